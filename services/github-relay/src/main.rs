//! GitHub OAuth Relay
//!
//! Single-binary Rust service that:
//! 1. Starts a GitHub OAuth handshake for an anonymous editor client
//! 2. Completes it on GitHub's callback, keeping the access token server-side
//! 3. Proxies a few authenticated GitHub API calls for the client
//!
//! The client only ever holds a signed session token; the GitHub client
//! secret and the access tokens never leave the relay.

mod auth;
mod config;
mod cors;
mod error;
mod flow;
mod metrics;
mod repos;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{FromRef, State};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use github_client::OAuthApp;
use metrics_exporter_prometheus::PrometheusHandle;
use secret_store::{MemoryStore, SecretStore, SecretsManagerStore};
use session_token::SessionCodec;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Environment, StoreBackend};
use crate::flow::{CallbackUrl, GitHubSettings, RelayState};
use crate::metrics::ServiceMetrics;

/// Maximum time to wait for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    relay: RelayState,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

impl FromRef<AppState> for RelayState {
    fn from_ref(state: &AppState) -> Self {
        state.relay.clone()
    }
}

/// Build the axum router with all routes and shared state.
///
/// Authenticated routes sit behind the session middleware. CORS wraps
/// everything, including rejections produced by inner layers.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let authenticated = Router::new()
        .route("/check-authorization", get(auth::check_authorization))
        .route("/repos/{owner}/{repo}/files", get(repos::head_commit))
        .route_layer(middleware::from_fn_with_state(
            state.relay.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/authorize", post(flow::authorize))
        .route("/callback", get(flow::callback))
        .merge(authenticated)
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track_requests,
        ))
        .layer(middleware::from_fn(cors::apply_cors))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting github-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        environment = ?config.server.environment,
        store_backend = ?config.store.backend,
        oauth_base_url = %config.github.oauth_base_url,
        api_base_url = %config.github.api_base_url,
        "configuration loaded"
    );

    if config.server.environment == Environment::Production && config.store.endpoint_url.is_some()
    {
        warn!("store.endpoint_url is ignored outside development mode");
    }

    let signing_secret = config
        .server
        .signing_secret
        .as_ref()
        .context("signing secret not loaded")?;
    let codec = SessionCodec::new(signing_secret).context("invalid signing secret")?;

    let client_secret = config
        .github
        .client_secret
        .clone()
        .context("GitHub client secret not loaded")?;

    let store: Arc<dyn SecretStore> = match config.store.backend {
        StoreBackend::Memory => {
            warn!("using in-memory secret store, sessions are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::SecretsManager => {
            let settings = config.secrets_manager_settings()?;
            info!(region = %settings.region, "using AWS Secrets Manager store");
            Arc::new(SecretsManagerStore::new(&settings))
        }
    };

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.github.timeout_secs))
        .user_agent(github_client::USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;

    let relay = RelayState {
        codec,
        store,
        http_client,
        github: GitHubSettings {
            app: OAuthApp {
                client_id: config.github.client_id.clone(),
                client_secret,
            },
            scope: config.github.scope.clone(),
            oauth_base_url: config.github.oauth_base_url.clone(),
            api_base_url: config.github.api_base_url.clone(),
        },
        callback_url: CallbackUrl::from_config(&config),
        state_max_age: Duration::from_secs(config.session.state_max_age_secs),
        session_max_age: Duration::from_secs(config.session.session_max_age_secs),
    };

    let app_state = AppState {
        relay,
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race the drain against
    // the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: status, store backend, uptime, request counters.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "store_backend": state.relay.store.backend(),
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
