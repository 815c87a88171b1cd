//! OAuth handshake endpoints
//!
//! Endpoints:
//! - POST /authorize: create a pending session, return consent URL + session token
//! - GET  /callback: verify state, exchange code, store the access token
//!
//! The session token handed to the client doubles as the OAuth `state`
//! parameter. Its signature and age are the only proof that a callback
//! belongs to a session this relay started; the session record itself lives
//! in the secret store under the identifier embedded in the token.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use github_client::OAuthApp;
use secret_store::{SecretStore, SessionRecord};
use serde::{Deserialize, Serialize};
use session_token::SessionCodec;
use tracing::{info, instrument, warn};

use crate::config::{Config, Environment};
use crate::error::RelayError;
use crate::metrics;

/// Callback URL used in development mode.
pub const DEVELOPMENT_CALLBACK_URL: &str = "http://localhost:8080/callback";

/// Message shown in the browser once the handshake completes.
pub const COMPLETION_MESSAGE: &str = "Authorization complete. Feel free to return to VSCode.";

const CALLBACK_PATH: &str = "/callback";

/// Where GitHub should send the user after consent.
#[derive(Debug, Clone)]
pub enum CallbackUrl {
    /// Known ahead of time (development, or production with `public_url`)
    Fixed(String),
    /// Built from the request's Host / X-Forwarded-Proto headers
    FromRequest,
}

impl CallbackUrl {
    pub fn from_config(config: &Config) -> Self {
        match (config.server.environment, &config.server.public_url) {
            (Environment::Development, _) => Self::Fixed(DEVELOPMENT_CALLBACK_URL.to_string()),
            (Environment::Production, Some(base)) => Self::Fixed(format!(
                "{}{CALLBACK_PATH}",
                base.trim_end_matches('/')
            )),
            (Environment::Production, None) => Self::FromRequest,
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Result<String, RelayError> {
        match self {
            Self::Fixed(url) => Ok(url.clone()),
            Self::FromRequest => {
                let host = headers
                    .get(axum::http::header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        RelayError::Internal("cannot build callback URL without a Host header".into())
                    })?;
                let scheme = headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .filter(|p| *p == "http" || *p == "https")
                    .unwrap_or("https");
                Ok(format!("{scheme}://{host}{CALLBACK_PATH}"))
            }
        }
    }
}

/// GitHub endpoints and app credentials used by the relay.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub app: OAuthApp,
    pub scope: String,
    pub oauth_base_url: String,
    pub api_base_url: String,
}

/// Shared state for the handshake and authenticated endpoints. Built once at
/// startup and read-only afterwards.
#[derive(Clone)]
pub struct RelayState {
    pub codec: SessionCodec,
    pub store: Arc<dyn SecretStore>,
    pub http_client: reqwest::Client,
    pub github: GitHubSettings,
    pub callback_url: CallbackUrl,
    pub state_max_age: Duration,
    pub session_max_age: Duration,
}

/// Response body for POST /authorize.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub redirect_url: String,
    /// Signed session token; presented later as the bearer credential
    pub session_id: String,
}

/// POST /authorize: start a handshake.
///
/// Mints a session token, creates the pending record, and returns the GitHub
/// consent URL carrying the token as `state`.
#[instrument(skip_all)]
pub async fn authorize(
    State(state): State<RelayState>,
    headers: HeaderMap,
) -> Result<Json<AuthorizeResponse>, RelayError> {
    let identifier = session_token::new_identifier();
    let session_token = state.codec.mint(&identifier)?;

    let callback_url = state.callback_url.resolve(&headers)?;
    let redirect_url = github_client::build_authorization_url(
        &state.github.oauth_base_url,
        &state.github.app.client_id,
        &callback_url,
        &state.github.scope,
        &session_token,
    )
    .map_err(|e| RelayError::Internal(e.to_string()))?;

    state
        .store
        .create(&identifier, &SessionRecord::Pending)
        .await
        .map_err(|e| {
            metrics::record_store_error("create");
            RelayError::StoreUnavailable(format!("Secret creation failed - {e}"))
        })?;

    info!(session = short_id(&identifier), "authorization initiated");

    Ok(Json(AuthorizeResponse {
        redirect_url,
        session_id: session_token,
    }))
}

/// Query parameters GitHub appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// GET /callback: complete a handshake.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<RelayState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<&'static str, RelayError> {
    let (Some(token), Some(code)) = (non_empty(params.state), non_empty(params.code)) else {
        return Err(RelayError::MissingParameter("state or code"));
    };

    let identifier = match state.codec.verify(&token, state.state_max_age) {
        Ok(identifier) => identifier,
        Err(session_token::Error::Expired { identifier, .. }) => {
            discard_if_pending(state.store.as_ref(), &identifier).await;
            return Err(RelayError::Expired);
        }
        Err(e) => return Err(e.into()),
    };

    let record = state.store.get(&identifier).await.map_err(|e| match e {
        secret_store::Error::NotFound(_) => {
            RelayError::Unauthorized(format!("Secret fetch failed - {e}"))
        }
        secret_store::Error::Unavailable(_) => {
            metrics::record_store_error("get");
            RelayError::StoreUnavailable(format!("Secret fetch failed - {e}"))
        }
    })?;

    // A record moves from Pending to Authorized exactly once
    if !record.is_pending() {
        warn!(session = short_id(&identifier), "callback replayed for completed session");
        return Err(RelayError::Unauthorized("session already authorized".into()));
    }

    let redirect_uri = state.callback_url.resolve(&headers)?;
    let grant = github_client::exchange_code(
        &state.http_client,
        &state.github.oauth_base_url,
        &state.github.app,
        &code,
        &redirect_uri,
    )
    .await
    .map_err(|e| {
        metrics::record_upstream_error("exchange");
        RelayError::UpstreamExchangeFailed(e.to_string())
    })?;

    state
        .store
        .put(&identifier, &SessionRecord::Authorized(grant.access_token))
        .await
        .map_err(|e| {
            metrics::record_store_error("put");
            RelayError::StoreUnavailable(format!("Secret update failed - {e}"))
        })?;

    info!(
        session = short_id(&identifier),
        scope = %grant.scope,
        "authorization complete"
    );
    Ok(COMPLETION_MESSAGE)
}

/// Delete the record of a handshake whose state token expired. Completed
/// sessions are left alone so a replayed old callback cannot revoke them.
async fn discard_if_pending(store: &dyn SecretStore, identifier: &str) {
    match store.get(identifier).await {
        Ok(record) if record.is_pending() => {
            if let Err(e) = store.delete(identifier).await {
                metrics::record_store_error("delete");
                warn!(session = short_id(identifier), error = %e, "failed to discard expired session");
            } else {
                info!(session = short_id(identifier), "discarded expired pending session");
            }
        }
        Ok(_) | Err(secret_store::Error::NotFound(_)) => {}
        Err(e) => {
            metrics::record_store_error("get");
            warn!(session = short_id(identifier), error = %e, "expired session lookup failed");
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// First segment of a session identifier, for log correlation.
pub fn short_id(identifier: &str) -> &str {
    identifier.split('-').next().unwrap_or(identifier)
}
