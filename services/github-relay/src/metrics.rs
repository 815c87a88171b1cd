//! Prometheus metrics exposition
//!
//! - `relay_requests_total` (counter): labels `status`, `method`
//! - `relay_request_duration_seconds` (histogram): label `status`
//! - `relay_upstream_errors_total` (counter): label `operation`
//! - `relay_store_errors_total` (counter): label `operation`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "relay_request_duration_seconds";

/// Bucket boundaries from 5ms to 30s. Requests that reach GitHub make up to
/// two serial upstream calls bounded by the client timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Counters reported by the health endpoint.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Build a recorder handle without installing it globally (for tests).
#[cfg(test)]
pub fn isolated_handle() -> PrometheusHandle {
    builder().build_recorder().handle()
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("relay_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "status" => status_str).record(duration_secs);
}

/// Record a failed GitHub call (`exchange`, `repository`, `branch`).
pub fn record_upstream_error(operation: &'static str) {
    metrics::counter!("relay_upstream_errors_total", "operation" => operation).increment(1);
}

/// Record a failed secret store call (`create`, `get`, `put`, `delete`).
pub fn record_store_error(operation: &'static str) {
    metrics::counter!("relay_store_errors_total", "operation" => operation).increment(1);
}

/// Middleware counting every request and its latency.
pub async fn track_requests(
    State(service): State<ServiceMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    service.requests_total.fetch_add(1, Ordering::Relaxed);

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        service.errors_total.fetch_add(1, Ordering::Relaxed);
    }
    record_request(status.as_u16(), &method, started.elapsed().as_secs_f64());
    response
}
