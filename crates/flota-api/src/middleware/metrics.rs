//! # Request Metrics
//!
//! Per-request counters published through the `metrics` facade. The binary
//! installs the Prometheus recorder; without one the calls are no-ops.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Middleware that counts requests and error responses by route and status.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().as_str().to_owned();

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!(
        "flota_http_requests_total",
        "method" => method,
        "route" => route.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!("flota_http_errors_total", "route" => route).increment(1);
    }

    response
}
