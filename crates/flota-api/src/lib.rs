//! # flota-api: HTTP Boundary for the Maintenance Engine
//!
//! Exposes the engine operations over axum. The API owns two concerns the
//! engine deliberately leaves out: who the caller is (headers, see
//! [`auth`]) and whether their role may invoke the operation.
//!
//! ## API Surface
//!
//! | Prefix               | Module                      |
//! |----------------------|-----------------------------|
//! | `/v1/incidents/*`    | [`routes::incidents`]       |
//! | `/v1/work-orders/*`  | [`routes::work_orders`]     |
//! | `/v1/equipment*`     | [`routes::equipment`]       |
//! | `/v1/audit/*`        | [`routes::audit`]           |
//! | `/v1/billing/*`      | [`routes::billing`]         |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → CallerMiddleware → Handler
//! ```
//!
//! `/health/*`, `/metrics` and `/openapi.json` sit outside the caller
//! middleware.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::incidents::router())
        .merge(routes::work_orders::router())
        .merge(routes::equipment::router())
        .merge(routes::audit::router())
        .merge(routes::billing::router())
        .layer(from_fn(auth::caller_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer());

    let open = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .merge(openapi::router());

    Router::new().merge(open).merge(api).with_state(state)
}

async fn liveness() -> &'static str {
    "ok"
}

/// Ready once the audit chain verifies; a broken chain means the process
/// should not accept writes.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.audit_integrity().chain_valid {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "audit chain broken")
    }
}

/// Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::NotFound("metrics recorder not installed".into()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
