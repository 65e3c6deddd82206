//! # Billing API
//!
//! What is ready to invoice, and marking it invoiced.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use flota_core::WorkOrderId;
use flota_state::{Operation, WorkOrder};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::extract_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/billing/unbilled", get(unbilled_work_orders))
        .route("/v1/billing/work-orders/{id}/billed", post(mark_billed))
}

/// GET /v1/billing/unbilled: validated, billable work orders not yet billed.
#[utoipa::path(
    get,
    path = "/v1/billing/unbilled",
    responses((status = 200, description = "Work orders ready to invoice")),
    tag = "billing"
)]
pub(crate) async fn unbilled_work_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<WorkOrder>>, AppError> {
    caller.require(Operation::ManageBilling)?;
    Ok(Json(state.engine.unbilled_work_orders(caller.tenant())))
}

/// POST /v1/billing/work-orders/{id}/billed
#[utoipa::path(
    post,
    path = "/v1/billing/work-orders/{id}/billed",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Billing stamped"),
        (
            status = 409,
            description = "Not billable or already billed",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "billing"
)]
pub(crate) async fn mark_billed(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::ManageBilling)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.mark_billed(ctx, id)?))
}
