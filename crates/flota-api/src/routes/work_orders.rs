//! # Work Order API
//!
//! Opening, assignment, execution reporting, completion and the
//! validate/reject decision.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use flota_core::{Timestamp, WorkOrderId};
use flota_state::{
    Completion, ExecutionUpdate, NewWorkOrder, Operation, WorkOrder, WorkOrderState,
};

use super::incidents::AllowedTransitionsResponse;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_id, extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkOrderListQuery {
    /// Only work orders in this state, e.g. `asignada`.
    #[param(value_type = Option<String>)]
    pub state: Option<WorkOrderState>,
}

/// Request to assign a technician.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub technician: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub planned_date: Option<Timestamp>,
}

impl Validate for AssignRequest {
    fn validate(&self) -> Result<(), String> {
        if self.technician.trim().is_empty() {
            return Err("technician must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request to reject a completed work order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

impl Validate for RejectRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/work-orders", post(create_work_order).get(list_work_orders))
        .route("/v1/work-orders/{id}", get(get_work_order))
        .route(
            "/v1/work-orders/{id}/allowed-transitions",
            get(allowed_transitions),
        )
        .route("/v1/work-orders/{id}/assign", post(assign_work_order))
        .route("/v1/work-orders/{id}/execution", post(record_execution))
        .route("/v1/work-orders/{id}/complete", post(complete_work_order))
        .route("/v1/work-orders/{id}/validate", post(validate_work_order))
        .route("/v1/work-orders/{id}/reject", post(reject_work_order))
}

/// POST /v1/work-orders: open a work order from an incident or a plan.
#[utoipa::path(
    post,
    path = "/v1/work-orders",
    request_body(content = Object, description = "Work order data with tagged origin"),
    responses(
        (status = 201, description = "Work order created"),
        (status = 409, description = "Incident already closed", body = crate::error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "work_orders"
)]
pub(crate) async fn create_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<NewWorkOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkOrder>), AppError> {
    let ctx = caller.require(Operation::CreateWorkOrder)?;
    let input = extract_json(body)?;
    let order = state.engine.create_work_order(ctx, input)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/work-orders
#[utoipa::path(
    get,
    path = "/v1/work-orders",
    params(WorkOrderListQuery),
    responses((status = 200, description = "Work orders of the caller's tenant")),
    tag = "work_orders"
)]
pub(crate) async fn list_work_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<WorkOrderListQuery>, QueryRejection>,
) -> Result<Json<Vec<WorkOrder>>, AppError> {
    caller.require(Operation::Read)?;
    let query = extract_query(query)?;
    Ok(Json(state.engine.work_orders(caller.tenant(), query.state)))
}

/// GET /v1/work-orders/{id}
#[utoipa::path(
    get,
    path = "/v1/work-orders/{id}",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "work_orders"
)]
pub(crate) async fn get_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    caller.require(Operation::Read)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.work_order(caller.tenant(), id)?))
}

/// GET /v1/work-orders/{id}/allowed-transitions
#[utoipa::path(
    get,
    path = "/v1/work-orders/{id}/allowed-transitions",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses((status = 200, description = "Allowed targets", body = AllowedTransitionsResponse)),
    tag = "work_orders"
)]
pub(crate) async fn allowed_transitions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AllowedTransitionsResponse>, AppError> {
    caller.require(Operation::Read)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    let order = state.engine.work_order(caller.tenant(), id)?;
    Ok(Json(AllowedTransitionsResponse {
        state: order.state.as_str().to_string(),
        version: order.version,
        allowed: order
            .allowed_transitions()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
    }))
}

/// POST /v1/work-orders/{id}/assign
#[utoipa::path(
    post,
    path = "/v1/work-orders/{id}/assign",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Technician assigned"),
        (
            status = 409,
            description = "Not pending or stale version",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "work_orders"
)]
pub(crate) async fn assign_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::AssignWorkOrder)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    let req = extract_validated_json(body)?;
    let order = state
        .engine
        .assign_work_order(ctx, id, &req.technician, req.planned_date)?;
    Ok(Json(order))
}

/// POST /v1/work-orders/{id}/execution: report times, materials or work
/// done. The first report on an assigned order starts it.
#[utoipa::path(
    post,
    path = "/v1/work-orders/{id}/execution",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body(content = Object, description = "Partial execution update"),
    responses((status = 200, description = "Execution recorded")),
    tag = "work_orders"
)]
pub(crate) async fn record_execution(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ExecutionUpdate>, JsonRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::RecordExecution)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    let update = extract_json(body)?;
    Ok(Json(state.engine.record_execution(ctx, id, update)?))
}

/// POST /v1/work-orders/{id}/complete
#[utoipa::path(
    post,
    path = "/v1/work-orders/{id}/complete",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body(content = Object, description = "Completion report"),
    responses((status = 200, description = "Completed with costs computed")),
    tag = "work_orders"
)]
pub(crate) async fn complete_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Completion>, JsonRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::CompleteWorkOrder)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    let completion = extract_json(body)?;
    Ok(Json(state.engine.complete_work_order(ctx, id, completion)?))
}

/// POST /v1/work-orders/{id}/validate
#[utoipa::path(
    post,
    path = "/v1/work-orders/{id}/validate",
    params(("id" = Uuid, Path, description = "Work order ID")),
    responses((status = 200, description = "Work order validated")),
    tag = "work_orders"
)]
pub(crate) async fn validate_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::ValidateWorkOrder)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.validate_work_order(ctx, id)?))
}

/// POST /v1/work-orders/{id}/reject
#[utoipa::path(
    post,
    path = "/v1/work-orders/{id}/reject",
    params(("id" = Uuid, Path, description = "Work order ID")),
    request_body = RejectRequest,
    responses((status = 200, description = "Work order rejected")),
    tag = "work_orders"
)]
pub(crate) async fn reject_work_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<WorkOrder>, AppError> {
    let ctx = caller.require(Operation::RejectWorkOrder)?;
    let id = WorkOrderId::from_uuid(extract_id(id)?);
    let req = extract_validated_json(body)?;
    Ok(Json(state.engine.reject_work_order(ctx, id, &req.reason)?))
}
