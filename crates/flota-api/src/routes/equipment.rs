//! # Equipment API
//!
//! Equipment types, registration (alta), relocation and the movement
//! ledger views: history, replay, chain verification and statistics.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use flota_core::EquipmentId;
use flota_equipment::{
    ChainReport, Equipment, EquipmentStats, EquipmentType, LedgerPosition, MovementRecord,
    MovementRequest, NewEquipment, OperationalState,
};
use flota_state::Operation;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_id, extract_json, extract_query};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EquipmentListQuery {
    /// Only units in this operational state, e.g. `en_servicio`.
    #[param(value_type = Option<String>)]
    pub state: Option<OperationalState>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/equipment-types",
            post(register_equipment_type).get(list_equipment_types),
        )
        .route("/v1/equipment", post(register_equipment).get(list_equipment))
        .route("/v1/equipment/{id}", get(get_equipment))
        .route(
            "/v1/equipment/{id}/movements",
            post(relocate_equipment).get(list_movements),
        )
        .route("/v1/equipment/{id}/movements/replay", get(replay_movements))
        .route("/v1/equipment/{id}/movements/verify", get(verify_movements))
        .route("/v1/equipment/{id}/stats", get(equipment_stats))
}

/// POST /v1/equipment-types
#[utoipa::path(
    post,
    path = "/v1/equipment-types",
    request_body(content = Object, description = "Equipment type with custom field definitions"),
    responses(
        (status = 201, description = "Type registered"),
        (
            status = 422,
            description = "Duplicate id or invalid field definitions",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "equipment"
)]
pub(crate) async fn register_equipment_type(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<EquipmentType>, JsonRejection>,
) -> Result<(StatusCode, Json<EquipmentType>), AppError> {
    caller.require(Operation::RegisterEquipment)?;
    let equipment_type = extract_json(body)?;
    let registered = state.engine.register_equipment_type(equipment_type)?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /v1/equipment-types
#[utoipa::path(
    get,
    path = "/v1/equipment-types",
    responses((status = 200, description = "Known equipment types")),
    tag = "equipment"
)]
pub(crate) async fn list_equipment_types(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<EquipmentType>>, AppError> {
    caller.require(Operation::Read)?;
    Ok(Json(state.engine.equipment_types()))
}

/// POST /v1/equipment: register a unit together with its `alta` movement.
#[utoipa::path(
    post,
    path = "/v1/equipment",
    request_body(content = Object, description = "Registration data"),
    responses(
        (status = 201, description = "Equipment registered"),
        (status = 404, description = "Unknown equipment type", body = crate::error::ErrorBody),
        (
            status = 422,
            description = "Duplicate serial or code, or invalid custom fields",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "equipment"
)]
pub(crate) async fn register_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<NewEquipment>, JsonRejection>,
) -> Result<(StatusCode, Json<Equipment>), AppError> {
    let ctx = caller.require(Operation::RegisterEquipment)?;
    let input = extract_json(body)?;
    let equipment = state.engine.register_equipment(ctx, input)?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// GET /v1/equipment
#[utoipa::path(
    get,
    path = "/v1/equipment",
    params(EquipmentListQuery),
    responses((status = 200, description = "Equipment of the caller's tenant")),
    tag = "equipment"
)]
pub(crate) async fn list_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<EquipmentListQuery>, QueryRejection>,
) -> Result<Json<Vec<Equipment>>, AppError> {
    caller.require(Operation::Read)?;
    let query = extract_query(query)?;
    Ok(Json(state.engine.equipment_list(caller.tenant(), query.state)))
}

/// GET /v1/equipment/{id}
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "equipment"
)]
pub(crate) async fn get_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Equipment>, AppError> {
    caller.require(Operation::Read)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.equipment(caller.tenant(), id)?))
}

/// POST /v1/equipment/{id}/movements: relocate a unit.
#[utoipa::path(
    post,
    path = "/v1/equipment/{id}/movements",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body(content = Object, description = "Movement kind, destination and links"),
    responses(
        (status = 201, description = "Movement recorded"),
        (status = 409, description = "Stale version", body = crate::error::ErrorBody),
        (
            status = 422,
            description = "Movement not allowed from the current position",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "equipment"
)]
pub(crate) async fn relocate_equipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Equipment>), AppError> {
    let ctx = caller.require(Operation::RelocateEquipment)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    let request = extract_json(body)?;
    let equipment = state.engine.relocate_equipment(ctx, id, request)?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// GET /v1/equipment/{id}/movements: the unit's ledger, oldest first.
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}/movements",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses((status = 200, description = "Movement records")),
    tag = "equipment"
)]
pub(crate) async fn list_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<MovementRecord>>, AppError> {
    caller.require(Operation::Read)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.movements(caller.tenant(), id)?))
}

/// GET /v1/equipment/{id}/movements/replay
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}/movements/replay",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses((status = 200, description = "Position rebuilt from the ledger")),
    tag = "equipment"
)]
pub(crate) async fn replay_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LedgerPosition>, AppError> {
    caller.require(Operation::Read)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.replay_movements(caller.tenant(), id)?))
}

/// GET /v1/equipment/{id}/movements/verify
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}/movements/verify",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses((status = 200, description = "Chain consistency report")),
    tag = "equipment"
)]
pub(crate) async fn verify_movements(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChainReport>, AppError> {
    caller.require(Operation::Read)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.verify_movements(caller.tenant(), id)?))
}

/// GET /v1/equipment/{id}/stats
#[utoipa::path(
    get,
    path = "/v1/equipment/{id}/stats",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses((status = 200, description = "Movement, failure and service-day counts")),
    tag = "equipment"
)]
pub(crate) async fn equipment_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EquipmentStats>, AppError> {
    caller.require(Operation::Read)?;
    let id = EquipmentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.equipment_stats(caller.tenant(), id)?))
}
