//! # Incident API
//!
//! Intake, lifecycle transitions, field edits and SLA views of incidents.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use flota_core::IncidentId;
use flota_sla::{SlaBreach, SlaEvaluation};
use flota_state::{Incident, IncidentEdit, IncidentState, NewIncident, Operation, WorkOrder};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_id, extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncidentListQuery {
    /// Only incidents in this state, e.g. `en_analisis`.
    #[param(value_type = Option<String>)]
    pub state: Option<IncidentState>,
}

/// Request to move an incident to another state.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionIncidentRequest {
    /// Target state, e.g. `en_intervencion`.
    #[schema(value_type = String)]
    pub to: IncidentState,
    /// Free-text observation stored on the transition record.
    #[serde(default)]
    pub observation: Option<String>,
}

impl Validate for TransitionIncidentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.observation.as_ref().is_some_and(|o| o.len() > 2000) {
            return Err("observation must not exceed 2000 characters".to_string());
        }
        Ok(())
    }
}

/// What a UI may offer next for an entity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AllowedTransitionsResponse {
    pub state: String,
    pub version: u64,
    pub allowed: Vec<String>,
}

/// Current SLA standing of an incident.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlaStatusResponse {
    #[schema(value_type = Object)]
    pub evaluation: SlaEvaluation,
    #[schema(value_type = Vec<Object>)]
    pub breaches: Vec<SlaBreach>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/incidents", post(create_incident).get(list_incidents))
        .route("/v1/incidents/{id}", get(get_incident).patch(edit_incident))
        .route("/v1/incidents/{id}/transitions", post(transition_incident))
        .route(
            "/v1/incidents/{id}/allowed-transitions",
            get(allowed_transitions),
        )
        .route("/v1/incidents/{id}/sla", get(sla_status))
        .route("/v1/incidents/{id}/work-orders", get(incident_work_orders))
}

/// POST /v1/incidents: register a reported fault.
#[utoipa::path(
    post,
    path = "/v1/incidents",
    request_body(content = Object, description = "Incident intake"),
    responses(
        (status = 201, description = "Incident created"),
        (
            status = 404,
            description = "Affected equipment not found",
            body = crate::error::ErrorBody
        ),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "incidents"
)]
pub(crate) async fn create_incident(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<NewIncident>, JsonRejection>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    let ctx = caller.require(Operation::CreateIncident)?;
    let input = extract_json(body)?;
    let incident = state.engine.create_incident(ctx, input)?;
    Ok((StatusCode::CREATED, Json(incident)))
}

/// GET /v1/incidents: list the tenant's incidents by code.
#[utoipa::path(
    get,
    path = "/v1/incidents",
    params(IncidentListQuery),
    responses((status = 200, description = "Incidents of the caller's tenant")),
    tag = "incidents"
)]
pub(crate) async fn list_incidents(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<IncidentListQuery>, QueryRejection>,
) -> Result<Json<Vec<Incident>>, AppError> {
    caller.require(Operation::Read)?;
    let query = extract_query(query)?;
    Ok(Json(state.engine.incidents(caller.tenant(), query.state)))
}

/// GET /v1/incidents/{id}: get one incident.
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}",
    params(("id" = Uuid, Path, description = "Incident ID")),
    responses(
        (status = 200, description = "Incident found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "incidents"
)]
pub(crate) async fn get_incident(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Incident>, AppError> {
    caller.require(Operation::Read)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    Ok(Json(state.engine.incident(caller.tenant(), id)?))
}

/// POST /v1/incidents/{id}/transitions: move an incident along its lifecycle.
#[utoipa::path(
    post,
    path = "/v1/incidents/{id}/transitions",
    params(("id" = Uuid, Path, description = "Incident ID")),
    request_body = TransitionIncidentRequest,
    responses(
        (status = 200, description = "Transition applied"),
        (
            status = 409,
            description = "Transition not allowed or stale version",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "incidents"
)]
pub(crate) async fn transition_incident(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TransitionIncidentRequest>, JsonRejection>,
) -> Result<Json<Incident>, AppError> {
    let ctx = caller.require(Operation::TransitionIncident)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    let req = extract_validated_json(body)?;
    let incident = state
        .engine
        .transition_incident(ctx, id, req.to, req.observation)?;
    Ok(Json(incident))
}

/// PATCH /v1/incidents/{id}: edit one field, e.g.
/// `{"field":"diagnosis","value":"antena suelta"}`.
#[utoipa::path(
    patch,
    path = "/v1/incidents/{id}",
    params(("id" = Uuid, Path, description = "Incident ID")),
    request_body(content = Object, description = "Tagged field edit"),
    responses(
        (status = 200, description = "Edit applied"),
        (
            status = 409,
            description = "Incident closed or stale version",
            body = crate::error::ErrorBody
        ),
    ),
    tag = "incidents"
)]
pub(crate) async fn edit_incident(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<IncidentEdit>, JsonRejection>,
) -> Result<Json<Incident>, AppError> {
    let ctx = caller.require(Operation::EditIncident)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    let edit = extract_json(body)?;
    Ok(Json(state.engine.edit_incident(ctx, id, edit)?))
}

/// GET /v1/incidents/{id}/allowed-transitions: states reachable from here.
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/allowed-transitions",
    params(("id" = Uuid, Path, description = "Incident ID")),
    responses((status = 200, description = "Allowed targets", body = AllowedTransitionsResponse)),
    tag = "incidents"
)]
pub(crate) async fn allowed_transitions(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AllowedTransitionsResponse>, AppError> {
    caller.require(Operation::Read)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    let incident = state.engine.incident(caller.tenant(), id)?;
    Ok(Json(AllowedTransitionsResponse {
        state: incident.state.as_str().to_string(),
        version: incident.version,
        allowed: incident
            .allowed_transitions()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
    }))
}

/// GET /v1/incidents/{id}/sla: evaluation and outstanding breaches now.
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/sla",
    params(("id" = Uuid, Path, description = "Incident ID")),
    responses((status = 200, description = "SLA status", body = SlaStatusResponse)),
    tag = "incidents"
)]
pub(crate) async fn sla_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SlaStatusResponse>, AppError> {
    caller.require(Operation::Read)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    let evaluation = state.engine.evaluate_sla(caller.tenant(), id)?;
    let breaches = state.engine.sla_breaches(caller.tenant(), id)?;
    Ok(Json(SlaStatusResponse {
        evaluation,
        breaches,
    }))
}

/// GET /v1/incidents/{id}/work-orders: work orders opened from an incident.
#[utoipa::path(
    get,
    path = "/v1/incidents/{id}/work-orders",
    params(("id" = Uuid, Path, description = "Incident ID")),
    responses((status = 200, description = "Work orders by code")),
    tag = "incidents"
)]
pub(crate) async fn incident_work_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<WorkOrder>>, AppError> {
    caller.require(Operation::Read)?;
    let id = IncidentId::from_uuid(extract_id(id)?);
    state.engine.incident(caller.tenant(), id)?;
    Ok(Json(state.engine.work_orders_for_incident(caller.tenant(), id)))
}
