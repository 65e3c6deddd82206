//! # Audit API
//!
//! Read-only views of the audit ledger. Reading audit history needs the
//! `read_audit` permission, which only auditors and managers hold.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use flota_audit::{AuditAction, AuditEntry, AuditExportRow, AuditFilter, ChainIntegrity};
use flota_core::{OperationId, Timestamp};
use flota_state::Operation;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_id, extract_query};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Maximum entries to return, newest first (default 100, max 1000).
    pub limit: Option<usize>,
    /// Keep only this action, e.g. `cambio_estado`.
    #[param(value_type = Option<String>)]
    pub action: Option<AuditAction>,
    /// Keep only entries at or after this RFC 3339 instant.
    #[param(value_type = Option<String>, format = DateTime)]
    pub since: Option<Timestamp>,
}

impl AuditQuery {
    fn limit(&self) -> Result<usize, AppError> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(0) => Err(AppError::Validation("limit must be positive".into())),
            Some(n) => Ok(n.min(MAX_LIMIT)),
        }
    }

    fn filter(&self) -> Option<AuditFilter> {
        if self.action.is_none() && self.since.is_none() {
            return None;
        }
        Some(AuditFilter {
            actions: self.action.into_iter().collect(),
            since: self.since,
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit/entities/{id}", get(entity_history))
        .route("/v1/audit/entities/{id}/export", get(entity_export))
        .route("/v1/audit/operations/{operation_id}", get(operation_entries))
        .route("/v1/audit/chain/verify", get(verify_chain))
}

/// GET /v1/audit/entities/{id}: history of one entity, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit/entities/{id}",
    params(("id" = Uuid, Path, description = "Entity ID"), AuditQuery),
    responses((status = 200, description = "Audit entries")),
    tag = "audit"
)]
pub(crate) async fn entity_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    caller.require(Operation::ReadAudit)?;
    let id = extract_id(id)?;
    let query = extract_query(query)?;
    let filter = query.filter();
    Ok(Json(state.engine.audit_history(
        caller.tenant(),
        id,
        query.limit()?,
        filter.as_ref(),
    )))
}

/// GET /v1/audit/entities/{id}/export: one flat row per changed field.
#[utoipa::path(
    get,
    path = "/v1/audit/entities/{id}/export",
    params(("id" = Uuid, Path, description = "Entity ID"), AuditQuery),
    responses((status = 200, description = "Flat export rows")),
    tag = "audit"
)]
pub(crate) async fn entity_export(
    State(state): State<AppState>,
    caller: CallerIdentity,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditExportRow>>, AppError> {
    caller.require(Operation::ReadAudit)?;
    let id = extract_id(id)?;
    let query = extract_query(query)?;
    let filter = query.filter();
    Ok(Json(state.engine.audit_export(
        caller.tenant(),
        id,
        query.limit()?,
        filter.as_ref(),
    )))
}

/// GET /v1/audit/operations/{operation_id}: entries written under one
/// idempotency key.
#[utoipa::path(
    get,
    path = "/v1/audit/operations/{operation_id}",
    params(("operation_id" = String, Path, description = "Caller-supplied operation id")),
    responses((status = 200, description = "Audit entries")),
    tag = "audit"
)]
pub(crate) async fn operation_entries(
    State(state): State<AppState>,
    caller: CallerIdentity,
    operation_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    caller.require(Operation::ReadAudit)?;
    let Path(raw) = operation_id.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let operation = OperationId::new(raw)?;
    Ok(Json(
        state.engine.audit_for_operation(caller.tenant(), &operation),
    ))
}

/// GET /v1/audit/chain/verify: recompute the ledger's hash chain.
#[utoipa::path(
    get,
    path = "/v1/audit/chain/verify",
    responses((status = 200, description = "Chain integrity report")),
    tag = "audit"
)]
pub(crate) async fn verify_chain(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ChainIntegrity>, AppError> {
    caller.require(Operation::ReadAudit)?;
    Ok(Json(state.engine.verify_audit_chain()))
}
