//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flota Maintenance API",
        version = "0.1.0",
        description = "Incidents, work orders, on-board equipment and their audit trail \
                       for a bus fleet maintenance back-office."
    ),
    paths(
        // Incidents
        crate::routes::incidents::create_incident,
        crate::routes::incidents::list_incidents,
        crate::routes::incidents::get_incident,
        crate::routes::incidents::transition_incident,
        crate::routes::incidents::edit_incident,
        crate::routes::incidents::allowed_transitions,
        crate::routes::incidents::sla_status,
        crate::routes::incidents::incident_work_orders,
        // Work orders
        crate::routes::work_orders::create_work_order,
        crate::routes::work_orders::list_work_orders,
        crate::routes::work_orders::get_work_order,
        crate::routes::work_orders::allowed_transitions,
        crate::routes::work_orders::assign_work_order,
        crate::routes::work_orders::record_execution,
        crate::routes::work_orders::complete_work_order,
        crate::routes::work_orders::validate_work_order,
        crate::routes::work_orders::reject_work_order,
        // Equipment
        crate::routes::equipment::register_equipment_type,
        crate::routes::equipment::list_equipment_types,
        crate::routes::equipment::register_equipment,
        crate::routes::equipment::list_equipment,
        crate::routes::equipment::get_equipment,
        crate::routes::equipment::relocate_equipment,
        crate::routes::equipment::list_movements,
        crate::routes::equipment::replay_movements,
        crate::routes::equipment::verify_movements,
        crate::routes::equipment::equipment_stats,
        // Audit
        crate::routes::audit::entity_history,
        crate::routes::audit::entity_export,
        crate::routes::audit::operation_entries,
        crate::routes::audit::verify_chain,
        // Billing
        crate::routes::billing::unbilled_work_orders,
        crate::routes::billing::mark_billed,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::incidents::TransitionIncidentRequest,
        crate::routes::incidents::AllowedTransitionsResponse,
        crate::routes::incidents::SlaStatusResponse,
        crate::routes::work_orders::AssignRequest,
        crate::routes::work_orders::RejectRequest,
    )),
    tags(
        (name = "incidents", description = "Fault intake and incident lifecycle"),
        (name = "work_orders", description = "Repair work orders"),
        (name = "equipment", description = "On-board equipment and the movement ledger"),
        (name = "audit", description = "Audit ledger queries"),
        (name = "billing", description = "Billing interface"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
