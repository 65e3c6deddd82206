//! # flota-state: Maintenance State Machines
//!
//! The incident and work order lifecycles. Both are enum-based machines
//! whose legal moves live in a static table ([`LifecycleState`]), so the
//! engine and any UI derive "what can happen next" from the same data.
//!
//! Aggregates here are plain values. Each mutating method validates fully
//! before writing and returns the audit deltas of the change; making the
//! write and its audit entry atomic is the engine's job.
//!
//! - **Incident** (`incident.rs`): `nueva → en_analisis → en_intervencion →
//!   resuelta → cerrada`, with `reabierta` re-entering analysis.
//! - **Work order** (`work_order.rs`): `pendiente → asignada → en_curso →
//!   completada → validada | rechazada`.
//! - **Roles** (`roles.rs`): the role/operation permission table enforced by
//!   the hosting layer.

pub mod incident;
pub mod lifecycle;
pub mod materials;
pub mod roles;
pub mod work_order;

pub use incident::{
    Incident, IncidentEdit, IncidentState, IncidentTimestamps, NewIncident, SlaSnapshot,
};
pub use lifecycle::{LifecycleState, TransitionRecord};
pub use materials::{
    materials_cost, validate_materials, MaterialKind, MaterialLine, TestOutcome, TestResult,
    MAX_QUANTITY, MAX_UNIT_COST,
};
pub use roles::{Operation, Role, UnknownRole};
pub use work_order::{
    Completion, CostRates, Execution, ExecutionUpdate, NewWorkOrder, WorkOrder, WorkOrderCosts,
    WorkOrderOrigin, WorkOrderState, WorkOrderType,
};
