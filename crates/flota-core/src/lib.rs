//! # flota-core: Foundational Types for the Maintenance Engine
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! primitives every other `flota-*` crate builds on and depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `IncidentId`, `WorkOrderId`,
//!    `EquipmentId`, `MovementId`, `AuditEntryId`, `TenantId`, `ActorId`,
//!    `OperationId`. You cannot pass a work order id where an incident id is
//!    expected.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision, so
//!    SLA arithmetic and audit ordering never depend on a local offset.
//!
//! 3. **Injectable time.** Every component reads time through the [`Clock`]
//!    trait. Tests drive a [`ManualClock`]; production uses [`SystemClock`].
//!
//! 4. **One error taxonomy.** [`EngineError`] carries the five recoverable
//!    failure kinds the engine reports to its callers.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `flota-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod clock;
pub mod criticality;
pub mod custom_field;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use amount::{round_money, MONEY_SCALE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use criticality::{Criticality, CriticalityFlags};
pub use custom_field::{validate_custom_fields, CustomFieldDef, CustomFieldKind, CustomFieldValue};
pub use error::{EngineError, ErrorKind};
pub use identity::{
    Actor, ActorId, AuditEntryId, EquipmentId, IncidentId, MovementId, OperationId, PlanId,
    TenantId, WorkOrderId,
};
pub use temporal::Timestamp;
