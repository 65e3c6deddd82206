//! # flota-equipment: Equipment Location Ledger
//!
//! Tracks where every physical unit is and what state it is in. A unit's
//! location and operational state change only by appending an immutable
//! [`MovementRecord`]; the current [`LedgerPosition`] is always equal to
//! replaying those records from an empty state.
//!
//! ## Movement rules
//!
//! - `alta` is the first movement and never repeats.
//! - `baja` is terminal: no movement is accepted afterwards.
//! - `instalacion`, `sustitucion` and `preinstalacion` need a bus.
//! - `retorno_laboratorio` needs the unit to be in a lab.
//! - Each movement's origin is the previous movement's destination.

pub mod equipment;
pub mod ledger;
pub mod location;
pub mod movement;

pub use equipment::{
    Characteristics, Equipment, EquipmentStats, EquipmentType, LedgerPosition, NewEquipment,
    OperationalState, Warranty,
};
pub use ledger::{
    plan_registration, plan_relocation, replay, verify_chain, ChainBreak, ChainReport,
    MovementAuthor, MovementPlan,
};
pub use location::{Location, LocationKind};
pub use movement::{MovementKind, MovementLinks, MovementRecord, MovementRequest};
