//! # flota-sla: Service-Level Engine
//!
//! Pure functions of incident data and the current time. Nothing in this
//! crate holds state or mutates an incident; callers persist the returned
//! values into the incident's SLA snapshot.
//!
//! - [`policy`]: per-criticality attention and resolution windows.
//! - [`evaluation`]: deadline computation and breach evaluation.
//! - [`sweep`]: breach detection for the periodic, read-only sweep.

pub mod evaluation;
pub mod policy;
pub mod sweep;

pub use evaluation::{compute_deadlines, evaluate, SlaDeadlines, SlaEvaluation, SlaTimestamps};
pub use policy::{SlaPolicy, SlaWindows, MAX_WINDOW_MINUTES};
pub use sweep::{detect_breaches, BreachKind, SlaBreach};
