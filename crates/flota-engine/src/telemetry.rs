//! Counters published through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so library users and tests pay nothing.

use metrics::counter;

pub const TRANSITIONS: &str = "flota_transitions_total";
pub const SLA_BREACHES: &str = "flota_sla_breaches_total";
pub const MOVEMENTS: &str = "flota_movements_total";
pub const CONCURRENCY_CONFLICTS: &str = "flota_concurrency_conflicts_total";
pub const IDEMPOTENT_REPLAYS: &str = "flota_idempotent_replays_total";

pub(crate) fn record_transition(entity: &'static str) {
    counter!(TRANSITIONS, "entity" => entity).increment(1);
}

pub(crate) fn record_breach(kind: &'static str) {
    counter!(SLA_BREACHES, "kind" => kind).increment(1);
}

pub(crate) fn record_movement(kind: &'static str) {
    counter!(MOVEMENTS, "kind" => kind).increment(1);
}

pub(crate) fn record_conflict(entity: &'static str) {
    counter!(CONCURRENCY_CONFLICTS, "entity" => entity).increment(1);
}

pub(crate) fn record_replay(operation: &'static str) {
    counter!(IDEMPOTENT_REPLAYS, "operation" => operation).increment(1);
}
