//! Flat export of audit history for compliance reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::AuditEntry;

/// One row per changed field. Entries without deltas (create, login) yield
/// a single row with empty field columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditExportRow {
    pub timestamp: String,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub action: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub actor: String,
    pub actor_email: String,
}

/// Flatten entries into export rows, preserving their order.
pub fn flatten(entries: &[AuditEntry]) -> Vec<AuditExportRow> {
    let mut rows = Vec::new();
    for entry in entries {
        let row = |field: &str, old: Option<&str>, new: Option<&str>| AuditExportRow {
            timestamp: entry.at.to_iso8601(),
            entity_kind: entry.entity_kind.to_string(),
            entity_id: entry.entity_id,
            action: entry.action.to_string(),
            field: field.to_string(),
            old_value: old.unwrap_or_default().to_string(),
            new_value: new.unwrap_or_default().to_string(),
            actor: entry.actor.id.to_string(),
            actor_email: entry.actor.email.clone().unwrap_or_default(),
        };
        if entry.changes.is_empty() {
            rows.push(row("", None, None));
        } else {
            for delta in &entry.changes {
                rows.push(row(
                    &delta.field,
                    delta.before.as_deref(),
                    delta.after.as_deref(),
                ));
            }
        }
    }
    rows
}
