//! Audit entry types.

use flota_core::{Actor, AuditEntryId, OperationId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityKind {
    Incidencia,
    OrdenTrabajo,
    Equipo,
    MovimientoEquipo,
    Usuario,
}

impl AuditEntityKind {
    /// Return the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incidencia => "incidencia",
            Self::OrdenTrabajo => "orden_trabajo",
            Self::Equipo => "equipo",
            Self::MovimientoEquipo => "movimiento_equipo",
            Self::Usuario => "usuario",
        }
    }
}

impl std::fmt::Display for AuditEntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of mutation the entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    CambioEstado,
    Movimiento,
    Login,
    Logout,
}

impl AuditAction {
    /// Return the string representation of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CambioEstado => "cambio_estado",
            Self::Movimiento => "movimiento",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }

    /// Actions that must carry at least one real change.
    pub fn requires_changes(&self) -> bool {
        matches!(self, Self::Update | Self::CambioEstado | Self::Movimiento)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field's value before and after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldDelta {
    /// A field that changed from `before` to `after`.
    pub fn changed(
        field: impl Into<String>,
        before: impl std::fmt::Display,
        after: impl std::fmt::Display,
    ) -> Self {
        Self {
            field: field.into(),
            before: Some(before.to_string()),
            after: Some(after.to_string()),
        }
    }

    /// A field set for the first time.
    pub fn set(field: impl Into<String>, after: impl std::fmt::Display) -> Self {
        Self {
            field: field.into(),
            before: None,
            after: Some(after.to_string()),
        }
    }

    /// A field whose values may each be absent.
    pub fn optional(
        field: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Self {
        Self {
            field: field.into(),
            before,
            after,
        }
    }

    /// Whether the delta records an actual change.
    pub fn is_change(&self) -> bool {
        self.before != self.after
    }
}

/// An audit entry as built by a producer, before the ledger assigns an id,
/// sequence number and hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub tenant: TenantId,
    pub entity_kind: AuditEntityKind,
    pub entity_id: Uuid,
    pub actor: Actor,
    pub action: AuditAction,
    pub changes: Vec<FieldDelta>,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
}

impl AuditDraft {
    pub fn new(
        tenant: TenantId,
        entity_kind: AuditEntityKind,
        entity_id: Uuid,
        actor: Actor,
        action: AuditAction,
        at: Timestamp,
    ) -> Self {
        Self {
            tenant,
            entity_kind,
            entity_id,
            actor,
            action,
            changes: Vec::new(),
            at,
            operation_id: None,
        }
    }

    /// Builder: attach field deltas.
    pub fn with_changes(mut self, changes: Vec<FieldDelta>) -> Self {
        self.changes = changes;
        self
    }

    /// Builder: key the entry on a caller-supplied operation id.
    pub fn with_operation(mut self, operation_id: Option<OperationId>) -> Self {
        self.operation_id = operation_id;
        self
    }
}

/// An immutable, ledger-assigned audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    /// Position in the ledger, starting at 1.
    pub sequence: u64,
    pub tenant: TenantId,
    pub entity_kind: AuditEntityKind,
    pub entity_id: Uuid,
    pub actor: Actor,
    pub action: AuditAction,
    pub changes: Vec<FieldDelta>,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
    /// Hash of the previous entry (all zeros for the first).
    pub previous_hash: String,
    /// SHA-256 over this entry's content and `previous_hash`.
    pub entry_hash: String,
}

/// Hash of the (empty) predecessor of the first entry.
pub(crate) const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// The content that goes into an entry's hash.
#[derive(Serialize)]
struct HashInput<'a> {
    id: &'a AuditEntryId,
    sequence: u64,
    tenant: &'a TenantId,
    entity_kind: AuditEntityKind,
    entity_id: &'a Uuid,
    actor: &'a Actor,
    action: AuditAction,
    changes: &'a [FieldDelta],
    at: &'a Timestamp,
    operation_id: &'a Option<OperationId>,
    previous_hash: &'a str,
}

impl AuditEntry {
    /// Seal a draft into an entry chained to `previous_hash`.
    pub(crate) fn seal(draft: AuditDraft, sequence: u64, previous_hash: &str) -> Self {
        let mut entry = Self {
            id: AuditEntryId::new(),
            sequence,
            tenant: draft.tenant,
            entity_kind: draft.entity_kind,
            entity_id: draft.entity_id,
            actor: draft.actor,
            action: draft.action,
            changes: draft.changes,
            at: draft.at,
            operation_id: draft.operation_id,
            previous_hash: previous_hash.to_string(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Recompute the hash from the entry's content.
    pub fn compute_hash(&self) -> String {
        let input = HashInput {
            id: &self.id,
            sequence: self.sequence,
            tenant: &self.tenant,
            entity_kind: self.entity_kind,
            entity_id: &self.entity_id,
            actor: &self.actor,
            action: self.action,
            changes: &self.changes,
            at: &self.at,
            operation_id: &self.operation_id,
            previous_hash: &self.previous_hash,
        };
        // Serializing plain structs of strings cannot fail; an empty
        // buffer would still produce a hash that fails verification.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Value of `field` after this mutation, if the entry touched it.
    pub fn after_value(&self, field: &str) -> Option<&str> {
        self.changes
            .iter()
            .find(|d| d.field == field)
            .and_then(|d| d.after.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flota_core::ActorId;

    fn draft() -> AuditDraft {
        AuditDraft::new(
            TenantId::new("t1").unwrap(),
            AuditEntityKind::Incidencia,
            Uuid::nil(),
            Actor::new(ActorId::new("op-1").unwrap()),
            AuditAction::CambioEstado,
            Timestamp::parse("2026-02-02T10:00:00Z").unwrap(),
        )
        .with_changes(vec![FieldDelta::changed("estado", "nueva", "en_analisis")])
    }

    #[test]
    fn action_serializes_spanish_state_change() {
        assert_eq!(
            serde_json::to_string(&AuditAction::CambioEstado).unwrap(),
            "\"cambio_estado\""
        );
        assert_eq!(AuditEntityKind::OrdenTrabajo.as_str(), "orden_trabajo");
    }

    #[test]
    fn delta_change_detection() {
        assert!(FieldDelta::changed("estado", "a", "b").is_change());
        assert!(!FieldDelta::changed("estado", "a", "a").is_change());
        assert!(FieldDelta::set("diagnostico", "x").is_change());
    }

    #[test]
    fn sealed_hash_verifies_and_detects_tampering() {
        let mut entry = AuditEntry::seal(draft(), 1, GENESIS_HASH);
        assert_eq!(entry.entry_hash, entry.compute_hash());
        assert_eq!(entry.entry_hash.len(), 64);
        entry.changes[0].after = Some("cerrada".into());
        assert_ne!(entry.entry_hash, entry.compute_hash());
    }

    #[test]
    fn after_value_lookup() {
        let entry = AuditEntry::seal(draft(), 1, GENESIS_HASH);
        assert_eq!(entry.after_value("estado"), Some("en_analisis"));
        assert_eq!(entry.after_value("diagnostico"), None);
    }
}
