//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier the engine handles. Each one is a
//! distinct type, so an [`EquipmentId`] cannot be passed where a
//! [`WorkOrderId`] is expected.
//!
//! ## Validation
//!
//! UUID-based identifiers are valid by construction. String-based
//! identifiers ([`TenantId`], [`ActorId`], [`OperationId`]) reject empty or
//! oversized values at construction and at deserialization time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Maximum length accepted for string identifiers.
const MAX_STRING_ID_LEN: usize = 128;

/// Route deserialization of a string newtype through its validating
/// constructor so malformed values never enter the system.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Declare a UUID-backed identifier with its constructors and `Display`.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $ty:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Internal identifier of a reported fault.
    IncidentId,
    "incident"
);

uuid_id!(
    /// Internal identifier of a work order (OT).
    WorkOrderId,
    "work_order"
);

uuid_id!(
    /// Internal identifier of a physical equipment unit.
    EquipmentId,
    "equipment"
);

uuid_id!(
    /// Identifier of an immutable movement record.
    MovementId,
    "movement"
);

uuid_id!(
    /// Identifier of an immutable audit entry.
    AuditEntryId,
    "audit"
);

uuid_id!(
    /// Identifier of a preventive-maintenance plan that can originate work orders.
    PlanId,
    "plan"
);

// ---------------------------------------------------------------------------
// String-based identifiers
// ---------------------------------------------------------------------------

fn validate_string_id(kind: &str, raw: String) -> Result<String, EngineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_STRING_ID_LEN {
        return Err(EngineError::Validation(format!(
            "{kind} must not exceed {MAX_STRING_ID_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Tenant (operating company) that owns every record it creates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a validated tenant identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, EngineError> {
        validate_string_id("tenant id", raw.into()).map(Self)
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(TenantId);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User (technician, manager, operator, auditor) performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Create a validated actor identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, EngineError> {
        validate_string_id("actor id", raw.into()).map(Self)
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(ActorId);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied key that makes a retried request idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Create a validated operation identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, EngineError> {
        validate_string_id("operation id", raw.into()).map(Self)
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(OperationId);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity recorded on audit entries: who did it, and their email
/// when the hosting service knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Actor {
    /// An actor known only by id.
    pub fn new(id: ActorId) -> Self {
        Self { id, email: None }
    }

    /// Builder: attach the actor's email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_distinct() {
        assert_ne!(IncidentId::new(), IncidentId::new());
    }

    #[test]
    fn uuid_id_display_has_prefix() {
        let uuid = Uuid::nil();
        assert_eq!(
            WorkOrderId::from_uuid(uuid).to_string(),
            "work_order:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn uuid_id_serializes_transparently() {
        let id = EquipmentId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn tenant_id_trims_whitespace() {
        let t = TenantId::new("  emt-madrid ").unwrap();
        assert_eq!(t.as_str(), "emt-madrid");
    }

    #[test]
    fn empty_string_ids_rejected() {
        assert!(TenantId::new("").is_err());
        assert!(ActorId::new("   ").is_err());
        assert!(OperationId::new("").is_err());
    }

    #[test]
    fn oversized_string_id_rejected() {
        let long = "x".repeat(MAX_STRING_ID_LEN + 1);
        assert!(ActorId::new(long).is_err());
    }

    #[test]
    fn deserialize_routes_through_validation() {
        let ok: Result<TenantId, _> = serde_json::from_str("\"t1\"");
        assert!(ok.is_ok());
        let bad: Result<TenantId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn actor_email_omitted_when_absent() {
        let actor = Actor::new(ActorId::new("tech-7").unwrap());
        let json = serde_json::to_value(&actor).unwrap();
        assert!(json.get("email").is_none());
        let with = actor.with_email("tech7@example.org");
        assert_eq!(with.email.as_deref(), Some("tech7@example.org"));
    }
}
