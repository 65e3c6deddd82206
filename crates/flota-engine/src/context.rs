//! Explicit caller context passed to every mutating engine operation.

use flota_core::{Actor, ActorId, EngineError, OperationId, TenantId};

/// Who is calling, for which tenant, and under which retry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub tenant: TenantId,
    pub actor: Actor,
    /// Caller-supplied idempotency key. A retried operation with the same
    /// key returns the recorded outcome and writes nothing.
    pub operation_id: Option<OperationId>,
    /// Version the caller last read. A mismatch fails with
    /// [`EngineError::ConcurrencyConflict`].
    pub expected_version: Option<u64>,
}

impl OperationContext {
    pub fn new(tenant: TenantId, actor: Actor) -> Self {
        Self {
            tenant,
            actor,
            operation_id: None,
            expected_version: None,
        }
    }

    /// Build from raw identifiers, validating both.
    pub fn parse(tenant: &str, actor: &str) -> Result<Self, EngineError> {
        Ok(Self::new(
            TenantId::new(tenant)?,
            Actor::new(ActorId::new(actor)?),
        ))
    }

    /// Builder: attach an idempotency key.
    pub fn with_operation(mut self, operation_id: OperationId) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    /// Builder: require the entity to be at `version`.
    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Builder: record the actor's email on audit entries.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.actor = self.actor.with_email(email);
        self
    }
}
