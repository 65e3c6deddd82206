//! # Engine
//!
//! [`Engine`] owns the aggregate stores, the audit and movement ledgers,
//! the idempotency registry and the per-tenant code sequences. Every
//! mutating operation runs as one unit of work:
//!
//! 1. take the aggregate store's write lock, then the ledger lock;
//! 2. return the recorded outcome if the operation id was already applied;
//! 3. check the caller's expected version;
//! 4. compute the next entity state on a copy, plus its audit entries and
//!    movement record;
//! 5. append audit entries (the only step that can still fail), then the
//!    movement, then replace the entity.
//!
//! Nothing is written before step 5, and nothing in step 5 can fail after
//! the audit append succeeds, so a failed operation leaves no trace.
//! Locks are always taken in the order incidents, work orders, equipment,
//! ledgers; an operation that needs to read another aggregate does so
//! before taking any write lock.
//!
//! Notifications are delivered after the locks are released.

mod audit;
mod billing;
mod equipment;
mod incidents;
mod work_orders;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use flota_audit::{AuditAction, AuditDraft, AuditEntityKind, AuditLedger, FieldDelta};
use flota_core::{Clock, EngineError, EquipmentId, OperationId, SystemClock, TenantId, Timestamp};
use flota_equipment::{Equipment, EquipmentType, MovementRecord};
use flota_state::{Incident, WorkOrder};

use crate::config::EngineConfig;
use crate::context::OperationContext;
use crate::events::{Notification, NotificationSink, TracingSink};
use crate::store::{Aggregate, Store, StoreWriter};
use crate::telemetry;

// ─── Idempotency ─────────────────────────────────────────────────────

/// Snapshot of what an applied operation returned.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Incident(Box<Incident>),
    WorkOrder(Box<WorkOrder>),
    Equipment(Box<Equipment>),
}

/// Aggregates whose post-operation state can be recorded for retries.
pub(crate) trait Recordable: Aggregate {
    fn record(&self) -> Outcome;
    fn recall(outcome: &Outcome) -> Option<Self>;
}

impl Recordable for Incident {
    fn record(&self) -> Outcome {
        Outcome::Incident(Box::new(self.clone()))
    }
    fn recall(outcome: &Outcome) -> Option<Self> {
        match outcome {
            Outcome::Incident(i) => Some((**i).clone()),
            _ => None,
        }
    }
}

impl Recordable for WorkOrder {
    fn record(&self) -> Outcome {
        Outcome::WorkOrder(Box::new(self.clone()))
    }
    fn recall(outcome: &Outcome) -> Option<Self> {
        match outcome {
            Outcome::WorkOrder(w) => Some((**w).clone()),
            _ => None,
        }
    }
}

impl Recordable for Equipment {
    fn record(&self) -> Outcome {
        Outcome::Equipment(Box::new(self.clone()))
    }
    fn recall(outcome: &Outcome) -> Option<Self> {
        match outcome {
            Outcome::Equipment(e) => Some((**e).clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Applied {
    operation: &'static str,
    outcome: Outcome,
}

/// Which per-tenant sequence a code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CodeKind {
    Incident,
    WorkOrder,
}

// ─── Ledgers ─────────────────────────────────────────────────────────

/// Everything appended alongside an aggregate write, behind one lock.
#[derive(Debug)]
pub(crate) struct Ledgers {
    pub(crate) audit: AuditLedger,
    pub(crate) movements: HashMap<EquipmentId, Vec<MovementRecord>>,
    applied: HashMap<(TenantId, OperationId), Applied>,
    /// Insertion order of `applied`, oldest first.
    applied_order: VecDeque<(TenantId, OperationId)>,
    applied_capacity: usize,
    sequences: HashMap<(TenantId, CodeKind), u64>,
}

impl Ledgers {
    fn new(applied_capacity: usize) -> Self {
        Self {
            audit: AuditLedger::new(),
            movements: HashMap::new(),
            applied: HashMap::new(),
            applied_order: VecDeque::new(),
            applied_capacity,
            sequences: HashMap::new(),
        }
    }

    /// The recorded outcome of `ctx.operation_id`, if it was applied.
    ///
    /// Reusing an operation id for a different operation, or for the same
    /// operation on a different entity, is a validation error.
    fn recall<T: Recordable>(
        &self,
        ctx: &OperationContext,
        operation: &'static str,
        target: Option<T::Id>,
    ) -> Result<Option<T>, EngineError> {
        let Some(op) = &ctx.operation_id else {
            return Ok(None);
        };
        let Some(applied) = self.applied.get(&(ctx.tenant.clone(), op.clone())) else {
            return Ok(None);
        };
        let reused = || {
            EngineError::Validation(format!(
                "operation id {op} was already used for {}",
                applied.operation
            ))
        };
        if applied.operation != operation {
            return Err(reused());
        }
        let prior = T::recall(&applied.outcome).ok_or_else(reused)?;
        if target.is_some_and(|id| id != prior.id()) {
            return Err(reused());
        }
        telemetry::record_replay(operation);
        tracing::info!(operation, operation_id = %op, "replaying recorded outcome");
        Ok(Some(prior))
    }

    fn peek_code(&self, tenant: &TenantId, kind: CodeKind) -> u64 {
        self.sequences
            .get(&(tenant.clone(), kind))
            .copied()
            .unwrap_or(0)
            + 1
    }

    fn advance_code(&mut self, tenant: &TenantId, kind: CodeKind, to: u64) {
        self.sequences.insert((tenant.clone(), kind), to);
    }

    /// Append everything a unit produced. Fails, writing nothing, only if
    /// the audit ledger rejects an entry.
    fn commit<T: Recordable>(
        &mut self,
        ctx: &OperationContext,
        operation: &'static str,
        entity: &T,
        audit: Vec<AuditDraft>,
        movement: Option<MovementRecord>,
    ) -> Result<(), EngineError> {
        self.audit.append_batch(audit)?;
        if let Some(record) = movement {
            self.movements
                .entry(record.equipment_id)
                .or_default()
                .push(record);
        }
        if let Some(op) = &ctx.operation_id {
            self.remember(
                (ctx.tenant.clone(), op.clone()),
                Applied {
                    operation,
                    outcome: entity.record(),
                },
            );
        }
        Ok(())
    }

    /// Record an applied operation, forgetting the oldest beyond capacity.
    fn remember(&mut self, key: (TenantId, OperationId), applied: Applied) {
        if self.applied.insert(key.clone(), applied).is_none() {
            self.applied_order.push_back(key);
        }
        while self.applied_order.len() > self.applied_capacity {
            if let Some(oldest) = self.applied_order.pop_front() {
                self.applied.remove(&oldest);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn applied_len(&self) -> usize {
        self.applied.len()
    }
}

// ─── Unit of work ────────────────────────────────────────────────────

/// The result of planning one operation, before anything is written.
#[derive(Debug)]
pub(crate) struct Unit<T> {
    pub(crate) entity: T,
    pub(crate) audit: Vec<AuditDraft>,
    pub(crate) movement: Option<MovementRecord>,
    pub(crate) events: Vec<Notification>,
}

impl<T: Aggregate> Unit<T> {
    /// A unit with a single audit entry on `entity`; no entry if `changes`
    /// is empty and the action requires changes.
    pub(crate) fn audited(
        ctx: &OperationContext,
        kind: AuditEntityKind,
        entity: T,
        action: AuditAction,
        changes: Vec<FieldDelta>,
        at: Timestamp,
    ) -> Self {
        let audit = if changes.is_empty() && action.requires_changes() {
            Vec::new()
        } else {
            vec![draft(ctx, kind, entity.uuid(), action, changes, at)]
        };
        Self {
            entity,
            audit,
            movement: None,
            events: Vec::new(),
        }
    }

    pub(crate) fn with_movement(mut self, record: MovementRecord) -> Self {
        self.movement = Some(record);
        self
    }

    pub(crate) fn notify(mut self, event: Notification) -> Self {
        self.events.push(event);
        self
    }
}

pub(crate) fn draft(
    ctx: &OperationContext,
    kind: AuditEntityKind,
    entity_id: Uuid,
    action: AuditAction,
    changes: Vec<FieldDelta>,
    at: Timestamp,
) -> AuditDraft {
    AuditDraft::new(ctx.tenant.clone(), kind, entity_id, ctx.actor.clone(), action, at)
        .with_changes(changes)
        .with_operation(ctx.operation_id.clone())
}

/// Audit action for a change that may or may not have moved the state.
pub(crate) fn action_for(changes: &[FieldDelta]) -> AuditAction {
    if changes.iter().any(|d| d.field == "state") {
        AuditAction::CambioEstado
    } else {
        AuditAction::Update
    }
}

fn log_rejection(operation: &'static str, ctx: &OperationContext, err: &EngineError) {
    match err {
        EngineError::Configuration(_) => {
            tracing::error!(operation, tenant = %ctx.tenant, error = %err, "operation failed")
        }
        EngineError::ConcurrencyConflict { .. } => {
            tracing::warn!(operation, tenant = %ctx.tenant, error = %err, "operation rejected")
        }
        _ => tracing::debug!(operation, tenant = %ctx.tenant, error = %err, "operation rejected"),
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

struct Inner {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    incidents: Store<Incident>,
    work_orders: Store<WorkOrder>,
    equipment: Store<Equipment>,
    equipment_types: RwLock<BTreeMap<String, EquipmentType>>,
    ledgers: Mutex<Ledgers>,
}

/// The maintenance lifecycle engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("incidents", &self.inner.incidents)
            .field("work_orders", &self.inner.work_orders)
            .field("equipment", &self.inner.equipment)
            .finish()
    }
}

/// Builder for [`Engine`]. Defaults to the system clock and a tracing sink.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;
        let ledgers = Ledgers::new(self.config.idempotency_capacity);
        let types = self
            .config
            .equipment_types
            .iter()
            .map(|t| (t.id.clone(), t.clone()))
            .collect();
        Ok(Engine {
            inner: Arc::new(Inner {
                config: self.config,
                clock: self.clock,
                sink: self.sink,
                incidents: Store::new(),
                work_orders: Store::new(),
                equipment: Store::new(),
                equipment_types: RwLock::new(types),
                ledgers: Mutex::new(ledgers),
            }),
        })
    }
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
        }
    }

    /// An engine on the system clock that logs its notifications.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    fn emit(&self, events: Vec<Notification>) {
        for event in events {
            self.inner.sink.deliver(event);
        }
    }

    /// Create a new aggregate. `build` receives the store (for uniqueness
    /// checks), the allocated code if `code` is set, and the current time.
    pub(crate) fn create<T: Recordable>(
        &self,
        store: &Store<T>,
        ctx: &OperationContext,
        operation: &'static str,
        code: Option<CodeKind>,
        build: impl FnOnce(
            &StoreWriter<'_, T>,
            Option<String>,
            Timestamp,
        ) -> Result<Unit<T>, EngineError>,
    ) -> Result<T, EngineError> {
        let result = (|| {
            let mut writer = store.write();
            let mut ledgers = self.inner.ledgers.lock();
            if let Some(prior) = ledgers.recall::<T>(ctx, operation, None)? {
                return Ok((prior, Vec::new()));
            }
            let now = self.now();
            let sequence = code.map(|kind| (kind, ledgers.peek_code(&ctx.tenant, kind)));
            let code = sequence.map(|(kind, seq)| self.format_code(kind, seq));
            let mut unit = build(&writer, code, now)?;
            unit.entity.set_version(1);
            ledgers.commit(ctx, operation, &unit.entity, unit.audit, unit.movement)?;
            if let Some((kind, seq)) = sequence {
                ledgers.advance_code(&ctx.tenant, kind, seq);
            }
            writer.put(unit.entity.clone());
            tracing::info!(
                operation,
                tenant = %ctx.tenant,
                entity = %unit.entity.id(),
                "{} created",
                T::ENTITY
            );
            Ok((unit.entity, unit.events))
        })();
        match result {
            Ok((entity, events)) => {
                self.emit(events);
                Ok(entity)
            }
            Err(err) => {
                log_rejection(operation, ctx, &err);
                Err(err)
            }
        }
    }

    /// Mutate an existing aggregate. A unit with no audit entries is a
    /// no-op: nothing is written and the version does not move.
    pub(crate) fn update<T: Recordable>(
        &self,
        store: &Store<T>,
        ctx: &OperationContext,
        operation: &'static str,
        id: T::Id,
        mutate: impl FnOnce(&T, Timestamp) -> Result<Unit<T>, EngineError>,
    ) -> Result<T, EngineError> {
        let result = (|| {
            let mut writer = store.write();
            let mut ledgers = self.inner.ledgers.lock();
            if let Some(prior) = ledgers.recall::<T>(ctx, operation, Some(id))? {
                return Ok((prior, Vec::new()));
            }
            let current = writer.current(&ctx.tenant, &id, ctx.expected_version)?;
            let version = current.version();
            let now = self.now();
            let mut unit = mutate(current, now)?;
            if unit.audit.is_empty() {
                tracing::debug!(operation, entity = %id, "no change, nothing written");
                return Ok((current.clone(), Vec::new()));
            }
            unit.entity.set_version(version + 1);
            ledgers.commit(ctx, operation, &unit.entity, unit.audit, unit.movement)?;
            writer.put(unit.entity.clone());
            tracing::info!(
                operation,
                tenant = %ctx.tenant,
                entity = %id,
                version = version + 1,
                "{} updated",
                T::ENTITY
            );
            Ok((unit.entity, unit.events))
        })();
        match result {
            Ok((entity, events)) => {
                self.emit(events);
                Ok(entity)
            }
            Err(err) => {
                log_rejection(operation, ctx, &err);
                Err(err)
            }
        }
    }

    fn format_code(&self, kind: CodeKind, sequence: u64) -> String {
        let prefix = match kind {
            CodeKind::Incident => &self.inner.config.incident_code_prefix,
            CodeKind::WorkOrder => &self.inner.config.work_order_code_prefix,
        };
        format!("{prefix}-{sequence:06}")
    }

    /// Incidents across every tenant. Used by the SLA sweep.
    pub(crate) fn all_incidents(&self) -> Vec<Incident> {
        self.inner.incidents.all()
    }

    pub(crate) fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.inner.sink
    }
}
