//! # Versioned Aggregate Stores
//!
//! One in-memory map per aggregate kind. Reads clone out under a read
//! lock; every write goes through the engine's unit-of-work, which holds
//! the map's write lock for the whole read-check-commit sequence, so two
//! writers can never both act on the same pre-state.
//!
//! All locks are `parking_lot` and never held across `.await`.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

use flota_core::{EngineError, EquipmentId, IncidentId, TenantId, WorkOrderId};
use flota_equipment::Equipment;
use flota_state::{Incident, WorkOrder};

/// A tenant-owned entity with an optimistic-lock version.
pub trait Aggregate: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + std::fmt::Debug + std::fmt::Display + Send + Sync;

    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;
    fn uuid(&self) -> Uuid;
    fn tenant(&self) -> &TenantId;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Aggregate for Incident {
    type Id = IncidentId;
    const ENTITY: &'static str = "incident";

    fn id(&self) -> IncidentId {
        self.id
    }
    fn uuid(&self) -> Uuid {
        *self.id.as_uuid()
    }
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Aggregate for WorkOrder {
    type Id = WorkOrderId;
    const ENTITY: &'static str = "work_order";

    fn id(&self) -> WorkOrderId {
        self.id
    }
    fn uuid(&self) -> Uuid {
        *self.id.as_uuid()
    }
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Aggregate for Equipment {
    type Id = EquipmentId;
    const ENTITY: &'static str = "equipment";

    fn id(&self) -> EquipmentId {
        self.id
    }
    fn uuid(&self) -> Uuid {
        *self.id.as_uuid()
    }
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Thread-safe map of one aggregate kind.
pub struct Store<T: Aggregate> {
    data: RwLock<HashMap<T::Id, T>>,
}

impl<T: Aggregate> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entity", &T::ENTITY)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Aggregate> Default for Store<T> {
    fn default() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Aggregate> Store<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an entity owned by `tenant`. Another tenant's entity is
    /// reported as not found.
    pub fn get(&self, tenant: &TenantId, id: &T::Id) -> Result<T, EngineError> {
        self.data
            .read()
            .get(id)
            .filter(|e| e.tenant() == tenant)
            .cloned()
            .ok_or_else(|| EngineError::not_found(T::ENTITY, id))
    }

    /// Every entity of `tenant` matching `keep`.
    pub fn list(&self, tenant: &TenantId, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|e| e.tenant() == tenant && keep(e))
            .cloned()
            .collect()
    }

    /// Every entity across tenants. Used by the SLA sweep.
    pub fn all(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the write lock for a unit of work.
    pub(crate) fn write(&self) -> StoreWriter<'_, T> {
        StoreWriter {
            guard: self.data.write(),
        }
    }
}

/// Exclusive access to a store for the duration of one unit of work.
pub(crate) struct StoreWriter<'a, T: Aggregate> {
    guard: RwLockWriteGuard<'a, HashMap<T::Id, T>>,
}

impl<T: Aggregate> StoreWriter<'_, T> {
    /// Current value of an entity owned by `tenant`, checked against the
    /// caller's expected version.
    pub(crate) fn current(
        &self,
        tenant: &TenantId,
        id: &T::Id,
        expected_version: Option<u64>,
    ) -> Result<&T, EngineError> {
        let current = self
            .guard
            .get(id)
            .filter(|e| e.tenant() == tenant)
            .ok_or_else(|| EngineError::not_found(T::ENTITY, id))?;
        if let Some(expected) = expected_version {
            if expected != current.version() {
                crate::telemetry::record_conflict(T::ENTITY);
                return Err(EngineError::ConcurrencyConflict {
                    entity: id.to_string(),
                    expected,
                    actual: current.version(),
                });
            }
        }
        Ok(current)
    }

    /// Whether any entity satisfies `pred`.
    pub(crate) fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.guard.values().any(pred)
    }

    pub(crate) fn put(&mut self, entity: T) {
        self.guard.insert(entity.id(), entity);
    }
}
