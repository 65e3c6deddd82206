//! Billing interface. Invoicing itself happens elsewhere; the engine only
//! lists what is ready to bill and records that it was billed.

use flota_audit::{AuditAction, AuditEntityKind};
use flota_core::{EngineError, TenantId, WorkOrderId};
use flota_state::WorkOrder;

use super::{Engine, Unit};
use crate::context::OperationContext;

impl Engine {
    /// Validated, billable work orders of `tenant` not yet marked billed,
    /// ordered by code.
    pub fn unbilled_work_orders(&self, tenant: &TenantId) -> Vec<WorkOrder> {
        let mut list = self
            .inner
            .work_orders
            .list(tenant, WorkOrder::is_billable_unbilled);
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// Stamp `billed_at` on a work order.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidState`] if the order is not validated and
    /// billable, or was already billed.
    pub fn mark_billed(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
    ) -> Result<WorkOrder, EngineError> {
        self.update(&self.inner.work_orders, ctx, "mark_billed", id, |current, now| {
            let mut next = current.clone();
            let changes = next.mark_billed(now)?;
            Ok(Unit::audited(
                ctx,
                AuditEntityKind::OrdenTrabajo,
                next,
                AuditAction::Update,
                changes,
                now,
            ))
        })
    }
}
