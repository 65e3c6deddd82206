//! Work order operations.

use flota_audit::{AuditAction, AuditEntityKind, FieldDelta};
use flota_core::{EngineError, IncidentId, TenantId, Timestamp, WorkOrderId};
use flota_state::{
    Completion, ExecutionUpdate, IncidentState, NewWorkOrder, WorkOrder, WorkOrderState,
};

use super::{CodeKind, Engine, Unit};
use crate::context::OperationContext;
use crate::events::{Notification, NotificationKind};
use crate::telemetry;

impl Engine {
    /// Open a work order in `pendiente` with a tenant-scoped `OT-` code.
    ///
    /// An order opened from an incident inherits the incident's effective
    /// criticality and asset when the input leaves them out.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the originating incident or a listed
    ///   equipment unit does not resolve for the tenant.
    /// - [`EngineError::InvalidState`] if the incident is `cerrada`.
    /// - [`EngineError::Validation`] if the order type does not match its
    ///   origin.
    pub fn create_work_order(
        &self,
        ctx: &OperationContext,
        mut input: NewWorkOrder,
    ) -> Result<WorkOrder, EngineError> {
        if let Some(incident_id) = input.origin.incident() {
            let incident = self.inner.incidents.get(&ctx.tenant, &incident_id)?;
            if incident.state == IncidentState::Cerrada {
                return Err(EngineError::invalid_state(
                    "create_work_order",
                    incident.state,
                ));
            }
            input
                .criticality
                .get_or_insert(incident.effective_criticality());
            if input.asset_ref.is_none() {
                input.asset_ref = Some(incident.asset_ref.clone());
            }
        }
        for equipment_id in &input.equipment {
            self.inner.equipment.get(&ctx.tenant, equipment_id)?;
        }
        self.create(
            &self.inner.work_orders,
            ctx,
            "create_work_order",
            Some(CodeKind::WorkOrder),
            |_, code, now| {
                let code = code.unwrap_or_default();
                let order = WorkOrder::open(ctx.tenant.clone(), code, input, now)?;
                let mut changes = vec![
                    FieldDelta::set("code", &order.code),
                    FieldDelta::set("state", order.state),
                    FieldDelta::set("order_type", format!("{:?}", order.order_type)),
                ];
                if let Some(incident) = order.origin.incident() {
                    changes.push(FieldDelta::set("incident", incident));
                }
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::OrdenTrabajo,
                    order,
                    AuditAction::Create,
                    changes,
                    now,
                ))
            },
        )
    }

    /// Assign a technician (`pendiente` → `asignada`).
    pub fn assign_work_order(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
        technician: &str,
        planned_date: Option<Timestamp>,
    ) -> Result<WorkOrder, EngineError> {
        self.transition_work_order(ctx, "assign_work_order", id, |order, now| {
            order.assign(technician, planned_date, now)
        })
    }

    /// Record execution data incrementally. The first call moves
    /// `asignada` → `en_curso`; later calls that change nothing write
    /// nothing.
    pub fn record_execution(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
        update: ExecutionUpdate,
    ) -> Result<WorkOrder, EngineError> {
        let mut started = false;
        let order = self.update(
            &self.inner.work_orders,
            ctx,
            "record_execution",
            id,
            |current, now| {
                let mut next = current.clone();
                let (moved, changes) = next.record_execution(update, now)?;
                started = moved;
                let action = if moved {
                    AuditAction::CambioEstado
                } else {
                    AuditAction::Update
                };
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::OrdenTrabajo,
                    next,
                    action,
                    changes,
                    now,
                ))
            },
        )?;
        if started {
            telemetry::record_transition("work_order");
        }
        Ok(order)
    }

    /// Finish the work (`en_curso` → `completada`), recomputing costs with
    /// the configured rates.
    pub fn complete_work_order(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
        completion: Completion,
    ) -> Result<WorkOrder, EngineError> {
        let rates = self.inner.config.costs;
        self.transition_work_order(ctx, "complete_work_order", id, |order, now| {
            order.complete(completion, &rates, now)
        })
    }

    /// Accept completed work (`completada` → `validada`). A billable order
    /// then shows up in [`Engine::unbilled_work_orders`].
    pub fn validate_work_order(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
    ) -> Result<WorkOrder, EngineError> {
        self.transition_work_order(ctx, "validate_work_order", id, |order, now| {
            order.validate(now)
        })
    }

    /// Reject completed work (`completada` → `rechazada`). The originating
    /// incident is left as it is; consumers of `work_order_rejected`
    /// decide whether to reopen it.
    pub fn reject_work_order(
        &self,
        ctx: &OperationContext,
        id: WorkOrderId,
        reason: &str,
    ) -> Result<WorkOrder, EngineError> {
        self.transition_work_order(ctx, "reject_work_order", id, |order, now| {
            order.reject(reason, now)
        })
    }

    /// Shared path for the operations that always move the state.
    fn transition_work_order(
        &self,
        ctx: &OperationContext,
        operation: &'static str,
        id: WorkOrderId,
        apply: impl FnOnce(&mut WorkOrder, Timestamp) -> Result<Vec<FieldDelta>, EngineError>,
    ) -> Result<WorkOrder, EngineError> {
        let order = self.update(
            &self.inner.work_orders,
            ctx,
            operation,
            id,
            |current, now| {
                let mut next = current.clone();
                let changes = apply(&mut next, now)?;
                let event = completion_event(&next, now);
                let mut unit = Unit::audited(
                    ctx,
                    AuditEntityKind::OrdenTrabajo,
                    next,
                    AuditAction::CambioEstado,
                    changes,
                    now,
                );
                if let Some(event) = event {
                    unit = unit.notify(event);
                }
                Ok(unit)
            },
        )?;
        telemetry::record_transition("work_order");
        Ok(order)
    }

    pub fn work_order(&self, tenant: &TenantId, id: WorkOrderId) -> Result<WorkOrder, EngineError> {
        self.inner.work_orders.get(tenant, &id)
    }

    /// Work orders of `tenant`, optionally in one state, ordered by code.
    pub fn work_orders(&self, tenant: &TenantId, state: Option<WorkOrderState>) -> Vec<WorkOrder> {
        let mut list = self
            .inner
            .work_orders
            .list(tenant, |w| state.map_or(true, |s| w.state == s));
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// Work orders opened from `incident`, ordered by code.
    pub fn work_orders_for_incident(
        &self,
        tenant: &TenantId,
        incident: IncidentId,
    ) -> Vec<WorkOrder> {
        let mut list = self
            .inner
            .work_orders
            .list(tenant, |w| w.origin.incident() == Some(incident));
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }
}

/// Event raised when an order reaches a terminal state, if any.
fn completion_event(order: &WorkOrder, now: Timestamp) -> Option<Notification> {
    let notification = |kind| {
        Notification::new(
            kind,
            order.tenant.clone(),
            *order.id.as_uuid(),
            &order.code,
            now,
        )
    };
    match order.state {
        WorkOrderState::Rechazada => {
            let event = notification(NotificationKind::WorkOrderRejected);
            Some(match &order.rejection_reason {
                Some(reason) => event.with_detail(reason.clone()),
                None => event,
            })
        }
        WorkOrderState::Validada if order.billable => Some(
            notification(NotificationKind::WorkOrderBillable)
                .with_detail(format!("total {}", order.costs.total)),
        ),
        _ => None,
    }
}
