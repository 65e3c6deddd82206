//! Incident operations.

use flota_audit::{AuditAction, AuditEntityKind, FieldDelta};
use flota_core::{Criticality, EngineError, IncidentId, TenantId};
use flota_sla::{SlaBreach, SlaEvaluation};
use flota_state::{Incident, IncidentEdit, IncidentState, NewIncident};

use super::{action_for, CodeKind, Engine, Unit};
use crate::context::OperationContext;
use crate::events::{Notification, NotificationKind};
use crate::telemetry;

impl Engine {
    /// Intake a new incident in `nueva`, with deadlines computed from the
    /// configured policy and a tenant-scoped `INC-` code.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for blank required fields.
    /// - [`EngineError::NotFound`] if an affected equipment id does not
    ///   resolve for the tenant.
    /// - [`EngineError::Configuration`] if the policy lacks windows for the
    ///   effective criticality.
    pub fn create_incident(
        &self,
        ctx: &OperationContext,
        input: NewIncident,
    ) -> Result<Incident, EngineError> {
        for equipment_id in &input.affected_equipment {
            self.inner.equipment.get(&ctx.tenant, equipment_id)?;
        }
        let policy = &self.inner.config.sla;
        self.create(
            &self.inner.incidents,
            ctx,
            "create_incident",
            Some(CodeKind::Incident),
            |_, code, now| {
                let code = code.unwrap_or_default();
                let incident = Incident::open(ctx.tenant.clone(), code, input, policy, now)?;
                let changes = vec![
                    FieldDelta::set("code", &incident.code),
                    FieldDelta::set("state", incident.state),
                    FieldDelta::set("criticality", incident.effective_criticality()),
                    FieldDelta::set("attention_deadline", incident.sla.deadlines.attention),
                    FieldDelta::set("resolution_deadline", incident.sla.deadlines.resolution),
                ];
                let critical = incident.effective_criticality() == Criticality::Critical;
                let event = critical.then(|| {
                    Notification::new(
                        NotificationKind::CriticalIncidentCreated,
                        ctx.tenant.clone(),
                        *incident.id.as_uuid(),
                        &incident.code,
                        now,
                    )
                    .with_detail(incident.description.clone())
                });
                let mut unit = Unit::audited(
                    ctx,
                    AuditEntityKind::Incidencia,
                    incident,
                    AuditAction::Create,
                    changes,
                    now,
                );
                if let Some(event) = event {
                    unit = unit.notify(event);
                }
                Ok(unit)
            },
        )
    }

    /// Move an incident to `to`.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] if `to` is not allowed from the
    /// current state, plus the usual not-found and version errors.
    pub fn transition_incident(
        &self,
        ctx: &OperationContext,
        id: IncidentId,
        to: IncidentState,
        observation: Option<String>,
    ) -> Result<Incident, EngineError> {
        let incident = self.update(
            &self.inner.incidents,
            ctx,
            "transition_incident",
            id,
            |current, now| {
                let mut next = current.clone();
                let changes = next.transition(to, observation, now)?;
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::Incidencia,
                    next,
                    AuditAction::CambioEstado,
                    changes,
                    now,
                ))
            },
        )?;
        telemetry::record_transition("incident");
        Ok(incident)
    }

    /// Apply a field edit. An edit that changes nothing writes nothing.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidState`] on a `cerrada` incident;
    /// [`EngineError::Validation`] for malformed values.
    pub fn edit_incident(
        &self,
        ctx: &OperationContext,
        id: IncidentId,
        edit: IncidentEdit,
    ) -> Result<Incident, EngineError> {
        let policy = &self.inner.config.sla;
        self.update(
            &self.inner.incidents,
            ctx,
            "edit_incident",
            id,
            |current, now| {
                let mut next = current.clone();
                let changes = next.edit(edit, policy, now)?;
                let action = action_for(&changes);
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::Incidencia,
                    next,
                    action,
                    changes,
                    now,
                ))
            },
        )
    }

    pub fn incident(&self, tenant: &TenantId, id: IncidentId) -> Result<Incident, EngineError> {
        self.inner.incidents.get(tenant, &id)
    }

    /// Incidents of `tenant`, optionally in one state, ordered by code.
    pub fn incidents(&self, tenant: &TenantId, state: Option<IncidentState>) -> Vec<Incident> {
        let mut list = self
            .inner
            .incidents
            .list(tenant, |i| state.map_or(true, |s| i.state == s));
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// SLA evaluation as of now. Frozen incidents return their stored values.
    pub fn evaluate_sla(
        &self,
        tenant: &TenantId,
        id: IncidentId,
    ) -> Result<SlaEvaluation, EngineError> {
        Ok(self.incident(tenant, id)?.evaluate_at(self.now()))
    }

    /// Deadlines the incident has missed as of now.
    pub fn sla_breaches(
        &self,
        tenant: &TenantId,
        id: IncidentId,
    ) -> Result<Vec<SlaBreach>, EngineError> {
        Ok(self.incident(tenant, id)?.breaches_at(self.now()))
    }
}
