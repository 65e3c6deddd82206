//! Equipment registration, relocation and ledger queries.

use flota_audit::{AuditAction, AuditEntityKind};
use flota_core::{EngineError, EquipmentId, TenantId};
use flota_equipment::{
    plan_registration, plan_relocation, replay, verify_chain, ChainReport, Equipment,
    EquipmentStats, EquipmentType, LedgerPosition, MovementAuthor, MovementRecord,
    MovementRequest, NewEquipment, OperationalState,
};

use super::{Engine, Unit};
use crate::context::OperationContext;
use crate::telemetry;

impl Engine {
    /// Register an equipment type at runtime, next to those from config.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] if the type is malformed or its id is
    /// already registered.
    pub fn register_equipment_type(
        &self,
        equipment_type: EquipmentType,
    ) -> Result<EquipmentType, EngineError> {
        equipment_type.validate()?;
        let mut types = self.inner.equipment_types.write();
        if types.contains_key(&equipment_type.id) {
            return Err(EngineError::Validation(format!(
                "equipment type {:?} already exists",
                equipment_type.id
            )));
        }
        types.insert(equipment_type.id.clone(), equipment_type.clone());
        tracing::info!(equipment_type = %equipment_type.id, "equipment type registered");
        Ok(equipment_type)
    }

    /// Every known equipment type, ordered by id.
    pub fn equipment_types(&self) -> Vec<EquipmentType> {
        self.inner.equipment_types.read().values().cloned().collect()
    }

    fn equipment_type(&self, id: &str) -> Result<EquipmentType, EngineError> {
        self.inner
            .equipment_types
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("equipment_type", id))
    }

    /// Register (`alta`) a unit. The unit, its first movement and the audit
    /// entry are committed together.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown equipment type.
    /// - [`EngineError::Validation`] for a duplicate serial number (across
    ///   the fleet) or code (within the tenant), or custom field values the
    ///   type does not accept.
    pub fn register_equipment(
        &self,
        ctx: &OperationContext,
        input: NewEquipment,
    ) -> Result<Equipment, EngineError> {
        let equipment_type = self.equipment_type(&input.equipment_type_id)?;
        let equipment = self.create(
            &self.inner.equipment,
            ctx,
            "register_equipment",
            None,
            |store, _, now| {
                let serial = input.serial_number.trim();
                if store.any(|e| e.serial_number == serial) {
                    return Err(EngineError::Validation(format!(
                        "serial number {serial:?} is already registered"
                    )));
                }
                let code = input.code.trim();
                if store.any(|e| e.tenant == ctx.tenant && e.code == code) {
                    return Err(EngineError::Validation(format!(
                        "equipment code {code:?} is already in use"
                    )));
                }
                let plan = plan_registration(
                    ctx.tenant.clone(),
                    input,
                    &equipment_type,
                    author(ctx, now),
                )?;
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::Equipo,
                    plan.equipment,
                    AuditAction::Create,
                    plan.changes,
                    now,
                )
                .with_movement(plan.record))
            },
        )?;
        telemetry::record_movement("alta");
        Ok(equipment)
    }

    /// Move a unit. The movement record, the unit's new position and the
    /// audit entry are committed together or not at all.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown unit, or a linked work
    ///   order or incident that does not resolve for the tenant.
    /// - [`EngineError::InvalidState`] once the unit is `baja`, for a second
    ///   `alta`, or for `retorno_laboratorio` outside a lab.
    /// - [`EngineError::Validation`] for a destination the movement kind
    ///   does not allow or that equals the current location.
    pub fn relocate_equipment(
        &self,
        ctx: &OperationContext,
        id: EquipmentId,
        request: MovementRequest,
    ) -> Result<Equipment, EngineError> {
        if let Some(order) = request.links.work_order {
            self.inner.work_orders.get(&ctx.tenant, &order)?;
        }
        if let Some(incident) = request.links.incident {
            self.inner.incidents.get(&ctx.tenant, &incident)?;
        }
        let kind = request.kind;
        let equipment = self.update(
            &self.inner.equipment,
            ctx,
            "relocate_equipment",
            id,
            |current, now| {
                let plan = plan_relocation(current, request, author(ctx, now))?;
                Ok(Unit::audited(
                    ctx,
                    AuditEntityKind::Equipo,
                    plan.equipment,
                    AuditAction::Movimiento,
                    plan.changes,
                    now,
                )
                .with_movement(plan.record))
            },
        )?;
        telemetry::record_movement(kind.as_str());
        Ok(equipment)
    }

    pub fn equipment(&self, tenant: &TenantId, id: EquipmentId) -> Result<Equipment, EngineError> {
        self.inner.equipment.get(tenant, &id)
    }

    /// Units of `tenant`, optionally in one operational state, ordered by code.
    pub fn equipment_list(
        &self,
        tenant: &TenantId,
        state: Option<OperationalState>,
    ) -> Vec<Equipment> {
        let mut list = self
            .inner
            .equipment
            .list(tenant, |e| state.map_or(true, |s| e.state() == s));
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// Statistics with days in service counted up to now.
    pub fn equipment_stats(
        &self,
        tenant: &TenantId,
        id: EquipmentId,
    ) -> Result<EquipmentStats, EngineError> {
        let equipment = self.equipment(tenant, id)?;
        let mut stats = equipment.position.stats;
        stats.days_in_service = equipment.position.days_in_service_at(self.now());
        Ok(stats)
    }

    /// Movement records of a unit, oldest first.
    pub fn movements(
        &self,
        tenant: &TenantId,
        id: EquipmentId,
    ) -> Result<Vec<MovementRecord>, EngineError> {
        self.equipment(tenant, id)?;
        Ok(self
            .inner
            .ledgers
            .lock()
            .movements
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    /// Rebuild a unit's position from its movements alone.
    pub fn replay_movements(
        &self,
        tenant: &TenantId,
        id: EquipmentId,
    ) -> Result<LedgerPosition, EngineError> {
        replay(&self.movements(tenant, id)?)
    }

    /// Check a unit's movement chain and that replaying it reproduces the
    /// stored position.
    pub fn verify_movements(
        &self,
        tenant: &TenantId,
        id: EquipmentId,
    ) -> Result<ChainReport, EngineError> {
        let equipment = self.equipment(tenant, id)?;
        let records = self.movements(tenant, id)?;
        let mut report = verify_chain(&records);
        if report.consistent {
            if let Ok(position) = replay(&records) {
                if position != equipment.position {
                    report.consistent = false;
                    tracing::warn!(
                        equipment = %id,
                        "replayed position differs from stored position"
                    );
                }
            }
        }
        Ok(report)
    }
}

fn author(ctx: &OperationContext, at: flota_core::Timestamp) -> MovementAuthor {
    MovementAuthor {
        actor: ctx.actor.id.clone(),
        operation_id: ctx.operation_id.clone(),
        at,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use flota_core::{
        CustomFieldDef, CustomFieldKind, CustomFieldValue, ManualClock, Timestamp,
    };
    use flota_equipment::{Characteristics, Location, MovementKind};

    use crate::config::EngineConfig;

    use super::*;

    fn setup() -> (Engine, Arc<ManualClock>, OperationContext) {
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-03-02T08:00:00Z").unwrap(),
        ));
        let engine = Engine::builder(EngineConfig::default())
            .clock(clock.clone())
            .build()
            .unwrap();
        engine
            .register_equipment_type(EquipmentType {
                id: "validadora".into(),
                name: "Validadora".into(),
                custom_fields: vec![CustomFieldDef {
                    key: "lector".into(),
                    label: "Lector".into(),
                    required: true,
                    kind: CustomFieldKind::Enumerated {
                        options: vec!["nfc".into(), "qr".into()],
                    },
                }],
            })
            .unwrap();
        (engine, clock, OperationContext::parse("emt", "tec-01").unwrap())
    }

    fn unit(serial: &str, code: &str) -> NewEquipment {
        NewEquipment {
            serial_number: serial.into(),
            code: code.into(),
            equipment_type_id: "validadora".into(),
            location: Location::warehouse("alm-1", "Almacén central"),
            ownership: None,
            characteristics: Characteristics::default(),
            network_id: None,
            sim_id: None,
            warranty: None,
            custom_fields: BTreeMap::from([(
                "lector".to_string(),
                CustomFieldValue::Enumerated("nfc".into()),
            )]),
        }
    }

    #[test]
    fn registration_writes_alta() {
        let (engine, _, ctx) = setup();
        let eq = engine.register_equipment(&ctx, unit("SN-1", "VAL-001")).unwrap();
        assert_eq!(eq.state(), OperationalState::EnAlmacen);
        assert_eq!(eq.version, 1);
        let movements = engine.movements(&ctx.tenant, eq.id).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Alta);
        assert!(movements[0].origin.is_none());
    }

    #[test]
    fn duplicate_serial_and_bad_custom_fields_rejected() {
        let (engine, _, ctx) = setup();
        engine.register_equipment(&ctx, unit("SN-1", "VAL-001")).unwrap();
        let other = OperationContext::parse("tussam", "tec-09").unwrap();
        assert!(matches!(
            engine.register_equipment(&other, unit("SN-1", "VAL-001")),
            Err(EngineError::Validation(_))
        ));
        let mut bad = unit("SN-2", "VAL-002");
        bad.custom_fields.clear();
        assert!(matches!(
            engine.register_equipment(&ctx, bad),
            Err(EngineError::Validation(_))
        ));
        let mut unknown = unit("SN-3", "VAL-003");
        unknown.equipment_type_id = "pupitre".into();
        assert!(matches!(
            engine.register_equipment(&ctx, unknown),
            Err(EngineError::NotFound { .. })
        ));
        assert_eq!(engine.equipment_list(&ctx.tenant, None).len(), 1);
    }

    #[test]
    fn relocation_and_replay_agree() {
        let (engine, clock, ctx) = setup();
        let eq = engine.register_equipment(&ctx, unit("SN-1", "VAL-001")).unwrap();
        clock.advance_minutes(60);
        engine
            .relocate_equipment(
                &ctx,
                eq.id,
                MovementRequest::new(MovementKind::Instalacion, Location::bus("bus-2041", "2041")),
            )
            .unwrap();
        clock.advance_minutes(60 * 24 * 3);
        let eq = engine
            .relocate_equipment(
                &ctx,
                eq.id,
                MovementRequest::new(MovementKind::RetiradaAveria, Location::lab("lab-1", "Taller"))
                    .because("no lee"),
            )
            .unwrap();
        assert_eq!(eq.state(), OperationalState::EnLaboratorio);
        assert_eq!(eq.position.stats.failure_count, 1);
        assert_eq!(eq.position.stats.days_in_service, 3);
        assert_eq!(engine.replay_movements(&ctx.tenant, eq.id).unwrap(), eq.position);
        assert!(engine.verify_movements(&ctx.tenant, eq.id).unwrap().consistent);
    }

    #[test]
    fn baja_is_final() {
        let (engine, clock, ctx) = setup();
        let eq = engine.register_equipment(&ctx, unit("SN-1", "VAL-001")).unwrap();
        clock.advance_minutes(5);
        engine
            .relocate_equipment(
                &ctx,
                eq.id,
                MovementRequest::new(
                    MovementKind::Baja,
                    Location::warehouse("chatarra", "Desguace"),
                ),
            )
            .unwrap();
        let err = engine
            .relocate_equipment(
                &ctx,
                eq.id,
                MovementRequest::new(
                    MovementKind::Reubicacion,
                    Location::warehouse("alm-1", "Almacén central"),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
        assert_eq!(engine.movements(&ctx.tenant, eq.id).unwrap().len(), 2);
    }

    #[test]
    fn failed_relocation_leaves_no_trace() {
        let (engine, _, ctx) = setup();
        let eq = engine.register_equipment(&ctx, unit("SN-1", "VAL-001")).unwrap();
        let audit_before = engine.audit_history(&ctx.tenant, *eq.id.as_uuid(), 100, None).len();
        let err = engine
            .relocate_equipment(
                &ctx,
                eq.id,
                MovementRequest::new(
                    MovementKind::Instalacion,
                    Location::warehouse("alm-2", "Norte"),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(engine.movements(&ctx.tenant, eq.id).unwrap().len(), 1);
        assert_eq!(engine.equipment(&ctx.tenant, eq.id).unwrap().version, 1);
        assert_eq!(
            engine.audit_history(&ctx.tenant, *eq.id.as_uuid(), 100, None).len(),
            audit_before
        );
    }
}
