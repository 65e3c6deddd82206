//! # Equipment
//!
//! A physical unit (validator, onboard computer, camera, ...) with an
//! operational state and a current location. Both are only ever changed by
//! applying a [`MovementRecord`]; [`LedgerPosition`] is that derived part
//! of the unit, and it is what replay reconstructs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use flota_core::{
    validate_custom_fields, CustomFieldDef, CustomFieldValue, EngineError, EquipmentId, TenantId,
    Timestamp,
};

use crate::location::{Location, LocationKind};
use crate::movement::{MovementKind, MovementRecord};

// ─── Operational state ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalState {
    EnServicio,
    EnAlmacen,
    EnLaboratorio,
    Averiado,
    /// Decommissioned. Terminal.
    Baja,
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnServicio => "en_servicio",
            Self::EnAlmacen => "en_almacen",
            Self::EnLaboratorio => "en_laboratorio",
            Self::Averiado => "averiado",
            Self::Baja => "baja",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Baja)
    }
}

impl std::fmt::Display for OperationalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Equipment type ──────────────────────────────────────────────────

/// A kind of equipment and the custom fields its units carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
}

impl EquipmentType {
    /// Check the declarations themselves: keys must be unique and non-empty.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "equipment type id and name must not be empty".into(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for def in &self.custom_fields {
            if def.key.trim().is_empty() || !seen.insert(def.key.as_str()) {
                return Err(EngineError::Validation(format!(
                    "equipment type {} declares an empty or duplicate field key {:?}",
                    self.id, def.key
                )));
            }
        }
        Ok(())
    }
}

// ─── Descriptive data ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Characteristics {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warranty {
    pub starts: Timestamp,
    pub ends: Timestamp,
}

/// Registration data for a new unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEquipment {
    /// Fleet-wide serial number.
    pub serial_number: String,
    /// Tenant-scoped display code.
    pub code: String,
    pub equipment_type_id: String,
    /// Where the unit enters the fleet.
    pub location: Location,
    #[serde(default)]
    pub ownership: Option<String>,
    #[serde(default)]
    pub characteristics: Characteristics,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub sim_id: Option<String>,
    #[serde(default)]
    pub warranty: Option<Warranty>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
}

// ─── Ledger-derived position ─────────────────────────────────────────

/// Rolling statistics derived from the movement ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EquipmentStats {
    pub movement_count: u32,
    pub failure_count: u32,
    /// Whole days spent `en_servicio` in completed stints.
    pub days_in_service: i64,
    /// Start of the current in-service stint, if in service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_service_since: Option<Timestamp>,
}

/// The part of a unit that movements determine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosition {
    pub location: Location,
    pub state: OperationalState,
    pub stats: EquipmentStats,
    /// Timestamp of the last accepted movement.
    pub last_movement_at: Timestamp,
}

impl LedgerPosition {
    /// Position right after an `alta` movement.
    pub(crate) fn from_alta(record: &MovementRecord) -> Self {
        let state = record.resulting_state;
        Self {
            location: record.destination.clone(),
            state,
            stats: EquipmentStats {
                movement_count: 1,
                failure_count: 0,
                days_in_service: 0,
                in_service_since: (state == OperationalState::EnServicio).then_some(record.at),
            },
            last_movement_at: record.at,
        }
    }

    /// Apply a subsequent movement. Assumes it was checked against `self`.
    pub(crate) fn apply(&mut self, record: &MovementRecord) {
        let next = record.resulting_state;
        if let Some(since) = self.stats.in_service_since {
            if next != OperationalState::EnServicio {
                self.stats.days_in_service += whole_days(since, record.at);
                self.stats.in_service_since = None;
            }
        } else if next == OperationalState::EnServicio {
            self.stats.in_service_since = Some(record.at);
        }
        self.stats.movement_count += 1;
        if record.kind == MovementKind::RetiradaAveria {
            self.stats.failure_count += 1;
        }
        self.location = record.destination.clone();
        self.state = next;
        self.last_movement_at = record.at;
    }

    /// Days in service including the current stint, as of `now`.
    pub fn days_in_service_at(&self, now: Timestamp) -> i64 {
        self.stats.days_in_service
            + self
                .stats
                .in_service_since
                .map_or(0, |since| whole_days(since, now))
    }

    /// Whether a unit in this position is currently in a lab.
    pub fn in_lab(&self) -> bool {
        self.location.kind == LocationKind::Lab
    }
}

fn whole_days(from: Timestamp, to: Timestamp) -> i64 {
    to.whole_minutes_since(&from).max(0) / (24 * 60)
}

// ─── Equipment ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub tenant: TenantId,
    pub serial_number: String,
    pub code: String,
    pub version: u64,
    pub equipment_type_id: String,
    pub equipment_type_name: String,
    pub ownership: Option<String>,
    pub characteristics: Characteristics,
    pub network_id: Option<String>,
    pub sim_id: Option<String>,
    pub warranty: Option<Warranty>,
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
    #[serde(flatten)]
    pub position: LedgerPosition,
    pub created_at: Timestamp,
}

impl Equipment {
    /// Build a unit from registration data and its `alta` movement.
    pub(crate) fn register(
        id: EquipmentId,
        tenant: TenantId,
        input: NewEquipment,
        equipment_type: &EquipmentType,
        alta: &MovementRecord,
    ) -> Result<Self, EngineError> {
        if input.serial_number.trim().is_empty() || input.code.trim().is_empty() {
            return Err(EngineError::Validation(
                "serial number and code must not be empty".into(),
            ));
        }
        if input.equipment_type_id != equipment_type.id {
            return Err(EngineError::Validation(format!(
                "equipment declares type {:?} but was registered as {:?}",
                input.equipment_type_id, equipment_type.id
            )));
        }
        if let Some(w) = input.warranty {
            if w.ends < w.starts {
                return Err(EngineError::Validation(
                    "warranty ends before it starts".into(),
                ));
            }
        }
        validate_custom_fields(&equipment_type.custom_fields, &input.custom_fields)?;
        Ok(Self {
            id,
            tenant,
            serial_number: input.serial_number.trim().to_string(),
            code: input.code.trim().to_string(),
            version: 0,
            equipment_type_id: equipment_type.id.clone(),
            equipment_type_name: equipment_type.name.clone(),
            ownership: input.ownership,
            characteristics: input.characteristics,
            network_id: input.network_id,
            sim_id: input.sim_id,
            warranty: input.warranty,
            custom_fields: input.custom_fields,
            position: LedgerPosition::from_alta(alta),
            created_at: alta.at,
        })
    }

    pub fn state(&self) -> OperationalState {
        self.position.state
    }

    pub fn location(&self) -> &Location {
        &self.position.location
    }

    /// Whether the unit is under warranty at `now`.
    pub fn under_warranty(&self, now: Timestamp) -> bool {
        self.warranty
            .is_some_and(|w| w.starts <= now && now <= w.ends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flota_core::{ActorId, CustomFieldKind, MovementId};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn validator_type() -> EquipmentType {
        EquipmentType {
            id: "validadora".into(),
            name: "Validadora".into(),
            custom_fields: vec![CustomFieldDef {
                key: "readers".into(),
                label: "Lectores".into(),
                kind: CustomFieldKind::Boolean,
                required: true,
            }],
        }
    }

    fn alta(at: Timestamp, destination: Location) -> MovementRecord {
        MovementRecord {
            id: MovementId::new(),
            tenant: TenantId::new("emt").unwrap(),
            equipment_id: EquipmentId::new(),
            sequence: 1,
            kind: MovementKind::Alta,
            origin: None,
            resulting_state: MovementKind::Alta.resulting_state(&destination),
            destination,
            reason: None,
            comments: None,
            links: Default::default(),
            technicians: vec![],
            actor: ActorId::new("jefe").unwrap(),
            at,
            operation_id: None,
        }
    }

    fn input() -> NewEquipment {
        NewEquipment {
            serial_number: "SN-0001".into(),
            code: "VAL-0001".into(),
            equipment_type_id: "validadora".into(),
            location: Location::warehouse("W1", "Central"),
            ownership: None,
            characteristics: Characteristics::default(),
            network_id: None,
            sim_id: None,
            warranty: None,
            custom_fields: BTreeMap::from([(
                "readers".to_string(),
                CustomFieldValue::Boolean(true),
            )]),
        }
    }

    #[test]
    fn register_validates_custom_fields() {
        let record = alta(ts("2026-01-01T00:00:00Z"), Location::warehouse("W1", "Central"));
        let ok = Equipment::register(
            record.equipment_id,
            TenantId::new("emt").unwrap(),
            input(),
            &validator_type(),
            &record,
        )
        .unwrap();
        assert_eq!(ok.state(), OperationalState::EnAlmacen);
        assert_eq!(ok.position.stats.movement_count, 1);

        let mut missing = input();
        missing.custom_fields.clear();
        assert!(Equipment::register(
            record.equipment_id,
            TenantId::new("emt").unwrap(),
            missing,
            &validator_type(),
            &record,
        )
        .is_err());
    }

    #[test]
    fn duplicate_field_keys_rejected() {
        let mut t = validator_type();
        t.custom_fields.push(t.custom_fields[0].clone());
        assert!(t.validate().is_err());
        assert!(validator_type().validate().is_ok());
    }

    #[test]
    fn days_in_service_accumulate_per_stint() {
        let t0 = ts("2026-01-01T00:00:00Z");
        let mut pos = LedgerPosition::from_alta(&alta(t0, Location::bus("2041", "Bus")));
        assert_eq!(pos.stats.in_service_since, Some(t0));
        assert_eq!(pos.days_in_service_at(t0.plus_minutes(3 * 1440 + 5)), 3);

        let mut removal = alta(t0.plus_minutes(10 * 1440), Location::lab("L1", "Taller"));
        removal.kind = MovementKind::RetiradaAveria;
        removal.resulting_state = OperationalState::EnLaboratorio;
        pos.apply(&removal);
        assert_eq!(pos.stats.days_in_service, 10);
        assert_eq!(pos.stats.failure_count, 1);
        assert_eq!(pos.stats.in_service_since, None);
        assert_eq!(pos.days_in_service_at(t0.plus_minutes(40 * 1440)), 10);
    }
}
