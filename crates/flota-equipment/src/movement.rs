//! # Movement Records
//!
//! A movement is an immutable record of one relocation. The kind of
//! movement decides which destinations are legal and what operational
//! state the unit ends up in.

use serde::{Deserialize, Serialize};

use flota_core::{
    ActorId, EngineError, EquipmentId, IncidentId, MovementId, OperationId, TenantId, Timestamp,
    WorkOrderId,
};

use crate::equipment::OperationalState;
use crate::location::{Location, LocationKind};

/// What a movement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Registration; only ever the first movement.
    Alta,
    Preinstalacion,
    Instalacion,
    Sustitucion,
    /// Removed because of a fault.
    RetiradaAveria,
    RetornoLaboratorio,
    Reubicacion,
    /// Decommissioning; always the last movement.
    Baja,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alta => "alta",
            Self::Preinstalacion => "preinstalacion",
            Self::Instalacion => "instalacion",
            Self::Sustitucion => "sustitucion",
            Self::RetiradaAveria => "retirada_averia",
            Self::RetornoLaboratorio => "retorno_laboratorio",
            Self::Reubicacion => "reubicacion",
            Self::Baja => "baja",
        }
    }

    pub fn all() -> &'static [MovementKind] {
        &[
            Self::Alta,
            Self::Preinstalacion,
            Self::Instalacion,
            Self::Sustitucion,
            Self::RetiradaAveria,
            Self::RetornoLaboratorio,
            Self::Reubicacion,
            Self::Baja,
        ]
    }

    /// Whether the destination must be a vehicle.
    pub fn requires_bus(&self) -> bool {
        matches!(
            self,
            Self::Instalacion | Self::Sustitucion | Self::Preinstalacion
        )
    }

    /// Operational state after moving to `destination`.
    pub fn resulting_state(&self, destination: &Location) -> OperationalState {
        match (self, destination.kind) {
            (Self::Baja, _) => OperationalState::Baja,
            (Self::RetiradaAveria, LocationKind::Lab) => OperationalState::EnLaboratorio,
            (Self::RetiradaAveria, _) => OperationalState::Averiado,
            (_, LocationKind::Bus) => OperationalState::EnServicio,
            (_, LocationKind::Warehouse) => OperationalState::EnAlmacen,
            (_, LocationKind::Lab) => OperationalState::EnLaboratorio,
        }
    }

    /// Check the destination against this kind's rules.
    pub(crate) fn check_destination(&self, destination: &Location) -> Result<(), EngineError> {
        destination.validate()?;
        if self.requires_bus() && destination.kind != LocationKind::Bus {
            return Err(EngineError::Validation(format!(
                "{} requires a bus destination, got a {}",
                self, destination.kind
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("unknown movement kind {s:?}")))
    }
}

/// Optional links from a movement to what triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_order: Option<WorkOrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<IncidentId>,
}

/// What a caller asks for when relocating a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub destination: Location,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub links: MovementLinks,
    #[serde(default)]
    pub technicians: Vec<String>,
}

impl MovementRequest {
    pub fn new(kind: MovementKind, destination: Location) -> Self {
        Self {
            kind,
            destination,
            reason: None,
            comments: None,
            links: MovementLinks::default(),
            technicians: Vec::new(),
        }
    }

    /// Builder: set the reason text.
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Builder: link the triggering work order.
    pub fn for_work_order(mut self, id: WorkOrderId) -> Self {
        self.links.work_order = Some(id);
        self
    }
}

/// An accepted movement. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub tenant: TenantId,
    pub equipment_id: EquipmentId,
    /// Position in this unit's ledger, starting at 1 for `alta`.
    pub sequence: u32,
    pub kind: MovementKind,
    /// `None` only for `alta`.
    pub origin: Option<Location>,
    pub destination: Location,
    pub resulting_state: OperationalState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default)]
    pub links: MovementLinks,
    #[serde(default)]
    pub technicians: Vec<String>,
    pub actor: ActorId,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
}
