//! # Roles and Operation Permissions
//!
//! Which role may invoke which operation. The engine never reads this
//! table; the hosting layer checks it before calling the engine, so state
//! legality and role gating stay independent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user role in the maintenance back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tecnico,
    JefeMantenimiento,
    Operador,
    Auditor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tecnico => "tecnico",
            Self::JefeMantenimiento => "jefe_mantenimiento",
            Self::Operador => "operador",
            Self::Auditor => "auditor",
            Self::Admin => "admin",
        }
    }

    pub fn all() -> &'static [Role] {
        &[
            Self::Tecnico,
            Self::JefeMantenimiento,
            Self::Operador,
            Self::Auditor,
            Self::Admin,
        ]
    }

    /// Operations this role may invoke.
    pub fn permitted(&self) -> &'static [Operation] {
        use Operation::*;
        match self {
            Self::Admin | Self::JefeMantenimiento => Operation::all(),
            Self::Tecnico => &[
                Read,
                CreateIncident,
                TransitionIncident,
                EditIncident,
                RecordExecution,
                CompleteWorkOrder,
                RelocateEquipment,
            ],
            Self::Operador => &[Read, CreateIncident, EditIncident],
            Self::Auditor => &[Read, ReadAudit],
        }
    }

    /// Whether this role may invoke `operation`.
    pub fn permits(&self, operation: Operation) -> bool {
        self.permitted().contains(&operation)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Engine operations subject to role gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    ReadAudit,
    CreateIncident,
    TransitionIncident,
    EditIncident,
    CreateWorkOrder,
    AssignWorkOrder,
    RecordExecution,
    CompleteWorkOrder,
    ValidateWorkOrder,
    RejectWorkOrder,
    RegisterEquipment,
    RelocateEquipment,
    ManageBilling,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ReadAudit => "read_audit",
            Self::CreateIncident => "create_incident",
            Self::TransitionIncident => "transition_incident",
            Self::EditIncident => "edit_incident",
            Self::CreateWorkOrder => "create_work_order",
            Self::AssignWorkOrder => "assign_work_order",
            Self::RecordExecution => "record_execution",
            Self::CompleteWorkOrder => "complete_work_order",
            Self::ValidateWorkOrder => "validate_work_order",
            Self::RejectWorkOrder => "reject_work_order",
            Self::RegisterEquipment => "register_equipment",
            Self::RelocateEquipment => "relocate_equipment",
            Self::ManageBilling => "manage_billing",
        }
    }

    pub fn all() -> &'static [Operation] {
        &[
            Self::Read,
            Self::ReadAudit,
            Self::CreateIncident,
            Self::TransitionIncident,
            Self::EditIncident,
            Self::CreateWorkOrder,
            Self::AssignWorkOrder,
            Self::RecordExecution,
            Self::CompleteWorkOrder,
            Self::ValidateWorkOrder,
            Self::RejectWorkOrder,
            Self::RegisterEquipment,
            Self::RelocateEquipment,
            Self::ManageBilling,
        ]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managers_and_admins_can_do_everything() {
        for op in Operation::all() {
            assert!(Role::Admin.permits(*op));
            assert!(Role::JefeMantenimiento.permits(*op));
        }
    }

    #[test]
    fn technicians_cannot_validate_their_own_work() {
        assert!(Role::Tecnico.permits(Operation::CompleteWorkOrder));
        assert!(!Role::Tecnico.permits(Operation::ValidateWorkOrder));
        assert!(!Role::Tecnico.permits(Operation::RejectWorkOrder));
        assert!(!Role::Tecnico.permits(Operation::ManageBilling));
    }

    #[test]
    fn auditors_only_read() {
        assert!(Role::Auditor.permits(Operation::ReadAudit));
        assert!(!Role::Auditor.permits(Operation::CreateIncident));
        assert!(!Role::Operador.permits(Operation::ReadAudit));
    }

    #[test]
    fn role_parsing() {
        assert_eq!("jefe_mantenimiento".parse::<Role>().unwrap(), Role::JefeMantenimiento);
        assert_eq!(" Tecnico ".parse::<Role>().unwrap(), Role::Tecnico);
        assert_eq!(
            "chofer".parse::<Role>().unwrap_err(),
            UnknownRole("chofer".into())
        );
    }
}
