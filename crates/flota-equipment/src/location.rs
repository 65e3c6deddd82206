//! Location descriptors.

use serde::{Deserialize, Serialize};

use flota_core::EngineError;

/// The kind of place equipment can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Bus,
    Warehouse,
    Lab,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Warehouse => "warehouse",
            Self::Lab => "lab",
        }
    }
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a unit is: a vehicle (optionally a slot inside it), a warehouse,
/// or a repair lab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub kind: LocationKind,
    pub id: String,
    pub name: String,
    /// In-vehicle position slot, e.g. `front-door`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl Location {
    pub fn new(kind: LocationKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            position: None,
        }
    }

    pub fn bus(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(LocationKind::Bus, id, name)
    }

    pub fn warehouse(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(LocationKind::Warehouse, id, name)
    }

    pub fn lab(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(LocationKind::Lab, id, name)
    }

    /// Builder: set the in-vehicle slot.
    pub fn at_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Same physical place, ignoring the display name.
    pub fn same_place(&self, other: &Location) -> bool {
        self.kind == other.kind && self.id == other.id && self.position == other.position
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "{} location id must not be empty",
                self.kind
            )));
        }
        if self.position.is_some() && self.kind != LocationKind::Bus {
            return Err(EngineError::Validation(format!(
                "position slots only exist on buses, not on a {}",
                self.kind
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)?;
        if let Some(pos) = &self.position {
            write!(f, "#{pos}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_place_ignores_name() {
        let a = Location::bus("2041", "Bus 2041");
        let b = Location::bus("2041", "Articulado 2041");
        assert!(a.same_place(&b));
        assert!(!a.same_place(&b.clone().at_position("rear")));
        assert!(!a.same_place(&Location::warehouse("2041", "x")));
    }

    #[test]
    fn display_and_validation() {
        let loc = Location::bus("2041", "Bus").at_position("front");
        assert_eq!(loc.to_string(), "bus:2041#front");
        assert!(loc.validate().is_ok());
        assert!(Location::lab("", "Lab").validate().is_err());
        assert!(Location::lab("L1", "Lab").at_position("x").validate().is_err());
    }
}
