//! # Criticality
//!
//! Severity classification driving SLA window selection.
//!
//! An incident carries two independent flags: one set by the operator that
//! reported the fault and one set by maintenance staff. Both are retained.
//! The effective criticality is `critical` when **either** flag is set.
//! That merge rule is an assumption pending product confirmation; it lives in
//! [`CriticalityFlags::effective`] and nowhere else.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Severity of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Critical,
    Normal,
}

impl Criticality {
    /// All criticality values, most severe first.
    pub fn all() -> &'static [Criticality] {
        &[Self::Critical, Self::Normal]
    }

    /// Return the string representation of this criticality.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Normal => "normal",
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criticality {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "critica" | "crítica" => Ok(Self::Critical),
            "normal" => Ok(Self::Normal),
            other => Err(EngineError::Validation(format!(
                "unknown criticality {other:?}"
            ))),
        }
    }
}

/// The two independently-set criticality flags of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CriticalityFlags {
    /// Marked critical by the reporting operator.
    pub operator: bool,
    /// Marked critical by maintenance staff.
    pub maintenance: bool,
}

impl CriticalityFlags {
    pub fn new(operator: bool, maintenance: bool) -> Self {
        Self {
            operator,
            maintenance,
        }
    }

    /// Critical if either party marked it critical.
    pub fn effective(&self) -> Criticality {
        if self.operator || self.maintenance {
            Criticality::Critical
        } else {
            Criticality::Normal
        }
    }

    /// Both parties independently marked the incident critical.
    pub fn both_critical(&self) -> bool {
        self.operator && self.maintenance
    }
}
