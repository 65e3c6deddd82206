//! # SLA Policy
//!
//! A configuration table keyed by criticality. Each entry gives the
//! attention window (time to first analysis) and the resolution window
//! (time to repair end), both in whole minutes.
//!
//! In YAML the table is keyed by criticality name:
//!
//! ```yaml
//! critical:
//!   attention_minutes: 30
//!   resolution_minutes: 240
//! normal:
//!   attention_minutes: 240
//!   resolution_minutes: 2880
//! ```
//!
//! Unknown keys are rejected. A table may omit a criticality; asking for
//! its windows is then a configuration error, never a silent default.

use std::collections::BTreeMap;

use flota_core::{Criticality, EngineError};
use serde::{Deserialize, Serialize};

/// Longest window a policy may declare: one year.
pub const MAX_WINDOW_MINUTES: i64 = 365 * 24 * 60;

/// Attention and resolution windows for one criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaWindows {
    pub attention_minutes: i64,
    pub resolution_minutes: i64,
}

impl SlaWindows {
    pub fn new(attention_minutes: i64, resolution_minutes: i64) -> Self {
        Self {
            attention_minutes,
            resolution_minutes,
        }
    }

    fn validate(&self, key: &str) -> Result<(), EngineError> {
        if self.attention_minutes <= 0 || self.resolution_minutes <= 0 {
            return Err(EngineError::Configuration(format!(
                "SLA windows for {key:?} must be positive"
            )));
        }
        if self.resolution_minutes > MAX_WINDOW_MINUTES {
            return Err(EngineError::Configuration(format!(
                "SLA resolution window for {key:?} exceeds {MAX_WINDOW_MINUTES} minutes"
            )));
        }
        if self.attention_minutes > self.resolution_minutes {
            return Err(EngineError::Configuration(format!(
                "SLA attention window for {key:?} exceeds its resolution window"
            )));
        }
        Ok(())
    }
}

/// Per-criticality SLA windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, SlaWindows>",
    into = "BTreeMap<String, SlaWindows>"
)]
pub struct SlaPolicy {
    windows: BTreeMap<Criticality, SlaWindows>,
}

impl SlaPolicy {
    /// Built-in policy: critical 30 min / 4 h, normal 4 h / 48 h.
    pub fn standard() -> Self {
        let mut windows = BTreeMap::new();
        windows.insert(Criticality::Critical, SlaWindows::new(30, 240));
        windows.insert(Criticality::Normal, SlaWindows::new(240, 2880));
        Self { windows }
    }

    /// An empty policy; every lookup fails until windows are added.
    pub fn empty() -> Self {
        Self {
            windows: BTreeMap::new(),
        }
    }

    /// Builder: set the windows for one criticality.
    pub fn with(
        mut self,
        criticality: Criticality,
        windows: SlaWindows,
    ) -> Result<Self, EngineError> {
        windows.validate(criticality.as_str())?;
        self.windows.insert(criticality, windows);
        Ok(self)
    }

    /// Build from a table keyed by criticality name.
    ///
    /// # Errors
    ///
    /// [`EngineError::Configuration`] for an unknown criticality key,
    /// non-positive windows, or an attention window longer than the
    /// resolution window.
    pub fn from_table(table: BTreeMap<String, SlaWindows>) -> Result<Self, EngineError> {
        let mut windows = BTreeMap::new();
        for (key, w) in table {
            let criticality = Criticality::all()
                .iter()
                .copied()
                .find(|c| c.as_str() == key)
                .ok_or_else(|| {
                    EngineError::Configuration(format!("unknown criticality {key:?} in SLA policy"))
                })?;
            w.validate(&key)?;
            windows.insert(criticality, w);
        }
        Ok(Self { windows })
    }

    /// Parse a YAML policy table.
    pub fn from_yaml(source: &str) -> Result<Self, EngineError> {
        let table: BTreeMap<String, SlaWindows> = serde_yaml::from_str(source)
            .map_err(|e| EngineError::Configuration(format!("invalid SLA policy: {e}")))?;
        Self::from_table(table)
    }

    /// Windows for `criticality`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Configuration`] if the table has no entry for it.
    pub fn windows(&self, criticality: Criticality) -> Result<SlaWindows, EngineError> {
        self.windows.get(&criticality).copied().ok_or_else(|| {
            EngineError::Configuration(format!(
                "SLA policy has no windows for criticality {criticality}"
            ))
        })
    }

    /// Windows looked up by a raw criticality name.
    pub fn windows_for(&self, key: &str) -> Result<SlaWindows, EngineError> {
        let criticality = Criticality::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| EngineError::Configuration(format!("unknown criticality {key:?}")))?;
        self.windows(criticality)
    }

    /// Criticalities the table does not cover.
    pub fn missing(&self) -> Vec<Criticality> {
        Criticality::all()
            .iter()
            .copied()
            .filter(|c| !self.windows.contains_key(c))
            .collect()
    }

    /// Iterate over configured entries, most severe first.
    pub fn iter(&self) -> impl Iterator<Item = (Criticality, SlaWindows)> + '_ {
        self.windows.iter().map(|(c, w)| (*c, *w))
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<BTreeMap<String, SlaWindows>> for SlaPolicy {
    type Error = EngineError;

    fn try_from(table: BTreeMap<String, SlaWindows>) -> Result<Self, Self::Error> {
        Self::from_table(table)
    }
}

impl From<SlaPolicy> for BTreeMap<String, SlaWindows> {
    fn from(policy: SlaPolicy) -> Self {
        policy
            .windows
            .into_iter()
            .map(|(c, w)| (c.as_str().to_string(), w))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_policy_windows() {
        let p = SlaPolicy::standard();
        assert_eq!(
            p.windows(Criticality::Critical).unwrap(),
            SlaWindows::new(30, 240)
        );
        assert_eq!(
            p.windows(Criticality::Normal).unwrap(),
            SlaWindows::new(240, 2880)
        );
        assert!(p.missing().is_empty());
    }

    #[test]
    fn yaml_policy_parses() {
        let p = SlaPolicy::from_yaml(
            "critical:\n  attention_minutes: 15\n  resolution_minutes: 120\n",
        )
        .unwrap();
        assert_eq!(p.windows_for("critical").unwrap().attention_minutes, 15);
        assert_eq!(p.missing(), vec![Criticality::Normal]);
    }

    #[test]
    fn missing_criticality_is_configuration_error() {
        let p = SlaPolicy::empty()
            .with(Criticality::Critical, SlaWindows::new(30, 240))
            .unwrap();
        let err = p.windows(Criticality::Normal).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn unknown_key_is_configuration_error() {
        let err = SlaPolicy::from_yaml(
            "urgent:\n  attention_minutes: 15\n  resolution_minutes: 120\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(matches!(
            SlaPolicy::standard().windows_for("urgent"),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn bad_windows_rejected() {
        assert!(SlaPolicy::empty()
            .with(Criticality::Normal, SlaWindows::new(0, 60))
            .is_err());
        assert!(SlaPolicy::empty()
            .with(Criticality::Normal, SlaWindows::new(120, 60))
            .is_err());
        assert!(SlaPolicy::empty()
            .with(Criticality::Normal, SlaWindows::new(60, MAX_WINDOW_MINUTES))
            .is_ok());
        assert!(SlaPolicy::empty()
            .with(Criticality::Normal, SlaWindows::new(60, MAX_WINDOW_MINUTES + 1))
            .is_err());
    }

    #[test]
    fn oversized_yaml_window_is_configuration_error() {
        let err = SlaPolicy::from_yaml(
            "critical:\n  attention_minutes: 30\n  resolution_minutes: 9000000000000000000\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn serde_roundtrip_uses_names() {
        let json = serde_json::to_value(SlaPolicy::standard()).unwrap();
        assert_eq!(json["critical"]["attention_minutes"], 30);
        let back: SlaPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, SlaPolicy::standard());
    }
}
