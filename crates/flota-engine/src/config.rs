//! # Engine Configuration
//!
//! Loaded from YAML. Every field has a built-in default, so an empty file
//! (or no file at all) yields a working engine:
//!
//! ```yaml
//! sla:
//!   critical: { attention_minutes: 30, resolution_minutes: 240 }
//!   normal:   { attention_minutes: 240, resolution_minutes: 2880 }
//! costs:
//!   labor_rate_per_hour: "35.00"
//!   travel_rate_per_hour: "25.00"
//! sweep_interval_secs: 60
//! incident_code_prefix: INC
//! work_order_code_prefix: OT
//! idempotency_capacity: 10000
//! equipment_types:
//!   - id: validadora
//!     name: Validadora
//!     custom_fields:
//!       - { key: readers, label: Lectores, kind: boolean, required: true }
//! ```

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flota_core::EngineError;
use flota_equipment::EquipmentType;
use flota_sla::SlaPolicy;
use flota_state::CostRates;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FLOTA_CONFIG";

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] EngineError),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(inner) => inner,
            other => EngineError::Configuration(other.to_string()),
        }
    }
}

/// Everything the engine needs besides its clock and notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub sla: SlaPolicy,
    pub costs: CostRates,
    /// Seconds between SLA sweeps.
    pub sweep_interval_secs: u64,
    pub incident_code_prefix: String,
    pub work_order_code_prefix: String,
    /// Operation ids remembered for idempotent retries; the oldest are
    /// forgotten first.
    pub idempotency_capacity: usize,
    /// Equipment types known at start-up.
    pub equipment_types: Vec<EquipmentType>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sla: SlaPolicy::standard(),
            costs: CostRates {
                labor_rate_per_hour: Decimal::new(3500, 2),
                travel_rate_per_hour: Decimal::new(2500, 2),
            },
            sweep_interval_secs: 60,
            incident_code_prefix: "INC".to_string(),
            work_order_code_prefix: "OT".to_string(),
            idempotency_capacity: 10_000,
            equipment_types: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "engine configuration loaded");
        Ok(config)
    }

    /// Load from the file named by `FLOTA_CONFIG`, or use the defaults
    /// when the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                tracing::debug!("{CONFIG_ENV} not set, using built-in configuration");
                Ok(Self::default())
            }
        }
    }

    /// Check the parts serde cannot.
    ///
    /// The SLA table validates itself while deserializing; a table that
    /// omits a criticality is accepted here and fails at intake instead.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.costs.labor_rate_per_hour.is_sign_negative()
            || self.costs.travel_rate_per_hour.is_sign_negative()
        {
            return Err(EngineError::Configuration(
                "cost rates must not be negative".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(EngineError::Configuration(
                "sweep_interval_secs must be positive".into(),
            ));
        }
        if self.idempotency_capacity == 0 {
            return Err(EngineError::Configuration(
                "idempotency_capacity must be positive".into(),
            ));
        }
        for prefix in [&self.incident_code_prefix, &self.work_order_code_prefix] {
            if prefix.trim().is_empty() {
                return Err(EngineError::Configuration(
                    "code prefixes must not be empty".into(),
                ));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for equipment_type in &self.equipment_types {
            equipment_type
                .validate()
                .map_err(|e| EngineError::Configuration(e.to_string()))?;
            if !seen.insert(equipment_type.id.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "equipment type {:?} declared twice",
                    equipment_type.id
                )));
            }
        }
        Ok(())
    }

    /// Criticalities the SLA table has no windows for.
    pub fn sla_gaps(&self) -> Vec<flota_core::Criticality> {
        self.sla.missing()
    }
}
