//! # flota-cli: Command-Line Tool for the Maintenance Engine
//!
//! Offline helpers for operators; none of them touch a running service.
//!
//! ## Subcommands
//!
//! - `flota config check`: load and validate an engine configuration file.
//! - `flota sla deadlines`: attention and resolution deadlines for an intake.
//! - `flota movements verify`: check a JSON export of movement records.
//!
//! ```bash
//! flota config check deploy/engine.yaml
//! flota sla deadlines --received-at 2026-03-02T08:00:00Z --criticality critical
//! flota movements verify movements.json
//! ```

pub mod config;
pub mod movements;
pub mod sla;

use std::path::Path;

use anyhow::{Context, Result};

use flota_engine::EngineConfig;

/// Load the configuration named on the command line, or fall back to
/// `FLOTA_CONFIG` and then the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("invalid configuration {}", path.display())),
        None => EngineConfig::from_env().context("invalid configuration"),
    }
}
