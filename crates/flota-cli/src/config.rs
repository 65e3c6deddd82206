//! # Config Subcommand
//!
//! `flota config check [PATH]` loads an engine configuration the same way
//! the API server does and prints what it resolved to.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use flota_core::Criticality;
use flota_engine::EngineConfig;

/// Arguments for the `flota config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file and print a summary.
    Check {
        /// Configuration file; defaults to `--config`, then `FLOTA_CONFIG`.
        #[arg(value_name = "CONFIG_YAML")]
        path: Option<PathBuf>,
    },
}

/// Execute the config subcommand.
///
/// Returns exit code: 0 when valid, 1 when invalid.
pub fn run_config(args: &ConfigArgs, global: Option<&std::path::Path>) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { path } => {
            let path = path.as_deref().or(global);
            match crate::load_config(path) {
                Ok(config) => {
                    print!("{}", summarize(&config));
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("configuration invalid: {e:#}");
                    Ok(1)
                }
            }
        }
    }
}

/// Human-readable summary of a loaded configuration.
pub fn summarize(config: &EngineConfig) -> String {
    let mut out = String::from("configuration OK\n");
    for criticality in [Criticality::Critical, Criticality::Normal] {
        match config.sla.windows(criticality) {
            Ok(w) => out.push_str(&format!(
                "  sla {criticality}: attention {} min, resolution {} min\n",
                w.attention_minutes, w.resolution_minutes
            )),
            Err(_) => out.push_str(&format!(
                "  sla {criticality}: MISSING (intake at this criticality will fail)\n"
            )),
        }
    }
    out.push_str(&format!(
        "  rates: labor {}/h, travel {}/h\n",
        config.costs.labor_rate_per_hour, config.costs.travel_rate_per_hour
    ));
    out.push_str(&format!(
        "  codes: {}-NNNNNN, {}-NNNNNN\n",
        config.incident_code_prefix, config.work_order_code_prefix
    ));
    out.push_str(&format!("  sweep every {} s\n", config.sweep_interval_secs));
    out.push_str(&format!(
        "  idempotent retries: last {} operations\n",
        config.idempotency_capacity
    ));
    out.push_str(&format!("  equipment types: {}\n", config.equipment_types.len()));
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_file_exits_zero() {
        let file = write_temp("sweep_interval_secs: 30\nincident_code_prefix: INC\n");
        let args = ConfigArgs {
            command: ConfigCommand::Check {
                path: Some(file.path().to_path_buf()),
            },
        };
        assert_eq!(run_config(&args, None).unwrap(), 0);
    }

    #[test]
    fn unknown_key_exits_one() {
        let file = write_temp("sweep_every: 30\n");
        let args = ConfigArgs {
            command: ConfigCommand::Check {
                path: Some(file.path().to_path_buf()),
            },
        };
        assert_eq!(run_config(&args, None).unwrap(), 1);
    }

    #[test]
    fn summary_flags_missing_windows() {
        let config = EngineConfig::from_yaml(
            "sla:\n  critical: { attention_minutes: 15, resolution_minutes: 120 }\n",
        )
        .unwrap();
        let summary = summarize(&config);
        assert!(summary.contains("sla critical: attention 15 min"));
        assert!(summary.contains("sla normal: MISSING"));
    }
}
