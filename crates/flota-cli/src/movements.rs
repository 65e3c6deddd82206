//! # Movements Subcommand
//!
//! `flota movements verify FILE` checks an exported JSON array of movement
//! records. Records are grouped by unit and ordered by sequence before
//! each unit's chain is walked, so an export in any order verifies the
//! same way.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use flota_core::EquipmentId;
use flota_equipment::{verify_chain, ChainReport, MovementRecord};

/// Arguments for the `flota movements` subcommand.
#[derive(Args, Debug)]
pub struct MovementsArgs {
    #[command(subcommand)]
    pub command: MovementsCommand,
}

#[derive(Subcommand, Debug)]
pub enum MovementsCommand {
    /// Verify the movement chains in a JSON export.
    Verify {
        /// JSON file holding an array of movement records.
        file: PathBuf,

        /// Emit the reports as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the movements subcommand.
///
/// Returns exit code: 0 when every chain is consistent, 1 otherwise.
pub fn run_movements(args: &MovementsArgs) -> Result<u8> {
    match &args.command {
        MovementsCommand::Verify { file, json } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<MovementRecord> = serde_json::from_str(&content)
                .with_context(|| {
                    format!("{} is not a JSON array of movement records", file.display())
                })?;
            let reports = verify_export(records);

            if *json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                }
            }

            let broken = reports.iter().filter(|r| !r.consistent).count();
            if broken > 0 {
                tracing::warn!(broken, units = reports.len(), "inconsistent movement chains");
                return Ok(1);
            }
            Ok(0)
        }
    }
}

/// One report per unit, ordered by unit id.
pub fn verify_export(records: Vec<MovementRecord>) -> Vec<ChainReport> {
    let mut by_unit: BTreeMap<EquipmentId, Vec<MovementRecord>> = BTreeMap::new();
    for record in records {
        by_unit.entry(record.equipment_id).or_default().push(record);
    }
    by_unit
        .into_values()
        .map(|mut chain| {
            chain.sort_by_key(|r| r.sequence);
            verify_chain(&chain)
        })
        .collect()
}

fn print_report(report: &ChainReport) {
    let unit = report
        .equipment_id
        .map_or_else(|| "<empty>".to_string(), |id| id.to_string());
    if report.consistent {
        let state = report
            .final_state
            .map_or_else(String::new, |s| format!(", now {s}"));
        println!("OK    {unit}: {} movements{state}", report.movements);
    } else {
        println!("FAIL  {unit}: {} movements", report.movements);
        for b in &report.breaks {
            println!("        #{}: {}", b.sequence, b.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flota_core::{ActorId, MovementId, TenantId, Timestamp};
    use flota_equipment::{Location, MovementKind, OperationalState};

    use super::*;

    fn record(
        unit: EquipmentId,
        sequence: u32,
        kind: MovementKind,
        origin: Option<Location>,
        destination: Location,
    ) -> MovementRecord {
        MovementRecord {
            id: MovementId::new(),
            tenant: TenantId::new("emt").unwrap(),
            equipment_id: unit,
            sequence,
            kind,
            origin,
            resulting_state: kind.resulting_state(&destination),
            destination,
            reason: None,
            comments: None,
            links: Default::default(),
            technicians: Vec::new(),
            actor: ActorId::new("tech-3").unwrap(),
            at: Timestamp::parse("2026-02-01T09:00:00Z")
                .unwrap()
                .plus_minutes(i64::from(sequence) * 10),
            operation_id: None,
        }
    }

    fn installed(unit: EquipmentId) -> Vec<MovementRecord> {
        let warehouse = Location::warehouse("W1", "Central");
        let bus = Location::bus("2041", "Bus 2041");
        vec![
            record(unit, 1, MovementKind::Alta, None, warehouse.clone()),
            record(unit, 2, MovementKind::Instalacion, Some(warehouse), bus),
        ]
    }

    #[test]
    fn export_order_does_not_matter() {
        let a = EquipmentId::new();
        let b = EquipmentId::new();
        let mut records = installed(a);
        records.extend(installed(b));
        records.reverse();

        let reports = verify_export(records);
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(report.consistent, "{report:?}");
            assert_eq!(report.movements, 2);
            assert_eq!(report.final_state, Some(OperationalState::EnServicio));
        }
    }

    #[test]
    fn broken_origin_is_reported() {
        let unit = EquipmentId::new();
        let mut records = installed(unit);
        records[1].origin = Some(Location::lab("L1", "Taller"));

        let reports = verify_export(records);
        assert!(!reports[0].consistent);
        assert_eq!(reports[0].breaks[0].sequence, 2);
    }

    #[test]
    fn exit_code_reflects_consistency() {
        let unit = EquipmentId::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&installed(unit)).unwrap().as_bytes())
            .unwrap();
        let args = MovementsArgs {
            command: MovementsCommand::Verify {
                file: file.path().to_path_buf(),
                json: false,
            },
        };
        assert_eq!(run_movements(&args).unwrap(), 0);

        let mut records = installed(unit);
        records.remove(0);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&records).unwrap().as_bytes())
            .unwrap();
        let args = MovementsArgs {
            command: MovementsCommand::Verify {
                file: file.path().to_path_buf(),
                json: true,
            },
        };
        assert_eq!(run_movements(&args).unwrap(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"not\": \"an array\"}").unwrap();
        let args = MovementsArgs {
            command: MovementsCommand::Verify {
                file: file.path().to_path_buf(),
                json: false,
            },
        };
        assert!(run_movements(&args).is_err());
    }
}
