//! # SLA Subcommand
//!
//! `flota sla deadlines` computes the attention and resolution deadlines
//! an intake would get under the configured policy.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use flota_core::{Criticality, CriticalityFlags, Timestamp};
use flota_engine::EngineConfig;
use flota_sla::{compute_deadlines, SlaDeadlines};

/// Arguments for the `flota sla` subcommand.
#[derive(Args, Debug)]
pub struct SlaArgs {
    #[command(subcommand)]
    pub command: SlaCommand,
}

#[derive(Subcommand, Debug)]
pub enum SlaCommand {
    /// Print the deadlines for a fault received at a given instant.
    Deadlines(DeadlinesArgs),
}

#[derive(Args, Debug)]
pub struct DeadlinesArgs {
    /// Reception instant (RFC 3339, UTC). Defaults to now.
    #[arg(long)]
    pub received_at: Option<String>,

    /// Effective criticality, `critical` or `normal`.
    #[arg(long, conflicts_with_all = ["operator_critical", "maintenance_critical"])]
    pub criticality: Option<String>,

    /// The operator flagged the fault as critical.
    #[arg(long)]
    pub operator_critical: bool,

    /// Maintenance flagged the fault as critical.
    #[arg(long)]
    pub maintenance_critical: bool,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct DeadlinesOutput {
    criticality: Criticality,
    received_at: Timestamp,
    #[serde(flatten)]
    deadlines: SlaDeadlines,
}

/// Execute the sla subcommand.
pub fn run_sla(args: &SlaArgs, config: &EngineConfig) -> Result<u8> {
    match &args.command {
        SlaCommand::Deadlines(args) => {
            print!("{}", render_deadlines(args, config)?);
            Ok(0)
        }
    }
}

/// Compute and render the deadlines as they would be printed.
pub fn render_deadlines(args: &DeadlinesArgs, config: &EngineConfig) -> Result<String> {
    let criticality = match &args.criticality {
        Some(name) => name.parse::<Criticality>()?,
        None => {
            CriticalityFlags::new(args.operator_critical, args.maintenance_critical).effective()
        }
    };
    let received_at = match &args.received_at {
        Some(raw) => Timestamp::parse(raw).with_context(|| format!("--received-at {raw:?}"))?,
        None => Timestamp::now(),
    };
    tracing::debug!(%criticality, %received_at, "computing deadlines");
    let deadlines = compute_deadlines(criticality, received_at, &config.sla)
        .with_context(|| format!("no SLA windows configured for {criticality}"))?;

    if args.json {
        let output = DeadlinesOutput {
            criticality,
            received_at,
            deadlines,
        };
        let mut rendered = serde_json::to_string_pretty(&output)?;
        rendered.push('\n');
        return Ok(rendered);
    }
    Ok(format!(
        "criticality: {criticality}\nreceived:    {received_at}\n\
         attention:   {}\nresolution:  {}\n",
        deadlines.attention, deadlines.resolution
    ))
}
