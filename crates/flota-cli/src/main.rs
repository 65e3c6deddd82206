//! # flota CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flota_cli::config::ConfigArgs;
use flota_cli::movements::MovementsArgs;
use flota_cli::sla::SlaArgs;

/// Fleet maintenance toolchain.
///
/// Checks engine configuration, computes SLA deadlines and verifies
/// exported movement ledgers without a running service.
#[derive(Parser, Debug)]
#[command(name = "flota", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file; overrides `FLOTA_CONFIG`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Engine configuration checks.
    Config(ConfigArgs),
    /// SLA deadline calculation.
    Sla(SlaArgs),
    /// Movement ledger verification.
    Movements(MovementsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Config(args) => flota_cli::config::run_config(args, cli.config.as_deref()),
        Commands::Sla(args) => flota_cli::load_config(cli.config.as_deref())
            .and_then(|config| flota_cli::sla::run_sla(args, &config)),
        Commands::Movements(args) => flota_cli::movements::run_movements(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
