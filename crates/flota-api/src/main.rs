//! # flota-api: Binary Entry Point
//!
//! Starts the HTTP server and the SLA sweeper. Configuration comes from
//! `FLOTA_CONFIG` (engine YAML, optional) and `PORT` (default 8080).
//! `FLOTA_LOG_JSON=1` switches logs to JSON lines.

use std::time::Duration;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use flota_api::state::{AppConfig, AppState};
use flota_engine::{Engine, EngineConfig, SlaSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let recorder = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let config = EngineConfig::from_env().context("loading engine configuration")?;
    for criticality in config.sla_gaps() {
        tracing::warn!(
            %criticality,
            "SLA policy has no windows; intake at this criticality will fail"
        );
    }
    let sweep_every = Duration::from_secs(config.sweep_interval_secs);
    let engine = Engine::new(config).context("building engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = SlaSweeper::new(engine.clone()).spawn(sweep_every, shutdown_rx);

    let app_config = AppConfig::from_env();
    let app = flota_api::app(AppState::new(engine).with_metrics(recorder));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!("flota API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!("SLA sweeper task failed: {e}");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("FLOTA_LOG_JSON").is_ok_and(|v| v == "1");
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
