//! # Application State
//!
//! Shared state passed to all route handlers via the `State` extractor.
//! The engine handle is cheap to clone; all synchronisation lives inside it.

use metrics_exporter_prometheus::PrometheusHandle;

use flota_engine::{Engine, EngineConfig};

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    /// Read `PORT`, defaulting to 8080.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self { port }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    /// Renders `/metrics`; absent when no recorder was installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            metrics: None,
        }
    }

    /// State over an engine with the built-in configuration.
    pub fn with_defaults() -> Result<Self, flota_core::EngineError> {
        Ok(Self::new(Engine::new(EngineConfig::default())?))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
