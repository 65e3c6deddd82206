//! # flota-engine: Maintenance Lifecycle Engine
//!
//! Ties the state machines, the SLA engine and the ledgers together behind
//! one [`Engine`] handle. Every mutating operation takes an explicit
//! [`OperationContext`] and is applied as a single unit: entity, audit
//! entries and movement record are all written or none is.
//!
//! ## Concurrency
//!
//! Writes to one aggregate kind are serialized by that kind's store lock;
//! callers that pass `expected_version` get
//! [`flota_core::EngineError::ConcurrencyConflict`] instead of silently
//! overwriting a newer version. Reads clone out and never block writers
//! for longer than the clone.
//!
//! ## Background work
//!
//! [`SlaSweeper`] runs on tokio and only reads incidents.

pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod store;
pub mod sweeper;
pub mod telemetry;

pub use config::{ConfigError, EngineConfig, CONFIG_ENV};
pub use context::OperationContext;
pub use engine::{Engine, EngineBuilder};
pub use events::{
    ChannelSink, FanoutSink, MemorySink, Notification, NotificationKind, NotificationSink,
    Severity, TracingSink,
};
pub use store::{Aggregate, Store};
pub use sweeper::SlaSweeper;
