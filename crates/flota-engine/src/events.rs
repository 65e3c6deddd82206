//! # Notification Events
//!
//! Events the engine emits for an external delivery mechanism. The engine
//! only produces them; how (and whether) they reach a person is up to the
//! [`NotificationSink`] the host installs.
//!
//! Events are delivered after the write that caused them has committed, so
//! a sink never sees an event for a rejected operation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use flota_core::{TenantId, Timestamp};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An incident was created with effective criticality `critical`.
    CriticalIncidentCreated,
    /// An open incident passed its attention deadline without analysis.
    SlaAttentionBreached,
    /// An open incident passed its resolution deadline without repair.
    SlaResolutionBreached,
    /// A completed work order was rejected. Reopening the originating
    /// incident, if wanted, is up to the consumer.
    WorkOrderRejected,
    /// A billable work order was validated and awaits invoicing.
    WorkOrderBillable,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalIncidentCreated => "critical_incident_created",
            Self::SlaAttentionBreached => "sla_attention_breached",
            Self::SlaResolutionBreached => "sla_resolution_breached",
            Self::WorkOrderRejected => "work_order_rejected",
            Self::WorkOrderBillable => "work_order_billable",
        }
    }

    /// Default severity for this kind.
    pub fn severity(&self) -> Severity {
        match self {
            Self::CriticalIncidentCreated | Self::SlaResolutionBreached => Severity::Critical,
            Self::SlaAttentionBreached | Self::WorkOrderRejected => Severity::Warning,
            Self::WorkOrderBillable => Severity::Info,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub severity: Severity,
    pub tenant: TenantId,
    /// Id of the incident or work order the event is about.
    pub entity_id: Uuid,
    /// Its human-readable code.
    pub entity_code: String,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        tenant: TenantId,
        entity_id: Uuid,
        entity_code: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            tenant,
            entity_id,
            entity_code: entity_code.into(),
            at,
            detail: None,
        }
    }

    /// Builder: attach free-text detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ─── Sinks ───────────────────────────────────────────────────────────

/// Destination for engine events. Delivery must not block.
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    fn deliver(&self, notification: Notification);
}

/// Keeps every event in memory. Used by tests and the API's event feed.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Take everything delivered so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Delivered events of one kind.
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn deliver(&self, notification: Notification) {
        self.events.lock().push(notification);
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// A sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::warn!("notification receiver dropped, event discarded");
        }
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, n: Notification) {
        match n.severity {
            Severity::Critical | Severity::Warning => tracing::warn!(
                kind = %n.kind,
                tenant = %n.tenant,
                entity = %n.entity_code,
                at = %n.at,
                detail = n.detail.as_deref().unwrap_or(""),
                "notification"
            ),
            Severity::Info => tracing::info!(
                kind = %n.kind,
                tenant = %n.tenant,
                entity = %n.entity_code,
                at = %n.at,
                "notification"
            ),
        }
    }
}

/// Delivers every event to each inner sink in turn.
#[derive(Debug, Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn deliver(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.deliver(notification.clone());
        }
    }
}
