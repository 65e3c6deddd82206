//! # SLA Sweep
//!
//! A periodic, read-only pass over open incidents that emits a breach
//! notification the first time each deadline is seen missed. It never
//! writes to an incident and takes no write lock.
//!
//! Which breaches were already notified lives in the sweeper, not in the
//! incidents, so a restarted sweeper notifies outstanding breaches again.
//! Entries are dropped once their incident is no longer open; a reopened
//! incident that is still past a deadline is notified again.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use flota_core::IncidentId;
use flota_sla::BreachKind;

use crate::engine::Engine;
use crate::events::{Notification, NotificationKind, NotificationSink};
use crate::telemetry;

/// Emits each breach kind at most once per incident.
#[derive(Debug)]
pub struct SlaSweeper {
    engine: Engine,
    notified: HashSet<(IncidentId, BreachKind)>,
}

impl SlaSweeper {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            notified: HashSet::new(),
        }
    }

    /// Run one pass and return the notifications it delivered.
    pub fn sweep_once(&mut self) -> Vec<Notification> {
        let now = self.engine.now();
        let mut emitted = Vec::new();
        let mut open = HashSet::new();
        for incident in self.engine.all_incidents() {
            if !incident.state.is_open() {
                continue;
            }
            open.insert(incident.id);
            for breach in incident.breaches_at(now) {
                if !self.notified.insert((incident.id, breach.kind)) {
                    continue;
                }
                let kind = match breach.kind {
                    BreachKind::Attention => NotificationKind::SlaAttentionBreached,
                    BreachKind::Resolution => NotificationKind::SlaResolutionBreached,
                };
                telemetry::record_breach(breach.kind.as_str());
                emitted.push(
                    Notification::new(
                        kind,
                        incident.tenant.clone(),
                        *incident.id.as_uuid(),
                        &incident.code,
                        now,
                    )
                    .with_detail(format!(
                        "{} deadline {} missed by {} min",
                        breach.kind, breach.deadline, breach.overdue_minutes
                    )),
                );
            }
        }
        // Incidents that resolved, closed or vanished since they were notified.
        self.notified.retain(|(id, _)| open.contains(id));
        if !emitted.is_empty() {
            tracing::info!(count = emitted.len(), "SLA sweep found new breaches");
        }
        for notification in &emitted {
            self.engine.sink().deliver(notification.clone());
        }
        emitted
    }

    /// Sweep every `period` until `shutdown` turns true or its sender is
    /// dropped.
    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period_secs = period.as_secs_f64(), "SLA sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("SLA sweeper stopped");
    }

    /// Spawn [`SlaSweeper::run`] on the current tokio runtime.
    pub fn spawn(self, period: Duration, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(period, shutdown))
    }
}
