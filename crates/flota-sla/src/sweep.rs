//! Breach detection for the periodic SLA sweep.
//!
//! The sweep is read-only with respect to incidents: it reports which
//! deadlines have passed, and the caller decides whether a breach was
//! already notified.

use flota_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::evaluation::{SlaDeadlines, SlaTimestamps};

/// Which deadline was missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    Attention,
    Resolution,
}

impl BreachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attention => "attention",
            Self::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for BreachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A missed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBreach {
    pub kind: BreachKind,
    pub deadline: Timestamp,
    /// Whole minutes past the deadline, measured to the stamp that
    /// resolved it or to `now` if still pending.
    pub overdue_minutes: i64,
}

/// Deadlines missed as of `now`.
///
/// A deadline counts as missed when its stamp is later than the deadline,
/// or when the stamp is absent and `now` is past the deadline.
pub fn detect_breaches(
    timestamps: &SlaTimestamps,
    deadlines: &SlaDeadlines,
    now: Timestamp,
) -> Vec<SlaBreach> {
    let check = |kind, stamp: Option<Timestamp>, deadline: Timestamp| {
        let reference = stamp.unwrap_or(now);
        (reference > deadline).then(|| SlaBreach {
            kind,
            deadline,
            overdue_minutes: reference.whole_minutes_since(&deadline),
        })
    };
    [
        check(
            BreachKind::Attention,
            timestamps.analysis_started_at,
            deadlines.attention,
        ),
        check(
            BreachKind::Resolution,
            timestamps.repair_ended_at,
            deadlines.resolution,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}
