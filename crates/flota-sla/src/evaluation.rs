//! # Deadline Computation and Evaluation
//!
//! `compute_deadlines` runs at intake (and again if criticality changes
//! before resolution). `evaluate` is a pure function of the incident's
//! lifecycle timestamps, its deadlines, and `now`. Once repair end is set,
//! `now` no longer participates, so re-evaluating a resolved incident
//! always reproduces the frozen values.

use flota_core::{Criticality, EngineError, Timestamp};
use serde::{Deserialize, Serialize};

use crate::policy::SlaPolicy;

/// Attention and resolution deadlines of one incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaDeadlines {
    pub attention: Timestamp,
    pub resolution: Timestamp,
}

/// The lifecycle timestamps the evaluation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTimestamps {
    pub received_at: Timestamp,
    pub analysis_started_at: Option<Timestamp>,
    pub repair_ended_at: Option<Timestamp>,
}

/// Result of evaluating an incident against its deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaEvaluation {
    /// `None` until analysis has started.
    pub attention_met: Option<bool>,
    /// `None` until the repair has ended.
    pub resolution_met: Option<bool>,
    /// Whole minutes from reception to repair end (or `now`), floored.
    pub out_of_service_minutes: i64,
}

/// Deadlines for a fault of `criticality` received at `received_at`.
///
/// # Errors
///
/// [`EngineError::Configuration`] if the policy has no windows for the
/// criticality, or a deadline falls outside the representable range.
pub fn compute_deadlines(
    criticality: Criticality,
    received_at: Timestamp,
    policy: &SlaPolicy,
) -> Result<SlaDeadlines, EngineError> {
    let windows = policy.windows(criticality)?;
    let shift = |minutes: i64| {
        received_at.checked_plus_minutes(minutes).ok_or_else(|| {
            EngineError::Configuration(format!(
                "SLA window of {minutes} minutes for {criticality} is out of range"
            ))
        })
    };
    Ok(SlaDeadlines {
        attention: shift(windows.attention_minutes)?,
        resolution: shift(windows.resolution_minutes)?,
    })
}

/// Evaluate compliance at `now`.
pub fn evaluate(
    timestamps: &SlaTimestamps,
    deadlines: &SlaDeadlines,
    now: Timestamp,
) -> SlaEvaluation {
    let end = timestamps.repair_ended_at.unwrap_or(now);
    SlaEvaluation {
        attention_met: timestamps
            .analysis_started_at
            .map(|started| started <= deadlines.attention),
        resolution_met: timestamps
            .repair_ended_at
            .map(|ended| ended <= deadlines.resolution),
        out_of_service_minutes: end.whole_minutes_since(&timestamps.received_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn critical_deadlines_from_standard_policy() {
        let t0 = ts("2026-03-10T08:00:00Z");
        let d = compute_deadlines(Criticality::Critical, t0, &SlaPolicy::standard()).unwrap();
        assert_eq!(d.attention, ts("2026-03-10T08:30:00Z"));
        assert_eq!(d.resolution, ts("2026-03-10T12:00:00Z"));
    }

    #[test]
    fn late_analysis_misses_attention() {
        let t0 = ts("2026-03-10T08:00:00Z");
        let d = compute_deadlines(Criticality::Critical, t0, &SlaPolicy::standard()).unwrap();
        let stamps = SlaTimestamps {
            received_at: t0,
            analysis_started_at: Some(t0.plus_minutes(45)),
            repair_ended_at: None,
        };
        let e = evaluate(&stamps, &d, t0.plus_minutes(50));
        assert_eq!(e.attention_met, Some(false));
        assert_eq!(e.resolution_met, None);
        assert_eq!(e.out_of_service_minutes, 50);
    }

    #[test]
    fn undefined_until_stamped() {
        let t0 = ts("2026-03-10T08:00:00Z");
        let d = compute_deadlines(Criticality::Normal, t0, &SlaPolicy::standard()).unwrap();
        let stamps = SlaTimestamps {
            received_at: t0,
            analysis_started_at: None,
            repair_ended_at: None,
        };
        let e = evaluate(&stamps, &d, t0.plus_minutes(10_000));
        assert_eq!(e.attention_met, None);
        assert_eq!(e.resolution_met, None);
        assert_eq!(e.out_of_service_minutes, 10_000);
    }

    #[test]
    fn deadline_boundary_is_met() {
        let t0 = ts("2026-03-10T08:00:00Z");
        let d = compute_deadlines(Criticality::Critical, t0, &SlaPolicy::standard()).unwrap();
        let stamps = SlaTimestamps {
            received_at: t0,
            analysis_started_at: Some(d.attention),
            repair_ended_at: Some(d.resolution),
        };
        let e = evaluate(&stamps, &d, d.resolution);
        assert_eq!(e.attention_met, Some(true));
        assert_eq!(e.resolution_met, Some(true));
        assert_eq!(e.out_of_service_minutes, 240);
    }

    #[test]
    fn missing_window_propagates() {
        let err = compute_deadlines(
            Criticality::Normal,
            ts("2026-03-10T08:00:00Z"),
            &SlaPolicy::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    proptest! {
        #[test]
        fn resolved_evaluation_is_frozen(
            analysis in 0i64..600,
            repair in 0i64..6000,
            t1 in 0i64..100_000,
            t2 in 0i64..100_000,
        ) {
            let t0 = ts("2026-01-01T00:00:00Z");
            let d = compute_deadlines(Criticality::Critical, t0, &SlaPolicy::standard()).unwrap();
            let stamps = SlaTimestamps {
                received_at: t0,
                analysis_started_at: Some(t0.plus_minutes(analysis)),
                repair_ended_at: Some(t0.plus_minutes(analysis + repair)),
            };
            prop_assert_eq!(
                evaluate(&stamps, &d, t0.plus_minutes(t1)),
                evaluate(&stamps, &d, t0.plus_minutes(t2))
            );
        }

        #[test]
        fn out_of_service_never_negative_after_reception(elapsed in 0i64..1_000_000) {
            let t0 = ts("2026-01-01T00:00:00Z");
            let d = compute_deadlines(Criticality::Normal, t0, &SlaPolicy::standard()).unwrap();
            let stamps = SlaTimestamps {
                received_at: t0,
                analysis_started_at: None,
                repair_ended_at: None,
            };
            prop_assert_eq!(
                evaluate(&stamps, &d, t0.plus_minutes(elapsed)).out_of_service_minutes,
                elapsed
            );
        }
    }
}
