//! # Incident State Machine
//!
//! Governs a reported fault from intake to closure.
//!
//! ## States
//!
//! ```text
//! nueva ──▶ en_analisis ──▶ en_intervencion ──▶ resuelta ──▶ cerrada
//!              ▲                                   │            │
//!              │                                   ▼            │
//!              └──────────────────────────── reabierta ◀────────┘
//! ```
//!
//! Entering `en_analisis`, `en_intervencion` and `resuelta` stamps the
//! analysis-start, repair-start and repair-end timestamps the first time
//! only. Entering `resuelta` also freezes the SLA snapshot; entering
//! `reabierta` unfreezes it and bumps `reopen_count`.
//!
//! Every mutating method validates completely before it writes, and returns
//! the field deltas the caller records in the audit ledger.

use serde::{Deserialize, Serialize};

use flota_audit::FieldDelta;
use flota_core::{
    Criticality, CriticalityFlags, EngineError, EquipmentId, IncidentId, TenantId, Timestamp,
};
use flota_sla::{
    compute_deadlines, detect_breaches, evaluate, SlaBreach, SlaDeadlines, SlaEvaluation,
    SlaPolicy, SlaTimestamps,
};

use crate::lifecycle::{non_blank, required_text, LifecycleState, TransitionRecord};
use crate::materials::{
    summarize_materials, summarize_tests, validate_materials, validate_test_results,
    MaterialLine, TestResult,
};

// ─── State ───────────────────────────────────────────────────────────

/// Lifecycle state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentState {
    Nueva,
    EnAnalisis,
    EnIntervencion,
    Resuelta,
    Cerrada,
    Reabierta,
}

impl IncidentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nueva => "nueva",
            Self::EnAnalisis => "en_analisis",
            Self::EnIntervencion => "en_intervencion",
            Self::Resuelta => "resuelta",
            Self::Cerrada => "cerrada",
            Self::Reabierta => "reabierta",
        }
    }

    /// Whether the incident still counts against open SLA deadlines.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Resuelta | Self::Cerrada)
    }
}

impl LifecycleState for IncidentState {
    fn all() -> &'static [Self] {
        &[
            Self::Nueva,
            Self::EnAnalisis,
            Self::EnIntervencion,
            Self::Resuelta,
            Self::Cerrada,
            Self::Reabierta,
        ]
    }

    fn allowed_next(&self) -> &'static [Self] {
        match self {
            Self::Nueva => &[Self::EnAnalisis],
            Self::EnAnalisis => &[Self::EnIntervencion],
            Self::EnIntervencion => &[Self::Resuelta],
            Self::Resuelta => &[Self::Cerrada, Self::Reabierta],
            Self::Cerrada => &[Self::Reabierta],
            Self::Reabierta => &[Self::EnAnalisis],
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Cerrada)
    }
}

impl std::fmt::Display for IncidentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("unknown incident state {s:?}")))
    }
}

// ─── Timestamps and SLA snapshot ─────────────────────────────────────

/// Lifecycle timestamps. Each is written once and never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentTimestamps {
    pub received_at: Timestamp,
    pub analysis_started_at: Option<Timestamp>,
    pub repair_started_at: Option<Timestamp>,
    pub repair_ended_at: Option<Timestamp>,
}

impl IncidentTimestamps {
    /// The subset the SLA engine reads.
    pub fn sla(&self) -> SlaTimestamps {
        SlaTimestamps {
            received_at: self.received_at,
            analysis_started_at: self.analysis_started_at,
            repair_ended_at: self.repair_ended_at,
        }
    }
}

/// Persisted SLA values for one incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSnapshot {
    /// Effective criticality the deadlines were computed for.
    pub criticality: Criticality,
    pub deadlines: SlaDeadlines,
    pub evaluation: SlaEvaluation,
    /// Set on `resuelta`; cleared on `reabierta`.
    pub frozen: bool,
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// Intake data for a new incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub criticality: CriticalityFlags,
    /// Primary asset (vehicle) the fault was reported on.
    pub asset_ref: String,
    #[serde(default)]
    pub affected_equipment: Vec<EquipmentId>,
    /// When the fault was received, if earlier than intake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<Timestamp>,
}

/// A field edit allowed in any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum IncidentEdit {
    Diagnosis(Option<String>),
    RootCause(Option<String>),
    Solution(Option<String>),
    TestResults(Vec<TestResult>),
    Materials(Vec<MaterialLine>),
    Criticality(CriticalityFlags),
}

// ─── Incident ────────────────────────────────────────────────────────

/// A reported fault and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub tenant: TenantId,
    /// Tenant-scoped sequential code, e.g. `INC-000042`.
    pub code: String,
    /// Optimistic-lock version, bumped on every accepted write.
    pub version: u64,
    pub category: String,
    pub description: String,
    pub criticality: CriticalityFlags,
    pub state: IncidentState,
    pub asset_ref: String,
    pub affected_equipment: Vec<EquipmentId>,
    pub diagnosis: Option<String>,
    pub root_cause: Option<String>,
    pub solution: Option<String>,
    pub test_results: Vec<TestResult>,
    pub materials: Vec<MaterialLine>,
    pub timestamps: IncidentTimestamps,
    pub sla: SlaSnapshot,
    pub reopen_count: u32,
    pub transitions: Vec<TransitionRecord<IncidentState>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Incident {
    /// Intake a fault in state `nueva` with deadlines stamped.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] for blank category, description or asset,
    /// or a reception time in the future; [`EngineError::Configuration`] if
    /// the policy has no windows for the effective criticality.
    pub fn open(
        tenant: TenantId,
        code: String,
        input: NewIncident,
        policy: &SlaPolicy,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let category = required_text("category", &input.category)?;
        let description = required_text("description", &input.description)?;
        let asset_ref = required_text("asset_ref", &input.asset_ref)?;
        let received_at = input.received_at.unwrap_or(now);
        if received_at > now {
            return Err(EngineError::Validation(format!(
                "received_at {received_at} is in the future"
            )));
        }
        let criticality = input.criticality.effective();
        let deadlines = compute_deadlines(criticality, received_at, policy)?;
        let timestamps = IncidentTimestamps {
            received_at,
            analysis_started_at: None,
            repair_started_at: None,
            repair_ended_at: None,
        };
        Ok(Self {
            id: IncidentId::new(),
            tenant,
            code,
            version: 0,
            category,
            description,
            criticality: input.criticality,
            state: IncidentState::Nueva,
            asset_ref,
            affected_equipment: input.affected_equipment,
            diagnosis: None,
            root_cause: None,
            solution: None,
            test_results: Vec::new(),
            materials: Vec::new(),
            timestamps,
            sla: SlaSnapshot {
                criticality,
                deadlines,
                evaluation: evaluate(&timestamps.sla(), &deadlines, now),
                frozen: false,
            },
            reopen_count: 0,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Effective criticality under the either-flag rule.
    pub fn effective_criticality(&self) -> Criticality {
        self.criticality.effective()
    }

    /// States reachable from the current one.
    pub fn allowed_transitions(&self) -> &'static [IncidentState] {
        self.state.allowed_next()
    }

    /// Move to `to`, stamping lifecycle timestamps and the SLA snapshot.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] if `to` is not allowed from the
    /// current state; [`EngineError::Validation`] if `now` precedes the
    /// incident's last write.
    pub fn transition(
        &mut self,
        to: IncidentState,
        observation: Option<String>,
        now: Timestamp,
    ) -> Result<Vec<FieldDelta>, EngineError> {
        self.state.check_transition(to)?;
        self.check_clock(now)?;

        let from = self.state;
        let mut changes = vec![FieldDelta::changed("state", from, to)];
        match to {
            IncidentState::EnAnalisis => {
                stamp_once(
                    &mut self.timestamps.analysis_started_at,
                    "analysis_started_at",
                    now,
                    &mut changes,
                );
            }
            IncidentState::EnIntervencion => {
                stamp_once(
                    &mut self.timestamps.repair_started_at,
                    "repair_started_at",
                    now,
                    &mut changes,
                );
            }
            IncidentState::Resuelta => {
                stamp_once(
                    &mut self.timestamps.repair_ended_at,
                    "repair_ended_at",
                    now,
                    &mut changes,
                );
            }
            IncidentState::Reabierta => {
                changes.push(FieldDelta::changed(
                    "reopen_count",
                    self.reopen_count,
                    self.reopen_count + 1,
                ));
                self.reopen_count += 1;
                self.sla.frozen = false;
            }
            IncidentState::Nueva | IncidentState::Cerrada => {}
        }

        let before = self.sla.evaluation;
        self.sla.evaluation = evaluate(&self.timestamps.sla(), &self.sla.deadlines, now);
        if to == IncidentState::Resuelta {
            self.sla.frozen = true;
            push_flag_delta(
                &mut changes,
                "attention_met",
                before.attention_met,
                self.sla.evaluation.attention_met,
            );
            push_flag_delta(
                &mut changes,
                "resolution_met",
                before.resolution_met,
                self.sla.evaluation.resolution_met,
            );
        }

        let note = non_blank(observation);
        if let Some(text) = &note {
            changes.push(FieldDelta::set("observation", text));
        }
        self.transitions.push(TransitionRecord {
            from,
            to,
            at: now,
            note,
        });
        self.state = to;
        self.updated_at = now;
        Ok(changes)
    }

    /// Apply a field edit.
    ///
    /// Returns no deltas when the edit changes nothing; the caller then
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidState`] on a closed incident.
    /// - [`EngineError::Validation`] for malformed lists, or for lowering a
    ///   criticality flag once both parties marked the incident critical.
    /// - [`EngineError::Configuration`] if a criticality change needs
    ///   windows the policy lacks.
    pub fn edit(
        &mut self,
        edit: IncidentEdit,
        policy: &SlaPolicy,
        now: Timestamp,
    ) -> Result<Vec<FieldDelta>, EngineError> {
        if self.state.is_terminal() {
            return Err(EngineError::invalid_state("edit_incident", self.state));
        }
        self.check_clock(now)?;

        let mut changes = Vec::new();
        match edit {
            IncidentEdit::Diagnosis(text) => {
                replace_text(&mut self.diagnosis, "diagnosis", text, &mut changes)
            }
            IncidentEdit::RootCause(text) => {
                replace_text(&mut self.root_cause, "root_cause", text, &mut changes)
            }
            IncidentEdit::Solution(text) => {
                replace_text(&mut self.solution, "solution", text, &mut changes)
            }
            IncidentEdit::TestResults(results) => {
                validate_test_results(&results)?;
                if results != self.test_results {
                    changes.push(FieldDelta::changed(
                        "test_results",
                        summarize_tests(&self.test_results),
                        summarize_tests(&results),
                    ));
                    self.test_results = results;
                }
            }
            IncidentEdit::Materials(lines) => {
                validate_materials(&lines)?;
                if lines != self.materials {
                    changes.push(FieldDelta::changed(
                        "materials",
                        summarize_materials(&self.materials),
                        summarize_materials(&lines),
                    ));
                    self.materials = lines;
                }
            }
            IncidentEdit::Criticality(flags) => {
                self.change_criticality(flags, policy, &mut changes)?
            }
        }

        if !changes.is_empty() {
            if !self.sla.frozen {
                self.sla.evaluation =
                    evaluate(&self.timestamps.sla(), &self.sla.deadlines, now);
            }
            self.updated_at = now;
        }
        Ok(changes)
    }

    fn change_criticality(
        &mut self,
        flags: CriticalityFlags,
        policy: &SlaPolicy,
        changes: &mut Vec<FieldDelta>,
    ) -> Result<(), EngineError> {
        if flags == self.criticality {
            return Ok(());
        }
        if self.criticality.both_critical() {
            return Err(EngineError::Validation(
                "criticality cannot be lowered once operator and maintenance \
                 both marked it critical"
                    .into(),
            ));
        }
        let effective = flags.effective();
        let recompute = !self.sla.frozen && effective != self.sla.criticality;
        let deadlines = if recompute {
            Some(compute_deadlines(
                effective,
                self.timestamps.received_at,
                policy,
            )?)
        } else {
            None
        };

        if flags.operator != self.criticality.operator {
            changes.push(FieldDelta::changed(
                "criticality_operator",
                self.criticality.operator,
                flags.operator,
            ));
        }
        if flags.maintenance != self.criticality.maintenance {
            changes.push(FieldDelta::changed(
                "criticality_maintenance",
                self.criticality.maintenance,
                flags.maintenance,
            ));
        }
        self.criticality = flags;
        if let Some(deadlines) = deadlines {
            changes.push(FieldDelta::changed(
                "attention_deadline",
                self.sla.deadlines.attention,
                deadlines.attention,
            ));
            changes.push(FieldDelta::changed(
                "resolution_deadline",
                self.sla.deadlines.resolution,
                deadlines.resolution,
            ));
            self.sla.criticality = effective;
            self.sla.deadlines = deadlines;
        }
        Ok(())
    }

    /// SLA evaluation as of `now`; the stored values once frozen.
    pub fn evaluate_at(&self, now: Timestamp) -> SlaEvaluation {
        if self.sla.frozen {
            self.sla.evaluation
        } else {
            evaluate(&self.timestamps.sla(), &self.sla.deadlines, now)
        }
    }

    /// Deadlines missed as of `now`.
    pub fn breaches_at(&self, now: Timestamp) -> Vec<SlaBreach> {
        detect_breaches(&self.timestamps.sla(), &self.sla.deadlines, now)
    }

    fn check_clock(&self, now: Timestamp) -> Result<(), EngineError> {
        if now < self.updated_at {
            return Err(EngineError::Validation(format!(
                "incident {} was last written at {}, after {now}",
                self.code, self.updated_at
            )));
        }
        Ok(())
    }
}

fn stamp_once(
    slot: &mut Option<Timestamp>,
    field: &str,
    now: Timestamp,
    changes: &mut Vec<FieldDelta>,
) {
    if slot.is_none() {
        *slot = Some(now);
        changes.push(FieldDelta::set(field, now));
    }
}

fn push_flag_delta(
    changes: &mut Vec<FieldDelta>,
    field: &str,
    before: Option<bool>,
    after: Option<bool>,
) {
    if before != after {
        changes.push(FieldDelta::optional(
            field,
            before.map(|b| b.to_string()),
            after.map(|b| b.to_string()),
        ));
    }
}

fn replace_text(
    slot: &mut Option<String>,
    field: &str,
    text: Option<String>,
    changes: &mut Vec<FieldDelta>,
) {
    let text = non_blank(text);
    if *slot != text {
        changes.push(FieldDelta::optional(field, slot.clone(), text.clone()));
        *slot = text;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{MaterialKind, TestOutcome};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-10T08:00:00Z").unwrap()
    }

    fn intake(flags: CriticalityFlags) -> NewIncident {
        NewIncident {
            category: "validadora".into(),
            description: "no lee tarjetas".into(),
            criticality: flags,
            asset_ref: "BUS-2041".into(),
            affected_equipment: vec![],
            received_at: None,
        }
    }

    fn open_critical() -> Incident {
        Incident::open(
            TenantId::new("emt").unwrap(),
            "INC-000001".into(),
            intake(CriticalityFlags::new(true, false)),
            &SlaPolicy::standard(),
            t0(),
        )
        .unwrap()
    }

    // ── Intake ───────────────────────────────────────────────────────

    #[test]
    fn intake_stamps_deadlines() {
        let inc = open_critical();
        assert_eq!(inc.state, IncidentState::Nueva);
        assert_eq!(inc.sla.deadlines.attention, t0().plus_minutes(30));
        assert_eq!(inc.sla.deadlines.resolution, t0().plus_minutes(240));
        assert_eq!(inc.sla.criticality, Criticality::Critical);
        assert!(!inc.sla.frozen);
    }

    #[test]
    fn intake_rejects_blank_fields_and_future_reception() {
        let mut bad = intake(CriticalityFlags::default());
        bad.description = "  ".into();
        let tenant = TenantId::new("emt").unwrap();
        assert!(matches!(
            Incident::open(tenant.clone(), "INC-1".into(), bad, &SlaPolicy::standard(), t0()),
            Err(EngineError::Validation(_))
        ));
        let mut future = intake(CriticalityFlags::default());
        future.received_at = Some(t0().plus_minutes(5));
        let policy = SlaPolicy::standard();
        assert!(Incident::open(tenant, "INC-1".into(), future, &policy, t0()).is_err());
    }

    #[test]
    fn intake_without_policy_window_is_configuration_error() {
        let err = Incident::open(
            TenantId::new("emt").unwrap(),
            "INC-1".into(),
            intake(CriticalityFlags::default()),
            &SlaPolicy::empty(),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    // ── Transitions ──────────────────────────────────────────────────

    #[test]
    fn full_lifecycle_stamps_each_timestamp_once() {
        let mut inc = open_critical();
        inc.transition(IncidentState::EnAnalisis, None, t0().plus_minutes(10))
            .unwrap();
        inc.transition(IncidentState::EnIntervencion, None, t0().plus_minutes(20))
            .unwrap();
        let changes = inc
            .transition(
                IncidentState::Resuelta,
                Some("lector sustituido".into()),
                t0().plus_minutes(90),
            )
            .unwrap();
        assert!(changes.iter().any(|d| d.field == "repair_ended_at"));
        assert!(changes.iter().any(|d| d.field == "observation"));
        inc.transition(IncidentState::Cerrada, None, t0().plus_minutes(100))
            .unwrap();

        assert_eq!(inc.timestamps.analysis_started_at, Some(t0().plus_minutes(10)));
        assert_eq!(inc.timestamps.repair_started_at, Some(t0().plus_minutes(20)));
        assert_eq!(inc.timestamps.repair_ended_at, Some(t0().plus_minutes(90)));
        assert!(inc.sla.frozen);
        assert_eq!(inc.sla.evaluation.attention_met, Some(true));
        assert_eq!(inc.sla.evaluation.resolution_met, Some(true));
        assert_eq!(inc.sla.evaluation.out_of_service_minutes, 90);
        assert_eq!(inc.transitions.len(), 4);
    }

    #[test]
    fn late_analysis_misses_attention() {
        let mut inc = open_critical();
        inc.transition(IncidentState::EnAnalisis, None, t0().plus_minutes(45))
            .unwrap();
        assert_eq!(inc.evaluate_at(t0().plus_minutes(46)).attention_met, Some(false));
    }

    #[test]
    fn skipping_states_is_invalid_transition() {
        let mut inc = open_critical();
        let err = inc
            .transition(IncidentState::Resuelta, None, t0())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(inc.state, IncidentState::Nueva);
        assert!(inc.transitions.is_empty());
    }

    #[test]
    fn clock_going_backwards_rejected() {
        let mut inc = open_critical();
        inc.transition(IncidentState::EnAnalisis, None, t0().plus_minutes(10))
            .unwrap();
        assert!(matches!(
            inc.transition(IncidentState::EnIntervencion, None, t0().plus_minutes(5)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn reopen_keeps_timestamps_and_unfreezes() {
        let mut inc = open_critical();
        inc.transition(IncidentState::EnAnalisis, None, t0().plus_minutes(10)).unwrap();
        inc.transition(IncidentState::EnIntervencion, None, t0().plus_minutes(20)).unwrap();
        inc.transition(IncidentState::Resuelta, None, t0().plus_minutes(30)).unwrap();
        inc.transition(IncidentState::Cerrada, None, t0().plus_minutes(40)).unwrap();
        let changes = inc
            .transition(
                IncidentState::Reabierta,
                Some("vuelve a fallar".into()),
                t0().plus_minutes(500),
            )
            .unwrap();
        assert!(changes.iter().any(|d| d.field == "reopen_count"));
        assert_eq!(inc.reopen_count, 1);
        assert!(!inc.sla.frozen);
        assert_eq!(inc.timestamps.repair_ended_at, Some(t0().plus_minutes(30)));

        inc.transition(IncidentState::EnAnalisis, None, t0().plus_minutes(510)).unwrap();
        assert_eq!(inc.timestamps.analysis_started_at, Some(t0().plus_minutes(10)));
    }

    #[test]
    fn allowed_transitions_follow_table() {
        let inc = open_critical();
        assert_eq!(inc.allowed_transitions(), &[IncidentState::EnAnalisis]);
        assert_eq!(
            IncidentState::Resuelta.allowed_next(),
            &[IncidentState::Cerrada, IncidentState::Reabierta]
        );
        assert!(IncidentState::Cerrada.is_terminal());
        assert_eq!(
            "en_intervencion".parse::<IncidentState>().unwrap(),
            IncidentState::EnIntervencion,
        );
        assert!("abierta".parse::<IncidentState>().is_err());
    }

    // ── Edits ────────────────────────────────────────────────────────

    #[test]
    fn text_edits_produce_deltas_and_noop_produces_none() {
        let mut inc = open_critical();
        let policy = SlaPolicy::standard();
        let changes = inc
            .edit(IncidentEdit::Diagnosis(Some("lector quemado".into())), &policy, t0())
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].before, None);
        assert_eq!(changes[0].after.as_deref(), Some("lector quemado"));
        let again = inc
            .edit(IncidentEdit::Diagnosis(Some(" lector quemado ".into())), &policy, t0())
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(inc.state, IncidentState::Nueva);
    }

    #[test]
    fn list_edits_validate() {
        let mut inc = open_critical();
        let policy = SlaPolicy::standard();
        let blank_test = TestResult::new("", TestOutcome::Ok);
        assert!(inc
            .edit(IncidentEdit::TestResults(vec![blank_test]), &policy, t0())
            .is_err());
        let changes = inc
            .edit(
                IncidentEdit::Materials(vec![MaterialLine::new(
                    "lector",
                    Decimal::ONE,
                    MaterialKind::Repuesto,
                )]),
                &policy,
                t0(),
            )
            .unwrap();
        assert_eq!(changes[0].field, "materials");
        assert_eq!(inc.materials.len(), 1);
    }

    #[test]
    fn criticality_change_recomputes_deadlines_until_frozen() {
        let mut inc = Incident::open(
            TenantId::new("emt").unwrap(),
            "INC-2".into(),
            intake(CriticalityFlags::default()),
            &SlaPolicy::standard(),
            t0(),
        )
        .unwrap();
        assert_eq!(inc.sla.deadlines.attention, t0().plus_minutes(240));
        let changes = inc
            .edit(
                IncidentEdit::Criticality(CriticalityFlags::new(false, true)),
                &SlaPolicy::standard(),
                t0().plus_minutes(5),
            )
            .unwrap();
        assert!(changes.iter().any(|d| d.field == "attention_deadline"));
        assert_eq!(inc.sla.deadlines.attention, t0().plus_minutes(30));
        assert_eq!(inc.effective_criticality(), Criticality::Critical);
    }

    #[test]
    fn criticality_cannot_be_lowered_once_both_set() {
        let mut inc = open_critical();
        let policy = SlaPolicy::standard();
        inc.edit(IncidentEdit::Criticality(CriticalityFlags::new(true, true)), &policy, t0())
            .unwrap();
        let err = inc
            .edit(IncidentEdit::Criticality(CriticalityFlags::new(true, false)), &policy, t0())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn edits_on_closed_incident_rejected() {
        let mut inc = open_critical();
        let policy = SlaPolicy::standard();
        for to in [
            IncidentState::EnAnalisis,
            IncidentState::EnIntervencion,
            IncidentState::Resuelta,
            IncidentState::Cerrada,
        ] {
            inc.transition(to, None, t0()).unwrap();
        }
        let err = inc
            .edit(IncidentEdit::Solution(Some("x".into())), &policy, t0())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn frozen_incident_ignores_now() {
        let mut inc = open_critical();
        for (to, m) in [
            (IncidentState::EnAnalisis, 40),
            (IncidentState::EnIntervencion, 50),
            (IncidentState::Resuelta, 300),
        ] {
            inc.transition(to, None, t0().plus_minutes(m)).unwrap();
        }
        assert_eq!(
            inc.evaluate_at(t0().plus_minutes(301)),
            inc.evaluate_at(t0().plus_minutes(99_999)),
        );
        assert_eq!(inc.sla.evaluation.resolution_met, Some(false));
    }

    // ── Properties ───────────────────────────────────────────────────

    fn any_state() -> impl Strategy<Value = IncidentState> {
        prop::sample::select(IncidentState::all().to_vec())
    }

    proptest! {
        #[test]
        fn transitions_respect_table_and_stamp_order(
            targets in prop::collection::vec(any_state(), 1..40)
        ) {
            let mut inc = open_critical();
            let mut now = t0();
            for to in targets {
                now = now.plus_minutes(7);
                let prev = inc.state;
                match inc.transition(to, None, now) {
                    Ok(_) => {
                        prop_assert!(prev.allowed_next().contains(&inc.state));
                        prop_assert_eq!(inc.state, to);
                    }
                    Err(EngineError::InvalidTransition { .. }) => {
                        prop_assert!(!prev.can_transition_to(to));
                        prop_assert_eq!(inc.state, prev);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                let ts = inc.timestamps;
                if ts.repair_started_at.is_some() {
                    prop_assert!(ts.analysis_started_at.is_some());
                    prop_assert!(ts.analysis_started_at <= ts.repair_started_at);
                }
                if ts.repair_ended_at.is_some() {
                    prop_assert!(ts.repair_started_at.is_some());
                    prop_assert!(ts.repair_started_at <= ts.repair_ended_at);
                }
                if matches!(inc.state, IncidentState::EnAnalisis) {
                    prop_assert!(ts.analysis_started_at.is_some());
                }
            }
        }
    }
}
