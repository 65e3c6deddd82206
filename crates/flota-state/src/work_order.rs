//! # Work Order State Machine
//!
//! ```text
//! pendiente ──▶ asignada ──▶ en_curso ──▶ completada ──▶ validada
//!                                              │
//!                                              └───────▶ rechazada
//! ```
//!
//! `validada` and `rechazada` are terminal. Role gating is not this
//! module's concern: it enforces state legality only.
//!
//! Costs are recomputed from the stored materials and execution minutes on
//! `complete`, each part rounded to two decimals, and the total is the sum
//! of the rounded parts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use flota_audit::FieldDelta;
use flota_core::{
    round_money, Criticality, EngineError, EquipmentId, IncidentId, PlanId, TenantId, Timestamp,
    WorkOrderId,
};

use crate::lifecycle::{non_blank, required_text, LifecycleState, TransitionRecord};
use crate::materials::{materials_cost, summarize_materials, validate_materials, MaterialLine};

// ─── State ───────────────────────────────────────────────────────────

/// Lifecycle state of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderState {
    Pendiente,
    Asignada,
    EnCurso,
    Completada,
    Validada,
    Rechazada,
}

impl WorkOrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Asignada => "asignada",
            Self::EnCurso => "en_curso",
            Self::Completada => "completada",
            Self::Validada => "validada",
            Self::Rechazada => "rechazada",
        }
    }
}

impl LifecycleState for WorkOrderState {
    fn all() -> &'static [Self] {
        &[
            Self::Pendiente,
            Self::Asignada,
            Self::EnCurso,
            Self::Completada,
            Self::Validada,
            Self::Rechazada,
        ]
    }

    fn allowed_next(&self) -> &'static [Self] {
        match self {
            Self::Pendiente => &[Self::Asignada],
            Self::Asignada => &[Self::EnCurso],
            Self::EnCurso => &[Self::Completada],
            Self::Completada => &[Self::Validada, Self::Rechazada],
            Self::Validada | Self::Rechazada => &[],
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Validada | Self::Rechazada)
    }
}

impl std::fmt::Display for WorkOrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkOrderState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("unknown work order state {s:?}")))
    }
}

// ─── Origin, type, costs ─────────────────────────────────────────────

/// Where a work order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkOrderOrigin {
    Incidencia { incident_id: IncidentId },
    Preventivo { plan_id: PlanId },
}

impl WorkOrderOrigin {
    /// The originating incident, if any.
    pub fn incident(&self) -> Option<IncidentId> {
        match self {
            Self::Incidencia { incident_id } => Some(*incident_id),
            Self::Preventivo { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderType {
    CorrectivoUrgente,
    CorrectivoProgramado,
    Preventivo,
}

/// Hourly rates applied on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRates {
    pub labor_rate_per_hour: Decimal,
    pub travel_rate_per_hour: Decimal,
}

/// Cost breakdown. Never hand-edited; `total` is the sum of the parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkOrderCosts {
    pub materials: Decimal,
    pub labor: Decimal,
    pub travel: Decimal,
    pub total: Decimal,
}

impl WorkOrderCosts {
    /// Compute costs from materials and execution minutes.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] if any part or the total overflows.
    pub fn compute(
        materials: &[MaterialLine],
        intervention_minutes: u32,
        travel_minutes: u32,
        rates: &CostRates,
    ) -> Result<Self, EngineError> {
        let out_of_range =
            |what: &str| EngineError::Validation(format!("{what} cost is out of range"));
        let per_minute = |minutes: u32, rate: Decimal, what: &str| {
            Decimal::from(minutes)
                .checked_mul(rate)
                .and_then(|v| v.checked_div(Decimal::from(60)))
                .map(round_money)
                .ok_or_else(|| out_of_range(what))
        };
        let materials = materials_cost(materials)?;
        let labor = per_minute(intervention_minutes, rates.labor_rate_per_hour, "labor")?;
        let travel = per_minute(travel_minutes, rates.travel_rate_per_hour, "travel")?;
        let total = materials
            .checked_add(labor)
            .and_then(|v| v.checked_add(travel))
            .ok_or_else(|| out_of_range("total"))?;
        Ok(Self {
            materials,
            labor,
            travel,
            total,
        })
    }
}

/// Execution data recorded while the order is being worked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Execution {
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub intervention_minutes: Option<u32>,
    pub travel_minutes: Option<u32>,
    pub work_performed: Option<String>,
    pub materials: Vec<MaterialLine>,
    pub signature_ref: Option<String>,
}

/// A partial update to [`Execution`]; absent fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionUpdate {
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub ended_at: Option<Timestamp>,
    #[serde(default)]
    pub intervention_minutes: Option<u32>,
    #[serde(default)]
    pub travel_minutes: Option<u32>,
    #[serde(default)]
    pub work_performed: Option<String>,
    #[serde(default)]
    pub materials: Option<Vec<MaterialLine>>,
    #[serde(default)]
    pub signature_ref: Option<String>,
}

/// Input to [`WorkOrder::complete`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Completion {
    pub work_performed: String,
    #[serde(default)]
    pub materials: Option<Vec<MaterialLine>>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub ended_at: Option<Timestamp>,
    #[serde(default)]
    pub intervention_minutes: Option<u32>,
    #[serde(default)]
    pub travel_minutes: Option<u32>,
}

/// Data to open a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkOrder {
    pub origin: WorkOrderOrigin,
    pub order_type: WorkOrderType,
    #[serde(default)]
    pub criticality: Option<Criticality>,
    #[serde(default)]
    pub asset_ref: Option<String>,
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub planned_date: Option<Timestamp>,
}

// ─── Work order ──────────────────────────────────────────────────────

/// A scheduled or executed repair action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub tenant: TenantId,
    /// Tenant-scoped sequential code, e.g. `OT-000007`.
    pub code: String,
    pub version: u64,
    pub origin: WorkOrderOrigin,
    pub order_type: WorkOrderType,
    pub criticality: Option<Criticality>,
    pub state: WorkOrderState,
    pub technician: Option<String>,
    pub asset_ref: Option<String>,
    pub equipment: Vec<EquipmentId>,
    pub billable: bool,
    pub planned_date: Option<Timestamp>,
    pub execution: Execution,
    pub costs: WorkOrderCosts,
    pub rejection_reason: Option<String>,
    pub billed_at: Option<Timestamp>,
    pub transitions: Vec<TransitionRecord<WorkOrderState>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkOrder {
    /// Open a work order in `pendiente`.
    ///
    /// Preventive plans originate `preventivo` orders only; incidents
    /// originate corrective ones only.
    pub fn open(
        tenant: TenantId,
        code: String,
        input: NewWorkOrder,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let preventive_origin = matches!(input.origin, WorkOrderOrigin::Preventivo { .. });
        let preventive_type = input.order_type == WorkOrderType::Preventivo;
        if preventive_origin != preventive_type {
            return Err(EngineError::Validation(format!(
                "order type {:?} does not match its origin",
                input.order_type
            )));
        }
        Ok(Self {
            id: WorkOrderId::new(),
            tenant,
            code,
            version: 0,
            origin: input.origin,
            order_type: input.order_type,
            criticality: input.criticality,
            state: WorkOrderState::Pendiente,
            technician: None,
            asset_ref: non_blank(input.asset_ref),
            equipment: input.equipment,
            billable: input.billable,
            planned_date: input.planned_date,
            execution: Execution::default(),
            costs: WorkOrderCosts::default(),
            rejection_reason: None,
            billed_at: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// States reachable from the current one.
    pub fn allowed_transitions(&self) -> &'static [WorkOrderState] {
        self.state.allowed_next()
    }

    /// Assign a technician (`pendiente` → `asignada`).
    pub fn assign(
        &mut self,
        technician: &str,
        planned_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<Vec<FieldDelta>, EngineError> {
        self.require("assign", &[WorkOrderState::Pendiente])?;
        let technician = required_text("technician", technician)?;
        self.check_clock(now)?;

        let mut changes = vec![FieldDelta::set("technician", &technician)];
        if let Some(date) = planned_date {
            if self.planned_date != Some(date) {
                changes.push(FieldDelta::optional(
                    "planned_date",
                    self.planned_date.map(|d| d.to_string()),
                    Some(date.to_string()),
                ));
                self.planned_date = Some(date);
            }
        }
        self.technician = Some(technician);
        self.move_to(WorkOrderState::Asignada, None, now, &mut changes);
        Ok(changes)
    }

    /// Record execution data. The first call moves `asignada` → `en_curso`.
    ///
    /// Returns whether the state changed together with the deltas.
    pub fn record_execution(
        &mut self,
        update: ExecutionUpdate,
        now: Timestamp,
    ) -> Result<(bool, Vec<FieldDelta>), EngineError> {
        self.require(
            "record_execution",
            &[WorkOrderState::Asignada, WorkOrderState::EnCurso],
        )?;
        self.check_clock(now)?;
        let mut next = self.execution.clone();
        let mut changes = Vec::new();
        let starting = self.state == WorkOrderState::Asignada;
        if starting && next.started_at.is_none() && update.started_at.is_none() {
            next.started_at = Some(now);
        }
        apply_update(&mut next, update)?;
        validate_execution(&next)?;
        diff_execution(&self.execution, &next, &mut changes);

        if !starting && changes.is_empty() {
            return Ok((false, changes));
        }
        self.execution = next;
        if starting {
            self.move_to(WorkOrderState::EnCurso, None, now, &mut changes);
        } else {
            self.updated_at = now;
        }
        Ok((starting, changes))
    }

    /// Finish the work (`en_curso` → `completada`) and recompute costs.
    pub fn complete(
        &mut self,
        completion: Completion,
        rates: &CostRates,
        now: Timestamp,
    ) -> Result<Vec<FieldDelta>, EngineError> {
        self.require("complete", &[WorkOrderState::EnCurso])?;
        let work_performed = required_text("work_performed", &completion.work_performed)?;
        self.check_clock(now)?;

        let mut next = self.execution.clone();
        let mut changes = Vec::new();
        apply_update(
            &mut next,
            ExecutionUpdate {
                started_at: completion.started_at,
                ended_at: completion.ended_at,
                intervention_minutes: completion.intervention_minutes,
                travel_minutes: completion.travel_minutes,
                work_performed: Some(work_performed),
                materials: completion.materials,
                signature_ref: None,
            },
        )?;
        if next.ended_at.is_none() {
            next.ended_at = Some(now);
        }
        validate_execution(&next)?;
        diff_execution(&self.execution, &next, &mut changes);

        let costs = WorkOrderCosts::compute(
            &next.materials,
            next.intervention_minutes.unwrap_or(0),
            next.travel_minutes.unwrap_or(0),
            rates,
        )?;
        if costs != self.costs {
            changes.push(FieldDelta::changed("cost_total", self.costs.total, costs.total));
        }
        self.execution = next;
        self.costs = costs;
        self.move_to(WorkOrderState::Completada, None, now, &mut changes);
        Ok(changes)
    }

    /// Accept the completed work (`completada` → `validada`).
    pub fn validate(&mut self, now: Timestamp) -> Result<Vec<FieldDelta>, EngineError> {
        self.require("validate", &[WorkOrderState::Completada])?;
        self.check_clock(now)?;
        let mut changes = Vec::new();
        self.move_to(WorkOrderState::Validada, None, now, &mut changes);
        Ok(changes)
    }

    /// Reject the completed work (`completada` → `rechazada`).
    pub fn reject(&mut self, reason: &str, now: Timestamp) -> Result<Vec<FieldDelta>, EngineError> {
        let reason = required_text("reason", reason)?;
        self.require("reject", &[WorkOrderState::Completada])?;
        self.check_clock(now)?;
        let mut changes = vec![FieldDelta::set("rejection_reason", &reason)];
        self.rejection_reason = Some(reason.clone());
        self.move_to(WorkOrderState::Rechazada, Some(reason), now, &mut changes);
        Ok(changes)
    }

    /// Whether the billing subsystem should pick this order up.
    pub fn is_billable_unbilled(&self) -> bool {
        self.state == WorkOrderState::Validada && self.billable && self.billed_at.is_none()
    }

    /// Stamp `billed_at`. Only once, and only on billable validated orders.
    pub fn mark_billed(&mut self, now: Timestamp) -> Result<Vec<FieldDelta>, EngineError> {
        if !self.is_billable_unbilled() {
            let state = if self.billed_at.is_some() {
                "billed".to_string()
            } else {
                self.state.to_string()
            };
            return Err(EngineError::invalid_state("mark_billed", state));
        }
        self.check_clock(now)?;
        self.billed_at = Some(now);
        self.updated_at = now;
        Ok(vec![FieldDelta::set("billed_at", now)])
    }

    fn require(&self, operation: &str, allowed: &[WorkOrderState]) -> Result<(), EngineError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::invalid_state(operation, self.state))
        }
    }

    fn check_clock(&self, now: Timestamp) -> Result<(), EngineError> {
        if now < self.updated_at {
            return Err(EngineError::Validation(format!(
                "work order {} was last written at {}, after {now}",
                self.code, self.updated_at
            )));
        }
        Ok(())
    }

    fn move_to(
        &mut self,
        to: WorkOrderState,
        note: Option<String>,
        now: Timestamp,
        changes: &mut Vec<FieldDelta>,
    ) {
        changes.insert(0, FieldDelta::changed("state", self.state, to));
        self.transitions.push(TransitionRecord {
            from: self.state,
            to,
            at: now,
            note,
        });
        self.state = to;
        self.updated_at = now;
    }
}

fn apply_update(next: &mut Execution, update: ExecutionUpdate) -> Result<(), EngineError> {
    if let Some(at) = update.started_at {
        next.started_at = Some(at);
    }
    if let Some(at) = update.ended_at {
        next.ended_at = Some(at);
    }
    if let Some(m) = update.intervention_minutes {
        next.intervention_minutes = Some(m);
    }
    if let Some(m) = update.travel_minutes {
        next.travel_minutes = Some(m);
    }
    if let Some(text) = update.work_performed {
        next.work_performed = non_blank(Some(text));
    }
    if let Some(lines) = update.materials {
        validate_materials(&lines)?;
        next.materials = lines;
    }
    if let Some(sig) = update.signature_ref {
        next.signature_ref = non_blank(Some(sig));
    }
    Ok(())
}

fn validate_execution(exec: &Execution) -> Result<(), EngineError> {
    if let (Some(start), Some(end)) = (exec.started_at, exec.ended_at) {
        if end < start {
            return Err(EngineError::Validation(format!(
                "execution ends at {end}, before it starts at {start}"
            )));
        }
    }
    Ok(())
}

fn diff_execution(before: &Execution, after: &Execution, changes: &mut Vec<FieldDelta>) {
    fn opt<T: ToString>(v: &Option<T>) -> Option<String> {
        v.as_ref().map(ToString::to_string)
    }
    let mut field = |name: &str, b: Option<String>, a: Option<String>| {
        if b != a {
            changes.push(FieldDelta::optional(name, b, a));
        }
    };
    field("started_at", opt(&before.started_at), opt(&after.started_at));
    field("ended_at", opt(&before.ended_at), opt(&after.ended_at));
    field(
        "intervention_minutes",
        opt(&before.intervention_minutes),
        opt(&after.intervention_minutes),
    );
    field(
        "travel_minutes",
        opt(&before.travel_minutes),
        opt(&after.travel_minutes),
    );
    field(
        "work_performed",
        before.work_performed.clone(),
        after.work_performed.clone(),
    );
    if before.materials != after.materials {
        field(
            "materials",
            Some(summarize_materials(&before.materials)),
            Some(summarize_materials(&after.materials)),
        );
    }
    field(
        "signature_ref",
        before.signature_ref.clone(),
        after.signature_ref.clone(),
    );
}

// ─── Tests ───────────────────────────────────────────────────────────
