//! # Location Ledger
//!
//! Planning functions compute, without side effects, the movement record
//! and the unit's next state for a registration or a relocation. The
//! engine commits both, plus the audit entry, as one unit.
//!
//! Replaying a unit's movement records from an empty state reconstructs
//! its exact [`LedgerPosition`]. Chain verification walks the same rules
//! and reports every broken link instead of stopping at the first.

use serde::{Deserialize, Serialize};

use flota_audit::FieldDelta;
use flota_core::{ActorId, EngineError, EquipmentId, MovementId, OperationId, TenantId, Timestamp};

use crate::equipment::{Equipment, EquipmentType, LedgerPosition, NewEquipment, OperationalState};
use crate::location::Location;
use crate::movement::{MovementKind, MovementRecord, MovementRequest};

/// A checked, not yet committed movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub record: MovementRecord,
    /// The unit as it will be once the record is committed.
    pub equipment: Equipment,
    /// Audit deltas for the unit.
    pub changes: Vec<FieldDelta>,
}

/// Who is moving the unit and under which operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementAuthor {
    pub actor: ActorId,
    pub operation_id: Option<OperationId>,
    pub at: Timestamp,
}

/// Plan the registration (`alta`) of a new unit.
pub fn plan_registration(
    tenant: TenantId,
    input: NewEquipment,
    equipment_type: &EquipmentType,
    author: MovementAuthor,
) -> Result<MovementPlan, EngineError> {
    let destination = input.location.clone();
    MovementKind::Alta.check_destination(&destination)?;
    let equipment_id = EquipmentId::new();
    let record = MovementRecord {
        id: MovementId::new(),
        tenant: tenant.clone(),
        equipment_id,
        sequence: 1,
        kind: MovementKind::Alta,
        origin: None,
        resulting_state: MovementKind::Alta.resulting_state(&destination),
        destination,
        reason: None,
        comments: None,
        links: Default::default(),
        technicians: Vec::new(),
        actor: author.actor,
        at: author.at,
        operation_id: author.operation_id,
    };
    let equipment = Equipment::register(equipment_id, tenant, input, equipment_type, &record)?;
    let changes = vec![
        FieldDelta::set("serial_number", &equipment.serial_number),
        FieldDelta::set("location", equipment.location()),
        FieldDelta::set("state", equipment.state()),
    ];
    Ok(MovementPlan {
        record,
        equipment,
        changes,
    })
}

/// Plan a relocation of an existing unit.
///
/// # Errors
///
/// - [`EngineError::InvalidState`] for a decommissioned unit, a second
///   `alta`, or `retorno_laboratorio` when the unit is not in a lab.
/// - [`EngineError::Validation`] for a destination the kind does not
///   allow, a destination equal to the current location, or a movement
///   dated before the unit's last one.
pub fn plan_relocation(
    equipment: &Equipment,
    request: MovementRequest,
    author: MovementAuthor,
) -> Result<MovementPlan, EngineError> {
    let position = &equipment.position;
    check_movement(position, request.kind, &request.destination, author.at)?;

    let record = MovementRecord {
        id: MovementId::new(),
        tenant: equipment.tenant.clone(),
        equipment_id: equipment.id,
        sequence: position.stats.movement_count + 1,
        kind: request.kind,
        origin: Some(position.location.clone()),
        resulting_state: request.kind.resulting_state(&request.destination),
        destination: request.destination,
        reason: trimmed(request.reason),
        comments: trimmed(request.comments),
        links: request.links,
        technicians: request.technicians,
        actor: author.actor,
        at: author.at,
        operation_id: author.operation_id,
    };

    let mut next = equipment.clone();
    next.position.apply(&record);
    let mut changes = vec![
        FieldDelta::set("movement", record.kind),
        FieldDelta::changed("location", equipment.location(), next.location()),
    ];
    if next.state() != equipment.state() {
        changes.push(FieldDelta::changed("state", equipment.state(), next.state()));
    }
    Ok(MovementPlan {
        record,
        equipment: next,
        changes,
    })
}

/// Rules every non-`alta` movement must satisfy against the current position.
fn check_movement(
    position: &LedgerPosition,
    kind: MovementKind,
    destination: &Location,
    at: Timestamp,
) -> Result<(), EngineError> {
    if position.state.is_terminal() {
        return Err(EngineError::invalid_state("relocate", position.state));
    }
    if kind == MovementKind::Alta {
        return Err(EngineError::invalid_state("alta", position.state));
    }
    kind.check_destination(destination)?;
    if kind == MovementKind::RetornoLaboratorio && !position.in_lab() {
        return Err(EngineError::invalid_state(
            "retorno_laboratorio",
            format!("{} at {}", position.state, position.location),
        ));
    }
    if destination.same_place(&position.location) {
        return Err(EngineError::Validation(format!(
            "unit is already at {destination}"
        )));
    }
    if at < position.last_movement_at {
        return Err(EngineError::Validation(format!(
            "movement at {at} precedes the last movement at {}",
            position.last_movement_at
        )));
    }
    Ok(())
}

fn trimmed(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

// ─── Replay and verification ─────────────────────────────────────────

/// Check one record against the position before it (`None` for the first).
fn check_link(prev: Option<&LedgerPosition>, record: &MovementRecord) -> Result<(), String> {
    if record.resulting_state != record.kind.resulting_state(&record.destination) {
        return Err(format!(
            "resulting state {} does not follow from {} to {}",
            record.resulting_state, record.kind, record.destination
        ));
    }
    match prev {
        None => {
            if record.kind != MovementKind::Alta
                || record.origin.is_some()
                || record.sequence != 1
            {
                return Err("first movement must be an alta with sequence 1 and no origin".into());
            }
            Ok(())
        }
        Some(position) => {
            let expected_seq = position.stats.movement_count + 1;
            if record.sequence != expected_seq {
                return Err(format!(
                    "sequence {} where {expected_seq} was expected",
                    record.sequence
                ));
            }
            if record.origin.as_ref() != Some(&position.location) {
                return Err(format!(
                    "origin {} does not match previous destination {}",
                    record
                        .origin
                        .as_ref()
                        .map_or_else(|| "none".to_string(), ToString::to_string),
                    position.location
                ));
            }
            check_movement(position, record.kind, &record.destination, record.at)
                .map_err(|e| e.to_string())
        }
    }
}

/// Reconstruct a unit's position from its movement records, oldest first.
///
/// # Errors
///
/// [`EngineError::Validation`] naming the first record that breaks the
/// chain, or if there are no records.
pub fn replay(records: &[MovementRecord]) -> Result<LedgerPosition, EngineError> {
    let mut position: Option<LedgerPosition> = None;
    for record in records {
        check_link(position.as_ref(), record).map_err(|reason| {
            EngineError::Validation(format!("movement {}: {reason}", record.sequence))
        })?;
        match position.as_mut() {
            None => position = Some(LedgerPosition::from_alta(record)),
            Some(p) => p.apply(record),
        }
    }
    position.ok_or_else(|| EngineError::Validation("no movements to replay".into()))
}

/// One broken link found by [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub sequence: u32,
    pub reason: String,
}

/// Outcome of verifying one unit's movement chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub equipment_id: Option<EquipmentId>,
    pub movements: usize,
    pub breaks: Vec<ChainBreak>,
    pub consistent: bool,
    /// Position after the last record, when the chain is consistent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<OperationalState>,
}

/// Walk a unit's records and report every break.
///
/// After a break the walk continues from the broken record's destination,
/// so one bad record does not hide later ones.
pub fn verify_chain(records: &[MovementRecord]) -> ChainReport {
    let mut position: Option<LedgerPosition> = None;
    let mut breaks = Vec::new();
    let equipment_id = records.first().map(|r| r.equipment_id);
    for record in records {
        if Some(record.equipment_id) != equipment_id {
            breaks.push(ChainBreak {
                sequence: record.sequence,
                reason: format!("record belongs to {}", record.equipment_id),
            });
            continue;
        }
        if let Err(reason) = check_link(position.as_ref(), record) {
            breaks.push(ChainBreak {
                sequence: record.sequence,
                reason,
            });
        }
        match position.as_mut() {
            None => position = Some(LedgerPosition::from_alta(record)),
            Some(p) => p.apply(record),
        }
    }
    let consistent = breaks.is_empty() && !records.is_empty();
    ChainReport {
        equipment_id,
        movements: records.len(),
        final_state: position.filter(|_| consistent).map(|p| p.state),
        breaks,
        consistent,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
