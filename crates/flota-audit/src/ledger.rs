//! # Audit Ledger: the single append path
//!
//! Entries are chained by SHA-256: each stores the hash of its predecessor,
//! and the first chains to a zero hash. The ledger itself is a plain value;
//! the engine owns it behind a lock and appends inside the same critical
//! section that writes the audited entity.

use std::collections::HashMap;

use flota_core::{EngineError, OperationId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::{AuditAction, AuditDraft, AuditEntry, GENESIS_HASH};

/// Optional narrowing of a history query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Keep only these actions (empty keeps all).
    #[serde(default)]
    pub actions: Vec<AuditAction>,
    /// Keep only entries at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
}

impl AuditFilter {
    /// Filter on a single action.
    pub fn action(action: AuditAction) -> Self {
        Self {
            actions: vec![action],
            since: None,
        }
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        (self.actions.is_empty() || self.actions.contains(&entry.action))
            && self.since.map_or(true, |since| entry.at >= since)
    }
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// How far [`AuditLedger::verify_appended`] has re-hashed the chain.
#[derive(Debug, Clone)]
struct Checkpoint {
    upto: usize,
    last_hash: String,
    broken_links: usize,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            upto: 0,
            last_hash: GENESIS_HASH.to_string(),
            broken_links: 0,
        }
    }
}

/// Append-only, hash-chained audit log.
#[derive(Debug, Default)]
pub struct AuditLedger {
    entries: Vec<AuditEntry>,
    /// Entity id -> positions in `entries`, oldest first.
    by_entity: HashMap<Uuid, Vec<usize>>,
    /// (tenant, operation id) -> positions written by that operation.
    by_operation: HashMap<(TenantId, OperationId), Vec<usize>>,
    checkpoint: Checkpoint,
}

impl AuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a draft without writing it.
    ///
    /// `pending` holds drafts already accepted earlier in the same batch,
    /// so per-entity ordering is checked against them too.
    fn check(&self, draft: &AuditDraft, pending: &[AuditDraft]) -> Result<(), EngineError> {
        if draft.action.requires_changes() && !draft.changes.iter().any(|d| d.is_change()) {
            return Err(EngineError::Validation(format!(
                "{} entry for {} {} records no change",
                draft.action, draft.entity_kind, draft.entity_id
            )));
        }
        let last_pending = pending
            .iter()
            .rev()
            .find(|d| d.entity_id == draft.entity_id)
            .map(|d| d.at);
        let last_stored = self
            .by_entity
            .get(&draft.entity_id)
            .and_then(|positions| positions.last())
            .map(|&pos| self.entries[pos].at);
        if let Some(last) = last_pending.or(last_stored) {
            if draft.at < last {
                return Err(EngineError::Validation(format!(
                    "audit entry for {} at {} precedes its latest entry at {last}",
                    draft.entity_id, draft.at
                )));
            }
        }
        Ok(())
    }

    fn push(&mut self, draft: AuditDraft) -> AuditEntry {
        let previous_hash = self
            .entries
            .last()
            .map_or(GENESIS_HASH, |e| e.entry_hash.as_str())
            .to_string();
        let sequence = self.entries.len() as u64 + 1;
        let entry = AuditEntry::seal(draft, sequence, &previous_hash);
        let pos = self.entries.len();
        self.by_entity.entry(entry.entity_id).or_default().push(pos);
        if let Some(op) = &entry.operation_id {
            self.by_operation
                .entry((entry.tenant.clone(), op.clone()))
                .or_default()
                .push(pos);
        }
        tracing::trace!(
            sequence,
            entity = %entry.entity_id,
            action = %entry.action,
            "audit entry appended"
        );
        self.entries.push(entry.clone());
        entry
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] if a state/field change carries no
    /// actual delta, or if the entry would precede the entity's latest one.
    pub fn append(&mut self, draft: AuditDraft) -> Result<AuditEntry, EngineError> {
        self.check(&draft, &[])?;
        Ok(self.push(draft))
    }

    /// Append several entries as one unit: either all are written or none.
    pub fn append_batch(
        &mut self,
        drafts: Vec<AuditDraft>,
    ) -> Result<Vec<AuditEntry>, EngineError> {
        for (i, draft) in drafts.iter().enumerate() {
            self.check(draft, &drafts[..i])?;
        }
        Ok(drafts.into_iter().map(|d| self.push(d)).collect())
    }

    /// Entries for `entity_id`, newest first, at most `limit` of them.
    pub fn history(
        &self,
        entity_id: Uuid,
        limit: usize,
        filter: Option<&AuditFilter>,
    ) -> Vec<AuditEntry> {
        let Some(positions) = self.by_entity.get(&entity_id) else {
            return Vec::new();
        };
        positions
            .iter()
            .rev()
            .map(|&pos| &self.entries[pos])
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Entries written by a previously applied operation, oldest first.
    pub fn for_operation(&self, tenant: &TenantId, operation: &OperationId) -> Vec<AuditEntry> {
        self.by_operation
            .get(&(tenant.clone(), operation.clone()))
            .map(|positions| positions.iter().map(|&p| self.entries[p].clone()).collect())
            .unwrap_or_default()
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute the chain over the whole ledger.
    pub fn verify_chain(&self) -> ChainIntegrity {
        verify_entries(&self.entries)
    }

    /// Verify only the entries appended since the previous call.
    ///
    /// Entries are never rewritten once sealed, so the result for the
    /// already checked prefix is carried forward and each entry is
    /// re-hashed once over the ledger's lifetime.
    pub fn verify_appended(&mut self) -> ChainIntegrity {
        let fresh = &self.entries[self.checkpoint.upto..];
        let (broken, last_hash) = scan(fresh, &self.checkpoint.last_hash);
        self.checkpoint.broken_links += broken;
        self.checkpoint.last_hash = last_hash;
        self.checkpoint.upto = self.entries.len();
        ChainIntegrity {
            total_events: self.entries.len(),
            broken_links: self.checkpoint.broken_links,
            chain_valid: self.checkpoint.broken_links == 0,
        }
    }
}

/// Count broken links in `entries`, starting from the hash they chain to.
/// Returns the count and the hash the next entry should carry.
fn scan(entries: &[AuditEntry], from_hash: &str) -> (usize, String) {
    let mut broken_links = 0;
    let mut last_hash = from_hash;
    for entry in entries {
        if entry.previous_hash != last_hash || entry.entry_hash != entry.compute_hash() {
            broken_links += 1;
        }
        last_hash = entry.entry_hash.as_str();
    }
    (broken_links, last_hash.to_string())
}

/// Verify hash continuity over an ordered slice of entries.
///
/// A link is broken when an entry's `previous_hash` does not match its
/// predecessor's hash, or when its stored hash no longer matches its
/// content. Works on exported entries as well as a live ledger.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainIntegrity {
    let (broken_links, _) = scan(entries, GENESIS_HASH);
    ChainIntegrity {
        total_events: entries.len(),
        broken_links,
        chain_valid: broken_links == 0,
    }
}
