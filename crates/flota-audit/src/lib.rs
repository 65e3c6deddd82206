//! # flota-audit: Audit Ledger
//!
//! Append-only log of field-level changes keyed by entity. Every other
//! component is a producer; nothing outside this crate can mutate an entry
//! once written.
//!
//! ## Security Invariant
//!
//! Each entry stores the SHA-256 hash of its predecessor and of its own
//! content. [`AuditLedger::verify_chain`] recomputes the chain and reports
//! broken links, making after-the-fact edits detectable.
//! [`AuditLedger::verify_appended`] does the same for entries added since
//! its previous call.
//!
//! ## Modules
//!
//! - `entry`: entry, action, entity-kind and delta types.
//! - `ledger`: the append path and history queries.
//! - `export`: flat, human-readable rows for compliance reports.

pub mod entry;
pub mod export;
pub mod ledger;

pub use entry::{AuditAction, AuditDraft, AuditEntry, AuditEntityKind, FieldDelta};
pub use export::{flatten, AuditExportRow};
pub use ledger::{verify_entries, AuditFilter, AuditLedger, ChainIntegrity};
