//! # Error Types: Engine Error Taxonomy
//!
//! Every engine operation returns `Result<_, EngineError>`. All variants are
//! recoverable from the caller's point of view; the hosting layer decides
//! whether to surface, retry or log them.
//!
//! - State machine errors carry the current state and the attempted target.
//! - Concurrency errors carry the expected and actual versions so a caller
//!   can reload and reapply without user involvement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of an [`EngineError`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Configuration,
    ConcurrencyConflict,
}

impl ErrorKind {
    /// Return the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::ConcurrencyConflict => "concurrency_conflict",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the maintenance engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The entity id does not resolve (or belongs to another tenant).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. `incident`.
        entity: String,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Target state is not in the allow-list for the current state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
    },

    /// The operation is not legal from the entity's current state.
    #[error("operation {operation} not allowed in state {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: String,
        /// State the entity was in.
        state: String,
    },

    /// Missing or malformed required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration is missing data needed to complete the operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Optimistic-lock version mismatch.
    #[error("concurrency conflict on {entity}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Entity identifier that was contended.
        entity: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for [`EngineError::InvalidState`].
    pub fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }

    /// Shorthand for [`EngineError::InvalidTransition`].
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Classify this error. `InvalidTransition` reports as `InvalidState`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } | Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
        }
    }

    /// Whether a caller may retry automatically (reload, reapply).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
