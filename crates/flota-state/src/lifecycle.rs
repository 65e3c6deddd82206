//! # Lifecycle Tables
//!
//! Both state machines describe their legal moves as a static table keyed
//! by current state. The engine enforces the table and the API derives the
//! "available actions" list from the same data, so the two cannot drift.

use flota_core::{EngineError, Timestamp};
use serde::{Deserialize, Serialize};

/// A state in a table-driven lifecycle.
pub trait LifecycleState: Copy + Eq + std::fmt::Display + 'static {
    /// Every declared state, in lifecycle order.
    fn all() -> &'static [Self];

    /// States reachable from `self` in one transition.
    fn allowed_next(&self) -> &'static [Self];

    /// Whether no further transition is defined (barring explicit reopening).
    fn is_terminal(&self) -> bool;

    /// Whether `to` is in the allow-list for `self`.
    fn can_transition_to(&self, to: Self) -> bool {
        self.allowed_next().contains(&to)
    }

    /// Check a move against the table.
    fn check_transition(&self, to: Self) -> Result<(), EngineError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(self, to))
        }
    }
}

/// One accepted state change, kept on the aggregate for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    pub from: S,
    pub to: S,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Trim free text and map blank input to `None`.
pub(crate) fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Require non-blank text, naming the field in the error.
pub(crate) fn required_text(field: &str, text: &str) -> Result<String, EngineError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(EngineError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}
