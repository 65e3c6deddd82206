//! # Typed Custom Fields
//!
//! Equipment types declare extra attributes (firmware channel, number of
//! validators, mounting side, ...). Instead of storing them as a free-form
//! JSON blob, each field is declared with a [`CustomFieldKind`] and every
//! value is a [`CustomFieldValue`] checked against its declaration.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The shape a custom field accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomFieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Decimal>,
    },
    Boolean,
    Enumerated {
        options: Vec<String>,
    },
}

impl CustomFieldKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Enumerated { .. } => "enumerated",
        }
    }
}

/// Declaration of one custom field on an equipment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    /// Stable key used in stored values.
    pub key: String,
    /// Display label.
    pub label: String,
    #[serde(flatten)]
    pub kind: CustomFieldKind,
    #[serde(default)]
    pub required: bool,
}

/// A stored custom field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CustomFieldValue {
    Text(String),
    Number(Decimal),
    Boolean(bool),
    Enumerated(String),
}

impl CustomFieldValue {
    /// Human-readable rendering, used in audit deltas.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) | Self::Enumerated(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

impl CustomFieldDef {
    /// Check a single value against this declaration.
    pub fn check(&self, value: &CustomFieldValue) -> Result<(), EngineError> {
        let mismatch = || {
            EngineError::Validation(format!(
                "custom field {:?} expects a {} value",
                self.key,
                self.kind.name()
            ))
        };
        match (&self.kind, value) {
            (CustomFieldKind::Text { max_len }, CustomFieldValue::Text(s)) => {
                if let Some(max) = max_len {
                    if s.chars().count() > *max {
                        return Err(EngineError::Validation(format!(
                            "custom field {:?} exceeds {max} characters",
                            self.key
                        )));
                    }
                }
                Ok(())
            }
            (CustomFieldKind::Number { min, max }, CustomFieldValue::Number(n)) => {
                if min.is_some_and(|m| *n < m) || max.is_some_and(|m| *n > m) {
                    return Err(EngineError::Validation(format!(
                        "custom field {:?} value {n} out of range",
                        self.key
                    )));
                }
                Ok(())
            }
            (CustomFieldKind::Boolean, CustomFieldValue::Boolean(_)) => Ok(()),
            (CustomFieldKind::Enumerated { options }, CustomFieldValue::Enumerated(v)) => {
                if options.iter().any(|o| o == v) {
                    Ok(())
                } else {
                    Err(EngineError::Validation(format!(
                        "custom field {:?} does not allow {v:?}",
                        self.key
                    )))
                }
            }
            _ => Err(mismatch()),
        }
    }
}

/// Validate a full set of values against a type's declarations.
///
/// Rejects undeclared keys and missing required fields.
pub fn validate_custom_fields(
    defs: &[CustomFieldDef],
    values: &BTreeMap<String, CustomFieldValue>,
) -> Result<(), EngineError> {
    for (key, value) in values {
        let def = defs.iter().find(|d| &d.key == key).ok_or_else(|| {
            EngineError::Validation(format!("custom field {key:?} is not declared"))
        })?;
        def.check(value)?;
    }
    if let Some(missing) = defs
        .iter()
        .find(|d| d.required && !values.contains_key(&d.key))
    {
        return Err(EngineError::Validation(format!(
            "custom field {:?} is required",
            missing.key
        )));
    }
    Ok(())
}
