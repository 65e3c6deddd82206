//! Materials consumed and post-repair test results.
//!
//! Shared by incidents (what was used to fix the fault) and work orders
//! (what the cost computation reads).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use flota_core::{round_money, EngineError};

/// Largest quantity accepted on one line.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest unit cost accepted on one line.
pub const MAX_UNIT_COST: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// What kind of material a line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Repuesto,
    Consumible,
    Otro,
}

/// One line of consumed material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub description: String,
    pub quantity: Decimal,
    pub kind: MaterialKind,
    /// Unit cost; lines without one contribute nothing to costs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
}

impl MaterialLine {
    pub fn new(description: impl Into<String>, quantity: Decimal, kind: MaterialKind) -> Self {
        Self {
            description: description.into(),
            quantity,
            kind,
            unit_cost: None,
        }
    }

    /// Builder: set the unit cost.
    pub fn at_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Unrounded cost of this line.
    pub fn line_cost(&self) -> Result<Decimal, EngineError> {
        match self.unit_cost {
            None => Ok(Decimal::ZERO),
            Some(c) => c.checked_mul(self.quantity).ok_or_else(|| {
                EngineError::Validation(format!(
                    "material {:?} cost is out of range",
                    self.description
                ))
            }),
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.description.trim().is_empty() {
            return Err(EngineError::Validation(
                "material description must not be empty".into(),
            ));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "material {:?} quantity must be positive",
                self.description
            )));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(EngineError::Validation(format!(
                "material {:?} quantity exceeds {MAX_QUANTITY}",
                self.description
            )));
        }
        if self.unit_cost.is_some_and(|c| c.is_sign_negative()) {
            return Err(EngineError::Validation(format!(
                "material {:?} unit cost must not be negative",
                self.description
            )));
        }
        if self.unit_cost.is_some_and(|c| c > MAX_UNIT_COST) {
            return Err(EngineError::Validation(format!(
                "material {:?} unit cost exceeds {MAX_UNIT_COST}",
                self.description
            )));
        }
        Ok(())
    }
}

/// Check every line of a materials list.
pub fn validate_materials(lines: &[MaterialLine]) -> Result<(), EngineError> {
    lines.iter().try_for_each(MaterialLine::validate)
}

/// Sum of line costs, rounded to two decimals.
///
/// # Errors
///
/// [`EngineError::Validation`] if a line or the sum overflows.
pub fn materials_cost(lines: &[MaterialLine]) -> Result<Decimal, EngineError> {
    let sum = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        acc.checked_add(line.line_cost()?)
            .ok_or_else(|| EngineError::Validation("materials cost is out of range".into()))
    })?;
    Ok(round_money(sum))
}

/// Outcome of a post-repair test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Ok,
    Fail,
    Pending,
}

/// One post-repair test and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub description: String,
    pub outcome: TestOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TestResult {
    pub fn new(description: impl Into<String>, outcome: TestOutcome) -> Self {
        Self {
            description: description.into(),
            outcome,
            notes: None,
        }
    }
}

/// Check every test result has a description.
pub fn validate_test_results(results: &[TestResult]) -> Result<(), EngineError> {
    match results.iter().find(|r| r.description.trim().is_empty()) {
        Some(_) => Err(EngineError::Validation(
            "test result description must not be empty".into(),
        )),
        None => Ok(()),
    }
}

/// Compact rendering for audit deltas.
pub(crate) fn summarize_materials(lines: &[MaterialLine]) -> String {
    lines
        .iter()
        .map(|l| format!("{} x{}", l.description, l.quantity))
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn summarize_tests(results: &[TestResult]) -> String {
    results
        .iter()
        .map(|r| {
            let outcome = match r.outcome {
                TestOutcome::Ok => "ok",
                TestOutcome::Fail => "fail",
                TestOutcome::Pending => "pending",
            };
            format!("{}: {outcome}", r.description)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn materials_cost_rounds_sum() {
        let lines = vec![
            MaterialLine::new("lector", dec("1"), MaterialKind::Repuesto).at_cost(dec("120.505")),
            MaterialLine::new("brida", dec("3"), MaterialKind::Consumible).at_cost(dec("0.333")),
            MaterialLine::new("cinta", dec("1"), MaterialKind::Otro),
        ];
        // 120.505 + 0.999 = 121.504
        assert_eq!(materials_cost(&lines).unwrap(), dec("121.50"));
    }

    #[test]
    fn oversized_lines_rejected() {
        let huge_qty = MaterialLine::new("x", Decimal::MAX, MaterialKind::Repuesto)
            .at_cost(Decimal::TWO);
        assert!(matches!(
            validate_materials(&[huge_qty.clone()]),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            materials_cost(&[huge_qty]),
            Err(EngineError::Validation(_))
        ));

        let huge_cost =
            MaterialLine::new("x", Decimal::ONE, MaterialKind::Repuesto).at_cost(Decimal::MAX);
        assert!(validate_materials(&[huge_cost]).is_err());

        let at_limit =
            MaterialLine::new("x", MAX_QUANTITY, MaterialKind::Repuesto).at_cost(MAX_UNIT_COST);
        assert!(validate_materials(&[at_limit.clone()]).is_ok());
        assert_eq!(
            materials_cost(&[at_limit]).unwrap(),
            MAX_QUANTITY * MAX_UNIT_COST
        );
    }

    #[test]
    fn invalid_lines_rejected() {
        let zero = MaterialLine::new("lector", Decimal::ZERO, MaterialKind::Repuesto);
        assert!(validate_materials(&[zero]).is_err());
        let blank = MaterialLine::new(" ", Decimal::ONE, MaterialKind::Repuesto);
        assert!(validate_materials(&[blank]).is_err());
        let negative =
            MaterialLine::new("x", Decimal::ONE, MaterialKind::Repuesto).at_cost(dec("-1"));
        assert!(validate_materials(&[negative]).is_err());
    }

    #[test]
    fn test_results_need_descriptions() {
        assert!(validate_test_results(&[TestResult::new("arranque", TestOutcome::Ok)]).is_ok());
        assert!(validate_test_results(&[TestResult::new("", TestOutcome::Fail)]).is_err());
    }

    #[test]
    fn summaries() {
        let lines = vec![MaterialLine::new("lector", dec("2"), MaterialKind::Repuesto)];
        assert_eq!(summarize_materials(&lines), "lector x2");
        let tests = vec![
            TestResult::new("validacion", TestOutcome::Ok),
            TestResult::new("gps", TestOutcome::Pending),
        ];
        assert_eq!(summarize_tests(&tests), "validacion: ok; gps: pending");
    }
}
