//! # Monetary Amounts
//!
//! Costs are currency-agnostic `rust_decimal::Decimal` values rounded to two
//! decimal places. Floats never carry money in this workspace.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places every stored amount carries.
pub const MONEY_SCALE: u32 = 2;

/// Round to [`MONEY_SCALE`] places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
