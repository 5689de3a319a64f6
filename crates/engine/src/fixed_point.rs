//! 18-decimal fixed-point helpers.
//!
//! Every helper is checked: overflow and division by zero surface as
//! [`EngineError::MathOverflow`]. Division always truncates (floor).

use alloy::primitives::U256;

use synth_common::error::{EngineError, EngineResult};

/// Canonical decimal places for prices, USD values and synthetic amounts.
pub const TARGET_DECIMALS: u8 = 18;

/// 1.0 in 18-decimal fixed point.
pub const PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Health factors strictly below this are liquidatable.
pub const MIN_HEALTH_FACTOR: U256 = PRECISION;

/// `10^exp` as a `U256`.
pub fn pow10(exp: u8) -> EngineResult<U256> {
    let ten = U256::from(10u64);
    let mut result = U256::from(1u64);
    for _ in 0..exp {
        result = result.checked_mul(ten).ok_or(EngineError::MathOverflow)?;
    }
    Ok(result)
}

/// `floor(a * b / denominator)`, multiplying first.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> EngineResult<U256> {
    a.checked_mul(b)
        .and_then(|product| product.checked_div(denominator))
        .ok_or(EngineError::MathOverflow)
}

/// Rescale `amount` from `decimals` places up to 18.
pub fn scale_to_target(amount: U256, decimals: u8) -> EngineResult<U256> {
    if decimals > TARGET_DECIMALS {
        return Err(EngineError::MathOverflow);
    }
    amount
        .checked_mul(pow10(TARGET_DECIMALS - decimals)?)
        .ok_or(EngineError::MathOverflow)
}

/// Rescale an 18-decimal `amount` down to `decimals` places, truncating.
pub fn scale_from_target(amount: U256, decimals: u8) -> EngineResult<U256> {
    if decimals > TARGET_DECIMALS {
        return Err(EngineError::MathOverflow);
    }
    amount
        .checked_div(pow10(TARGET_DECIMALS - decimals)?)
        .ok_or(EngineError::MathOverflow)
}
