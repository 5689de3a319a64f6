//! Health factor calculator.
//!
//! health factor = (collateral_usd × threshold / precision) × 1e18 / debt
//!
//! Both divisions come after their multiplications. A position with no debt has
//! an unbounded health factor, its own variant rather than a division by zero.

use alloy::primitives::{Address, U256};
use serde::{Serialize, Serializer};

use synth_common::config::RiskParams;
use synth_common::error::EngineResult;
use synth_common::types::AccountInformation;

use crate::fixed_point::{self, MIN_HEALTH_FACTOR, PRECISION};
use crate::ledger::CollateralLedger;
use crate::oracle::PriceOracleGateway;

/// Solvency of a position.
///
/// Variant order matters: `Unbounded` sorts above every ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthFactor {
    /// Ratio in 18-decimal fixed point, 1e18 = minimum safe.
    Ratio(U256),
    /// No debt outstanding.
    Unbounded,
}

impl HealthFactor {
    pub const UNBOUNDED: Self = Self::Unbounded;

    pub fn new(value: U256) -> Self {
        Self::Ratio(value)
    }

    /// Fixed-point value, saturating to `U256::MAX` when unbounded.
    pub fn value(&self) -> U256 {
        match self {
            Self::Ratio(value) => *value,
            Self::Unbounded => U256::MAX,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Strictly below the minimum.
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, Self::Ratio(value) if *value < MIN_HEALTH_FACTOR)
    }
}

impl std::fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ratio(value) => write!(f, "{value}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Reports carry the saturated fixed-point value.
impl Serialize for HealthFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// Pure health factor from a debt and a collateral value, both 18-decimal USD.
pub fn calculate_health_factor(
    params: &RiskParams,
    total_debt: U256,
    collateral_value_usd: U256,
) -> EngineResult<HealthFactor> {
    if total_debt.is_zero() {
        return Ok(HealthFactor::UNBOUNDED);
    }

    let margin = fixed_point::mul_div(
        collateral_value_usd,
        U256::from(params.liquidation_threshold),
        U256::from(params.liquidation_precision),
    )?;
    let ratio = fixed_point::mul_div(margin, PRECISION, total_debt)?;

    Ok(HealthFactor::Ratio(ratio))
}

/// Read-only view combining the ledger and current prices.
pub struct HealthFactorCalculator<'a> {
    ledger: &'a CollateralLedger,
    oracle: &'a PriceOracleGateway,
    params: RiskParams,
}

impl<'a> HealthFactorCalculator<'a> {
    pub fn new(
        ledger: &'a CollateralLedger,
        oracle: &'a PriceOracleGateway,
        params: RiskParams,
    ) -> Self {
        Self {
            ledger,
            oracle,
            params,
        }
    }

    /// Current debt and collateral value of `user`.
    pub fn account_information(&self, user: Address) -> EngineResult<AccountInformation> {
        Ok(AccountInformation {
            total_debt: self.ledger.debt_of(user),
            collateral_value_usd: self.ledger.total_value_usd(user, self.oracle)?,
        })
    }

    /// Always recomputed from the ledger and freshly fetched prices.
    ///
    /// Prices are only read when the user has debt.
    pub fn health_factor(&self, user: Address) -> EngineResult<HealthFactor> {
        let total_debt = self.ledger.debt_of(user);
        if total_debt.is_zero() {
            return Ok(HealthFactor::UNBOUNDED);
        }

        let collateral_value_usd = self.ledger.total_value_usd(user, self.oracle)?;
        let health_factor = calculate_health_factor(&self.params, total_debt, collateral_value_usd)?;

        tracing::debug!(
            user = %user,
            total_debt = %total_debt,
            collateral_value_usd = %collateral_value_usd,
            health_factor = %health_factor,
            "Computed health factor"
        );

        Ok(health_factor)
    }
}
