//! Over-collateralized synthetic asset engine.
//!
//! Users lock collateral, mint a unit-pegged synthetic asset against it, redeem
//! collateral, and are liquidated by third parties once their health factor drops
//! below [`fixed_point::MIN_HEALTH_FACTOR`].
//!
//! Components, leaf first:
//! - [`oracle::PriceOracleGateway`]: per-asset price sources, staleness guard, normalization
//! - [`ledger::CollateralLedger`]: collateral and debt bookkeeping
//! - [`health::HealthFactorCalculator`]: solvency ratio from ledger + prices
//! - [`controller`]: deposit / mint / redeem / burn on [`engine::SynthEngine`]
//! - [`liquidation`]: third-party liquidation on [`engine::SynthEngine`]

pub mod controller;
pub mod engine;
pub mod fixed_point;
pub mod health;
pub mod interfaces;
pub mod ledger;
pub mod liquidation;
pub mod memory;
pub mod oracle;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::SynthEngine;
pub use health::HealthFactor;
