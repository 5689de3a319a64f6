use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Every way a single engine operation can be rejected.
///
/// Each variant carries the structured data a caller needs to explain the
/// rejection (offending user, asset, amounts, thresholds). An operation that
/// returns one of these has left no partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Unknown collateral asset {asset}")]
    UnknownAsset { asset: Address },

    #[error(
        "Stale price for {asset}: observed at {observed_at}, {age_secs}s old (max {max_staleness_secs}s)"
    )]
    StalePrice {
        asset: Address,
        observed_at: DateTime<Utc>,
        age_secs: i64,
        max_staleness_secs: u64,
    },

    #[error("Invalid price for {asset}: {reason}")]
    InvalidPrice { asset: Address, reason: String },

    #[error("Price source for {asset} unavailable: {reason}")]
    PriceUnavailable { asset: Address, reason: String },

    #[error(
        "Insufficient collateral: {user} holds {available} of {asset}, {requested} requested"
    )]
    InsufficientCollateral {
        user: Address,
        asset: Address,
        requested: U256,
        available: U256,
    },

    #[error("Insufficient debt: {user} owes {outstanding}, {requested} requested")]
    InsufficientDebt {
        user: Address,
        requested: U256,
        outstanding: U256,
    },

    #[error("Transfer of {amount} {asset} from {from} to {to} failed")]
    TransferFailed {
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    },

    #[error("Mint of {amount} to {user} failed")]
    MintFailed { user: Address, amount: U256 },

    #[error("Burn of {amount} paid by {payer} failed")]
    BurnFailed { payer: Address, amount: U256 },

    #[error("Could not restore {amount} to {user} after aborted operation ({cause}); balances diverge")]
    CompensationFailed {
        user: Address,
        amount: U256,
        cause: Box<EngineError>,
    },

    #[error("Health factor of {user} would be broken: {health_factor}")]
    HealthFactorBroken { user: Address, health_factor: U256 },

    #[error("Health factor of {user} is ok ({health_factor}), position cannot be liquidated")]
    HealthFactorOk { user: Address, health_factor: U256 },

    #[error("Health factor of {user} not improved by liquidation: {before} -> {after}")]
    HealthFactorNotImproved {
        user: Address,
        before: U256,
        after: U256,
    },

    #[error("Collateral asset {asset} is already registered")]
    AssetAlreadyRegistered { asset: Address },

    #[error("Invalid configuration for asset {asset}: {reason}")]
    InvalidAssetConfig { asset: Address, reason: String },

    #[error("Fixed-point arithmetic overflow")]
    MathOverflow,
}

pub type EngineResult<T> = Result<T, EngineError>;
