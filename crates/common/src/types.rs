use alloy::primitives::{Address, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A supported collateral type, as registered with the price oracle gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Token identity
    pub asset: Address,
    /// Human-readable ticker (e.g., "WETH")
    pub symbol: String,
    /// Native decimal precision of balances in this asset (at most 18)
    pub decimals: u8,
    /// Maximum age of a usable price quote, in seconds
    pub max_staleness_secs: u64,
}

/// An unnormalized reading straight from an external price source.
///
/// Treated as untrusted: the answer may be non-positive and the timestamp may be
/// arbitrarily old or in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawQuote {
    /// Signed answer scaled by `10^decimals`
    pub answer: I256,
    /// Decimal places the source reports in (e.g., 8)
    pub decimals: u8,
    /// When the source observed this price
    pub observed_at: DateTime<Utc>,
}

/// A validated price, normalized to 18-decimal fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub asset: Address,
    /// USD per whole unit of `asset`, scaled by 1e18
    pub price: U256,
    pub observed_at: DateTime<Utc>,
}

/// Snapshot of a user's position, in 18-decimal USD terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountInformation {
    pub total_debt: U256,
    pub collateral_value_usd: U256,
}

/// Public engine operations, used as a structured logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Mint,
    Redeem,
    Burn,
    Liquidate,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Deposit => write!(f, "deposit"),
            OperationKind::Mint => write!(f, "mint"),
            OperationKind::Redeem => write!(f, "redeem"),
            OperationKind::Burn => write!(f, "burn"),
            OperationKind::Liquidate => write!(f, "liquidate"),
        }
    }
}
