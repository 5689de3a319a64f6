use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Default liquidation threshold (50% of collateral value counts toward solvency).
pub const DEFAULT_LIQUIDATION_THRESHOLD: u64 = 50;

/// Default denominator for threshold and bonus.
pub const DEFAULT_LIQUIDATION_PRECISION: u64 = 100;

/// Default liquidation bonus (10%).
pub const DEFAULT_LIQUIDATION_BONUS: u64 = 10;

/// Default maximum age of a price quote, in seconds (3 hours).
pub const DEFAULT_MAX_STALENESS_SECS: u64 = 3 * 60 * 60;

/// Solvency parameters shared by the health factor calculator and the liquidation engine.
///
/// `liquidation_threshold / liquidation_precision` is the fraction of raw collateral
/// value counted toward solvency; `liquidation_bonus / liquidation_precision` is the
/// extra collateral awarded to a liquidator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    pub liquidation_threshold: u64,
    pub liquidation_precision: u64,
    pub liquidation_bonus: u64,
}

impl RiskParams {
    /// Reject parameter sets that would make the health factor meaningless.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.liquidation_precision == 0 {
            anyhow::bail!("LIQUIDATION_PRECISION must be greater than zero");
        }
        if self.liquidation_threshold == 0 || self.liquidation_threshold > self.liquidation_precision {
            anyhow::bail!(
                "LIQUIDATION_THRESHOLD must be in 1..={}",
                self.liquidation_precision
            );
        }
        if self.liquidation_bonus > self.liquidation_precision {
            anyhow::bail!(
                "LIQUIDATION_BONUS must not exceed LIQUIDATION_PRECISION ({})",
                self.liquidation_precision
            );
        }
        Ok(())
    }
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            liquidation_threshold: DEFAULT_LIQUIDATION_THRESHOLD,
            liquidation_precision: DEFAULT_LIQUIDATION_PRECISION,
            liquidation_bonus: DEFAULT_LIQUIDATION_BONUS,
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Solvency parameters
    pub risk: RiskParams,

    /// Staleness window applied to assets registered without an explicit one
    pub default_max_staleness_secs: u64,

    /// Address that holds deposited collateral on behalf of users
    pub custody_address: Address,

    /// Optional scenario file replayed by the simulator
    pub scenario_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let risk = RiskParams {
            liquidation_threshold: parse_var(
                "LIQUIDATION_THRESHOLD",
                DEFAULT_LIQUIDATION_THRESHOLD,
            )?,
            liquidation_precision: parse_var(
                "LIQUIDATION_PRECISION",
                DEFAULT_LIQUIDATION_PRECISION,
            )?,
            liquidation_bonus: parse_var("LIQUIDATION_BONUS", DEFAULT_LIQUIDATION_BONUS)?,
        };
        risk.validate()?;

        let custody_address = match std::env::var("CUSTODY_ADDRESS") {
            Ok(raw) => Address::from_str(&raw)
                .map_err(|_| anyhow::anyhow!("CUSTODY_ADDRESS must be a 20-byte hex address"))?,
            Err(_) => default_custody_address(),
        };

        Ok(Self {
            risk,
            default_max_staleness_secs: parse_var(
                "DEFAULT_MAX_STALENESS_SECS",
                DEFAULT_MAX_STALENESS_SECS,
            )?,
            custody_address,
            scenario_path: std::env::var("SCENARIO_PATH").ok(),
        })
    }
}

/// Custody address used when `CUSTODY_ADDRESS` is not set.
pub fn default_custody_address() -> Address {
    Address::repeat_byte(0x5e)
}

fn parse_var(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a valid u64")),
        Err(_) => {
            tracing::debug!(var = name, default, "Environment variable not set, using default");
            Ok(default)
        }
    }
}
