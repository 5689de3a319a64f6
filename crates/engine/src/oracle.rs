//! Price oracle gateway: one external price source per collateral asset.
//!
//! Every read goes back to the source: quotes are never cached across calls, so
//! staleness is re-evaluated each time a price is used. Source answers are
//! normalized to 18-decimal fixed point before any arithmetic against amounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Duration, Utc};

use synth_common::error::{EngineError, EngineResult};
use synth_common::types::{AssetConfig, PriceQuote, RawQuote};

use crate::fixed_point::{self, PRECISION, TARGET_DECIMALS};

/// An external, untrusted price feed.
pub trait PriceSource: Send + Sync {
    /// Latest reading for `asset`, exactly as reported by the source.
    fn latest_quote(&self, asset: Address) -> anyhow::Result<RawQuote>;

    /// Human-readable name for this source (e.g., "FTSO ETH/USD").
    fn name(&self) -> &str;
}

/// Source of "now" for staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct RegisteredAsset {
    config: AssetConfig,
    source: Box<dyn PriceSource>,
}

/// Registry of collateral assets and their price sources.
///
/// Built explicitly and handed to the engine; there is no process-wide registry.
pub struct PriceOracleGateway {
    assets: BTreeMap<Address, RegisteredAsset>,
    clock: Arc<dyn Clock>,
}

impl PriceOracleGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            assets: BTreeMap::new(),
            clock,
        }
    }

    /// Associate a collateral asset with its price source and staleness window.
    pub fn register(
        &mut self,
        config: AssetConfig,
        source: Box<dyn PriceSource>,
    ) -> EngineResult<()> {
        if self.assets.contains_key(&config.asset) {
            return Err(EngineError::AssetAlreadyRegistered {
                asset: config.asset,
            });
        }
        if config.decimals > TARGET_DECIMALS {
            return Err(EngineError::InvalidAssetConfig {
                asset: config.asset,
                reason: format!("decimals {} exceed {}", config.decimals, TARGET_DECIMALS),
            });
        }
        if config.max_staleness_secs == 0 {
            return Err(EngineError::InvalidAssetConfig {
                asset: config.asset,
                reason: "max staleness must be greater than zero".to_string(),
            });
        }

        tracing::info!(
            asset = %config.asset,
            symbol = %config.symbol,
            decimals = config.decimals,
            max_staleness_secs = config.max_staleness_secs,
            source = source.name(),
            "Registered collateral asset"
        );

        self.assets
            .insert(config.asset, RegisteredAsset { config, source });
        Ok(())
    }

    pub fn is_registered(&self, asset: Address) -> bool {
        self.assets.contains_key(&asset)
    }

    pub fn asset_config(&self, asset: Address) -> EngineResult<&AssetConfig> {
        self.assets
            .get(&asset)
            .map(|registered| &registered.config)
            .ok_or(EngineError::UnknownAsset { asset })
    }

    /// All registered collateral assets, ordered by address.
    pub fn assets(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.values().map(|registered| &registered.config)
    }

    /// Fetch, validate and normalize the current price of `asset`.
    ///
    /// Fails with `StalePrice` when the quote is older than the asset's window;
    /// there are no retries.
    pub fn normalized_price(&self, asset: Address) -> EngineResult<PriceQuote> {
        let registered = self
            .assets
            .get(&asset)
            .ok_or(EngineError::UnknownAsset { asset })?;

        let raw = registered.source.latest_quote(asset).map_err(|e| {
            tracing::warn!(asset = %asset, source = registered.source.name(), error = %e, "Price source call failed");
            EngineError::PriceUnavailable {
                asset,
                reason: e.to_string(),
            }
        })?;

        self.validate_freshness(&registered.config, &raw)?;

        if !raw.answer.is_positive() {
            return Err(EngineError::InvalidPrice {
                asset,
                reason: format!("non-positive answer {}", raw.answer),
            });
        }

        let price = normalize_answer(raw.answer.into_raw(), raw.decimals)?;

        tracing::debug!(
            asset = %asset,
            raw_answer = %raw.answer,
            source_decimals = raw.decimals,
            price = %price,
            "Normalized price"
        );

        Ok(PriceQuote {
            asset,
            price,
            observed_at: raw.observed_at,
        })
    }

    /// USD value (18 decimals) of `amount` native units of `asset`.
    ///
    /// The balance is scaled up to 18 decimals first, multiplied by the 18-decimal
    /// price, then divided by `PRECISION`.
    pub fn usd_value(&self, asset: Address, amount: U256) -> EngineResult<U256> {
        let config = self.asset_config(asset)?;
        let quote = self.normalized_price(asset)?;
        let amount = fixed_point::scale_to_target(amount, config.decimals)?;
        fixed_point::mul_div(amount, quote.price, PRECISION)
    }

    /// Native units of `asset` worth `usd_amount` (18 decimals), truncated.
    pub fn token_amount_from_usd(&self, asset: Address, usd_amount: U256) -> EngineResult<U256> {
        let config = self.asset_config(asset)?;
        let quote = self.normalized_price(asset)?;
        let amount = fixed_point::mul_div(usd_amount, PRECISION, quote.price)?;
        fixed_point::scale_from_target(amount, config.decimals)
    }

    fn validate_freshness(&self, config: &AssetConfig, raw: &RawQuote) -> EngineResult<()> {
        let now = self.clock.now();
        let age = now.signed_duration_since(raw.observed_at);

        if age < Duration::zero() {
            return Err(EngineError::InvalidPrice {
                asset: config.asset,
                reason: format!("observed in the future ({})", raw.observed_at),
            });
        }

        let max_age = i64::try_from(config.max_staleness_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        if age > max_age {
            let age_secs = age.num_seconds();
            tracing::warn!(
                asset = %config.asset,
                observed_at = %raw.observed_at,
                age_ms = age.num_milliseconds(),
                max_staleness_secs = config.max_staleness_secs,
                "Rejected stale price"
            );
            return Err(EngineError::StalePrice {
                asset: config.asset,
                observed_at: raw.observed_at,
                age_secs,
                max_staleness_secs: config.max_staleness_secs,
            });
        }

        Ok(())
    }
}

/// Convert a positive source answer with `decimals` places to 18-decimal fixed point.
///
/// Sources reporting more than 18 places are truncated down.
pub fn normalize_answer(answer: U256, decimals: u8) -> EngineResult<U256> {
    if decimals <= TARGET_DECIMALS {
        fixed_point::scale_to_target(answer, decimals)
    } else {
        answer
            .checked_div(fixed_point::pow10(decimals - TARGET_DECIMALS)?)
            .ok_or(EngineError::MathOverflow)
    }
}
