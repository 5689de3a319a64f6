//! Engine state holder and read-only views.
//!
//! State-changing operations live in [`crate::controller`] and
//! [`crate::liquidation`]. Each one runs as a single unit: the touched ledger
//! records are checkpointed first and restored if any later step fails.

use alloy::primitives::{Address, U256};

use synth_common::config::RiskParams;
use synth_common::error::{EngineError, EngineResult};
use synth_common::types::{AccountInformation, AssetConfig};

use crate::health::{self, HealthFactor, HealthFactorCalculator};
use crate::interfaces::{CollateralToken, SyntheticAsset};
use crate::ledger::{CollateralLedger, Checkpoint};
use crate::oracle::PriceOracleGateway;

pub struct SynthEngine<T, S> {
    pub(crate) oracle: PriceOracleGateway,
    pub(crate) ledger: CollateralLedger,
    pub(crate) params: RiskParams,
    /// Address holding deposited collateral
    pub(crate) custody: Address,
    pub(crate) collateral: T,
    pub(crate) synthetic: S,
}

impl<T, S> SynthEngine<T, S>
where
    T: CollateralToken,
    S: SyntheticAsset,
{
    pub fn new(
        params: RiskParams,
        custody: Address,
        oracle: PriceOracleGateway,
        collateral: T,
        synthetic: S,
    ) -> Self {
        tracing::info!(
            liquidation_threshold = params.liquidation_threshold,
            liquidation_precision = params.liquidation_precision,
            liquidation_bonus = params.liquidation_bonus,
            custody = %custody,
            assets = oracle.assets().count(),
            "Synthetic asset engine initialised"
        );

        Self {
            oracle,
            ledger: CollateralLedger::new(),
            params,
            custody,
            collateral,
            synthetic,
        }
    }

    pub fn health_factor(&self, user: Address) -> EngineResult<HealthFactor> {
        self.calculator().health_factor(user)
    }

    /// Preview a health factor for arbitrary debt and collateral values.
    pub fn calculate_health_factor(
        &self,
        total_debt: U256,
        collateral_value_usd: U256,
    ) -> EngineResult<HealthFactor> {
        health::calculate_health_factor(&self.params, total_debt, collateral_value_usd)
    }

    pub fn account_information(&self, user: Address) -> EngineResult<AccountInformation> {
        self.calculator().account_information(user)
    }

    pub fn collateral_value_usd(&self, user: Address) -> EngineResult<U256> {
        self.ledger.total_value_usd(user, &self.oracle)
    }

    pub fn collateral_balance(&self, user: Address, asset: Address) -> U256 {
        self.ledger.balance(user, asset)
    }

    pub fn debt_of(&self, user: Address) -> U256 {
        self.ledger.debt_of(user)
    }

    pub fn usd_value(&self, asset: Address, amount: U256) -> EngineResult<U256> {
        self.oracle.usd_value(asset, amount)
    }

    pub fn token_amount_from_usd(&self, asset: Address, usd_amount: U256) -> EngineResult<U256> {
        self.oracle.token_amount_from_usd(asset, usd_amount)
    }

    pub fn collateral_assets(&self) -> impl Iterator<Item = &AssetConfig> {
        self.oracle.assets()
    }

    pub fn risk_params(&self) -> RiskParams {
        self.params
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn oracle(&self) -> &PriceOracleGateway {
        &self.oracle
    }

    /// Administrative access for registering further collateral assets.
    pub fn oracle_mut(&mut self) -> &mut PriceOracleGateway {
        &mut self.oracle
    }

    pub fn ledger(&self) -> &CollateralLedger {
        &self.ledger
    }

    pub fn collateral_token(&self) -> &T {
        &self.collateral
    }

    pub fn collateral_token_mut(&mut self) -> &mut T {
        &mut self.collateral
    }

    pub fn synthetic_asset(&self) -> &S {
        &self.synthetic
    }

    pub fn synthetic_asset_mut(&mut self) -> &mut S {
        &mut self.synthetic
    }

    pub(crate) fn calculator(&self) -> HealthFactorCalculator<'_> {
        HealthFactorCalculator::new(&self.ledger, &self.oracle, self.params)
    }

    /// Run `op` as one indivisible unit: on error, every record in `checkpoint`
    /// is restored before the error is returned.
    pub(crate) fn atomically<R>(
        &mut self,
        checkpoint: Checkpoint,
        op: impl FnOnce(&mut Self) -> EngineResult<R>,
    ) -> EngineResult<R> {
        match op(self) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.ledger.restore(checkpoint);
                tracing::warn!(error = %e, "Operation rejected, ledger rolled back");
                Err(e)
            }
        }
    }

    pub(crate) fn ensure_registered(&self, asset: Address) -> EngineResult<()> {
        if self.oracle.is_registered(asset) {
            Ok(())
        } else {
            Err(EngineError::UnknownAsset { asset })
        }
    }

    /// Fails with `HealthFactorBroken` when `user` is below the minimum.
    pub(crate) fn ensure_solvent(&self, user: Address) -> EngineResult<HealthFactor> {
        let health_factor = self.health_factor(user)?;
        if health_factor.is_liquidatable() {
            return Err(EngineError::HealthFactorBroken {
                user,
                health_factor: health_factor.value(),
            });
        }
        Ok(health_factor)
    }
}

/// Entry guard shared by every amount-taking operation.
pub(crate) fn ensure_non_zero(amount: U256) -> EngineResult<()> {
    if amount.is_zero() {
        Err(EngineError::ZeroAmount)
    } else {
        Ok(())
    }
}
