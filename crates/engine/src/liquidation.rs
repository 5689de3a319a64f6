//! Liquidation engine.
//!
//! Any actor may repay part of an under-collateralized user's debt and seize
//! the equivalent collateral plus a bonus. The victim's health factor is checked
//! before (must be below the minimum) and after (must not have dropped).

use alloy::primitives::{Address, U256};
use serde::Serialize;

use synth_common::error::{EngineError, EngineResult};
use synth_common::types::OperationKind;

use crate::controller::Redemption;
use crate::engine::{SynthEngine, ensure_non_zero};
use crate::fixed_point;
use crate::health::HealthFactor;
use crate::interfaces::{CollateralToken, SyntheticAsset};

/// Where seized collateral ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payout {
    /// Credited to the liquidator's own ledger position; stays in custody.
    Ledger,
    /// Paid out of custody to the liquidator's wallet.
    Wallet,
}

/// Result of a successful liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiquidationOutcome {
    pub debt_covered: U256,
    /// Collateral equivalent of `debt_covered`, before the bonus
    pub collateral_base: U256,
    pub collateral_bonus: U256,
    pub health_factor_before: HealthFactor,
    pub health_factor_after: HealthFactor,
}

impl LiquidationOutcome {
    pub fn collateral_seized(&self) -> U256 {
        self.collateral_base.saturating_add(self.collateral_bonus)
    }
}

impl<T, S> SynthEngine<T, S>
where
    T: CollateralToken,
    S: SyntheticAsset,
{
    /// Cover `debt_to_cover` of `victim`'s debt; the seized collateral is credited
    /// to `liquidator`'s ledger position.
    pub fn liquidate(
        &mut self,
        liquidator: Address,
        victim: Address,
        asset: Address,
        debt_to_cover: U256,
    ) -> EngineResult<LiquidationOutcome> {
        self.liquidate_with(liquidator, victim, asset, debt_to_cover, Payout::Ledger)
    }

    /// Same as [`Self::liquidate`], but the seized collateral leaves custody
    /// straight to `liquidator`'s wallet.
    pub fn liquidate_to_wallet(
        &mut self,
        liquidator: Address,
        victim: Address,
        asset: Address,
        debt_to_cover: U256,
    ) -> EngineResult<LiquidationOutcome> {
        self.liquidate_with(liquidator, victim, asset, debt_to_cover, Payout::Wallet)
    }

    /// Collateral owed for covering `debt_to_cover`: `(base, bonus)` in native units of `asset`.
    pub fn seizure_amount(&self, asset: Address, debt_to_cover: U256) -> EngineResult<(U256, U256)> {
        let base = self.oracle.token_amount_from_usd(asset, debt_to_cover)?;
        let bonus = fixed_point::mul_div(
            base,
            U256::from(self.params.liquidation_bonus),
            U256::from(self.params.liquidation_precision),
        )?;
        Ok((base, bonus))
    }

    fn liquidate_with(
        &mut self,
        liquidator: Address,
        victim: Address,
        asset: Address,
        debt_to_cover: U256,
        payout: Payout,
    ) -> EngineResult<LiquidationOutcome> {
        ensure_non_zero(debt_to_cover)?;
        self.ensure_registered(asset)?;

        let health_factor_before = self.health_factor(victim)?;
        if !health_factor_before.is_liquidatable() {
            return Err(EngineError::HealthFactorOk {
                user: victim,
                health_factor: health_factor_before.value(),
            });
        }

        let (collateral_base, collateral_bonus) = self.seizure_amount(asset, debt_to_cover)?;
        let seized = collateral_base
            .checked_add(collateral_bonus)
            .ok_or(EngineError::MathOverflow)?;
        let redemption = Redemption {
            from: victim,
            to: liquidator,
            asset,
            amount: seized,
        };

        let checkpoint = self
            .ledger
            .checkpoint(&[(victim, asset), (liquidator, asset)], &[victim]);
        let health_factor_after = self.atomically(checkpoint, |engine| {
            match payout {
                Payout::Ledger => engine.ledger.move_collateral(victim, liquidator, asset, seized)?,
                Payout::Wallet => engine.stage_redemption(&redemption)?,
            }
            engine.ledger.decrease_debt(victim, debt_to_cover)?;

            let health_factor_after = engine.health_factor(victim)?;
            if health_factor_after < health_factor_before {
                return Err(EngineError::HealthFactorNotImproved {
                    user: victim,
                    before: health_factor_before.value(),
                    after: health_factor_after.value(),
                });
            }
            engine.ensure_solvent(liquidator)?;

            engine.burn_synthetic(liquidator, debt_to_cover)?;
            if payout == Payout::Wallet
                && let Err(e) = engine.settle_redemption(&redemption)
            {
                return Err(engine.refund_burn(liquidator, debt_to_cover, e));
            }
            Ok(health_factor_after)
        })?;

        tracing::info!(
            operation = %OperationKind::Liquidate,
            liquidator = %liquidator,
            victim = %victim,
            asset = %asset,
            debt_covered = %debt_to_cover,
            collateral_seized = %seized,
            health_factor_before = %health_factor_before,
            health_factor_after = %health_factor_after,
            "Position liquidated"
        );

        Ok(LiquidationOutcome {
            debt_covered: debt_to_cover,
            collateral_base,
            collateral_bonus,
            health_factor_before,
            health_factor_after,
        })
    }
}
