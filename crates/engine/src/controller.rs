//! Mint / redeem controller: deposit, mint, redeem and burn.
//!
//! Every operation follows the same shape: validate inputs, checkpoint the
//! ledger records it touches, finish all bookkeeping and solvency checks, and
//! only then call the external collaborators. Any failure restores the
//! checkpoint, so a collaborator that re-enters the engine always observes
//! consistent, already-final state.

use alloy::primitives::{Address, U256};

use synth_common::error::{EngineError, EngineResult};
use synth_common::types::OperationKind;

use crate::engine::{SynthEngine, ensure_non_zero};
use crate::health::HealthFactor;
use crate::interfaces::{CollateralToken, SyntheticAsset};

/// Collateral leaving a ledger position: debited from `from`, paid out of custody to `to`.
///
/// Ordinary redemption pays the owner (`from == to`); liquidation redirects the
/// seized collateral to the liquidator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    pub from: Address,
    pub to: Address,
    pub asset: Address,
    pub amount: U256,
}

impl<T, S> SynthEngine<T, S>
where
    T: CollateralToken,
    S: SyntheticAsset,
{
    /// Lock `amount` of `asset` from the user's wallet into custody.
    pub fn deposit_collateral(
        &mut self,
        user: Address,
        asset: Address,
        amount: U256,
    ) -> EngineResult<()> {
        ensure_non_zero(amount)?;
        self.ensure_registered(asset)?;

        let checkpoint = self.ledger.checkpoint(&[(user, asset)], &[]);
        self.atomically(checkpoint, |engine| {
            engine.ledger.credit(user, asset, amount)?;
            engine.pull_collateral(user, asset, amount)
        })?;

        tracing::info!(
            operation = %OperationKind::Deposit,
            user = %user,
            asset = %asset,
            amount = %amount,
            "Collateral deposited"
        );
        Ok(())
    }

    /// Mint `amount` of the synthetic asset against the user's collateral.
    ///
    /// Never mints a smaller amount: if the full amount would break the health
    /// factor the request is rejected.
    pub fn mint(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        ensure_non_zero(amount)?;

        let checkpoint = self.ledger.checkpoint(&[], &[user]);
        let health_factor = self.atomically(checkpoint, |engine| {
            engine.ledger.increase_debt(user, amount)?;
            let health_factor = engine.ensure_solvent(user)?;
            engine.mint_synthetic(user, amount)?;
            Ok(health_factor)
        })?;

        tracing::info!(
            operation = %OperationKind::Mint,
            user = %user,
            amount = %amount,
            health_factor = %health_factor,
            "Synthetic minted"
        );
        Ok(())
    }

    /// Return `amount` of `asset` from custody to the user's wallet.
    pub fn redeem_collateral(
        &mut self,
        user: Address,
        asset: Address,
        amount: U256,
    ) -> EngineResult<()> {
        ensure_non_zero(amount)?;
        self.ensure_registered(asset)?;

        let redemption = Redemption {
            from: user,
            to: user,
            asset,
            amount,
        };
        let checkpoint = self.ledger.checkpoint(&[(user, asset)], &[]);
        self.atomically(checkpoint, |engine| {
            engine.debit_then_verify_solvency(&redemption)?;
            engine.settle_redemption(&redemption)
        })?;

        tracing::info!(
            operation = %OperationKind::Redeem,
            user = %user,
            asset = %asset,
            amount = %amount,
            "Collateral redeemed"
        );
        Ok(())
    }

    /// Repay `amount` of the user's debt by burning their synthetic tokens.
    ///
    /// Burning can only raise the health factor, so it is not re-checked.
    pub fn burn(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        ensure_non_zero(amount)?;

        let checkpoint = self.ledger.checkpoint(&[], &[user]);
        self.atomically(checkpoint, |engine| {
            engine.ledger.decrease_debt(user, amount)?;
            engine.burn_synthetic(user, amount)
        })?;

        tracing::info!(
            operation = %OperationKind::Burn,
            user = %user,
            amount = %amount,
            "Synthetic burned"
        );
        Ok(())
    }

    /// Deposit collateral and mint against it in one unit.
    pub fn deposit_collateral_and_mint(
        &mut self,
        user: Address,
        asset: Address,
        collateral_amount: U256,
        mint_amount: U256,
    ) -> EngineResult<()> {
        ensure_non_zero(collateral_amount)?;
        ensure_non_zero(mint_amount)?;
        self.ensure_registered(asset)?;

        let checkpoint = self.ledger.checkpoint(&[(user, asset)], &[user]);
        self.atomically(checkpoint, |engine| {
            engine.ledger.credit(user, asset, collateral_amount)?;
            engine.ledger.increase_debt(user, mint_amount)?;
            engine.ensure_solvent(user)?;

            engine.pull_collateral(user, asset, collateral_amount)?;
            if let Err(e) = engine.mint_synthetic(user, mint_amount) {
                return Err(engine.return_collateral(asset, user, collateral_amount, e));
            }
            Ok(())
        })?;

        tracing::info!(
            operation = %OperationKind::Deposit,
            user = %user,
            asset = %asset,
            collateral_amount = %collateral_amount,
            mint_amount = %mint_amount,
            "Collateral deposited and synthetic minted"
        );
        Ok(())
    }

    /// Burn synthetic tokens and redeem collateral in one unit.
    pub fn redeem_collateral_for_synth(
        &mut self,
        user: Address,
        asset: Address,
        collateral_amount: U256,
        burn_amount: U256,
    ) -> EngineResult<()> {
        ensure_non_zero(collateral_amount)?;
        ensure_non_zero(burn_amount)?;
        self.ensure_registered(asset)?;

        let redemption = Redemption {
            from: user,
            to: user,
            asset,
            amount: collateral_amount,
        };
        let checkpoint = self.ledger.checkpoint(&[(user, asset)], &[user]);
        self.atomically(checkpoint, |engine| {
            engine.ledger.decrease_debt(user, burn_amount)?;
            engine.debit_then_verify_solvency(&redemption)?;

            engine.burn_synthetic(user, burn_amount)?;
            if let Err(e) = engine.settle_redemption(&redemption) {
                return Err(engine.refund_burn(user, burn_amount, e));
            }
            Ok(())
        })?;

        tracing::info!(
            operation = %OperationKind::Redeem,
            user = %user,
            asset = %asset,
            collateral_amount = %collateral_amount,
            burn_amount = %burn_amount,
            "Synthetic burned and collateral redeemed"
        );
        Ok(())
    }

    /// Debit the redemption's source position, then check the owner's health factor.
    ///
    /// Must run before any external call. The caller settles the redemption
    /// after this returns `Ok` and restores its checkpoint otherwise.
    pub(crate) fn debit_then_verify_solvency(
        &mut self,
        redemption: &Redemption,
    ) -> EngineResult<HealthFactor> {
        self.stage_redemption(redemption)?;
        self.ensure_solvent(redemption.from)
    }

    /// Internal half of a redemption: remove the collateral from the source position.
    pub(crate) fn stage_redemption(&mut self, redemption: &Redemption) -> EngineResult<()> {
        self.ledger
            .debit(redemption.from, redemption.asset, redemption.amount)
    }

    /// External half of a redemption: pay the collateral out of custody.
    pub(crate) fn settle_redemption(&mut self, redemption: &Redemption) -> EngineResult<()> {
        let custody = self.custody;
        self.transfer_collateral(redemption.asset, custody, redemption.to, redemption.amount)
    }

    fn pull_collateral(&mut self, user: Address, asset: Address, amount: U256) -> EngineResult<()> {
        let custody = self.custody;
        self.transfer_collateral(asset, user, custody, amount)
    }

    fn transfer_collateral(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> EngineResult<()> {
        let outcome = self.collateral.transfer(asset, from, to, amount);
        if reported_success(outcome, "collateral transfer") {
            Ok(())
        } else {
            Err(EngineError::TransferFailed {
                asset,
                from,
                to,
                amount,
            })
        }
    }

    fn mint_synthetic(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        let outcome = self.synthetic.mint(user, amount);
        if reported_success(outcome, "synthetic mint") {
            Ok(())
        } else {
            Err(EngineError::MintFailed { user, amount })
        }
    }

    pub(crate) fn burn_synthetic(&mut self, payer: Address, amount: U256) -> EngineResult<()> {
        let outcome = self.synthetic.burn_from(payer, amount);
        if reported_success(outcome, "synthetic burn") {
            Ok(())
        } else {
            Err(EngineError::BurnFailed { payer, amount })
        }
    }

    /// Undo an already-executed burn after a later external step failed.
    ///
    /// Returns the error to report: `cause` when the refund went through,
    /// [`EngineError::CompensationFailed`] when synthetic supply is left short.
    pub(crate) fn refund_burn(
        &mut self,
        payer: Address,
        amount: U256,
        cause: EngineError,
    ) -> EngineError {
        let outcome = self.synthetic.mint(payer, amount);
        if reported_success(outcome, "burn refund") {
            return cause;
        }
        tracing::error!(
            payer = %payer,
            amount = %amount,
            cause = %cause,
            "Failed to refund burned synthetic after aborted operation"
        );
        EngineError::CompensationFailed {
            user: payer,
            amount,
            cause: Box::new(cause),
        }
    }

    /// Undo an already-executed deposit pull after a later external step failed.
    ///
    /// Same contract as [`Self::refund_burn`], with the collateral left in custody.
    fn return_collateral(
        &mut self,
        asset: Address,
        user: Address,
        amount: U256,
        cause: EngineError,
    ) -> EngineError {
        let custody = self.custody;
        if self
            .transfer_collateral(asset, custody, user, amount)
            .is_ok()
        {
            return cause;
        }
        tracing::error!(
            user = %user,
            asset = %asset,
            amount = %amount,
            cause = %cause,
            "Failed to return collateral after aborted operation"
        );
        EngineError::CompensationFailed {
            user,
            amount,
            cause: Box::new(cause),
        }
    }
}

/// `Ok(false)` and `Err(_)` from a collaborator are the same failure.
fn reported_success(outcome: anyhow::Result<bool>, step: &'static str) -> bool {
    match outcome {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(step, "External call reported failure");
            false
        }
        Err(e) => {
            tracing::warn!(step, error = %e, "External call failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::MIN_HEALTH_FACTOR;
    use crate::memory::FailureMode;
    use crate::test_support::*;
    use chrono::Duration;

    #[test]
    fn test_deposit_credits_ledger_and_moves_tokens() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(2)).unwrap();

        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, ALICE), eth(8));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, CUSTODY), eth(2));
    }

    #[test]
    fn test_deposit_zero_rejected() {
        let mut f = setup();
        assert_eq!(
            f.engine.deposit_collateral(ALICE, WETH, U256::ZERO),
            Err(EngineError::ZeroAmount)
        );
    }

    #[test]
    fn test_deposit_unknown_asset_rejected() {
        let mut f = setup();
        let unknown = Address::repeat_byte(0x99);
        assert_eq!(
            f.engine.deposit_collateral(ALICE, unknown, eth(1)),
            Err(EngineError::UnknownAsset { asset: unknown })
        );
    }

    #[test]
    fn test_deposit_rolled_back_when_transfer_reports_failure() {
        let mut f = setup();
        f.engine
            .collateral_token_mut()
            .set_failure_mode(FailureMode::ReportFailure);

        assert_eq!(
            f.engine.deposit_collateral(ALICE, WETH, eth(1)),
            Err(EngineError::TransferFailed {
                asset: WETH,
                from: ALICE,
                to: CUSTODY,
                amount: eth(1),
            })
        );
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
    }

    #[test]
    fn test_deposit_rolled_back_when_transfer_errors() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine
            .collateral_token_mut()
            .set_failure_mode(FailureMode::Error);

        assert!(matches!(
            f.engine.deposit_collateral(ALICE, WETH, eth(1)),
            Err(EngineError::TransferFailed { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
    }

    #[test]
    fn test_deposit_more_than_wallet_balance_fails() {
        let mut f = setup();
        assert!(matches!(
            f.engine.deposit_collateral(ALICE, WETH, eth(11)),
            Err(EngineError::TransferFailed { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
    }

    #[test]
    fn test_mint_at_exact_minimum_allowed() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine.mint(ALICE, usd(2000)).unwrap();

        assert_eq!(f.engine.health_factor(ALICE).unwrap().value(), MIN_HEALTH_FACTOR);
        assert_eq!(f.engine.debt_of(ALICE), usd(2000));
        assert_eq!(f.engine.synthetic_asset().balance_of(ALICE), usd(2000));
    }

    #[test]
    fn test_mint_one_wei_over_rejected_and_rolled_back() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();

        let result = f.engine.mint(ALICE, usd(2000) + U256::from(1u64));
        assert!(matches!(
            result,
            Err(EngineError::HealthFactorBroken { user, .. }) if user == ALICE
        ));
        assert_eq!(f.engine.debt_of(ALICE), U256::ZERO);
        assert_eq!(f.engine.synthetic_asset().total_supply(), U256::ZERO);
    }

    #[test]
    fn test_mint_without_collateral_rejected() {
        let mut f = setup();
        assert!(matches!(
            f.engine.mint(ALICE, usd(1)),
            Err(EngineError::HealthFactorBroken { .. })
        ));
    }

    #[test]
    fn test_mint_zero_rejected() {
        let mut f = setup();
        assert_eq!(f.engine.mint(ALICE, U256::ZERO), Err(EngineError::ZeroAmount));
    }

    #[test]
    fn test_mint_failure_rolls_back_debt() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine
            .synthetic_asset_mut()
            .set_mint_failure(FailureMode::ReportFailure);

        assert_eq!(
            f.engine.mint(ALICE, usd(100)),
            Err(EngineError::MintFailed {
                user: ALICE,
                amount: usd(100),
            })
        );
        assert_eq!(f.engine.debt_of(ALICE), U256::ZERO);
    }

    #[test]
    fn test_mint_with_stale_price_rejected() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.clock.advance(Duration::hours(4));

        assert!(matches!(
            f.engine.mint(ALICE, usd(100)),
            Err(EngineError::StalePrice { asset, .. }) if asset == WETH
        ));
        assert_eq!(f.engine.debt_of(ALICE), U256::ZERO);
    }

    #[test]
    fn test_redeem_returns_collateral() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(3)).unwrap();
        f.engine.redeem_collateral(ALICE, WETH, eth(1)).unwrap();

        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, ALICE), eth(8));
    }

    #[test]
    fn test_redeem_more_than_deposited_rejected() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();

        assert!(matches!(
            f.engine.redeem_collateral(ALICE, WETH, eth(2)),
            Err(EngineError::InsufficientCollateral { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
    }

    #[test]
    fn test_redeem_breaking_health_factor_rolled_back() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(2)).unwrap();
        f.engine.mint(ALICE, usd(2000)).unwrap();

        assert!(matches!(
            f.engine.redeem_collateral(ALICE, WETH, eth(1) + U256::from(1u64)),
            Err(EngineError::HealthFactorBroken { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, CUSTODY), eth(2));

        // Exactly down to the minimum is still allowed
        f.engine.redeem_collateral(ALICE, WETH, eth(1)).unwrap();
        assert_eq!(f.engine.health_factor(ALICE).unwrap().value(), MIN_HEALTH_FACTOR);
    }

    #[test]
    fn test_redeem_rolled_back_when_payout_fails() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine
            .collateral_token_mut()
            .set_failure_mode(FailureMode::Error);

        assert!(matches!(
            f.engine.redeem_collateral(ALICE, WETH, eth(1)),
            Err(EngineError::TransferFailed { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
    }

    #[test]
    fn test_redeem_without_debt_ignores_stale_price() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.clock.advance(Duration::days(1));

        f.engine.redeem_collateral(ALICE, WETH, eth(1)).unwrap();
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
    }

    #[test]
    fn test_redeem_with_debt_and_stale_price_rejected() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(2)).unwrap();
        f.engine.mint(ALICE, usd(100)).unwrap();
        f.clock.advance(Duration::days(1));

        assert!(matches!(
            f.engine.redeem_collateral(ALICE, WETH, eth(1)),
            Err(EngineError::StalePrice { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
    }

    #[test]
    fn test_debit_then_verify_solvency_leaves_debit_in_place_on_success() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(2)).unwrap();
        f.engine.mint(ALICE, usd(1000)).unwrap();

        let redemption = Redemption {
            from: ALICE,
            to: ALICE,
            asset: WETH,
            amount: eth(1),
        };
        let health_factor = f.engine.debit_then_verify_solvency(&redemption).unwrap();

        // Checked against the post-debit state: $4000 × 50% / $1000 = 2.0
        assert_eq!(health_factor.value(), U256::from(2u64) * MIN_HEALTH_FACTOR);
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
        // Nothing external happened yet
        assert_eq!(f.engine.collateral_token().balance_of(WETH, CUSTODY), eth(2));
    }

    #[test]
    fn test_debit_then_verify_solvency_reports_broken_after_debit() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(2)).unwrap();
        f.engine.mint(ALICE, usd(2000)).unwrap();

        let redemption = Redemption {
            from: ALICE,
            to: BOB,
            asset: WETH,
            amount: eth(2),
        };
        assert!(matches!(
            f.engine.debit_then_verify_solvency(&redemption),
            Err(EngineError::HealthFactorBroken { user, .. }) if user == ALICE
        ));
        // The primitive itself does not roll back; its caller's checkpoint does.
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
    }

    #[test]
    fn test_burn_reduces_debt() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine.mint(ALICE, usd(1000)).unwrap();
        f.engine.burn(ALICE, usd(400)).unwrap();

        assert_eq!(f.engine.debt_of(ALICE), usd(600));
        assert_eq!(f.engine.synthetic_asset().total_supply(), usd(600));
    }

    #[test]
    fn test_burn_more_than_debt_rejected() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine.mint(ALICE, usd(100)).unwrap();

        assert_eq!(
            f.engine.burn(ALICE, usd(101)),
            Err(EngineError::InsufficientDebt {
                user: ALICE,
                requested: usd(101),
                outstanding: usd(100),
            })
        );
    }

    #[test]
    fn test_burn_failure_rolls_back_debt() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine.mint(ALICE, usd(100)).unwrap();
        f.engine
            .synthetic_asset_mut()
            .set_burn_failure(FailureMode::Error);

        assert_eq!(
            f.engine.burn(ALICE, usd(50)),
            Err(EngineError::BurnFailed {
                payer: ALICE,
                amount: usd(50),
            })
        );
        assert_eq!(f.engine.debt_of(ALICE), usd(100));
    }

    #[test]
    fn test_burn_works_with_stale_price() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        f.engine.mint(ALICE, usd(100)).unwrap();
        f.clock.advance(Duration::days(1));

        f.engine.burn(ALICE, usd(100)).unwrap();
        assert_eq!(f.engine.debt_of(ALICE), U256::ZERO);
    }

    #[test]
    fn test_deposit_and_mint() {
        let mut f = setup();
        f.engine
            .deposit_collateral_and_mint(ALICE, WETH, eth(1), usd(1500))
            .unwrap();

        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
        assert_eq!(f.engine.debt_of(ALICE), usd(1500));
    }

    #[test]
    fn test_deposit_and_mint_too_much_touches_nothing() {
        let mut f = setup();
        assert!(matches!(
            f.engine
                .deposit_collateral_and_mint(ALICE, WETH, eth(1), usd(2001)),
            Err(EngineError::HealthFactorBroken { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
        assert_eq!(f.engine.collateral_token().balance_of(WETH, ALICE), eth(10));
        assert!(f.engine.collateral_token().transfers().is_empty());
    }

    #[test]
    fn test_deposit_and_mint_returns_collateral_when_mint_fails() {
        let mut f = setup();
        f.engine
            .synthetic_asset_mut()
            .set_mint_failure(FailureMode::Error);

        assert!(matches!(
            f.engine
                .deposit_collateral_and_mint(ALICE, WETH, eth(1), usd(100)),
            Err(EngineError::MintFailed { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), U256::ZERO);
        assert_eq!(f.engine.debt_of(ALICE), U256::ZERO);
        assert_eq!(f.engine.collateral_token().balance_of(WETH, ALICE), eth(10));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, CUSTODY), U256::ZERO);
    }

    #[test]
    fn test_redeem_for_synth() {
        let mut f = setup();
        f.engine
            .deposit_collateral_and_mint(ALICE, WETH, eth(2), usd(2000))
            .unwrap();
        f.engine
            .redeem_collateral_for_synth(ALICE, WETH, eth(1), usd(1000))
            .unwrap();

        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(1));
        assert_eq!(f.engine.debt_of(ALICE), usd(1000));
        assert_eq!(f.engine.synthetic_asset().balance_of(ALICE), usd(1000));
        assert_eq!(f.engine.collateral_token().balance_of(WETH, ALICE), eth(9));
    }

    #[test]
    fn test_redeem_for_synth_refunds_burn_when_payout_fails() {
        let mut f = setup();
        f.engine
            .deposit_collateral_and_mint(ALICE, WETH, eth(2), usd(2000))
            .unwrap();
        f.engine
            .collateral_token_mut()
            .set_failure_mode(FailureMode::ReportFailure);

        assert!(matches!(
            f.engine
                .redeem_collateral_for_synth(ALICE, WETH, eth(1), usd(1000)),
            Err(EngineError::TransferFailed { .. })
        ));
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
        assert_eq!(f.engine.debt_of(ALICE), usd(2000));
        assert_eq!(f.engine.synthetic_asset().balance_of(ALICE), usd(2000));
        assert_eq!(f.engine.synthetic_asset().total_supply(), usd(2000));
    }

    #[test]
    fn test_redeem_for_synth_reports_failed_refund_distinctly() {
        let mut f = setup();
        f.engine
            .deposit_collateral_and_mint(ALICE, WETH, eth(2), usd(2000))
            .unwrap();
        f.engine
            .collateral_token_mut()
            .set_failure_mode(FailureMode::ReportFailure);
        f.engine
            .synthetic_asset_mut()
            .set_mint_failure(FailureMode::Error);

        let err = f
            .engine
            .redeem_collateral_for_synth(ALICE, WETH, eth(1), usd(1000))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::CompensationFailed {
                user: ALICE,
                amount: usd(1000),
                cause: Box::new(EngineError::TransferFailed {
                    asset: WETH,
                    from: CUSTODY,
                    to: ALICE,
                    amount: eth(1),
                }),
            }
        );
        // Ledger is restored; the burned supply is not
        assert_eq!(f.engine.collateral_balance(ALICE, WETH), eth(2));
        assert_eq!(f.engine.debt_of(ALICE), usd(2000));
        assert_eq!(f.engine.synthetic_asset().balance_of(ALICE), usd(1000));
        assert_eq!(f.engine.synthetic_asset().total_supply(), usd(1000));
    }

    #[test]
    fn test_multi_asset_collateral_counts_toward_mint() {
        let mut f = setup();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        // 0.5 WBTC at $60,000
        f.engine
            .deposit_collateral(ALICE, WBTC, U256::from(50_000_000u64))
            .unwrap();

        assert_eq!(f.engine.collateral_value_usd(ALICE).unwrap(), usd(34_000));
        f.engine.mint(ALICE, usd(17_000)).unwrap();
        assert!(f.engine.mint(ALICE, U256::from(1u64)).is_err());

        // A stale WBTC feed blocks anything that needs the full valuation
        f.btc_feed.update_answer(price(60_000), start() - Duration::hours(4));
        assert!(matches!(
            f.engine.redeem_collateral(ALICE, WETH, U256::from(1u64)),
            Err(EngineError::StalePrice { asset, .. }) if asset == WBTC
        ));
    }

    #[test]
    fn test_operations_on_one_user_leave_others_untouched() {
        let mut f = setup();
        f.engine.deposit_collateral(BOB, WETH, eth(5)).unwrap();
        f.engine.deposit_collateral(ALICE, WETH, eth(1)).unwrap();
        let _ = f.engine.mint(ALICE, usd(5000));

        assert_eq!(f.engine.collateral_balance(BOB, WETH), eth(5));
        assert_eq!(f.engine.debt_of(BOB), U256::ZERO);
        assert_eq!(f.eth_feed.latest().decimals, 8);
    }
}
