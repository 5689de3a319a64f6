//! Collateral ledger: per-user, per-asset balances and per-user debt.
//!
//! Pure bookkeeping: nothing here calls out of the engine except
//! [`CollateralLedger::total_value_usd`], which reads prices through the gateway.
//! Zero balances are removed rather than stored.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::{Address, U256};

use synth_common::error::{EngineError, EngineResult};

use crate::oracle::PriceOracleGateway;

#[derive(Debug, Default, Clone)]
pub struct CollateralLedger {
    /// user → asset → amount (native precision)
    balances: HashMap<Address, BTreeMap<Address, U256>>,
    /// user → minted synthetic amount (18 decimals)
    debts: HashMap<Address, U256>,
}

/// Saved values of the records an operation is about to touch.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    balances: Vec<(Address, Address, U256)>,
    debts: Vec<(Address, U256)>,
}

impl CollateralLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, user: Address, asset: Address) -> U256 {
        self.balances
            .get(&user)
            .and_then(|positions| positions.get(&asset))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Non-zero positions held by `user`, ordered by asset.
    pub fn positions(&self, user: Address) -> Vec<(Address, U256)> {
        self.balances
            .get(&user)
            .map(|positions| positions.iter().map(|(a, b)| (*a, *b)).collect())
            .unwrap_or_default()
    }

    pub fn credit(&mut self, user: Address, asset: Address, amount: U256) -> EngineResult<()> {
        let balance = self.balance(user, asset);
        let updated = balance
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        self.set_balance(user, asset, updated);
        Ok(())
    }

    pub fn debit(&mut self, user: Address, asset: Address, amount: U256) -> EngineResult<()> {
        let available = self.balance(user, asset);
        let updated = available
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientCollateral {
                user,
                asset,
                requested: amount,
                available,
            })?;
        self.set_balance(user, asset, updated);
        Ok(())
    }

    /// Move collateral between two users without it leaving custody.
    pub fn move_collateral(
        &mut self,
        from: Address,
        to: Address,
        asset: Address,
        amount: U256,
    ) -> EngineResult<()> {
        self.debit(from, asset, amount)?;
        self.credit(to, asset, amount)
    }

    pub fn debt_of(&self, user: Address) -> U256 {
        self.debts.get(&user).copied().unwrap_or(U256::ZERO)
    }

    pub fn increase_debt(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        let updated = self
            .debt_of(user)
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        self.set_debt(user, updated);
        Ok(())
    }

    pub fn decrease_debt(&mut self, user: Address, amount: U256) -> EngineResult<()> {
        let outstanding = self.debt_of(user);
        let updated = outstanding
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientDebt {
                user,
                requested: amount,
                outstanding,
            })?;
        self.set_debt(user, updated);
        Ok(())
    }

    /// Sum of `balance × price` over every asset `user` holds, in 18-decimal USD.
    pub fn total_value_usd(&self, user: Address, oracle: &PriceOracleGateway) -> EngineResult<U256> {
        let mut total = U256::ZERO;
        for (asset, balance) in self.positions(user) {
            let value = oracle.usd_value(asset, balance)?;
            total = total.checked_add(value).ok_or(EngineError::MathOverflow)?;
        }
        Ok(total)
    }

    /// Capture the current value of the given `(user, asset)` positions and user debts.
    pub fn checkpoint(&self, positions: &[(Address, Address)], debtors: &[Address]) -> Checkpoint {
        Checkpoint {
            balances: positions
                .iter()
                .map(|&(user, asset)| (user, asset, self.balance(user, asset)))
                .collect(),
            debts: debtors
                .iter()
                .map(|&user| (user, self.debt_of(user)))
                .collect(),
        }
    }

    /// Put every record captured in `checkpoint` back to its saved value.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        for (user, asset, amount) in checkpoint.balances {
            self.set_balance(user, asset, amount);
        }
        for (user, amount) in checkpoint.debts {
            self.set_debt(user, amount);
        }
    }

    fn set_balance(&mut self, user: Address, asset: Address, amount: U256) {
        if amount.is_zero() {
            if let Some(positions) = self.balances.get_mut(&user) {
                positions.remove(&asset);
                if positions.is_empty() {
                    self.balances.remove(&user);
                }
            }
        } else {
            self.balances.entry(user).or_default().insert(asset, amount);
        }
    }

    fn set_debt(&mut self, user: Address, amount: U256) {
        if amount.is_zero() {
            self.debts.remove(&user);
        } else {
            self.debts.insert(user, amount);
        }
    }
}
