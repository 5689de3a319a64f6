//! In-memory collaborators for tests and the simulator.
//!
//! Price feeds and the clock are cheap `Clone` handles over shared state, so a
//! caller can keep one copy while the engine owns the other.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use alloy::primitives::{Address, I256, U256};
use chrono::{DateTime, Duration, Utc};

use synth_common::types::RawQuote;

use crate::interfaces::{CollateralToken, SyntheticAsset};
use crate::oracle::{Clock, PriceSource};

/// How a mock collaborator answers its next calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    Succeed,
    /// Report `Ok(false)`
    ReportFailure,
    /// Return an error
    Error,
}

/// One executed collateral transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    pub asset: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

/// Wallet balances of every collateral asset.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCollateral {
    balances: HashMap<(Address, Address), U256>,
    failure: FailureMode,
    transfers: Vec<TransferRecord>,
}

impl InMemoryCollateral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `holder` fresh units of `asset`.
    pub fn fund(&mut self, asset: Address, holder: Address, amount: U256) {
        let balance = self.balances.entry((asset, holder)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, asset: Address, holder: Address) -> U256 {
        self.balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn set_failure_mode(&mut self, failure: FailureMode) {
        self.failure = failure;
    }

    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }
}

impl CollateralToken for InMemoryCollateral {
    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> anyhow::Result<bool> {
        match self.failure {
            FailureMode::Succeed => {}
            FailureMode::ReportFailure => return Ok(false),
            FailureMode::Error => anyhow::bail!("collateral token {asset} reverted"),
        }

        let from_balance = self.balance_of(asset, from);
        let Some(remaining) = from_balance.checked_sub(amount) else {
            return Ok(false);
        };
        self.balances.insert((asset, from), remaining);
        self.fund(asset, to, amount);
        self.transfers.push(TransferRecord {
            asset,
            from,
            to,
            amount,
        });
        Ok(true)
    }
}

/// Holder balances and total supply of the synthetic asset.
#[derive(Debug, Default, Clone)]
pub struct InMemorySynthetic {
    balances: HashMap<Address, U256>,
    total_supply: U256,
    mint_failure: FailureMode,
    burn_failure: FailureMode,
}

impl InMemorySynthetic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or(U256::ZERO)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Move already-minted units between holders (e.g., a liquidator buying debt tokens).
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let from_balance = self.balance_of(from);
        let Some(remaining) = from_balance.checked_sub(amount) else {
            return false;
        };
        self.balances.insert(from, remaining);
        let to_balance = self.balances.entry(to).or_default();
        *to_balance = to_balance.saturating_add(amount);
        true
    }

    pub fn set_mint_failure(&mut self, failure: FailureMode) {
        self.mint_failure = failure;
    }

    pub fn set_burn_failure(&mut self, failure: FailureMode) {
        self.burn_failure = failure;
    }
}

impl SyntheticAsset for InMemorySynthetic {
    fn mint(&mut self, to: Address, amount: U256) -> anyhow::Result<bool> {
        match self.mint_failure {
            FailureMode::Succeed => {}
            FailureMode::ReportFailure => return Ok(false),
            FailureMode::Error => anyhow::bail!("synthetic mint reverted"),
        }

        let Some(supply) = self.total_supply.checked_add(amount) else {
            return Ok(false);
        };
        self.total_supply = supply;
        let balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
        Ok(true)
    }

    fn burn_from(&mut self, payer: Address, amount: U256) -> anyhow::Result<bool> {
        match self.burn_failure {
            FailureMode::Succeed => {}
            FailureMode::ReportFailure => return Ok(false),
            FailureMode::Error => anyhow::bail!("synthetic burn reverted"),
        }

        let Some(remaining) = self.balance_of(payer).checked_sub(amount) else {
            return Ok(false);
        };
        self.balances.insert(payer, remaining);
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(true)
    }
}

#[derive(Debug)]
struct FeedState {
    quote: RawQuote,
    failing: bool,
}

/// Aggregator-style feed whose answer can be pushed from outside.
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    state: Arc<RwLock<FeedState>>,
}

impl MockPriceFeed {
    pub fn new(decimals: u8, answer: I256, observed_at: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState {
                quote: RawQuote {
                    answer,
                    decimals,
                    observed_at,
                },
                failing: false,
            })),
        }
    }

    /// Publish a new round.
    pub fn update_answer(&self, answer: I256, observed_at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.quote.answer = answer;
        state.quote.observed_at = observed_at;
    }

    pub fn set_failing(&self, failing: bool) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .failing = failing;
    }

    pub fn latest(&self) -> RawQuote {
        self.state.read().unwrap_or_else(|e| e.into_inner()).quote
    }
}

impl PriceSource for MockPriceFeed {
    fn latest_quote(&self, _asset: Address) -> anyhow::Result<RawQuote> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.failing {
            anyhow::bail!("price feed unreachable");
        }
        Ok(state.quote)
    }

    fn name(&self) -> &str {
        "mock aggregator"
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
