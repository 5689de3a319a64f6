use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, I256, U256};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use synth_common::config::AppConfig;
use synth_common::error::EngineError;
use synth_common::types::AssetConfig;
use synth_engine::SynthEngine;
use synth_engine::memory::{InMemoryCollateral, InMemorySynthetic, ManualClock, MockPriceFeed};
use synth_engine::oracle::{Clock, PriceOracleGateway};

/// A scenario file.
///
/// Amounts and prices are decimal strings so 18-decimal values survive JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Initial clock reading; every feed starts observed at this instant
    pub start: DateTime<Utc>,
    pub assets: Vec<AssetSpec>,
    #[serde(default)]
    pub wallets: Vec<WalletFunding>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetSpec {
    pub asset: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Falls back to `DEFAULT_MAX_STALENESS_SECS`
    #[serde(default)]
    pub max_staleness_secs: Option<u64>,
    pub feed_decimals: u8,
    /// Initial answer, scaled by `10^feed_decimals`
    pub price: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletFunding {
    pub holder: Address,
    pub asset: Address,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        user: Address,
        asset: Address,
        amount: String,
    },
    Mint {
        user: Address,
        amount: String,
    },
    Redeem {
        user: Address,
        asset: Address,
        amount: String,
    },
    Burn {
        user: Address,
        amount: String,
    },
    DepositAndMint {
        user: Address,
        asset: Address,
        collateral_amount: String,
        mint_amount: String,
    },
    RedeemForSynth {
        user: Address,
        asset: Address,
        collateral_amount: String,
        burn_amount: String,
    },
    Liquidate {
        liquidator: Address,
        victim: Address,
        asset: Address,
        debt_to_cover: String,
        #[serde(default)]
        to_wallet: bool,
    },
    /// Publish a new feed answer observed at the current clock reading.
    SetPrice {
        asset: Address,
        price: String,
    },
    AdvanceTime {
        seconds: i64,
    },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Mint { .. } => "mint",
            Step::Redeem { .. } => "redeem",
            Step::Burn { .. } => "burn",
            Step::DepositAndMint { .. } => "deposit_and_mint",
            Step::RedeemForSynth { .. } => "redeem_for_synth",
            Step::Liquidate { .. } => "liquidate",
            Step::SetPrice { .. } => "set_price",
            Step::AdvanceTime { .. } => "advance_time",
        }
    }

    fn participants(&self) -> Vec<Address> {
        match self {
            Step::Deposit { user, .. }
            | Step::Mint { user, .. }
            | Step::Redeem { user, .. }
            | Step::Burn { user, .. }
            | Step::DepositAndMint { user, .. }
            | Step::RedeemForSynth { user, .. } => vec![*user],
            Step::Liquidate {
                liquidator, victim, ..
            } => vec![*liquidator, *victim],
            Step::SetPrice { .. } | Step::AdvanceTime { .. } => Vec::new(),
        }
    }
}

impl Scenario {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Why a step did not go through.
#[derive(Debug, Error)]
pub enum StepError {
    /// The engine refused the operation; the scenario continues
    #[error(transparent)]
    Rejected(#[from] EngineError),

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("no price feed registered for {0}")]
    UnknownFeed(Address),
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub asset: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub user: Address,
    pub debt: U256,
    pub synthetic_balance: U256,
    pub collateral: Vec<PositionReport>,
    /// `"unbounded"`, the 18-decimal ratio, or why it could not be computed
    pub health_factor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub accounts: Vec<AccountReport>,
    pub synthetic_supply: U256,
}

impl ScenarioReport {
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| !s.accepted).count()
    }
}

/// An engine wired to in-memory collaborators, plus handles to drive its feeds and clock.
pub struct Simulation {
    engine: SynthEngine<InMemoryCollateral, InMemorySynthetic>,
    feeds: HashMap<Address, MockPriceFeed>,
    clock: ManualClock,
    accounts: BTreeSet<Address>,
}

impl Simulation {
    pub fn new(config: &AppConfig, scenario: &Scenario) -> anyhow::Result<Self> {
        let clock = ManualClock::new(scenario.start);
        let mut oracle = PriceOracleGateway::new(Arc::new(clock.clone()));
        let mut feeds = HashMap::new();

        for spec in &scenario.assets {
            let answer = parse_answer(&spec.price)
                .with_context(|| format!("initial price of {}", spec.symbol))?;
            let feed = MockPriceFeed::new(spec.feed_decimals, answer, scenario.start);
            oracle.register(
                AssetConfig {
                    asset: spec.asset,
                    symbol: spec.symbol.clone(),
                    decimals: spec.decimals,
                    max_staleness_secs: spec
                        .max_staleness_secs
                        .unwrap_or(config.default_max_staleness_secs),
                },
                Box::new(feed.clone()),
            )?;
            feeds.insert(spec.asset, feed);
        }

        let mut collateral = InMemoryCollateral::new();
        let mut accounts = BTreeSet::new();
        for funding in &scenario.wallets {
            let amount = parse_amount(&funding.amount)
                .with_context(|| format!("funding of {}", funding.holder))?;
            collateral.fund(funding.asset, funding.holder, amount);
            accounts.insert(funding.holder);
        }
        accounts.extend(scenario.steps.iter().flat_map(Step::participants));

        let engine = SynthEngine::new(
            config.risk,
            config.custody_address,
            oracle,
            collateral,
            InMemorySynthetic::new(),
        );

        Ok(Self {
            engine,
            feeds,
            clock,
            accounts,
        })
    }

    pub fn engine(&self) -> &SynthEngine<InMemoryCollateral, InMemorySynthetic> {
        &self.engine
    }

    /// Run every step in order. Engine rejections are recorded; malformed steps abort.
    pub fn run(&mut self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        let mut steps = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let report = match self.apply(step) {
                Ok(()) => {
                    tracing::info!(index, action = step.label(), "Step accepted");
                    StepReport {
                        index,
                        action: step.label(),
                        accepted: true,
                        error: None,
                    }
                }
                Err(StepError::Rejected(e)) => {
                    tracing::warn!(index, action = step.label(), error = %e, "Step rejected");
                    StepReport {
                        index,
                        action: step.label(),
                        accepted: false,
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("step {index} ({})", step.label())));
                }
            };
            steps.push(report);
        }

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            finished_at: self.clock.now(),
            steps,
            accounts: self.accounts(),
            synthetic_supply: self.engine.synthetic_asset().total_supply(),
        })
    }

    pub fn apply(&mut self, step: &Step) -> Result<(), StepError> {
        match step {
            Step::Deposit {
                user,
                asset,
                amount,
            } => self
                .engine
                .deposit_collateral(*user, *asset, parse_amount(amount)?)?,
            Step::Mint { user, amount } => self.engine.mint(*user, parse_amount(amount)?)?,
            Step::Redeem {
                user,
                asset,
                amount,
            } => self
                .engine
                .redeem_collateral(*user, *asset, parse_amount(amount)?)?,
            Step::Burn { user, amount } => self.engine.burn(*user, parse_amount(amount)?)?,
            Step::DepositAndMint {
                user,
                asset,
                collateral_amount,
                mint_amount,
            } => self.engine.deposit_collateral_and_mint(
                *user,
                *asset,
                parse_amount(collateral_amount)?,
                parse_amount(mint_amount)?,
            )?,
            Step::RedeemForSynth {
                user,
                asset,
                collateral_amount,
                burn_amount,
            } => self.engine.redeem_collateral_for_synth(
                *user,
                *asset,
                parse_amount(collateral_amount)?,
                parse_amount(burn_amount)?,
            )?,
            Step::Liquidate {
                liquidator,
                victim,
                asset,
                debt_to_cover,
                to_wallet,
            } => {
                let debt_to_cover = parse_amount(debt_to_cover)?;
                let outcome = if *to_wallet {
                    self.engine
                        .liquidate_to_wallet(*liquidator, *victim, *asset, debt_to_cover)?
                } else {
                    self.engine
                        .liquidate(*liquidator, *victim, *asset, debt_to_cover)?
                };
                tracing::debug!(outcome = ?outcome, "Liquidation outcome");
            }
            Step::SetPrice { asset, price } => {
                let feed = self.feeds.get(asset).ok_or(StepError::UnknownFeed(*asset))?;
                let answer = parse_answer(price)?;
                feed.update_answer(answer, self.clock.now());
            }
            Step::AdvanceTime { seconds } => {
                self.clock.advance(Duration::seconds(*seconds));
            }
        }
        Ok(())
    }

    fn accounts(&self) -> Vec<AccountReport> {
        self.accounts
            .iter()
            .map(|&user| {
                let health_factor = match self.engine.health_factor(user) {
                    Ok(hf) => hf.to_string(),
                    Err(e) => format!("unavailable: {e}"),
                };
                AccountReport {
                    user,
                    debt: self.engine.debt_of(user),
                    synthetic_balance: self.engine.synthetic_asset().balance_of(user),
                    collateral: self
                        .engine
                        .ledger()
                        .positions(user)
                        .into_iter()
                        .map(|(asset, amount)| PositionReport { asset, amount })
                        .collect(),
                    health_factor,
                }
            })
            .collect()
    }
}

fn parse_amount(raw: &str) -> Result<U256, StepError> {
    raw.parse::<U256>()
        .map_err(|_| StepError::InvalidAmount(raw.to_string()))
}

fn parse_answer(raw: &str) -> Result<I256, StepError> {
    I256::from_dec_str(raw).map_err(|_| StepError::InvalidAmount(raw.to_string()))
}
