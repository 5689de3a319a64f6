//! Shared fixture for unit tests.

use std::sync::Arc;

use alloy::primitives::{Address, I256, U256};
use chrono::{DateTime, TimeZone, Utc};

use synth_common::config::RiskParams;
use synth_common::types::AssetConfig;

use crate::engine::SynthEngine;
use crate::fixed_point::PRECISION;
use crate::memory::{InMemoryCollateral, InMemorySynthetic, ManualClock, MockPriceFeed};
use crate::oracle::PriceOracleGateway;

pub(crate) const WETH: Address = Address::repeat_byte(0x11);
pub(crate) const WBTC: Address = Address::repeat_byte(0x22);
pub(crate) const ALICE: Address = Address::repeat_byte(0xA1);
pub(crate) const BOB: Address = Address::repeat_byte(0xB0);
pub(crate) const CUSTODY: Address = Address::repeat_byte(0x5E);

pub(crate) type TestEngine = SynthEngine<InMemoryCollateral, InMemorySynthetic>;

pub(crate) struct Fixture {
    pub engine: TestEngine,
    pub eth_feed: MockPriceFeed,
    pub btc_feed: MockPriceFeed,
    pub clock: ManualClock,
}

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Whole units of an 18-decimal amount.
pub(crate) fn eth(n: u64) -> U256 {
    U256::from(n) * PRECISION
}

/// Whole dollars in 18-decimal USD.
pub(crate) fn usd(n: u64) -> U256 {
    U256::from(n) * PRECISION
}

/// Whole dollars as an 8-decimal feed answer.
pub(crate) fn price(dollars: i64) -> I256 {
    I256::try_from(dollars * 100_000_000).unwrap()
}

/// WETH (18 decimals) at $4000 and WBTC (8 decimals) at $60,000, both on 8-decimal feeds.
/// ALICE holds 10 WETH and 1 WBTC, BOB holds 10 WETH.
pub(crate) fn setup() -> Fixture {
    let clock = ManualClock::new(start());
    let eth_feed = MockPriceFeed::new(8, price(4000), start());
    let btc_feed = MockPriceFeed::new(8, price(60_000), start());

    let mut oracle = PriceOracleGateway::new(Arc::new(clock.clone()));
    oracle
        .register(
            AssetConfig {
                asset: WETH,
                symbol: "WETH".to_string(),
                decimals: 18,
                max_staleness_secs: 10_800,
            },
            Box::new(eth_feed.clone()),
        )
        .unwrap();
    oracle
        .register(
            AssetConfig {
                asset: WBTC,
                symbol: "WBTC".to_string(),
                decimals: 8,
                max_staleness_secs: 10_800,
            },
            Box::new(btc_feed.clone()),
        )
        .unwrap();

    let mut collateral = InMemoryCollateral::new();
    collateral.fund(WETH, ALICE, eth(10));
    collateral.fund(WBTC, ALICE, U256::from(100_000_000u64));
    collateral.fund(WETH, BOB, eth(10));

    let engine = SynthEngine::new(
        RiskParams::default(),
        CUSTODY,
        oracle,
        collateral,
        InMemorySynthetic::new(),
    );

    Fixture {
        engine,
        eth_feed,
        btc_feed,
        clock,
    }
}
