//! Scenario replay for the synthetic asset engine.
//!
//! A scenario file registers collateral assets with mock price feeds, funds
//! wallets, and then runs a list of steps against a [`synth_engine::SynthEngine`]
//! backed by in-memory collaborators. Rejected steps are recorded, not fatal.

pub mod scenario;
