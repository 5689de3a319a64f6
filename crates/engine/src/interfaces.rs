//! External collaborators the engine calls into.
//!
//! Both traits report success explicitly. The engine treats `Ok(false)` and
//! `Err(_)` the same way: the step failed and the whole operation is abandoned.
//! The engine only calls these after its own bookkeeping and checks are final.

use alloy::primitives::{Address, U256};

/// Custody transfers of collateral assets.
pub trait CollateralToken {
    /// Move `amount` native units of `asset` from `from` to `to`.
    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> anyhow::Result<bool>;
}

/// Supply accounting of the synthetic asset.
pub trait SyntheticAsset {
    /// Create `amount` new units owned by `to`.
    fn mint(&mut self, to: Address, amount: U256) -> anyhow::Result<bool>;

    /// Destroy `amount` units taken from `payer`.
    fn burn_from(&mut self, payer: Address, amount: U256) -> anyhow::Result<bool>;
}
