//! Liquidity gateway: the only path that moves reserve balances.
//!
//! The protocol never touches reserve balances directly. Deposits and
//! withdrawals go through a `LiquidityGateway`, which owns the exchange math
//! and reports the amounts that actually moved.

pub mod basket;

pub use basket::*;

use crate::core::reserve::ReserveLedger;
use crate::error::Result;
use crate::utils::identity::AccountId;
use crate::valuation::snapshot::SystemSnapshot;

/// Moves reserve assets between external accounts and the reserve ledger
pub trait LiquidityGateway {
    /// Pull `amounts` (basket order) from `from` into the ledger.
    /// Returns the amounts actually deposited.
    fn deposit(&mut self, ledger: &mut ReserveLedger, from: &AccountId, amounts: &[u128]) -> Result<Vec<u128>>;

    /// Pay reserves worth `usd_value` (wad) at `snapshot` to `to`.
    /// Returns the amounts paid per reserve.
    fn withdraw(
        &mut self,
        ledger: &mut ReserveLedger,
        to: &AccountId,
        usd_value: u128,
        snapshot: &SystemSnapshot,
    ) -> Result<Vec<u128>>;
}
