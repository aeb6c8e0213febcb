//! Proportional basket gateway.
//!
//! Holds the external reserve wallets of every account. Withdrawals pay out
//! a pro-rata slice of every reserve, so a redeemer receives the same mix
//! the system holds and cannot cherry-pick the healthiest asset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::reserve::ReserveLedger;
use crate::error::{Error, Result};
use crate::gateway::LiquidityGateway;
use crate::utils::identity::AccountId;
use crate::utils::math::{mul_div, safe_add, Rounding};
use crate::utils::validation::validate_basket;
use crate::valuation::snapshot::SystemSnapshot;

/// In-process gateway paying redemptions pro rata across reserves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasketGateway {
    /// External reserve balances by account, in basket order
    wallets: HashMap<AccountId, Vec<u128>>,
}

impl BasketGateway {
    /// Create a gateway with empty wallets
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an external wallet (faucet / test funding)
    pub fn fund(&mut self, account: &AccountId, index: usize, amount: u128) -> Result<()> {
        let slot = self.slot(account, index);
        *slot = safe_add(*slot, amount)?;
        Ok(())
    }

    /// External balance of `account` in reserve `index`
    pub fn balance_of(&self, account: &AccountId, index: usize) -> u128 {
        self.wallets
            .get(account)
            .and_then(|w| w.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// External balances of `account` for the first `len` reserves
    pub fn wallet(&self, account: &AccountId, len: usize) -> Vec<u128> {
        (0..len).map(|i| self.balance_of(account, i)).collect()
    }

    fn slot(&mut self, account: &AccountId, index: usize) -> &mut u128 {
        let wallet = self.wallets.entry(*account).or_default();
        if wallet.len() <= index {
            wallet.resize(index + 1, 0);
        }
        &mut wallet[index]
    }
}

impl LiquidityGateway for BasketGateway {
    fn deposit(&mut self, ledger: &mut ReserveLedger, from: &AccountId, amounts: &[u128]) -> Result<Vec<u128>> {
        validate_basket(amounts, ledger.len())?;

        for (index, amount) in amounts.iter().enumerate() {
            let available = self.balance_of(from, index);
            if available < *amount {
                return Err(Error::InsufficientBalance {
                    required: *amount,
                    available,
                });
            }
        }

        for (index, amount) in amounts.iter().enumerate() {
            if *amount == 0 {
                continue;
            }
            ledger.credit(index, *amount)?;
            *self.slot(from, index) -= *amount;
        }

        Ok(amounts.to_vec())
    }

    fn withdraw(
        &mut self,
        ledger: &mut ReserveLedger,
        to: &AccountId,
        usd_value: u128,
        snapshot: &SystemSnapshot,
    ) -> Result<Vec<u128>> {
        let total = snapshot.total_system_assets;
        if total == 0 {
            return Err(Error::NoRedeemableValue);
        }
        let value = usd_value.min(total);

        let mut paid = Vec::with_capacity(ledger.len());
        for reserve in ledger.iter() {
            paid.push(mul_div(reserve.balance(), value, total, Rounding::Down)?);
        }

        for (index, amount) in paid.iter().enumerate() {
            if *amount == 0 {
                continue;
            }
            ledger.debit(index, *amount)?;
            let slot = self.slot(to, index);
            *slot = safe_add(*slot, *amount)?;
        }

        tracing::debug!(to = %to.short(), value, ?paid, "basket withdrawal");
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;

    fn ledger() -> ReserveLedger {
        let mut ledger = ReserveLedger::new();
        ledger.register("DAI".into(), 18).unwrap();
        ledger.register("USDC".into(), 6).unwrap();
        ledger
    }

    fn snapshot(tsa: u128) -> SystemSnapshot {
        SystemSnapshot {
            total_system_assets: tsa,
            version: 1,
            ..SystemSnapshot::genesis()
        }
    }

    #[test]
    fn test_deposit_moves_wallet_to_ledger() {
        let mut ledger = ledger();
        let mut gateway = BasketGateway::new();
        let bob = AccountId::from_label("bob");
        gateway.fund(&bob, 0, 30 * WAD).unwrap();
        gateway.fund(&bob, 1, 30_000_000).unwrap();

        let deposited = gateway.deposit(&mut ledger, &bob, &[10 * WAD, 5_000_000]).unwrap();
        assert_eq!(deposited, vec![10 * WAD, 5_000_000]);
        assert_eq!(ledger.balances(), vec![10 * WAD, 5_000_000]);
        assert_eq!(gateway.wallet(&bob, 2), vec![20 * WAD, 25_000_000]);
    }

    #[test]
    fn test_deposit_is_all_or_nothing() {
        let mut ledger = ledger();
        let mut gateway = BasketGateway::new();
        let bob = AccountId::from_label("bob");
        gateway.fund(&bob, 0, 30 * WAD).unwrap();

        let result = gateway.deposit(&mut ledger, &bob, &[10 * WAD, 1]);
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(ledger.balances(), vec![0, 0]);
        assert_eq!(gateway.balance_of(&bob, 0), 30 * WAD);
    }

    #[test]
    fn test_withdraw_is_pro_rata() {
        let mut ledger = ledger();
        ledger.credit(0, 30 * WAD).unwrap();
        ledger.credit(1, 10_000_000).unwrap();
        let mut gateway = BasketGateway::new();
        let alice = AccountId::from_label("alice");

        // A quarter of a 40 USD system
        let paid = gateway.withdraw(&mut ledger, &alice, 10 * WAD, &snapshot(40 * WAD)).unwrap();
        assert_eq!(paid, vec![30 * WAD / 4, 2_500_000]);
        assert_eq!(ledger.balances(), vec![30 * WAD - 30 * WAD / 4, 7_500_000]);
        assert_eq!(gateway.wallet(&alice, 2), paid);
    }

    #[test]
    fn test_withdraw_full_value_empties_reserves() {
        let mut ledger = ledger();
        ledger.credit(0, 3 * WAD).unwrap();
        ledger.credit(1, 7_000_001).unwrap();
        let mut gateway = BasketGateway::new();
        let alice = AccountId::from_label("alice");

        gateway.withdraw(&mut ledger, &alice, 50 * WAD, &snapshot(10 * WAD)).unwrap();
        assert_eq!(ledger.balances(), vec![0, 0]);
    }

    #[test]
    fn test_withdraw_from_empty_system() {
        let mut ledger = ledger();
        let mut gateway = BasketGateway::new();
        let alice = AccountId::from_label("alice");
        assert_eq!(
            gateway.withdraw(&mut ledger, &alice, WAD, &snapshot(0)),
            Err(Error::NoRedeemableValue)
        );
    }
}
