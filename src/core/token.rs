//! DUSD liability token ledger.
//!
//! This module implements the pegged liability unit:
//! - Balance tracking
//! - Allowances (prior transfer authorization for staking)
//! - Mint, burn and transfer
//! - Supply management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::constants::DUSD_DECIMALS;
use crate::utils::identity::AccountId;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// LIABILITY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// The DUSD liability ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiabilityToken {
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// Total supply in base units
    total_supply: u128,
    /// Balances by account
    balances: HashMap<AccountId, u128>,
    /// Allowances keyed by (owner, spender)
    allowances: HashMap<(AccountId, AccountId), u128>,
}

impl Default for LiabilityToken {
    fn default() -> Self {
        Self::new()
    }
}

impl LiabilityToken {
    /// Create an empty DUSD ledger
    pub fn new() -> Self {
        Self {
            symbol: "DUSD".to_string(),
            decimals: DUSD_DECIMALS,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Get balance of an account
    pub fn balance_of(&self, owner: &AccountId) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Remaining allowance `owner` granted to `spender`
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Number of accounts holding a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint new units
    pub fn mint(&mut self, to: &AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let new_supply = safe_add(self.total_supply, amount)?;
        let new_balance = safe_add(self.balance_of(to), amount)?;

        self.balances.insert(*to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burn units held by `from`
    pub fn burn(&mut self, from: &AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        self.debit(from, amount)?;
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSFERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Transfer units between accounts
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if from == to {
            // No-op for self-transfer, but the balance must still cover it
            let available = self.balance_of(from);
            if available < amount {
                return Err(Error::InsufficientBalance {
                    required: amount,
                    available,
                });
            }
            return Ok(());
        }

        self.debit(from, amount)?;
        let to_balance = safe_add(self.balance_of(to), amount)?;
        self.balances.insert(*to, to_balance);
        Ok(())
    }

    /// Set the allowance `owner` grants to `spender`
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), amount);
        }
    }

    /// Move `amount` from `owner` to `spender` under a prior approval.
    ///
    /// Missing allowance or missing funds both surface as
    /// `InsufficientAuthorization`, reporting the smaller of the two.
    pub fn transfer_from(&mut self, spender: &AccountId, owner: &AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let allowance = self.allowance(owner, spender);
        let balance = self.balance_of(owner);
        if allowance < amount || balance < amount {
            return Err(Error::InsufficientAuthorization {
                required: amount,
                approved: allowance.min(balance),
            });
        }

        // u128::MAX is an unlimited approval
        if allowance != u128::MAX {
            self.approve(owner, spender, allowance - amount);
        }
        self.transfer(owner, spender, amount)
    }

    fn debit(&mut self, from: &AccountId, amount: u128) -> Result<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        Ok(())
    }

    /// Sum of balances equals total supply
    pub fn check_invariants(&self) -> Result<()> {
        let sum = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .ok_or_else(|| Error::InvariantViolation("DUSD balance sum overflows".into()))?;
        if sum != self.total_supply {
            return Err(Error::InvariantViolation(format!(
                "DUSD balances sum to {} but supply is {}",
                sum, self.total_supply
            )));
        }
        Ok(())
    }
}
