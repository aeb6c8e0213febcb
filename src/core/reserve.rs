//! Reserve ledger.
//!
//! Pure bookkeeping of the reserve assets backing DUSD. Balances change only
//! through the liquidity gateway's deposit/withdraw path; identities and
//! decimals are immutable once registered.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::identity::ReserveId;
use crate::utils::math::{safe_add, safe_sub};
use crate::utils::validation::validate_decimals;

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE
// ═══════════════════════════════════════════════════════════════════════════════

/// A registered reserve asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    /// Reserve identity
    id: ReserveId,
    /// Decimal precision of `balance`
    decimals: u8,
    /// Amount held by the protocol, in the reserve's base units
    balance: u128,
}

impl Reserve {
    /// Reserve identity
    pub fn id(&self) -> &ReserveId {
        &self.id
    }

    /// Decimal precision
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Protocol-held balance
    pub fn balance(&self) -> u128 {
        self.balance
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered set of reserves plus protocol-held receivables.
///
/// Registration order is the index order used by basket amount vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveLedger {
    reserves: Vec<Reserve>,
    /// Receivables owed to the protocol, counted at face value (wad)
    receivables: u128,
}

impl ReserveLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reserve; returns its basket index
    pub fn register(&mut self, id: ReserveId, decimals: u8) -> Result<usize> {
        validate_decimals(decimals, "decimals")?;
        if self.index_of(&id).is_some() {
            return Err(Error::ReserveAlreadyRegistered(id.to_string()));
        }
        self.reserves.push(Reserve {
            id,
            decimals,
            balance: 0,
        });
        Ok(self.reserves.len() - 1)
    }

    /// Number of registered reserves
    pub fn len(&self) -> usize {
        self.reserves.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.reserves.is_empty()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Reserve> {
        self.reserves.iter()
    }

    /// Basket index of a reserve
    pub fn index_of(&self, id: &ReserveId) -> Option<usize> {
        self.reserves.iter().position(|r| &r.id == id)
    }

    /// Reserve by id
    pub fn get(&self, id: &ReserveId) -> Result<&Reserve> {
        self.reserves
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| Error::ReserveNotFound(id.to_string()))
    }

    /// Reserve by basket index
    pub fn at(&self, index: usize) -> Result<&Reserve> {
        self.reserves
            .get(index)
            .ok_or_else(|| Error::ReserveNotFound(format!("index {}", index)))
    }

    /// Balances in basket order
    pub fn balances(&self) -> Vec<u128> {
        self.reserves.iter().map(|r| r.balance).collect()
    }

    /// Protocol-held receivables (wad)
    pub fn receivables(&self) -> u128 {
        self.receivables
    }

    /// Set protocol-held receivables (wad)
    pub fn set_receivables(&mut self, amount: u128) {
        self.receivables = amount;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GATEWAY MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add to a reserve balance
    pub fn credit(&mut self, index: usize, amount: u128) -> Result<()> {
        let reserve = self.slot(index)?;
        reserve.balance = safe_add(reserve.balance, amount)?;
        Ok(())
    }

    /// Remove from a reserve balance
    pub fn debit(&mut self, index: usize, amount: u128) -> Result<()> {
        let reserve = self.slot(index)?;
        if reserve.balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: reserve.balance,
            });
        }
        reserve.balance = safe_sub(reserve.balance, amount)?;
        Ok(())
    }

    fn slot(&mut self, index: usize) -> Result<&mut Reserve> {
        self.reserves
            .get_mut(index)
            .ok_or_else(|| Error::ReserveNotFound(format!("index {}", index)))
    }
}
