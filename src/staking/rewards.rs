//! Reward stream capability.
//!
//! The stake buffer does not hold reward tokens itself. It asks the stream
//! how much was emitted to the pool over an interval and asks it to pay a
//! staker on claim.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::identity::AccountId;
use crate::utils::math::{safe_add, safe_mul};

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD STREAM CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of staking rewards
pub trait RewardStream {
    /// Rewards emitted to the pool over `[from, to)`
    fn emitted(&self, from: u64, to: u64) -> Result<u128>;

    /// Pay a claimed reward to `to`
    fn pay(&mut self, to: &AccountId, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINEAR STREAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Constant-rate emission over a fixed window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearRewardStream {
    /// Reward units emitted per second
    pub rate_per_second: u128,
    /// Emission start
    pub starts_at: u64,
    /// Emission end (exclusive)
    pub ends_at: u64,
    /// Paid so far by recipient
    paid: HashMap<AccountId, u128>,
    /// Total paid so far
    total_paid: u128,
}

impl LinearRewardStream {
    /// Create a stream emitting `rate_per_second` over `[starts_at, ends_at)`
    pub fn new(rate_per_second: u128, starts_at: u64, ends_at: u64) -> Result<Self> {
        if ends_at < starts_at {
            return Err(Error::InvalidParameter {
                name: "ends_at".into(),
                reason: format!("{} is before start {}", ends_at, starts_at),
            });
        }
        Ok(Self {
            rate_per_second,
            starts_at,
            ends_at,
            paid: HashMap::new(),
            total_paid: 0,
        })
    }

    /// Everything the stream will ever emit
    pub fn budget(&self) -> Result<u128> {
        safe_mul(self.rate_per_second, (self.ends_at - self.starts_at) as u128)
    }

    /// Total paid to `account`
    pub fn paid_to(&self, account: &AccountId) -> u128 {
        self.paid.get(account).copied().unwrap_or(0)
    }

    /// Total paid to everyone
    pub fn total_paid(&self) -> u128 {
        self.total_paid
    }
}

impl RewardStream for LinearRewardStream {
    fn emitted(&self, from: u64, to: u64) -> Result<u128> {
        let start = from.max(self.starts_at);
        let end = to.min(self.ends_at);
        if end <= start {
            return Ok(0);
        }
        safe_mul(self.rate_per_second, (end - start) as u128)
    }

    fn pay(&mut self, to: &AccountId, amount: u128) -> Result<()> {
        let total_paid = safe_add(self.total_paid, amount)?;
        let budget = self.budget()?;
        if total_paid > budget {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: budget - self.total_paid,
            });
        }

        let paid = safe_add(self.paid_to(to), amount)?;
        self.paid.insert(*to, paid);
        self.total_paid = total_paid;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NO REWARDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Stream that never emits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoRewards;

impl RewardStream for NoRewards {
    fn emitted(&self, _from: u64, _to: u64) -> Result<u128> {
        Ok(0)
    }

    fn pay(&mut self, _to: &AccountId, amount: u128) -> Result<()> {
        if amount > 0 {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: 0,
            });
        }
        Ok(())
    }
}
