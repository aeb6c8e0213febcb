//! Stake buffer.
//!
//! Stakers lock DUSD in a pool that absorbs the system deficit before any
//! other holder. Nothing is ever written off: each staker's share of the
//! loss is recomputed from the latest deficit on every read, so a recovery
//! of reserve prices frees the stake again without an unlock step.
//!
//! Rewards follow the reward-per-unit accumulator pattern: the pool keeps a
//! running `reward_per_unit` and each account settles against its own
//! checkpoint whenever its stake changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::constants::{REWARD_SCALE, STAKE_POOL_LABEL};
use crate::utils::identity::AccountId;
use crate::utils::math::{mul_div, safe_add, safe_sub, Rounding};

// ═══════════════════════════════════════════════════════════════════════════════
// STAKER ACCOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-staker state. Created on first stake, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerAccount {
    /// Owner
    pub owner: AccountId,
    /// DUSD held by the pool on the owner's behalf
    pub staked_amount: u128,
    /// `reward_per_unit` at the last settlement
    pub reward_checkpoint: u128,
    /// Settled but unclaimed rewards
    pub pending_rewards: u128,
    /// Set by `exit`, cleared by a later stake
    pub exited: bool,
}

impl StakerAccount {
    fn new(owner: AccountId, reward_checkpoint: u128) -> Self {
        Self {
            owner,
            staked_amount: 0,
            reward_checkpoint,
            pending_rewards: 0,
            exited: false,
        }
    }
}

/// Derived staker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakerStatus {
    /// No stake account, or nothing staked yet
    Unstaked,
    /// Stake fully withdrawable
    Staked,
    /// Part of the stake is allocated to the current deficit
    LossExposed,
    /// Account has exited
    Exited,
}

impl std::fmt::Display for StakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstaked => write!(f, "unstaked"),
            Self::Staked => write!(f, "staked"),
            Self::LossExposed => write!(f, "loss-exposed"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKE BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

/// Junior capital pool absorbing the system deficit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeBuffer {
    /// Ledger account holding staked DUSD
    pool_account: AccountId,
    /// Sum of all `staked_amount`
    total_staked: u128,
    /// Accumulated rewards per staked unit, scaled by `REWARD_SCALE`
    reward_per_unit: u128,
    /// Timestamp rewards were last accrued up to
    last_reward_update: u64,
    /// Accounts by owner
    accounts: HashMap<AccountId, StakerAccount>,
}

impl Default for StakeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StakeBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            pool_account: AccountId::from_label(STAKE_POOL_LABEL),
            total_staked: 0,
            reward_per_unit: 0,
            last_reward_update: 0,
            accounts: HashMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Account holding staked DUSD on the liability ledger
    pub fn pool_account(&self) -> AccountId {
        self.pool_account
    }

    /// Total staked DUSD
    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    /// Current reward accumulator
    pub fn reward_per_unit(&self) -> u128 {
        self.reward_per_unit
    }

    /// Timestamp rewards were last accrued up to
    pub fn last_reward_update(&self) -> u64 {
        self.last_reward_update
    }

    /// Account for `owner`, if it ever staked
    pub fn account(&self, owner: &AccountId) -> Option<&StakerAccount> {
        self.accounts.get(owner)
    }

    /// Number of stake accounts
    pub fn staker_count(&self) -> usize {
        self.accounts.len()
    }

    /// Iterate over stake accounts
    pub fn accounts(&self) -> impl Iterator<Item = &StakerAccount> {
        self.accounts.values()
    }

    /// Staked amount of `owner`
    pub fn staked_of(&self, owner: &AccountId) -> u128 {
        self.accounts.get(owner).map(|a| a.staked_amount).unwrap_or(0)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOSS ALLOCATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pool-wide loss: the part of the deficit the buffer can cover
    pub fn covered_deficit(&self, deficit: u128) -> u128 {
        deficit.min(self.total_staked)
    }

    /// Deficit left after the whole buffer is consumed
    pub fn residual_deficit(&self, deficit: u128) -> u128 {
        deficit.saturating_sub(self.total_staked)
    }

    /// `owner`'s pro-rata share of the covered deficit, rounded up
    pub fn allocated_loss(&self, owner: &AccountId, deficit: u128) -> Result<u128> {
        let staked = self.staked_of(owner);
        if staked == 0 || self.total_staked == 0 {
            return Ok(0);
        }
        let loss = mul_div(
            staked,
            self.covered_deficit(deficit),
            self.total_staked,
            Rounding::Up,
        )?;
        Ok(loss.min(staked))
    }

    /// Stake `owner` can withdraw at `deficit`
    pub fn withdraw_able(&self, owner: &AccountId, deficit: u128) -> Result<u128> {
        let staked = self.staked_of(owner);
        Ok(staked - self.allocated_loss(owner, deficit)?)
    }

    /// Lifecycle state of `owner` at `deficit`
    pub fn status(&self, owner: &AccountId, deficit: u128) -> Result<StakerStatus> {
        let Some(account) = self.accounts.get(owner) else {
            return Ok(StakerStatus::Unstaked);
        };
        if account.exited {
            return Ok(StakerStatus::Exited);
        }
        if account.staked_amount == 0 {
            return Ok(StakerStatus::Unstaked);
        }
        if self.allocated_loss(owner, deficit)? > 0 {
            Ok(StakerStatus::LossExposed)
        } else {
            Ok(StakerStatus::Staked)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAKE / WITHDRAW
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a stake. The caller moves the DUSD to the pool account and
    /// accrues rewards up to now beforehand. Returns the new staked amount.
    pub fn stake(&mut self, owner: &AccountId, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let new_total = safe_add(self.total_staked, amount)?;
        self.settle(owner)?;

        let account = self.account_mut(owner);
        account.staked_amount = safe_add(account.staked_amount, amount)?;
        account.exited = false;
        let staked = account.staked_amount;

        self.total_staked = new_total;
        Ok(staked)
    }

    /// Record a withdrawal bounded by `withdraw_able` at `deficit`. Returns
    /// the remaining staked amount.
    pub fn withdraw(&mut self, owner: &AccountId, amount: u128, deficit: u128) -> Result<u128> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        let available = self.withdraw_able(owner, deficit)?;
        if amount > available {
            return Err(Error::WithdrawExceedsAvailable {
                requested: amount,
                available,
            });
        }

        self.settle(owner)?;
        let account = self.account_mut(owner);
        account.staked_amount = safe_sub(account.staked_amount, amount)?;
        let remaining = account.staked_amount;

        self.total_staked = safe_sub(self.total_staked, amount)?;
        Ok(remaining)
    }

    /// Mark `owner` as exited; no-op for unknown owners
    pub fn mark_exited(&mut self, owner: &AccountId) {
        if let Some(account) = self.accounts.get_mut(owner) {
            account.exited = true;
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REWARDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accumulator value after distributing `emitted` over the current stake.
    /// Emissions while nothing is staked are not distributed.
    pub fn reward_per_unit_with(&self, emitted: u128) -> Result<u128> {
        if self.total_staked == 0 || emitted == 0 {
            return Ok(self.reward_per_unit);
        }
        let increment = mul_div(emitted, REWARD_SCALE, self.total_staked, Rounding::Down)?;
        safe_add(self.reward_per_unit, increment)
    }

    /// Distribute `emitted` rewards and move the accrual clock to `now`
    pub fn accrue(&mut self, emitted: u128, now: u64) -> Result<()> {
        self.reward_per_unit = self.reward_per_unit_with(emitted)?;
        self.last_reward_update = now.max(self.last_reward_update);
        Ok(())
    }

    /// Rewards earned by `owner` against accumulator value `reward_per_unit`
    pub fn earned_at(&self, owner: &AccountId, reward_per_unit: u128) -> Result<u128> {
        let Some(account) = self.accounts.get(owner) else {
            return Ok(0);
        };
        let delta = reward_per_unit.saturating_sub(account.reward_checkpoint);
        let fresh = mul_div(account.staked_amount, delta, REWARD_SCALE, Rounding::Down)?;
        safe_add(fresh, account.pending_rewards)
    }

    /// Rewards earned by `owner` as of the last accrual
    pub fn earned(&self, owner: &AccountId) -> Result<u128> {
        self.earned_at(owner, self.reward_per_unit)
    }

    /// Settle and zero `owner`'s rewards, returning the amount to pay
    pub fn take_rewards(&mut self, owner: &AccountId) -> Result<u128> {
        if !self.accounts.contains_key(owner) {
            return Ok(0);
        }
        self.settle(owner)?;
        let account = self.account_mut(owner);
        Ok(std::mem::take(&mut account.pending_rewards))
    }

    fn settle(&mut self, owner: &AccountId) -> Result<()> {
        let earned = self.earned(owner)?;
        let reward_per_unit = self.reward_per_unit;
        let account = self.account_mut(owner);
        account.pending_rewards = earned;
        account.reward_checkpoint = reward_per_unit;
        Ok(())
    }

    fn account_mut(&mut self, owner: &AccountId) -> &mut StakerAccount {
        let checkpoint = self.reward_per_unit;
        self.accounts
            .entry(*owner)
            .or_insert_with(|| StakerAccount::new(*owner, checkpoint))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INVARIANTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// `total_staked` equals the sum of account stakes
    pub fn check_invariants(&self) -> Result<()> {
        let sum = self
            .accounts
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.staked_amount))
            .ok_or_else(|| Error::InvariantViolation("staked sum overflows".into()))?;
        if sum != self.total_staked {
            return Err(Error::InvariantViolation(format!(
                "stake accounts sum to {} but total_staked is {}",
                sum, self.total_staked
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;

    fn alice() -> AccountId {
        AccountId::from_label("alice")
    }

    fn bob() -> AccountId {
        AccountId::from_label("bob")
    }

    #[test]
    fn test_stake_and_withdraw_without_deficit() {
        let mut buffer = StakeBuffer::new();
        assert_eq!(buffer.stake(&alice(), 10 * WAD).unwrap(), 10 * WAD);
        assert_eq!(buffer.withdraw_able(&alice(), 0).unwrap(), 10 * WAD);

        assert_eq!(buffer.withdraw(&alice(), 2 * WAD, 0).unwrap(), 8 * WAD);
        assert_eq!(buffer.withdraw_able(&alice(), 0).unwrap(), 8 * WAD);
        assert_eq!(buffer.total_staked(), 8 * WAD);
        assert_eq!(buffer.staker_count(), 1);
        assert!(buffer.check_invariants().is_ok());
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut buffer = StakeBuffer::new();
        assert_eq!(buffer.stake(&alice(), 0), Err(Error::ZeroAmount));
        buffer.stake(&alice(), WAD).unwrap();
        assert_eq!(buffer.withdraw(&alice(), 0, 0), Err(Error::ZeroAmount));
    }

    #[test]
    fn test_deficit_reduces_withdraw_able() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 8 * WAD).unwrap();

        assert_eq!(buffer.allocated_loss(&alice(), 4 * WAD).unwrap(), 4 * WAD);
        assert_eq!(buffer.withdraw_able(&alice(), 4 * WAD).unwrap(), 4 * WAD);

        let err = buffer.withdraw(&alice(), 5 * WAD, 4 * WAD).unwrap_err();
        assert_eq!(
            err,
            Error::WithdrawExceedsAvailable {
                requested: 5 * WAD,
                available: 4 * WAD
            }
        );
        assert_eq!(
            err.to_string(),
            "Withdrawing more than staked or illiquid due to system deficit"
        );
    }

    #[test]
    fn test_deficit_larger_than_pool() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 10 * WAD).unwrap();

        assert_eq!(buffer.withdraw_able(&alice(), 35 * WAD).unwrap(), 0);
        assert_eq!(buffer.residual_deficit(35 * WAD), 25 * WAD);
        assert!(buffer.withdraw(&alice(), 1, 35 * WAD).is_err());
    }

    #[test]
    fn test_loss_is_pro_rata_and_rounds_against_staker() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 1).unwrap();
        buffer.stake(&bob(), 2).unwrap();

        // 1 * 1 / 3 rounds up to 1
        assert_eq!(buffer.allocated_loss(&alice(), 1).unwrap(), 1);
        assert_eq!(buffer.withdraw_able(&alice(), 1).unwrap(), 0);
        // 2 * 1 / 3 rounds up to 1
        assert_eq!(buffer.withdraw_able(&bob(), 1).unwrap(), 1);
    }

    #[test]
    fn test_recovery_restores_withdraw_able() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 10 * WAD).unwrap();
        assert_eq!(buffer.withdraw_able(&alice(), 4 * WAD).unwrap(), 6 * WAD);
        assert_eq!(buffer.withdraw_able(&alice(), 0).unwrap(), 10 * WAD);
    }

    #[test]
    fn test_status_transitions() {
        let mut buffer = StakeBuffer::new();
        assert_eq!(buffer.status(&alice(), 0).unwrap(), StakerStatus::Unstaked);

        buffer.stake(&alice(), 10 * WAD).unwrap();
        assert_eq!(buffer.status(&alice(), 0).unwrap(), StakerStatus::Staked);
        assert_eq!(buffer.status(&alice(), WAD).unwrap(), StakerStatus::LossExposed);

        buffer.mark_exited(&alice());
        assert_eq!(buffer.status(&alice(), 0).unwrap(), StakerStatus::Exited);

        buffer.stake(&alice(), WAD).unwrap();
        assert_eq!(buffer.status(&alice(), 0).unwrap(), StakerStatus::Staked);
    }

    #[test]
    fn test_rewards_accumulate_pro_rata() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 10 * WAD).unwrap();
        buffer.accrue(100 * WAD, 100).unwrap();
        assert_eq!(buffer.earned(&alice()).unwrap(), 100 * WAD);

        buffer.stake(&bob(), 30 * WAD).unwrap();
        buffer.accrue(40 * WAD, 200).unwrap();
        assert_eq!(buffer.earned(&alice()).unwrap(), 110 * WAD);
        assert_eq!(buffer.earned(&bob()).unwrap(), 30 * WAD);

        assert_eq!(buffer.take_rewards(&alice()).unwrap(), 110 * WAD);
        assert_eq!(buffer.earned(&alice()).unwrap(), 0);
        assert_eq!(buffer.last_reward_update(), 200);
    }

    #[test]
    fn test_rewards_accrue_on_full_stake_during_deficit() {
        let mut buffer = StakeBuffer::new();
        buffer.stake(&alice(), 10 * WAD).unwrap();
        buffer.accrue(10 * WAD, 10).unwrap();
        // Deficit does not enter reward accrual
        assert_eq!(buffer.earned(&alice()).unwrap(), 10 * WAD);
    }

    #[test]
    fn test_emissions_with_empty_pool_are_dropped() {
        let mut buffer = StakeBuffer::new();
        buffer.accrue(50 * WAD, 10).unwrap();
        buffer.stake(&alice(), WAD).unwrap();
        assert_eq!(buffer.earned(&alice()).unwrap(), 0);
    }
}
