//! Staking buffer: junior capital that absorbs the deficit first.
//!
//! Components:
//! - Stake buffer (stake, withdraw, loss allocation, reward accrual)
//! - Reward stream capability

pub mod buffer;
pub mod rewards;

pub use buffer::*;
pub use rewards::*;
