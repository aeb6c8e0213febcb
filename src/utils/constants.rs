//! Protocol constants.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// DUSD decimals (base units per DUSD = 10^18)
pub const DUSD_DECIMALS: u8 = 18;

/// One DUSD / one USD in base units
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Largest decimal precision accepted for reserves and price answers
pub const MAX_DECIMALS: u8 = 28;

/// Decimals used for oracle answers entered by hand (CLI, tests)
pub const DEFAULT_PRICE_DECIMALS: u8 = 8;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE / SNAPSHOT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum price age accepted by a sync - 1 hour
pub const MAX_PRICE_AGE_SECS: u64 = 3600;

/// Maximum snapshot age accepted when auto-sync is disabled - 10 minutes
pub const SNAPSHOT_TOLERANCE_SECS: u64 = 600;

/// Price history kept per reserve by the in-memory feed
pub const PRICE_HISTORY_LEN: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default mint fee - none
pub const MINT_FEE_BPS: u64 = 0;

/// Default redeem fee - none
pub const REDEEM_FEE_BPS: u64 = 0;

/// Fees above this are rejected by config validation - 10%
pub const MAX_FEE_BPS: u64 = 1_000;

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scale factor for reward-per-unit accumulators
pub const REWARD_SCALE: u128 = WAD;

/// Label the staking pool account is derived from
pub const STAKE_POOL_LABEL: &str = "dusd/stake-pool";

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Events retained in memory by default
pub const MAX_EVENTS: usize = 1_000;

/// Length of an account id / hash in bytes
pub const HASH_LENGTH: usize = 32;
