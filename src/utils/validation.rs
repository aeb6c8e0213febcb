//! Input validation utilities.
//!
//! Validation runs before any state is touched so that rejected inputs never
//! reach the ledgers.

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// Validate a per-reserve amount vector against the registered reserve count
pub fn validate_basket(amounts: &[u128], reserve_count: usize) -> Result<()> {
    if amounts.len() != reserve_count {
        return Err(Error::InvalidParameter {
            name: "amounts".into(),
            reason: format!("expected {} entries, got {}", reserve_count, amounts.len()),
        });
    }
    if amounts.iter().all(|a| *a == 0) {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a decimal precision (reserve balance or price answer)
pub fn validate_decimals(decimals: u8, name: &str) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} decimals exceeds maximum {}", decimals, MAX_DECIMALS),
        });
    }
    Ok(())
}

/// Validate a fee in basis points
pub fn validate_fee_bps(fee_bps: u64, name: &str) -> Result<()> {
    if fee_bps > MAX_FEE_BPS {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} bps exceeds maximum {} bps", fee_bps, MAX_FEE_BPS),
        });
    }
    Ok(())
}
