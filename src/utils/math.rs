//! Fixed-point arithmetic and mathematical utilities.
//!
//! All ledger amounts are `u128` base units. Every multiplication that can
//! overflow goes through the checked helpers here, and every division states
//! its rounding direction explicitly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, MAX_DECIMALS, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUNDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Rounding direction for divisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    /// Toward zero; used for amounts paid out to a user
    Down,
    /// Away from zero; used for amounts charged to a user
    Up,
}

impl Rounding {
    /// Map the `round_up` flag used by the external pricing interface
    pub fn from_round_up(round_up: bool) -> Self {
        if round_up {
            Rounding::Up
        } else {
            Rounding::Down
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = WAD;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create from basis points (100 bps = 1%)
    pub fn from_bps(bps: u64) -> Self {
        Self((bps as u128) * Self::SCALE / (BPS_DIVISOR as u128))
    }

    /// `numerator / denominator` rounded down
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self> {
        mul_div(numerator, Self::SCALE, denominator, Rounding::Down).map(Self)
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Multiply an integer amount by this factor
    pub fn mul_amount(&self, amount: u128, rounding: Rounding) -> Result<u128> {
        mul_div(amount, self.0, Self::SCALE, rounding)
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction
    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0.checked_add(other.0).map(Self).ok_or(Error::Overflow {
            operation: "fixed point add".into(),
        })
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_units(self.0, 18))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// Computes `a * b / c` with the given rounding.
///
/// The product is computed as a 256-bit intermediate, so the call only fails
/// when the final quotient does not fit in `u128` or `c` is zero.
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }

    let (hi, lo) = wide_mul(a, b);
    let (quotient, remainder) = wide_div(hi, lo, c).ok_or_else(|| Error::Overflow {
        operation: format!("({} * {}) / {}", a, b, c),
    })?;

    match rounding {
        Rounding::Up if remainder > 0 => safe_add(quotient, 1),
        _ => Ok(quotient),
    }
}

/// Full 128x128 -> 256 bit product as (high, low)
fn wide_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let lo_lo = a_lo * b_lo;
    let hi_lo = a_hi * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_hi = a_hi * b_hi;

    let cross = (lo_lo >> 64) + (hi_lo & MASK) + (lo_hi & MASK);
    let low = (cross << 64) | (lo_lo & MASK);
    let high = hi_hi + (hi_lo >> 64) + (lo_hi >> 64) + (cross >> 64);
    (high, low)
}

/// Divide the 256-bit value (hi, lo) by `d`; None if the quotient overflows u128
fn wide_div(hi: u128, lo: u128, d: u128) -> Option<(u128, u128)> {
    if hi == 0 {
        return Some((lo / d, lo % d));
    }
    if hi >= d {
        return None;
    }

    // Restoring long division, one bit at a time. `rem < d` holds throughout.
    let mut rem = hi;
    let mut quotient = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    Some((quotient, rem))
}

/// `10^exp` as u128
pub fn pow10(exp: u32) -> Result<u128> {
    10u128.checked_pow(exp).ok_or(Error::Overflow {
        operation: format!("10^{}", exp),
    })
}

/// Rescale an amount from `from` decimals to `to` decimals
pub fn rescale(amount: u128, from: u8, to: u8, rounding: Rounding) -> Result<u128> {
    if from == to {
        return Ok(amount);
    }
    if to > from {
        safe_mul(amount, pow10((to - from) as u32)?)
    } else {
        mul_div(amount, 1, pow10((from - to) as u32)?, rounding)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fee in basis points, rounded up so the protocol never undercharges
pub fn calculate_fee_bps(amount: u128, fee_bps: u64) -> Result<u128> {
    mul_div(amount, fee_bps as u128, BPS_DIVISOR as u128, Rounding::Up)
}

/// Amount left after deducting a basis-point fee
pub fn amount_after_fee(amount: u128, fee_bps: u64) -> Result<u128> {
    let fee = calculate_fee_bps(amount, fee_bps)?;
    safe_sub(amount, fee)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HUMAN-READABLE UNITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a decimal string ("12.5") into base units with `decimals` precision
pub fn parse_units(text: &str, decimals: u8) -> Result<u128> {
    let invalid = |reason: String| Error::InvalidParameter {
        name: "amount".into(),
        reason,
    };

    if decimals > MAX_DECIMALS {
        return Err(invalid(format!("{} decimals exceeds maximum {}", decimals, MAX_DECIMALS)));
    }

    let value = Decimal::from_str(text.trim()).map_err(|e| invalid(e.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid(format!("{} is negative", text)));
    }

    let mut scaled = value.normalize();
    if scaled.scale() > decimals as u32 {
        return Err(invalid(format!(
            "{} has more than {} fractional digits",
            text, decimals
        )));
    }

    scaled.rescale(decimals as u32);
    if scaled.scale() != decimals as u32 {
        return Err(Error::Overflow {
            operation: format!("parse {} with {} decimals", text, decimals),
        });
    }

    u128::try_from(scaled.mantissa().abs()).map_err(|e| invalid(e.to_string()))
}

/// Format base units as a decimal string, trimming trailing zeros
pub fn format_units(amount: u128, decimals: u8) -> String {
    let formatted = i128::try_from(amount)
        .ok()
        .and_then(|mantissa| Decimal::try_from_i128_with_scale(mantissa, decimals as u32).ok())
        .map(|d| d.normalize().to_string());

    match formatted {
        Some(s) => s,
        None if decimals == 0 => amount.to_string(),
        None => {
            // Outside Decimal's 96-bit mantissa: fall back to integer/fraction split.
            let unit = 10u128.pow(decimals.min(38) as u32);
            format!("{}.{:0width$}", amount / unit, amount % unit, width = decimals as usize)
        }
    }
}
