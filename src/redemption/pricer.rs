//! Redemption pricer - uniform haircut for DUSD holders.
//!
//! Loss waterfall:
//! 1. The stake buffer absorbs the deficit up to `total_staked`
//! 2. Whatever remains is spread evenly over every non-staked DUSD
//!
//! The rate is a pure function of one snapshot and the buffer size, and is
//! kept as an exact fraction, so every redeemer at that
//! `(snapshot_version, total_staked)` pair is priced identically no matter
//! the order of requests. Staking between syncs moves the rate without a new
//! snapshot version, and only ever upwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::math::{mul_div, FixedPoint, Rounding};
use crate::valuation::snapshot::SystemSnapshot;

// ═══════════════════════════════════════════════════════════════════════════════
// REDEMPTION RATE
// ═══════════════════════════════════════════════════════════════════════════════

/// USD paid per DUSD, as `numerator / denominator`, never above one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionPricer {
    numerator: u128,
    denominator: u128,
    /// Snapshot version the rate was derived from
    snapshot_version: u64,
    /// Buffer size the rate was derived from
    total_staked: u128,
}

impl RedemptionPricer {
    /// Price at par
    pub fn par() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
            snapshot_version: 0,
            total_staked: 0,
        }
    }

    /// Derive the rate from a snapshot and the current buffer size.
    ///
    /// `ex_buffer = supply - staked`, `residual = max(0, deficit - staked)`,
    /// `rate = (ex_buffer - residual) / ex_buffer`, or par with nothing
    /// outside the buffer.
    pub fn from_snapshot(snapshot: &SystemSnapshot, total_staked: u128) -> Self {
        let ex_buffer = snapshot.liability_supply.saturating_sub(total_staked);
        let residual = snapshot.deficit.saturating_sub(total_staked);

        if ex_buffer == 0 {
            return Self {
                snapshot_version: snapshot.version,
                total_staked,
                ..Self::par()
            };
        }

        Self {
            numerator: ex_buffer.saturating_sub(residual),
            denominator: ex_buffer,
            snapshot_version: snapshot.version,
            total_staked,
        }
    }

    /// Raw `(numerator, denominator)`
    pub fn fraction(&self) -> (u128, u128) {
        (self.numerator, self.denominator)
    }

    /// Snapshot version the rate belongs to
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    /// Stake buffer size the rate belongs to
    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    /// True when redemption pays less than par
    pub fn is_impaired(&self) -> bool {
        self.numerator < self.denominator
    }

    /// Rate as an 18-decimal fixed-point number (display only)
    pub fn as_fixed(&self) -> FixedPoint {
        FixedPoint::from_ratio(self.numerator, self.denominator).unwrap_or(FixedPoint::ZERO)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONVERSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// USD value (wad) of `amount` DUSD
    pub fn value_of(&self, amount: u128, rounding: Rounding) -> Result<u128> {
        mul_div(amount, self.numerator, self.denominator, rounding)
    }

    /// Boolean-flag form of `value_of`
    pub fn dusd_to_usd(&self, amount: u128, round_up: bool) -> Result<u128> {
        self.value_of(amount, Rounding::from_round_up(round_up))
    }

    /// DUSD units worth `value` USD; the inverse of `value_of`
    pub fn units_for_value(&self, value: u128, rounding: Rounding) -> Result<u128> {
        if self.numerator == 0 {
            return Err(Error::NoRedeemableValue);
        }
        mul_div(value, self.denominator, self.numerator, rounding)
    }
}

impl Default for RedemptionPricer {
    fn default() -> Self {
        Self::par()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;

    fn snapshot(supply: u128, tsa: u128) -> SystemSnapshot {
        SystemSnapshot {
            total_system_assets: tsa,
            total_assets: supply,
            liability_supply: supply,
            deficit: supply.saturating_sub(tsa),
            version: 7,
            ..SystemSnapshot::genesis()
        }
    }

    #[test]
    fn test_par_without_deficit() {
        let pricer = RedemptionPricer::from_snapshot(&snapshot(110 * WAD, 110 * WAD), 10 * WAD);
        assert!(!pricer.is_impaired());
        assert_eq!(pricer.value_of(3 * WAD, Rounding::Down).unwrap(), 3 * WAD);
        assert_eq!(pricer.snapshot_version(), 7);
    }

    #[test]
    fn test_buffer_covers_deficit() {
        // Deficit 4 with 8 staked: holders are untouched
        let pricer = RedemptionPricer::from_snapshot(&snapshot(110 * WAD, 106 * WAD), 8 * WAD);
        assert!(!pricer.is_impaired());
        assert_eq!(pricer.dusd_to_usd(WAD, false).unwrap(), WAD);
    }

    #[test]
    fn test_residual_deficit_haircut() {
        // Supply 120, assets 85.35, staked 10: rate = 85.35 / 110
        let tsa = 85 * WAD + 35 * WAD / 100;
        let pricer = RedemptionPricer::from_snapshot(&snapshot(120 * WAD, tsa), 10 * WAD);

        assert!(pricer.is_impaired());
        assert_eq!(pricer.fraction(), (tsa, 110 * WAD));

        let one = pricer.dusd_to_usd(WAD, false).unwrap();
        assert!(one > 7 * WAD / 10 && one < 8 * WAD / 10);

        let up = pricer.dusd_to_usd(WAD, true).unwrap();
        assert_eq!(up, one + 1);
    }

    #[test]
    fn test_rate_keyed_on_version_and_stake() {
        let tsa = 85 * WAD + 35 * WAD / 100;
        let snap = snapshot(120 * WAD, tsa);
        let before = RedemptionPricer::from_snapshot(&snap, 10 * WAD);
        let after = RedemptionPricer::from_snapshot(&snap, 20 * WAD);

        assert_eq!(before.snapshot_version(), after.snapshot_version());
        assert_eq!(before.total_staked(), 10 * WAD);
        assert_eq!(after.total_staked(), 20 * WAD);
        assert_ne!(before, after);
        // more stake absorbs more of the deficit
        assert!(after.as_fixed() > before.as_fixed());
    }

    #[test]
    fn test_units_for_value_inverts_value_of() {
        let pricer = RedemptionPricer::from_snapshot(&snapshot(100 * WAD, 50 * WAD), 0);
        assert_eq!(pricer.units_for_value(5 * WAD, Rounding::Down).unwrap(), 10 * WAD);
        assert_eq!(pricer.value_of(10 * WAD, Rounding::Down).unwrap(), 5 * WAD);
    }

    #[test]
    fn test_everything_staked_is_par() {
        let pricer = RedemptionPricer::from_snapshot(&snapshot(10 * WAD, 0), 10 * WAD);
        assert_eq!(pricer.fraction(), (1, 1));
    }

    #[test]
    fn test_wiped_out_has_no_redeemable_value() {
        let pricer = RedemptionPricer::from_snapshot(&snapshot(100 * WAD, 0), 0);
        assert_eq!(pricer.value_of(WAD, Rounding::Down).unwrap(), 0);
        assert_eq!(pricer.units_for_value(WAD, Rounding::Down), Err(Error::NoRedeemableValue));
        assert_eq!(pricer.as_fixed(), FixedPoint::ZERO);
    }
}
