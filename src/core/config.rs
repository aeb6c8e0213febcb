//! Protocol parameters.
//!
//! Parameters are fixed when the engine is constructed; there is no on-line
//! parameter-change workflow.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::validation::validate_fee_bps;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunable protocol parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Protocol version
    pub version: String,

    /// Oracle answers older than this fail the sync
    pub max_price_age_secs: u64,

    /// With auto-sync off, deficit-dependent calls reject snapshots older
    /// than this
    pub snapshot_tolerance_secs: u64,

    /// Resync at the start of every deficit-dependent mutation
    pub auto_sync: bool,

    /// Fee charged on mint, in basis points of minted units
    pub mint_fee_bps: u64,

    /// Fee charged on redeem, in basis points of the payout
    pub redeem_fee_bps: u64,

    /// Events kept in the in-memory log
    pub max_events: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_price_age_secs: MAX_PRICE_AGE_SECS,
            snapshot_tolerance_secs: SNAPSHOT_TOLERANCE_SECS,
            auto_sync: true,
            mint_fee_bps: MINT_FEE_BPS,
            redeem_fee_bps: REDEEM_FEE_BPS,
            max_events: MAX_EVENTS,
        }
    }
}

impl ProtocolParams {
    /// Override the auto-sync flag
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Override mint/redeem fees
    pub fn with_fees(mut self, mint_fee_bps: u64, redeem_fee_bps: u64) -> Self {
        self.mint_fee_bps = mint_fee_bps;
        self.redeem_fee_bps = redeem_fee_bps;
        self
    }

    /// Override staleness limits
    pub fn with_staleness(mut self, max_price_age_secs: u64, snapshot_tolerance_secs: u64) -> Self {
        self.max_price_age_secs = max_price_age_secs;
        self.snapshot_tolerance_secs = snapshot_tolerance_secs;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        if self.max_price_age_secs == 0 {
            return Err(Error::Config("max_price_age_secs must be greater than 0".into()));
        }
        if self.snapshot_tolerance_secs == 0 {
            return Err(Error::Config("snapshot_tolerance_secs must be greater than 0".into()));
        }
        if self.max_events == 0 {
            return Err(Error::Config("max_events must be greater than 0".into()));
        }
        validate_fee_bps(self.mint_fee_bps, "mint_fee_bps")
            .and_then(|_| validate_fee_bps(self.redeem_fee_bps, "redeem_fee_bps"))
            .map_err(|e| Error::Config(e.to_string()))
    }
}
