//! System snapshots.
//!
//! A snapshot is the immutable result of one valuation. Every
//! deficit-dependent read (stake buffer, redemption pricer) works from the
//! latest snapshot, never from live prices.

use serde::{Deserialize, Serialize};

use crate::utils::constants::DUSD_DECIMALS;
use crate::utils::identity::ReserveId;
use crate::utils::math::format_units;

/// Mark-to-market of one reserve at sync time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveMark {
    /// Reserve identity
    pub reserve: ReserveId,
    /// Protocol-held balance at sync time
    pub balance: u128,
    /// Oracle answer used
    pub price: u128,
    /// Decimals of `price`
    pub price_decimals: u8,
    /// USD value of `balance` (wad)
    pub value: u128,
}

/// Result of one `sync_system` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Mark-to-market value of all reserves (wad)
    pub total_system_assets: u128,
    /// Outstanding DUSD plus receivables (wad)
    pub total_assets: u128,
    /// DUSD supply at sync time
    pub liability_supply: u128,
    /// `max(0, total_assets - total_system_assets)`
    pub deficit: u128,
    /// Per-reserve marks in basket order
    pub reserve_marks: Vec<ReserveMark>,
    /// Monotonic snapshot counter; 0 is the genesis snapshot
    pub version: u64,
    /// Block timestamp of the sync
    pub timestamp: u64,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self::genesis()
    }
}

impl SystemSnapshot {
    /// The all-zero snapshot that exists before the first sync
    pub fn genesis() -> Self {
        Self {
            total_system_assets: 0,
            total_assets: 0,
            liability_supply: 0,
            deficit: 0,
            reserve_marks: Vec::new(),
            version: 0,
            timestamp: 0,
        }
    }

    /// True for the genesis snapshot
    pub fn is_genesis(&self) -> bool {
        self.version == 0
    }

    /// Seconds since the snapshot was taken
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// Surplus of reserves over liabilities, if any
    pub fn surplus(&self) -> u128 {
        self.total_system_assets.saturating_sub(self.total_assets)
    }

    /// Same valuation, ignoring version and timestamp
    pub fn same_valuation(&self, other: &Self) -> bool {
        self.total_system_assets == other.total_system_assets
            && self.total_assets == other.total_assets
            && self.liability_supply == other.liability_supply
            && self.deficit == other.deficit
            && self.reserve_marks == other.reserve_marks
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "v{} tsa={} assets={} supply={} deficit={}",
            self.version,
            format_units(self.total_system_assets, DUSD_DECIMALS),
            format_units(self.total_assets, DUSD_DECIMALS),
            format_units(self.liability_supply, DUSD_DECIMALS),
            format_units(self.deficit, DUSD_DECIMALS),
        )
    }
}
