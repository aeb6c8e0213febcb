//! Price oracle capability and an in-memory feed.
//!
//! The valuation engine consumes prices only through [`PriceOracle`]. Feed
//! adapters live outside this crate; [`PriceFeed`] is the in-process
//! implementation used by tests and the scenario runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::identity::ReserveId;
use crate::utils::math::{format_units, parse_units};
use crate::utils::validation::validate_decimals;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// A single oracle answer: USD per whole reserve unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Raw answer; signed because feeds can report negative values
    pub answer: i128,
    /// Decimal precision of `answer`
    pub decimals: u8,
    /// Unix timestamp of the answer
    pub updated_at: u64,
}

impl PriceQuote {
    /// Create a new quote
    pub fn new(answer: i128, decimals: u8, updated_at: u64) -> Self {
        Self {
            answer,
            decimals,
            updated_at,
        }
    }

    /// Quote from a decimal string ("0.8") with default precision
    pub fn from_decimal(text: &str, updated_at: u64) -> Result<Self> {
        let raw = parse_units(text, DEFAULT_PRICE_DECIMALS)?;
        let answer = i128::try_from(raw).map_err(|_| Error::Overflow {
            operation: format!("price {}", text),
        })?;
        Ok(Self::new(answer, DEFAULT_PRICE_DECIMALS, updated_at))
    }

    /// Check if the answer is no older than `max_age` at `now`
    pub fn is_fresh(&self, now: u64, max_age: u64) -> bool {
        now.saturating_sub(self.updated_at) <= max_age
    }

    /// Get age of the answer in seconds
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }

    /// Validate the quote for use in a valuation; returns the positive answer
    pub fn validated(&self, reserve: &ReserveId, now: u64, max_age: u64) -> Result<u128> {
        let reject = |reason: String| Error::StaleOrInvalidPrice {
            reserve: reserve.to_string(),
            reason,
        };

        if self.answer <= 0 {
            return Err(reject(format!("non-positive answer {}", self.answer)));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(reject(format!("{} answer decimals", self.decimals)));
        }
        if !self.is_fresh(now, max_age) {
            return Err(reject(format!(
                "answer is {}s old, max {}s",
                self.age(now),
                max_age
            )));
        }
        Ok(self.answer as u128)
    }

    /// Format price for display
    pub fn format_price(&self) -> String {
        if self.answer < 0 {
            return format!("-${}", format_units(self.answer.unsigned_abs(), self.decimals));
        }
        format!("${}", format_units(self.answer as u128, self.decimals))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE ORACLE CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Supplies the current price of each reserve
pub trait PriceOracle {
    /// Latest answer for `reserve`; an error if the feed has none
    fn price_of(&self, reserve: &ReserveId) -> Result<PriceQuote>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for &T {
    fn price_of(&self, reserve: &ReserveId) -> Result<PriceQuote> {
        (**self).price_of(reserve)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory price feed keeping a bounded history per reserve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    /// Answers per reserve, oldest first; the last entry is current
    history: HashMap<ReserveId, Vec<PriceQuote>>,
    /// Maximum history size per reserve
    max_history: usize,
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed {
    /// Create an empty feed
    pub fn new() -> Self {
        Self {
            history: HashMap::new(),
            max_history: PRICE_HISTORY_LEN,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE UPDATES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a new answer. Answers are stored as reported (including
    /// non-positive ones) so that the valuation engine rejects them, not
    /// the feed.
    pub fn set_price(&mut self, reserve: ReserveId, quote: PriceQuote) -> Result<()> {
        validate_decimals(quote.decimals, "price decimals")?;

        let entries = self.history.entry(reserve.clone()).or_default();
        if let Some(last) = entries.last() {
            if quote.updated_at < last.updated_at {
                return Err(Error::InvalidParameter {
                    name: "updated_at".into(),
                    reason: format!(
                        "answer for {} is older than current ({} < {})",
                        reserve, quote.updated_at, last.updated_at
                    ),
                });
            }
        }

        entries.push(quote);
        if entries.len() > self.max_history {
            entries.remove(0);
        }
        Ok(())
    }

    /// Convenience: set a price from a decimal string
    pub fn set_decimal_price(&mut self, reserve: ReserveId, price: &str, timestamp: u64) -> Result<()> {
        let quote = PriceQuote::from_decimal(price, timestamp)?;
        self.set_price(reserve, quote)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current answer for a reserve
    pub fn latest(&self, reserve: &ReserveId) -> Option<&PriceQuote> {
        self.history.get(reserve).and_then(|h| h.last())
    }

    /// Full retained history for a reserve, oldest first
    pub fn history(&self, reserve: &ReserveId) -> &[PriceQuote] {
        self.history.get(reserve).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PriceOracle for PriceFeed {
    fn price_of(&self, reserve: &ReserveId) -> Result<PriceQuote> {
        self.latest(reserve)
            .copied()
            .ok_or_else(|| Error::StaleOrInvalidPrice {
                reserve: reserve.to_string(),
                reason: "no answer reported".into(),
            })
    }
}
