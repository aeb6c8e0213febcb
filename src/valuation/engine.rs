//! Valuation engine.
//!
//! Marks every reserve to market through the price oracle and derives the
//! system deficit. A failed sync leaves the previous snapshot authoritative;
//! the caller only replaces its snapshot on `Ok`.

use crate::core::reserve::{Reserve, ReserveLedger};
use crate::error::{Error, Result};
use crate::oracle::PriceOracle;
use crate::utils::constants::DUSD_DECIMALS;
use crate::utils::math::{mul_div, pow10, safe_add, safe_mul, Rounding};
use crate::valuation::snapshot::{ReserveMark, SystemSnapshot};

// ═══════════════════════════════════════════════════════════════════════════════
// VALUATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless valuation of the reserve ledger
#[derive(Debug, Clone, Copy)]
pub struct ValuationEngine {
    max_price_age_secs: u64,
}

impl ValuationEngine {
    /// Create an engine rejecting prices older than `max_price_age_secs`
    pub fn new(max_price_age_secs: u64) -> Self {
        Self { max_price_age_secs }
    }

    /// Recompute the system valuation.
    ///
    /// `previous` supplies the version counter; the result carries
    /// `previous.version + 1` and `now`.
    pub fn sync<O: PriceOracle + ?Sized>(
        &self,
        ledger: &ReserveLedger,
        liability_supply: u128,
        oracle: &O,
        previous: &SystemSnapshot,
        now: u64,
    ) -> Result<SystemSnapshot> {
        let mut marks = Vec::with_capacity(ledger.len());
        let mut total_system_assets = 0u128;

        for reserve in ledger.iter() {
            let mark = self.mark(reserve, reserve.balance(), oracle, now)?;
            total_system_assets = safe_add(total_system_assets, mark.value)?;
            marks.push(mark);
        }

        let total_assets = safe_add(liability_supply, ledger.receivables())?;
        let deficit = total_assets.saturating_sub(total_system_assets);

        let version = previous.version.checked_add(1).ok_or_else(|| Error::Overflow {
            operation: "snapshot version".into(),
        })?;

        tracing::debug!(
            version,
            total_system_assets,
            total_assets,
            deficit,
            "system valuation computed"
        );

        Ok(SystemSnapshot {
            total_system_assets,
            total_assets,
            liability_supply,
            deficit,
            reserve_marks: marks,
            version,
            timestamp: now,
        })
    }

    /// USD value (wad) of a basket of reserve amounts in basket order
    pub fn value_basket<O: PriceOracle + ?Sized>(
        &self,
        ledger: &ReserveLedger,
        amounts: &[u128],
        oracle: &O,
        now: u64,
    ) -> Result<u128> {
        let mut total = 0u128;
        for (index, amount) in amounts.iter().enumerate() {
            if *amount == 0 {
                continue;
            }
            let reserve = ledger.at(index)?;
            let mark = self.mark(reserve, *amount, oracle, now)?;
            total = safe_add(total, mark.value)?;
        }
        Ok(total)
    }

    fn mark<O: PriceOracle + ?Sized>(
        &self,
        reserve: &Reserve,
        amount: u128,
        oracle: &O,
        now: u64,
    ) -> Result<ReserveMark> {
        let quote = oracle.price_of(reserve.id())?;
        let price = quote.validated(reserve.id(), now, self.max_price_age_secs)?;
        let value = value_in_wad(amount, reserve.decimals(), price, quote.decimals)?;

        Ok(ReserveMark {
            reserve: reserve.id().clone(),
            balance: amount,
            price,
            price_decimals: quote.decimals,
            value,
        })
    }
}

/// `amount / 10^decimals * price / 10^price_decimals`, expressed in wad and
/// rounded down
pub fn value_in_wad(amount: u128, decimals: u8, price: u128, price_decimals: u8) -> Result<u128> {
    let combined = decimals as u32 + price_decimals as u32;
    let target = DUSD_DECIMALS as u32;

    if combined >= target {
        mul_div(amount, price, pow10(combined - target)?, Rounding::Down)
    } else {
        let product = mul_div(amount, price, 1, Rounding::Down)?;
        safe_mul(product, pow10(target - combined)?)
    }
}
