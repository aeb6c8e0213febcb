//! Oracle module for reserve prices.
//!
//! Provides the `PriceOracle` capability consumed by the valuation engine and
//! an in-memory `PriceFeed` implementation.

pub mod price_feed;

pub use price_feed::*;
