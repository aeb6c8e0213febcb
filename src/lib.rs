//! # DUSD Protocol
//!
//! Deficit accounting for a stablecoin backed by a basket of reserve
//! assets. When the marked value of the reserves falls below the DUSD
//! supply, a staking buffer absorbs the shortfall first and every holder
//! outside the buffer redeems at one uniform rate.
//!
//! ## Architecture
//!
//! - **Core**: Protocol parameters, the DUSD ledger and the reserve ledger
//! - **Oracle**: Price quotes and the in-memory price feed
//! - **Valuation**: Reserve marking and system snapshots
//! - **Staking**: The loss-absorbing stake buffer and reward streams
//! - **Redemption**: Uniform redemption pricing
//! - **Gateway**: Reserve movement on mint and redeem
//! - **Protocol**: The atomic state machine, operations and events
//!
//! ## Example
//!
//! ```rust,ignore
//! use dusd_core::prelude::*;
//!
//! let mut protocol = Protocol::new(ProtocolParams::default(), feed, BasketGateway::new(), NoRewards)?;
//! protocol.register_reserve(ReserveId::new("DAI"), 18)?;
//! let receipt = protocol.mint(&bob, &[30 * WAD], 0)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod gateway;
pub mod oracle;
pub mod protocol;
pub mod redemption;
pub mod staking;
pub mod utils;
pub mod valuation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::ProtocolParams,
        reserve::{Reserve, ReserveLedger},
        token::LiabilityToken,
    };
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{BasketGateway, LiquidityGateway};
    pub use crate::oracle::price_feed::{PriceFeed, PriceOracle, PriceQuote};
    pub use crate::protocol::{
        events::{EventLog, ProtocolEvent},
        operations::{ExitReceipt, MintReceipt, OperationResult, ProtocolOperation, RedeemReceipt},
        state_machine::{Protocol, State},
    };
    pub use crate::redemption::pricer::RedemptionPricer;
    pub use crate::staking::{
        buffer::{StakeBuffer, StakerStatus},
        rewards::{LinearRewardStream, NoRewards, RewardStream},
    };
    pub use crate::utils::{
        constants::WAD,
        identity::{AccountId, Hash, ReserveId},
        math::{FixedPoint, Rounding},
    };
    pub use crate::valuation::{engine::ValuationEngine, snapshot::SystemSnapshot};
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "DUSD";
