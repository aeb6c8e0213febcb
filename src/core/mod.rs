//! Core ledgers and configuration:
//! - Protocol parameters
//! - Reserve ledger
//! - DUSD liability token

pub mod config;
pub mod reserve;
pub mod token;

pub use config::*;
pub use reserve::*;
pub use token::*;
