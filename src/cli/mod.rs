//! DUSD Command Line Interface.
//!
//! Configuration, output formatting and scenario replay for the `dusd`
//! binary.

pub mod config;
pub mod output;
pub mod scenario;

pub use config::*;
pub use output::*;
pub use scenario::*;
