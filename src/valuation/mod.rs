//! Reserve valuation and deficit computation.

pub mod engine;
pub mod snapshot;

pub use engine::*;
pub use snapshot::*;
