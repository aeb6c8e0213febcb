//! Redemption pricing under a residual deficit.

pub mod pricer;

pub use pricer::*;
