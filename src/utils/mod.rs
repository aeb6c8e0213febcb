//! Utility modules shared across the DUSD core:
//! - Constants
//! - Identities and hashing
//! - Fixed-point and checked arithmetic
//! - Validation helpers

pub mod constants;
pub mod identity;
pub mod math;
pub mod validation;

pub use constants::*;
pub use identity::*;
pub use math::*;
pub use validation::*;
