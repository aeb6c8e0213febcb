//! Protocol module - Core state machine and orchestration.
//!
//! This module provides the central state machine that orchestrates
//! all DUSD protocol operations atomically.

pub mod events;
pub mod operations;
pub mod state_machine;

pub use events::*;
pub use operations::*;
pub use state_machine::*;
