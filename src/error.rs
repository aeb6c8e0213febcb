//! Error types for the DUSD deficit core.
//!
//! Every fallible operation returns [`Result`]. Errors abort the whole
//! operation; the protocol engine restores its pre-call state before the
//! error is handed back to the caller.

use thiserror::Error;

/// Result type alias for DUSD core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the DUSD deficit core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Oracle / Snapshot Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Oracle answer missing, non-positive or older than the allowed age
    #[error("Stale or invalid price for {reserve}: {reason}")]
    StaleOrInvalidPrice {
        /// Reserve whose price was rejected
        reserve: String,
        /// Why the price was rejected
        reason: String,
    },

    /// Cached snapshot is older than the configured tolerance
    #[error("System snapshot is stale: {age}s old, tolerance {tolerance}s")]
    StaleSnapshot {
        /// Snapshot age in seconds
        age: u64,
        /// Maximum tolerated age in seconds
        tolerance: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Staking Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Stake attempted without enough allowance or funds
    #[error("Insufficient authorization: required {required}, approved {approved}")]
    InsufficientAuthorization {
        /// Amount the operation needs to pull
        required: u128,
        /// Amount currently approved (or held, whichever is smaller)
        approved: u128,
    },

    /// Withdrawal larger than the staker's withdrawable balance
    #[error("Withdrawing more than staked or illiquid due to system deficit")]
    WithdrawExceedsAvailable {
        /// Requested amount
        requested: u128,
        /// Withdrawable amount at the time of the call
        available: u128,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Account balance too small
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: u128,
        /// Available amount
        available: u128,
    },

    /// Minted or redeemed amount fell below the caller's minimum
    #[error("Slippage exceeded: got {got}, minimum {minimum}")]
    SlippageExceeded {
        /// Amount the operation would deliver
        got: u128,
        /// Caller's minimum
        minimum: u128,
    },

    /// Reserve is not registered
    #[error("Reserve not found: {0}")]
    ReserveNotFound(String),

    /// Reserve registered twice
    #[error("Reserve already registered: {0}")]
    ReserveAlreadyRegistered(String),

    /// Redemption rate is zero, nothing is left to back new units
    #[error("No redeemable value left in the system")]
    NoRedeemableValue,

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Configuration / Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Returns true if retrying after caller-side action can succeed
    /// (fresher price, resync, approval, smaller amount)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StaleOrInvalidPrice { .. }
                | Error::StaleSnapshot { .. }
                | Error::InsufficientAuthorization { .. }
                | Error::WithdrawExceedsAvailable { .. }
                | Error::InsufficientBalance { .. }
                | Error::SlippageExceeded { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Overflow { .. } | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Oracle / snapshot errors: 1xxx
            Error::StaleOrInvalidPrice { .. } => 1001,
            Error::StaleSnapshot { .. } => 1002,

            // Staking errors: 2xxx
            Error::InsufficientAuthorization { .. } => 2001,
            Error::WithdrawExceedsAvailable { .. } => 2002,
            Error::ZeroAmount => 2003,

            // Ledger errors: 3xxx
            Error::InsufficientBalance { .. } => 3001,
            Error::SlippageExceeded { .. } => 3002,
            Error::ReserveNotFound(_) => 3003,
            Error::ReserveAlreadyRegistered(_) => 3004,
            Error::NoRedeemableValue => 3005,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Overflow { .. } => 5002,
            Error::Underflow { .. } => 5003,
            Error::InvariantViolation(_) => 5004,

            // Configuration / serialization errors: 7xxx
            Error::Config(_) => 7001,
            Error::Serialization(_) => 7002,
            Error::Deserialization(_) => 7003,
        }
    }
}
