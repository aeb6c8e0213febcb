//! Protocol operations - atomic state changes.
//!
//! Operations represent discrete actions that can be executed atomically
//! on the protocol state. Each operation validates inputs, modifies state,
//! and emits appropriate events.

use serde::{Deserialize, Serialize};

use crate::utils::identity::AccountId;
use crate::valuation::snapshot::SystemSnapshot;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// A single protocol transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolOperation {
    /// Publish a new system snapshot
    Sync,
    /// Deposit reserves and mint DUSD
    Mint {
        /// Depositor and recipient
        caller: AccountId,
        /// Reserve amounts, basket order
        amounts: Vec<u128>,
        /// Minimum DUSD to accept
        min_dusd: u128,
    },
    /// Burn DUSD for a pro-rata slice of the reserves
    Redeem {
        /// Redeemer
        caller: AccountId,
        /// DUSD to burn
        amount: u128,
        /// Minimum reserve amounts; empty for none
        #[serde(default)]
        min_amounts: Vec<u128>,
    },
    /// Lock DUSD in the stake buffer
    Stake {
        /// Staker
        staker: AccountId,
        /// DUSD to stake
        amount: u128,
    },
    /// Withdraw unlocked stake
    Withdraw {
        /// Staker
        staker: AccountId,
        /// DUSD to withdraw
        amount: u128,
    },
    /// Withdraw everything unlocked and claim rewards
    Exit {
        /// Staker
        staker: AccountId,
    },
    /// Move DUSD between holders
    Transfer {
        /// Sender
        from: AccountId,
        /// Recipient
        to: AccountId,
        /// DUSD to move
        amount: u128,
    },
    /// Authorize `spender` to pull DUSD from `owner`
    Approve {
        /// Token owner
        owner: AccountId,
        /// Authorized spender
        spender: AccountId,
        /// Allowance; `u128::MAX` is unlimited
        amount: u128,
    },
}

impl ProtocolOperation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Sync => "Sync",
            Self::Mint { .. } => "Mint",
            Self::Redeem { .. } => "Redeem",
            Self::Stake { .. } => "Stake",
            Self::Withdraw { .. } => "Withdraw",
            Self::Exit { .. } => "Exit",
            Self::Transfer { .. } => "Transfer",
            Self::Approve { .. } => "Approve",
        }
    }

    /// Account that initiated the operation
    pub fn caller(&self) -> Option<&AccountId> {
        match self {
            Self::Sync => None,
            Self::Mint { caller, .. } | Self::Redeem { caller, .. } => Some(caller),
            Self::Stake { staker, .. } | Self::Withdraw { staker, .. } | Self::Exit { staker } => Some(staker),
            Self::Transfer { from, .. } => Some(from),
            Self::Approve { owner, .. } => Some(owner),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    /// Reserve amounts deposited, basket order
    pub deposited: Vec<u128>,
    /// USD value of the deposit (wad)
    pub value: u128,
    /// DUSD credited to the caller
    pub minted: u128,
    /// DUSD withheld as fee
    pub fee: u128,
}

/// Result of a redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemReceipt {
    /// DUSD burned
    pub burned: u128,
    /// USD value paid out (wad)
    pub value: u128,
    /// USD withheld as fee (wad)
    pub fee: u128,
    /// Reserve amounts paid, basket order
    pub paid: Vec<u128>,
}

/// Result of an exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitReceipt {
    /// DUSD withdrawn from the buffer
    pub withdrawn: u128,
    /// Reward paid
    pub reward: u128,
}

/// Result of any operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// New snapshot
    Synced(SystemSnapshot),
    /// Mint receipt
    Minted(MintReceipt),
    /// Redemption receipt
    Redeemed(RedeemReceipt),
    /// New staked amount of the staker
    Staked(u128),
    /// Remaining staked amount of the staker
    Withdrawn(u128),
    /// Exit receipt
    Exited(ExitReceipt),
    /// Transfer done
    Transferred,
    /// Approval recorded
    Approved,
}
