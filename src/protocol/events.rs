//! Protocol events for state change notifications.
//!
//! Events are emitted for all significant state changes in the protocol,
//! enabling clients to track activity and react accordingly.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::utils::identity::{AccountId, Hash, ReserveId};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Setup Events
    /// Reserve asset registered
    ReserveRegistered(ReserveRegisteredEvent),

    // Valuation Events
    /// New system snapshot published
    SystemSynced(SystemSyncedEvent),

    // Staking Events
    /// DUSD staked into the buffer
    Staked(StakedEvent),
    /// DUSD withdrawn from the buffer
    Withdrawn(WithdrawnEvent),
    /// Staking reward paid
    RewardPaid(RewardPaidEvent),
    /// Staker exited
    Exited(ExitedEvent),

    // Liability Events
    /// DUSD minted against a reserve deposit
    Minted(MintedEvent),
    /// DUSD redeemed for reserves
    Redeemed(RedeemedEvent),
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReserveRegistered(_) => "ReserveRegistered",
            Self::SystemSynced(_) => "SystemSynced",
            Self::Staked(_) => "Staked",
            Self::Withdrawn(_) => "Withdrawn",
            Self::RewardPaid(_) => "RewardPaid",
            Self::Exited(_) => "Exited",
            Self::Minted(_) => "Minted",
            Self::Redeemed(_) => "Redeemed",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::ReserveRegistered(e) => e.timestamp,
            Self::SystemSynced(e) => e.timestamp,
            Self::Staked(e) => e.timestamp,
            Self::Withdrawn(e) => e.timestamp,
            Self::RewardPaid(e) => e.timestamp,
            Self::Exited(e) => e.timestamp,
            Self::Minted(e) => e.timestamp,
            Self::Redeemed(e) => e.timestamp,
        }
    }

    /// Get the block height of the event
    pub fn block_height(&self) -> u64 {
        match self {
            Self::ReserveRegistered(e) => e.block_height,
            Self::SystemSynced(e) => e.block_height,
            Self::Staked(e) => e.block_height,
            Self::Withdrawn(e) => e.block_height,
            Self::RewardPaid(e) => e.block_height,
            Self::Exited(e) => e.block_height,
            Self::Minted(e) => e.block_height,
            Self::Redeemed(e) => e.block_height,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETUP / VALUATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a reserve is registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveRegisteredEvent {
    /// Reserve identity
    pub reserve: ReserveId,
    /// Decimal precision
    pub decimals: u8,
    /// Basket index
    pub index: usize,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a snapshot is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSyncedEvent {
    /// Snapshot version
    pub version: u64,
    /// Mark-to-market reserves (wad)
    pub total_system_assets: u128,
    /// Liabilities plus receivables (wad)
    pub total_assets: u128,
    /// Deficit (wad)
    pub deficit: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when DUSD is staked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedEvent {
    /// Staker
    pub staker: AccountId,
    /// Amount staked
    pub amount: u128,
    /// New staked amount of this staker
    pub staker_total: u128,
    /// New pool total
    pub pool_total: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when DUSD is withdrawn from the buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawnEvent {
    /// Staker
    pub staker: AccountId,
    /// Amount withdrawn
    pub amount: u128,
    /// Remaining staked amount
    pub remaining: u128,
    /// New pool total
    pub pool_total: u128,
    /// Deficit the withdrawal was checked against
    pub deficit: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a staking reward is paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPaidEvent {
    /// Staker
    pub staker: AccountId,
    /// Reward paid
    pub reward: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a staker exits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitedEvent {
    /// Staker
    pub staker: AccountId,
    /// DUSD withdrawn by the exit
    pub withdrawn: u128,
    /// Reward claimed by the exit
    pub reward: u128,
    /// Stake left behind, locked by the deficit
    pub locked: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIABILITY EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when DUSD is minted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedEvent {
    /// Recipient
    pub account: AccountId,
    /// Reserve amounts deposited, basket order
    pub deposited: Vec<u128>,
    /// USD value of the deposit (wad)
    pub value: u128,
    /// DUSD minted to the account
    pub minted: u128,
    /// Fee withheld, in DUSD
    pub fee: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when DUSD is redeemed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemedEvent {
    /// Redeemer
    pub account: AccountId,
    /// DUSD burned
    pub burned: u128,
    /// USD value paid (wad)
    pub value: u128,
    /// Fee withheld, in USD (wad)
    pub fee: u128,
    /// Reserve amounts paid, basket order
    pub paid: Vec<u128>,
    /// Snapshot version used for pricing
    pub snapshot_version: u64,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded in-memory event log; the oldest events are dropped first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<ProtocolEvent>,
    /// Zero means unbounded
    capacity: usize,
    /// Events ever pushed, including dropped ones
    total: u64,
}

impl EventLog {
    /// Create a new empty, unbounded event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log retaining at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            total: 0,
        }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: ProtocolEvent) {
        self.events.push_back(event);
        self.total += 1;
        if self.capacity > 0 && self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Iterate over retained events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ProtocolEvent> {
        self.events.iter()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.events.back()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events ever pushed
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Hash over the retained events in order
    pub fn digest(&self) -> Hash {
        let mut data = Vec::with_capacity(self.events.len() * 32);
        for event in &self.events {
            data.extend_from_slice(event.hash().as_bytes());
        }
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn staked(amount: u128, timestamp: u64) -> ProtocolEvent {
        ProtocolEvent::Staked(StakedEvent {
            staker: AccountId::from_label("alice"),
            amount,
            staker_total: amount,
            pool_total: amount,
            block_height: 1,
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let event = staked(10, 100);
        assert_eq!(event.event_type(), "Staked");
        assert_eq!(event.timestamp(), 100);
        assert_eq!(event.block_height(), 1);
    }

    #[test]
    fn test_event_hash_is_deterministic() {
        assert_eq!(staked(10, 100).hash(), staked(10, 100).hash());
        assert_ne!(staked(10, 100).hash(), staked(11, 100).hash());
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.push(staked(1, 1));
        log.push(ProtocolEvent::RewardPaid(RewardPaidEvent {
            staker: AccountId::from_label("alice"),
            reward: 5,
            block_height: 1,
            timestamp: 2,
        }));

        assert_eq!(log.len(), 2);
        assert_eq!(log.filter_by_type("Staked").len(), 1);
        assert_eq!(log.last().map(|e| e.event_type()), Some("RewardPaid"));
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.push(staked(i, i as u64));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total(), 5);
        assert_eq!(log.iter().next().map(|e| e.timestamp()), Some(2));
    }

    #[test]
    fn test_digest_changes_with_events() {
        let mut log = EventLog::new();
        let empty = log.digest();
        log.push(staked(1, 1));
        assert_ne!(log.digest(), empty);
    }
}
