//! Protocol engine - core orchestration.
//!
//! The engine owns the single `State` aggregate and the injected oracle,
//! gateway and reward stream. Every public mutation runs as one serialized
//! transaction: on error, state, gateway and reward stream are restored to
//! their values before the call.

use crate::core::config::ProtocolParams;
use crate::core::reserve::ReserveLedger;
use crate::core::token::LiabilityToken;
use crate::error::{Error, Result};
use crate::gateway::LiquidityGateway;
use crate::oracle::PriceOracle;
use crate::protocol::events::*;
use crate::protocol::operations::*;
use crate::redemption::RedemptionPricer;
use crate::staking::{RewardStream, StakeBuffer, StakerStatus};
use crate::utils::identity::{AccountId, ReserveId};
use crate::utils::math::{calculate_fee_bps, safe_sub, Rounding};
use crate::utils::validation::validate_non_zero;
use crate::valuation::{SystemSnapshot, ValuationEngine};

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a transaction can mutate inside the core
#[derive(Debug, Clone, Default)]
pub struct State {
    /// Reserve balances and receivables
    pub reserves: ReserveLedger,
    /// DUSD ledger
    pub token: LiabilityToken,
    /// Stake buffer
    pub buffer: StakeBuffer,
    /// Latest published snapshot
    pub snapshot: SystemSnapshot,
    /// Emitted events
    pub events: EventLog,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Deficit-accounting core with injected collaborators
pub struct Protocol<O, G, R>
where
    O: PriceOracle,
    G: LiquidityGateway + Clone,
    R: RewardStream + Clone,
{
    params: ProtocolParams,
    valuation: ValuationEngine,
    state: State,
    oracle: O,
    gateway: G,
    rewards: R,
    /// Current block height
    block_height: u64,
    /// Current timestamp
    timestamp: u64,
}

impl<O, G, R> Protocol<O, G, R>
where
    O: PriceOracle,
    G: LiquidityGateway + Clone,
    R: RewardStream + Clone,
{
    /// Create an engine with validated parameters
    pub fn new(params: ProtocolParams, oracle: O, gateway: G, rewards: R) -> Result<Self> {
        params.validate()?;
        let state = State {
            events: EventLog::with_capacity(params.max_events),
            ..State::default()
        };

        Ok(Self {
            valuation: ValuationEngine::new(params.max_price_age_secs),
            params,
            state,
            oracle,
            gateway,
            rewards,
            block_height: 0,
            timestamp: 0,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Protocol parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Read-only view of the state aggregate
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Price oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable price oracle, for feeds driven by the host
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Liquidity gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Mutable liquidity gateway, for funding external wallets
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Reward stream
    pub fn rewards(&self) -> &R {
        &self.rewards
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> &SystemSnapshot {
        &self.state.snapshot
    }

    /// Event log
    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// Reserve ledger
    pub fn reserves(&self) -> &ReserveLedger {
        &self.state.reserves
    }

    /// Stake buffer
    pub fn buffer(&self) -> &StakeBuffer {
        &self.state.buffer
    }

    /// Account holding staked DUSD; stakers approve it before staking
    pub fn pool_account(&self) -> AccountId {
        self.state.buffer.pool_account()
    }

    /// Current block height
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Current timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance the clock. Height and time never go backwards.
    pub fn begin_block(&mut self, height: u64, timestamp: u64) -> Result<()> {
        if height < self.block_height {
            return Err(Error::InvalidParameter {
                name: "height".into(),
                reason: format!("{} is below current height {}", height, self.block_height),
            });
        }
        if timestamp < self.timestamp {
            return Err(Error::InvalidParameter {
                name: "timestamp".into(),
                reason: format!("{} is before current time {}", timestamp, self.timestamp),
            });
        }
        self.block_height = height;
        self.timestamp = timestamp;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute a protocol operation
    pub fn execute(&mut self, op: ProtocolOperation) -> Result<OperationResult> {
        match op {
            ProtocolOperation::Sync => self.sync_system().map(OperationResult::Synced),
            ProtocolOperation::Mint {
                caller,
                amounts,
                min_dusd,
            } => self.mint(&caller, &amounts, min_dusd).map(OperationResult::Minted),
            ProtocolOperation::Redeem {
                caller,
                amount,
                min_amounts,
            } => self
                .redeem(&caller, amount, &min_amounts)
                .map(OperationResult::Redeemed),
            ProtocolOperation::Stake { staker, amount } => {
                self.stake(&staker, amount).map(OperationResult::Staked)
            }
            ProtocolOperation::Withdraw { staker, amount } => {
                self.withdraw(&staker, amount).map(OperationResult::Withdrawn)
            }
            ProtocolOperation::Exit { staker } => self.exit(&staker).map(OperationResult::Exited),
            ProtocolOperation::Transfer { from, to, amount } => self
                .transfer(&from, &to, amount)
                .map(|_| OperationResult::Transferred),
            ProtocolOperation::Approve {
                owner,
                spender,
                amount,
            } => {
                self.approve(&owner, &spender, amount);
                Ok(OperationResult::Approved)
            }
        }
    }

    /// Run `f` as one transaction, restoring everything on error
    fn atomic<T>(&mut self, operation: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let state = self.state.clone();
        let gateway = self.gateway.clone();
        let rewards = self.rewards.clone();

        let result = f(self).and_then(|value| {
            self.check_invariants()?;
            Ok(value)
        });

        if let Err(e) = &result {
            tracing::warn!(operation, code = e.code(), error = %e, "operation rolled back");
            self.state = state;
            self.gateway = gateway;
            self.rewards = rewards;
        }
        result
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SETUP
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a reserve asset; returns its basket index
    pub fn register_reserve(&mut self, id: ReserveId, decimals: u8) -> Result<usize> {
        self.atomic("register_reserve", |this| {
            let index = this.state.reserves.register(id.clone(), decimals)?;
            tracing::info!(reserve = %id, decimals, index, "reserve registered");
            this.emit(|block_height, timestamp| {
                ProtocolEvent::ReserveRegistered(ReserveRegisteredEvent {
                    reserve: id,
                    decimals,
                    index,
                    block_height,
                    timestamp,
                })
            });
            Ok(index)
        })
    }

    /// Set protocol-held receivables (wad). Takes effect at the next sync.
    pub fn set_receivables(&mut self, amount: u128) {
        self.state.reserves.set_receivables(amount);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Revalue the reserves and publish a new snapshot
    pub fn sync_system(&mut self) -> Result<SystemSnapshot> {
        self.atomic("sync_system", |this| this.sync_inner().cloned())
    }

    fn sync_inner(&mut self) -> Result<&SystemSnapshot> {
        let snapshot = self
            .valuation
            .sync(
                &self.state.reserves,
                self.state.token.total_supply(),
                &self.oracle,
                &self.state.snapshot,
                self.timestamp,
            )
            .map_err(|e| {
                tracing::warn!(error = %e, "sync failed, previous snapshot stands");
                e
            })?;

        tracing::info!(
            version = snapshot.version,
            deficit = snapshot.deficit,
            tsa = snapshot.total_system_assets,
            "system synced"
        );

        self.emit(|block_height, timestamp| {
            ProtocolEvent::SystemSynced(SystemSyncedEvent {
                version: snapshot.version,
                total_system_assets: snapshot.total_system_assets,
                total_assets: snapshot.total_assets,
                deficit: snapshot.deficit,
                block_height,
                timestamp,
            })
        });
        self.state.snapshot = snapshot;
        Ok(&self.state.snapshot)
    }

    /// Resync, or reject a stale snapshot when auto-sync is off
    fn ensure_fresh(&mut self) -> Result<()> {
        if self.params.auto_sync {
            self.sync_inner()?;
            return Ok(());
        }
        self.check_snapshot_age()
    }

    fn check_snapshot_age(&self) -> Result<()> {
        let snapshot = &self.state.snapshot;
        let age = snapshot.age(self.timestamp);
        if snapshot.is_genesis() || age > self.params.snapshot_tolerance_secs {
            return Err(Error::StaleSnapshot {
                age,
                tolerance: self.params.snapshot_tolerance_secs,
            });
        }
        Ok(())
    }

    /// Deficit of the latest snapshot
    pub fn deficit(&self) -> u128 {
        self.state.snapshot.deficit
    }

    /// Redemption rate at the latest snapshot and the current buffer size
    pub fn redemption_pricer(&self) -> RedemptionPricer {
        RedemptionPricer::from_snapshot(&self.state.snapshot, self.state.buffer.total_staked())
    }

    /// USD value of `amount` DUSD. With auto-sync on, the rate comes from a
    /// fresh valuation that is not published; otherwise the latest snapshot
    /// must be within tolerance.
    pub fn dusd_to_usd(&self, amount: u128, round_up: bool) -> Result<u128> {
        let pricer = if self.params.auto_sync {
            let fresh = self.valuation.sync(
                &self.state.reserves,
                self.state.token.total_supply(),
                &self.oracle,
                &self.state.snapshot,
                self.timestamp,
            )?;
            RedemptionPricer::from_snapshot(&fresh, self.state.buffer.total_staked())
        } else {
            self.check_snapshot_age()?;
            self.redemption_pricer()
        };
        pricer.dusd_to_usd(amount, round_up)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DUSD LEDGER
    // ═══════════════════════════════════════════════════════════════════════════

    /// DUSD balance of `owner`
    pub fn balance_of(&self, owner: &AccountId) -> u128 {
        self.state.token.balance_of(owner)
    }

    /// DUSD total supply
    pub fn total_supply(&self) -> u128 {
        self.state.token.total_supply()
    }

    /// Remaining allowance from `owner` to `spender`
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.state.token.allowance(owner, spender)
    }

    /// Authorize `spender` to pull up to `amount` DUSD from `owner`
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u128) {
        self.state.token.approve(owner, spender, amount);
    }

    /// Move DUSD between holders
    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> Result<()> {
        self.atomic("transfer", |this| this.state.token.transfer(from, to, amount))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAKING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stake DUSD previously approved to the pool account. No resync needed.
    pub fn stake(&mut self, staker: &AccountId, amount: u128) -> Result<u128> {
        self.atomic("stake", |this| {
            validate_non_zero(amount)?;
            this.accrue_rewards()?;

            let pool = this.state.buffer.pool_account();
            this.state.token.transfer_from(&pool, staker, amount)?;
            let staker_total = this.state.buffer.stake(staker, amount)?;
            let pool_total = this.state.buffer.total_staked();

            tracing::info!(staker = %staker.short(), amount, staker_total, pool_total, "staked");
            this.emit(|block_height, timestamp| {
                ProtocolEvent::Staked(StakedEvent {
                    staker: *staker,
                    amount,
                    staker_total,
                    pool_total,
                    block_height,
                    timestamp,
                })
            });
            Ok(staker_total)
        })
    }

    /// Stake `staker` may withdraw at the latest snapshot
    pub fn withdraw_able(&self, staker: &AccountId) -> Result<u128> {
        self.state.buffer.withdraw_able(staker, self.deficit())
    }

    /// Lifecycle state of `staker` at the latest snapshot
    pub fn staker_status(&self, staker: &AccountId) -> Result<StakerStatus> {
        self.state.buffer.status(staker, self.deficit())
    }

    /// Withdraw stake not allocated to the deficit
    pub fn withdraw(&mut self, staker: &AccountId, amount: u128) -> Result<u128> {
        self.atomic("withdraw", |this| {
            this.ensure_fresh()?;
            this.accrue_rewards()?;
            this.withdraw_inner(staker, amount)
        })
    }

    fn withdraw_inner(&mut self, staker: &AccountId, amount: u128) -> Result<u128> {
        let deficit = self.deficit();
        let remaining = self.state.buffer.withdraw(staker, amount, deficit)?;
        let pool = self.state.buffer.pool_account();
        self.state.token.transfer(&pool, staker, amount)?;
        let pool_total = self.state.buffer.total_staked();

        tracing::info!(staker = %staker.short(), amount, remaining, deficit, "withdrawn");
        self.emit(|block_height, timestamp| {
            ProtocolEvent::Withdrawn(WithdrawnEvent {
                staker: *staker,
                amount,
                remaining,
                pool_total,
                deficit,
                block_height,
                timestamp,
            })
        });
        Ok(remaining)
    }

    /// Withdraw everything withdrawable and claim all rewards
    pub fn exit(&mut self, staker: &AccountId) -> Result<ExitReceipt> {
        self.atomic("exit", |this| {
            this.ensure_fresh()?;
            this.accrue_rewards()?;

            let withdrawn = this.withdraw_able(staker)?;
            if withdrawn > 0 {
                this.withdraw_inner(staker, withdrawn)?;
            }

            let reward = this.state.buffer.take_rewards(staker)?;
            if reward > 0 {
                this.rewards.pay(staker, reward)?;
                this.emit(|block_height, timestamp| {
                    ProtocolEvent::RewardPaid(RewardPaidEvent {
                        staker: *staker,
                        reward,
                        block_height,
                        timestamp,
                    })
                });
            }

            this.state.buffer.mark_exited(staker);
            let locked = this.state.buffer.staked_of(staker);

            tracing::info!(staker = %staker.short(), withdrawn, reward, locked, "exited");
            this.emit(|block_height, timestamp| {
                ProtocolEvent::Exited(ExitedEvent {
                    staker: *staker,
                    withdrawn,
                    reward,
                    locked,
                    block_height,
                    timestamp,
                })
            });
            Ok(ExitReceipt { withdrawn, reward })
        })
    }

    /// Rewards `staker` could claim now
    pub fn earned(&self, staker: &AccountId) -> Result<u128> {
        let buffer = &self.state.buffer;
        let emitted = self.rewards.emitted(buffer.last_reward_update(), self.timestamp)?;
        let reward_per_unit = buffer.reward_per_unit_with(emitted)?;
        buffer.earned_at(staker, reward_per_unit)
    }

    fn accrue_rewards(&mut self) -> Result<()> {
        let from = self.state.buffer.last_reward_update();
        if self.timestamp <= from {
            return Ok(());
        }
        let emitted = self.rewards.emitted(from, self.timestamp)?;
        self.state.buffer.accrue(emitted, self.timestamp)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MINT / REDEEM
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit reserves through the gateway and mint DUSD at the current
    /// redemption rate
    pub fn mint(&mut self, caller: &AccountId, amounts: &[u128], min_dusd: u128) -> Result<MintReceipt> {
        self.atomic("mint", |this| {
            this.ensure_fresh()?;
            let pricer = this.redemption_pricer();

            let deposited = this.gateway.deposit(&mut this.state.reserves, caller, amounts)?;
            let value = this
                .valuation
                .value_basket(&this.state.reserves, &deposited, &this.oracle, this.timestamp)?;

            let gross = pricer.units_for_value(value, Rounding::Down)?;
            let fee = calculate_fee_bps(gross, this.params.mint_fee_bps)?;
            let minted = safe_sub(gross, fee)?;
            validate_non_zero(minted)?;
            if minted < min_dusd {
                return Err(Error::SlippageExceeded {
                    got: minted,
                    minimum: min_dusd,
                });
            }

            this.state.token.mint(caller, minted)?;
            this.sync_inner()?;

            tracing::info!(account = %caller.short(), value, minted, fee, "minted");
            this.emit(|block_height, timestamp| {
                ProtocolEvent::Minted(MintedEvent {
                    account: *caller,
                    deposited: deposited.clone(),
                    value,
                    minted,
                    fee,
                    block_height,
                    timestamp,
                })
            });
            Ok(MintReceipt {
                deposited,
                value,
                minted,
                fee,
            })
        })
    }

    /// Burn DUSD and receive reserves worth its redemption value.
    /// `min_amounts` is empty or one minimum per reserve.
    pub fn redeem(&mut self, caller: &AccountId, amount: u128, min_amounts: &[u128]) -> Result<RedeemReceipt> {
        self.atomic("redeem", |this| {
            validate_non_zero(amount)?;
            if !min_amounts.is_empty() && min_amounts.len() != this.state.reserves.len() {
                return Err(Error::InvalidParameter {
                    name: "min_amounts".into(),
                    reason: format!(
                        "expected {} entries, got {}",
                        this.state.reserves.len(),
                        min_amounts.len()
                    ),
                });
            }

            this.ensure_fresh()?;
            let pricer = this.redemption_pricer();
            let gross = pricer.value_of(amount, Rounding::Down)?;
            let fee = calculate_fee_bps(gross, this.params.redeem_fee_bps)?;
            let value = safe_sub(gross, fee)?;
            if value == 0 {
                return Err(Error::NoRedeemableValue);
            }

            this.state.token.burn(caller, amount)?;
            let snapshot = this.state.snapshot.clone();
            let paid = this
                .gateway
                .withdraw(&mut this.state.reserves, caller, value, &snapshot)?;

            for (got, minimum) in paid.iter().zip(min_amounts) {
                if got < minimum {
                    return Err(Error::SlippageExceeded {
                        got: *got,
                        minimum: *minimum,
                    });
                }
            }

            this.sync_inner()?;

            tracing::info!(
                account = %caller.short(),
                burned = amount,
                value,
                fee,
                version = snapshot.version,
                "redeemed"
            );
            this.emit(|block_height, timestamp| {
                ProtocolEvent::Redeemed(RedeemedEvent {
                    account: *caller,
                    burned: amount,
                    value,
                    fee,
                    paid: paid.clone(),
                    snapshot_version: snapshot.version,
                    block_height,
                    timestamp,
                })
            });
            Ok(RedeemReceipt {
                burned: amount,
                value,
                fee,
                paid,
            })
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INVARIANTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check cross-component invariants
    pub fn check_invariants(&self) -> Result<()> {
        self.state.token.check_invariants()?;
        self.state.buffer.check_invariants()?;

        let pool_balance = self.state.token.balance_of(&self.state.buffer.pool_account());
        if pool_balance != self.state.buffer.total_staked() {
            return Err(Error::InvariantViolation(format!(
                "pool holds {} DUSD but {} is staked",
                pool_balance,
                self.state.buffer.total_staked()
            )));
        }

        let snapshot = &self.state.snapshot;
        if snapshot.deficit != snapshot.total_assets.saturating_sub(snapshot.total_system_assets) {
            return Err(Error::InvariantViolation(format!(
                "snapshot v{} deficit {} does not match its totals",
                snapshot.version, snapshot.deficit
            )));
        }
        Ok(())
    }

    fn emit(&mut self, build: impl FnOnce(u64, u64) -> ProtocolEvent) {
        let event = build(self.block_height, self.timestamp);
        self.state.events.push(event);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
