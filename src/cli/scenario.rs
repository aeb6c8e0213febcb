//! Scenario replay.
//!
//! A scenario is a JSON script of reserves, prices and user actions. The
//! runner replays it against an in-process engine (`PriceFeed`,
//! `BasketGateway`, `LinearRewardStream`) and records the outcome and the
//! resulting snapshot after every step. Accounts are named by label and
//! amounts are decimal strings ("12.5").

use serde::{Deserialize, Serialize};

use crate::core::config::ProtocolParams;
use crate::error::{Error, Result};
use crate::gateway::BasketGateway;
use crate::oracle::PriceFeed;
use crate::protocol::{OperationResult, Protocol, ProtocolOperation};
use crate::staking::LinearRewardStream;
use crate::utils::constants::DUSD_DECIMALS;
use crate::utils::identity::{AccountId, ReserveId};
use crate::utils::math::{format_units, parse_units};

/// Engine type the runner drives
pub type ScenarioProtocol = Protocol<PriceFeed, BasketGateway, LinearRewardStream>;

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO FILE
// ═══════════════════════════════════════════════════════════════════════════════

/// A scripted scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Parameter overrides; CLI config params when absent
    #[serde(default)]
    pub params: Option<ProtocolParams>,
    /// Clock at the first step
    #[serde(default = "default_start_time")]
    pub start_time: u64,
    /// Reserves in basket order, with their opening prices
    pub reserves: Vec<ReserveSpec>,
    /// Reward emission for the stake pool
    #[serde(default)]
    pub rewards: Option<RewardSpec>,
    /// Steps to replay
    pub steps: Vec<StepSpec>,
}

fn default_start_time() -> u64 {
    1_000
}

/// A reserve declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSpec {
    /// Reserve symbol
    pub symbol: String,
    /// Decimal precision
    pub decimals: u8,
    /// Opening USD price, decimal string
    pub price: String,
}

/// Linear reward emission, in whole reward units per second
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSpec {
    /// Emission per second, decimal string (18 decimals)
    pub rate_per_second: String,
    /// Emission window length in seconds from `start_time`
    pub duration_secs: u64,
}

/// One step and whether it is expected to fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// The action
    #[serde(flatten)]
    pub step: Step,
    /// The step must fail; a success aborts the run
    #[serde(default)]
    pub expect_failure: bool,
}

/// Scenario actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Credit an external reserve wallet
    Fund {
        /// Account label
        account: String,
        /// Reserve symbol
        reserve: String,
        /// Amount in whole reserve units
        amount: String,
    },
    /// Deposit reserves and mint DUSD
    Mint {
        /// Account label
        account: String,
        /// Per-reserve amounts, basket order
        amounts: Vec<String>,
        /// Minimum DUSD accepted
        #[serde(default)]
        min_dusd: Option<String>,
    },
    /// Redeem DUSD for reserves
    Redeem {
        /// Account label
        account: String,
        /// DUSD to burn
        amount: String,
    },
    /// Move DUSD
    Transfer {
        /// Sender label
        from: String,
        /// Recipient label
        to: String,
        /// DUSD amount
        amount: String,
    },
    /// Approve the stake pool (or `spender`) to pull DUSD
    Approve {
        /// Owner label
        account: String,
        /// DUSD amount
        amount: String,
        /// Spender label; the stake pool when absent
        #[serde(default)]
        spender: Option<String>,
    },
    /// Stake DUSD
    Stake {
        /// Account label
        account: String,
        /// DUSD amount
        amount: String,
    },
    /// Withdraw stake
    Withdraw {
        /// Account label
        account: String,
        /// DUSD amount
        amount: String,
    },
    /// Withdraw everything available and claim rewards
    Exit {
        /// Account label
        account: String,
    },
    /// Report a new oracle price
    SetPrice {
        /// Reserve symbol
        reserve: String,
        /// USD price, decimal string
        price: String,
    },
    /// Set protocol-held receivables
    SetReceivables {
        /// USD amount
        amount: String,
    },
    /// Publish a new snapshot
    Sync,
    /// Advance the clock
    Advance {
        /// Seconds to advance
        seconds: u64,
        /// Blocks to advance
        #[serde(default = "default_blocks")]
        blocks: u64,
    },
}

fn default_blocks() -> u64 {
    1
}

impl Step {
    /// Action name
    pub fn action(&self) -> &'static str {
        match self {
            Step::Fund { .. } => "fund",
            Step::Mint { .. } => "mint",
            Step::Redeem { .. } => "redeem",
            Step::Transfer { .. } => "transfer",
            Step::Approve { .. } => "approve",
            Step::Stake { .. } => "stake",
            Step::Withdraw { .. } => "withdraw",
            Step::Exit { .. } => "exit",
            Step::SetPrice { .. } => "set_price",
            Step::SetReceivables { .. } => "set_receivables",
            Step::Sync => "sync",
            Step::Advance { .. } => "advance",
        }
    }
}

impl Scenario {
    /// Parse a scenario from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// The two-phase deficit walkthrough printed by `dusd example`
    pub fn example() -> Self {
        let step = |step: Step| StepSpec {
            step,
            expect_failure: false,
        };
        let s = |v: &str| v.to_string();

        Scenario {
            name: s("buffer-absorbs-deficit"),
            description: s("A price drop creates a deficit the stake pool absorbs; recovery frees the stake"),
            params: None,
            start_time: default_start_time(),
            reserves: vec![
                ReserveSpec { symbol: s("DAI"), decimals: 18, price: s("1") },
                ReserveSpec { symbol: s("USDC"), decimals: 6, price: s("1") },
                ReserveSpec { symbol: s("USDT"), decimals: 6, price: s("1") },
                ReserveSpec { symbol: s("SUSD"), decimals: 18, price: s("1") },
            ],
            rewards: None,
            steps: vec![
                step(Step::Fund { account: s("bob"), reserve: s("DAI"), amount: s("30") }),
                step(Step::Fund { account: s("bob"), reserve: s("USDC"), amount: s("30") }),
                step(Step::Fund { account: s("bob"), reserve: s("USDT"), amount: s("30") }),
                step(Step::Fund { account: s("bob"), reserve: s("SUSD"), amount: s("20") }),
                step(Step::Mint {
                    account: s("bob"),
                    amounts: vec![s("30"), s("30"), s("30"), s("20")],
                    min_dusd: Some(s("110")),
                }),
                step(Step::Transfer { from: s("bob"), to: s("alice"), amount: s("10") }),
                step(Step::Approve { account: s("alice"), amount: s("10"), spender: None }),
                step(Step::Stake { account: s("alice"), amount: s("10") }),
                step(Step::Withdraw { account: s("alice"), amount: s("2") }),
                step(Step::SetPrice { reserve: s("SUSD"), price: s("0.8") }),
                step(Step::Sync),
                StepSpec {
                    step: Step::Withdraw { account: s("alice"), amount: s("5") },
                    expect_failure: true,
                },
                step(Step::Exit { account: s("alice") }),
                step(Step::SetPrice { reserve: s("SUSD"), price: s("1") }),
                step(Step::Sync),
                step(Step::Exit { account: s("alice") }),
            ],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step index
    pub index: usize,
    /// Action name
    pub action: String,
    /// Whether the step succeeded
    pub ok: bool,
    /// Result or error text
    pub detail: String,
    /// Snapshot summary after the step
    pub snapshot: String,
}

/// Per-account balances at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    /// Account label
    pub account: String,
    /// DUSD balance
    pub dusd: String,
    /// Staked DUSD
    pub staked: String,
    /// Withdrawable stake
    pub withdraw_able: String,
    /// Staker status
    pub status: String,
}

/// Result of a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Step outcomes in order
    pub steps: Vec<StepOutcome>,
    /// Balances of every named account
    pub accounts: Vec<AccountReport>,
    /// Final snapshot summary
    pub final_snapshot: String,
    /// Redemption value of one DUSD at the end
    pub redemption_rate: String,
    /// Hex digest of the event log
    pub event_digest: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Replays a scenario against a fresh engine
pub struct ScenarioRunner {
    protocol: ScenarioProtocol,
    reserves: Vec<(ReserveId, u8)>,
    accounts: Vec<String>,
}

impl ScenarioRunner {
    /// Build the engine, register reserves and publish opening prices
    pub fn new(scenario: &Scenario, default_params: &ProtocolParams) -> Result<Self> {
        let params = scenario.params.clone().unwrap_or_else(|| default_params.clone());
        let now = scenario.start_time;

        let mut feed = PriceFeed::new();
        let mut reserves = Vec::with_capacity(scenario.reserves.len());
        for spec in &scenario.reserves {
            let id = ReserveId::new(&spec.symbol);
            feed.set_decimal_price(id.clone(), &spec.price, now)?;
            reserves.push((id, spec.decimals));
        }

        let rewards = match &scenario.rewards {
            Some(spec) => LinearRewardStream::new(
                parse_units(&spec.rate_per_second, DUSD_DECIMALS)?,
                now,
                now.saturating_add(spec.duration_secs),
            )?,
            None => LinearRewardStream::default(),
        };

        let mut protocol = Protocol::new(params, feed, BasketGateway::new(), rewards)?;
        protocol.begin_block(1, now)?;
        for (id, decimals) in &reserves {
            protocol.register_reserve(id.clone(), *decimals)?;
        }

        Ok(Self {
            protocol,
            reserves,
            accounts: Vec::new(),
        })
    }

    /// The engine, for inspection after a run
    pub fn protocol(&self) -> &ScenarioProtocol {
        &self.protocol
    }

    /// Replay every step. Steps may fail; the run aborts only when a step's
    /// outcome differs from its `expect_failure` flag.
    pub fn run(mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        let mut outcomes = Vec::with_capacity(scenario.steps.len());

        for (index, spec) in scenario.steps.iter().enumerate() {
            let result = self.apply(&spec.step);
            let ok = result.is_ok();
            let detail = match &result {
                Ok(detail) => detail.clone(),
                Err(e) => e.to_string(),
            };

            tracing::debug!(index, action = spec.step.action(), ok, %detail, "scenario step");
            outcomes.push(StepOutcome {
                index,
                action: spec.step.action().to_string(),
                ok,
                detail: detail.clone(),
                snapshot: self.protocol.snapshot().summary(),
            });

            if ok == spec.expect_failure {
                return Err(Error::InvariantViolation(format!(
                    "step {} ({}) {}: {}",
                    index,
                    spec.step.action(),
                    if ok { "succeeded but was expected to fail" } else { "failed" },
                    detail
                )));
            }
        }

        Ok(self.report(&scenario.name, outcomes))
    }

    fn apply(&mut self, step: &Step) -> Result<String> {
        match step {
            Step::Fund {
                account,
                reserve,
                amount,
            } => {
                let (index, decimals) = self.reserve(reserve)?;
                let units = parse_units(amount, decimals)?;
                let id = self.account(account);
                self.protocol.gateway_mut().fund(&id, index, units)?;
                Ok(format!("{} {} to {}", amount, reserve, account))
            }
            Step::Mint {
                account,
                amounts,
                min_dusd,
            } => {
                if amounts.len() != self.reserves.len() {
                    return Err(Error::InvalidParameter {
                        name: "amounts".into(),
                        reason: format!("expected {} entries, got {}", self.reserves.len(), amounts.len()),
                    });
                }
                let units = amounts
                    .iter()
                    .zip(&self.reserves)
                    .map(|(a, (_, decimals))| parse_units(a, *decimals))
                    .collect::<Result<Vec<_>>>()?;
                let min = min_dusd.as_deref().map(dusd).transpose()?.unwrap_or(0);
                let caller = self.account(account);
                match self.protocol.execute(ProtocolOperation::Mint {
                    caller,
                    amounts: units,
                    min_dusd: min,
                })? {
                    OperationResult::Minted(r) => Ok(format!("minted {} DUSD", fmt(r.minted))),
                    other => Ok(format!("{:?}", other)),
                }
            }
            Step::Redeem { account, amount } => {
                let caller = self.account(account);
                let receipt = self.protocol.redeem(&caller, dusd(amount)?, &[])?;
                let paid = receipt
                    .paid
                    .iter()
                    .zip(&self.reserves)
                    .map(|(p, (id, decimals))| format!("{} {}", format_units(*p, *decimals), id))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("redeemed for {} USD [{}]", fmt(receipt.value), paid))
            }
            Step::Transfer { from, to, amount } => {
                let (from, to) = (self.account(from), self.account(to));
                self.protocol.transfer(&from, &to, dusd(amount)?)?;
                Ok(format!("moved {} DUSD", amount))
            }
            Step::Approve {
                account,
                amount,
                spender,
            } => {
                let owner = self.account(account);
                let spender = match spender {
                    Some(label) => self.account(label),
                    None => self.protocol.pool_account(),
                };
                self.protocol.approve(&owner, &spender, dusd(amount)?);
                Ok(format!("approved {} DUSD", amount))
            }
            Step::Stake { account, amount } => {
                let staker = self.account(account);
                let total = self.protocol.stake(&staker, dusd(amount)?)?;
                Ok(format!("staked total {}", fmt(total)))
            }
            Step::Withdraw { account, amount } => {
                let staker = self.account(account);
                let remaining = self.protocol.withdraw(&staker, dusd(amount)?)?;
                Ok(format!("remaining stake {}", fmt(remaining)))
            }
            Step::Exit { account } => {
                let staker = self.account(account);
                let receipt = self.protocol.exit(&staker)?;
                Ok(format!(
                    "withdrew {} DUSD, reward {}",
                    fmt(receipt.withdrawn),
                    fmt(receipt.reward)
                ))
            }
            Step::SetPrice { reserve, price } => {
                let id = ReserveId::new(reserve);
                let now = self.protocol.timestamp();
                self.protocol.oracle_mut().set_decimal_price(id, price, now)?;
                Ok(format!("{} at ${}", reserve, price))
            }
            Step::SetReceivables { amount } => {
                self.protocol.set_receivables(dusd(amount)?);
                Ok(format!("receivables {}", amount))
            }
            Step::Sync => {
                let snapshot = self.protocol.sync_system()?;
                Ok(snapshot.summary())
            }
            Step::Advance { seconds, blocks } => {
                let height = self.protocol.block_height().saturating_add(*blocks);
                let time = self.protocol.timestamp().saturating_add(*seconds);
                self.protocol.begin_block(height, time)?;
                Ok(format!("block {} at {}", height, time))
            }
        }
    }

    fn reserve(&self, symbol: &str) -> Result<(usize, u8)> {
        let id = ReserveId::new(symbol);
        self.reserves
            .iter()
            .position(|(r, _)| *r == id)
            .map(|index| (index, self.reserves[index].1))
            .ok_or_else(|| Error::ReserveNotFound(id.to_string()))
    }

    fn account(&mut self, label: &str) -> AccountId {
        if !self.accounts.iter().any(|a| a == label) {
            self.accounts.push(label.to_string());
        }
        AccountId::from_label(label)
    }

    fn report(&self, name: &str, steps: Vec<StepOutcome>) -> ScenarioReport {
        let protocol = &self.protocol;
        let accounts = self
            .accounts
            .iter()
            .map(|label| {
                let id = AccountId::from_label(label);
                AccountReport {
                    account: label.clone(),
                    dusd: fmt(protocol.balance_of(&id)),
                    staked: fmt(protocol.buffer().staked_of(&id)),
                    withdraw_able: protocol
                        .withdraw_able(&id)
                        .map(fmt)
                        .unwrap_or_else(|e| e.to_string()),
                    status: protocol
                        .staker_status(&id)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|e| e.to_string()),
                }
            })
            .collect();

        ScenarioReport {
            name: name.to_string(),
            steps,
            accounts,
            final_snapshot: protocol.snapshot().summary(),
            redemption_rate: protocol.redemption_pricer().as_fixed().to_string(),
            event_digest: protocol.events().digest().to_hex(),
        }
    }
}

fn dusd(amount: &str) -> Result<u128> {
    parse_units(amount, DUSD_DECIMALS)
}

fn fmt(amount: u128) -> String {
    format_units(amount, DUSD_DECIMALS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_runs_clean() {
        let scenario = Scenario::example();
        let runner = ScenarioRunner::new(&scenario, &ProtocolParams::default()).unwrap();
        let report = runner.run(&scenario).unwrap();

        assert_eq!(report.steps.len(), scenario.steps.len());
        let alice = report.accounts.iter().find(|a| a.account == "alice").unwrap();
        assert_eq!(alice.dusd, "10");
        assert_eq!(alice.staked, "0");
        assert_eq!(report.redemption_rate, "1");
    }

    #[test]
    fn test_example_json_roundtrip() {
        let scenario = Scenario::example();
        let json = scenario.to_json().unwrap();
        assert!(json.contains("\"action\": \"set_price\""));
        assert_eq!(Scenario::from_json(&json).unwrap(), scenario);
    }

    #[test]
    fn test_unexpected_failure_aborts() {
        let json = r#"{
            "name": "broken",
            "reserves": [{ "symbol": "DAI", "decimals": 18, "price": "1" }],
            "steps": [{ "action": "stake", "account": "alice", "amount": "1" }]
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        let runner = ScenarioRunner::new(&scenario, &ProtocolParams::default()).unwrap();
        assert!(matches!(runner.run(&scenario), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_expected_failure_passes() {
        let json = r#"{
            "name": "expected",
            "reserves": [{ "symbol": "DAI", "decimals": 18, "price": "1" }],
            "steps": [
                { "action": "advance", "seconds": 10 },
                { "action": "withdraw", "account": "alice", "amount": "1", "expect_failure": true }
            ]
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        let runner = ScenarioRunner::new(&scenario, &ProtocolParams::default()).unwrap();
        let report = runner.run(&scenario).unwrap();
        assert!(!report.steps[1].ok);
        assert_eq!(
            report.steps[1].detail,
            "Withdrawing more than staked or illiquid due to system deficit"
        );
    }

    #[test]
    fn test_rewards_in_scenario() {
        let json = r#"{
            "name": "rewards",
            "reserves": [{ "symbol": "DAI", "decimals": 18, "price": "1" }],
            "rewards": { "rate_per_second": "1", "duration_secs": 1000 },
            "steps": [
                { "action": "fund", "account": "alice", "reserve": "DAI", "amount": "10" },
                { "action": "mint", "account": "alice", "amounts": ["10"] },
                { "action": "approve", "account": "alice", "amount": "10" },
                { "action": "stake", "account": "alice", "amount": "10" },
                { "action": "advance", "seconds": 50 },
                { "action": "exit", "account": "alice" }
            ]
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        let runner = ScenarioRunner::new(&scenario, &ProtocolParams::default()).unwrap();
        let report = runner.run(&scenario).unwrap();
        assert_eq!(report.steps[5].detail, "withdrew 10 DUSD, reward 50");
    }
}
