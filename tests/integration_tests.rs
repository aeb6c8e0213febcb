//! Integration tests for the DUSD protocol.
//!
//! These tests drive the engine through full deficit and recovery cycles.

use dusd_core::prelude::*;

type TestProtocol = Protocol<PriceFeed, BasketGateway, NoRewards>;

const USDC: u128 = 1_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn account(label: &str) -> AccountId {
    AccountId::from_label(label)
}

/// DAI(18), USDC(6), USDT(6), SUSD(18), all at $1
fn four_reserve_protocol(params: ProtocolParams) -> TestProtocol {
    let mut feed = PriceFeed::new();
    for symbol in ["DAI", "USDC", "USDT", "SUSD"] {
        feed.set_decimal_price(ReserveId::new(symbol), "1", 1000).unwrap();
    }

    let mut protocol = Protocol::new(params, feed, BasketGateway::new(), NoRewards).unwrap();
    protocol.begin_block(1, 1000).unwrap();
    for (symbol, decimals) in [("DAI", 18), ("USDC", 6), ("USDT", 6), ("SUSD", 18)] {
        protocol.register_reserve(ReserveId::new(symbol), decimals).unwrap();
    }
    protocol
}

/// Basket in whole units, scaled to each reserve's decimals
fn basket(dai: u128, usdc: u128, usdt: u128, susd: u128) -> Vec<u128> {
    vec![dai * WAD, usdc * USDC, usdt * USDC, susd * WAD]
}

fn fund_and_mint(protocol: &mut TestProtocol, who: &AccountId, amounts: &[u128]) -> MintReceipt {
    for (index, amount) in amounts.iter().enumerate() {
        protocol.gateway_mut().fund(who, index, *amount).unwrap();
    }
    protocol.mint(who, amounts, 0).unwrap()
}

fn set_price(protocol: &mut TestProtocol, symbol: &str, price: &str) {
    let now = protocol.timestamp();
    protocol
        .oracle_mut()
        .set_decimal_price(ReserveId::new(symbol), price, now)
        .unwrap();
}

fn stake(protocol: &mut TestProtocol, who: &AccountId, amount: u128) {
    let pool = protocol.pool_account();
    protocol.approve(who, &pool, amount);
    protocol.stake(who, amount).unwrap();
}

/// Bob mints 110 and hands 10 to alice, who stakes all of it
fn staked_alice() -> TestProtocol {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let (bob, alice) = (account("bob"), account("alice"));

    let receipt = fund_and_mint(&mut protocol, &bob, &basket(30, 30, 30, 20));
    assert_eq!(receipt.minted, 110 * WAD);

    protocol.transfer(&bob, &alice, 10 * WAD).unwrap();
    stake(&mut protocol, &alice, 10 * WAD);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 10 * WAD);
    protocol
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEFICIT LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_partial_withdraw_then_deficit_locks_stake() {
    let mut protocol = staked_alice();
    let alice = account("alice");

    protocol.withdraw(&alice, 2 * WAD).unwrap();
    assert_eq!(protocol.balance_of(&alice), 2 * WAD);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 8 * WAD);

    set_price(&mut protocol, "SUSD", "0.8");
    let snapshot = protocol.sync_system().unwrap();
    assert_eq!(snapshot.total_system_assets, 106 * WAD);
    assert_eq!(snapshot.deficit, 4 * WAD);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 4 * WAD);
    assert_eq!(protocol.staker_status(&alice).unwrap(), StakerStatus::LossExposed);

    let err = protocol.withdraw(&alice, 5 * WAD).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Withdrawing more than staked or illiquid due to system deficit"
    );
    // rolled back: nothing moved
    assert_eq!(protocol.balance_of(&alice), 2 * WAD);

    let receipt = protocol.exit(&alice).unwrap();
    assert_eq!(receipt.withdrawn, 4 * WAD);
    assert_eq!(receipt.reward, 0);
    assert_eq!(protocol.balance_of(&alice), 6 * WAD);
    assert_eq!(protocol.earned(&alice).unwrap(), 0);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 0);
    assert_eq!(protocol.staker_status(&alice).unwrap(), StakerStatus::Exited);

    // recovery frees the locked remainder
    set_price(&mut protocol, "SUSD", "1");
    protocol.sync_system().unwrap();
    assert_eq!(protocol.deficit(), 0);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 4 * WAD);

    protocol.exit(&alice).unwrap();
    assert_eq!(protocol.balance_of(&alice), 10 * WAD);
    assert_eq!(protocol.buffer().total_staked(), 0);
}

/// Bob mints 110; alice and dave each stake 10, then SUSD drops to 0.8
fn two_stakers_in_deficit() -> TestProtocol {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let (bob, alice, dave) = (account("bob"), account("alice"), account("dave"));

    fund_and_mint(&mut protocol, &bob, &basket(30, 30, 30, 20));
    for staker in [&alice, &dave] {
        protocol.transfer(&bob, staker, 10 * WAD).unwrap();
        stake(&mut protocol, staker, 10 * WAD);
    }

    set_price(&mut protocol, "SUSD", "0.8");
    protocol.sync_system().unwrap();
    assert_eq!(protocol.deficit(), 4 * WAD);
    protocol
}

#[test]
fn test_two_stakers_share_deficit() {
    let protocol = two_stakers_in_deficit();
    let (alice, dave) = (account("alice"), account("dave"));

    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 8 * WAD);
    assert_eq!(protocol.withdraw_able(&dave).unwrap(), 8 * WAD);

    let buffer = protocol.buffer();
    let allocated = buffer.allocated_loss(&alice, protocol.deficit()).unwrap()
        + buffer.allocated_loss(&dave, protocol.deficit()).unwrap();
    assert_eq!(allocated, 4 * WAD);
}

#[test]
fn test_stake_during_deficit_shares_loss() {
    let mut protocol = staked_alice();
    let (bob, alice, dave) = (account("bob"), account("alice"), account("dave"));

    set_price(&mut protocol, "SUSD", "0.8");
    protocol.sync_system().unwrap();
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 6 * WAD);
    let version = protocol.snapshot().version;

    // a new staker joins the loss immediately, no resync needed
    protocol.transfer(&bob, &dave, 10 * WAD).unwrap();
    stake(&mut protocol, &dave, 10 * WAD);
    assert_eq!(protocol.snapshot().version, version);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 8 * WAD);
    assert_eq!(protocol.withdraw_able(&dave).unwrap(), 8 * WAD);
    assert_eq!(protocol.staker_status(&dave).unwrap(), StakerStatus::LossExposed);
}

#[test]
fn test_exit_in_shared_pool_reprices_remainder() {
    let mut protocol = two_stakers_in_deficit();
    let (alice, dave) = (account("alice"), account("dave"));

    let receipt = protocol.exit(&alice).unwrap();
    assert_eq!(receipt.withdrawn, 8 * WAD);
    assert_eq!(protocol.earned(&alice).unwrap(), 0);
    assert_eq!(protocol.staker_status(&alice).unwrap(), StakerStatus::Exited);

    // the remaining 2 are re-priced against a pool of 12, so part of it
    // reads withdrawable again while dave carries a larger share
    assert_eq!(protocol.buffer().staked_of(&alice), 2 * WAD);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 1_333_333_333_333_333_333);
    assert_eq!(protocol.withdraw_able(&dave).unwrap(), 6_666_666_666_666_666_666);

    // the buffer still covers the whole deficit
    let deficit = protocol.deficit();
    let buffer = protocol.buffer();
    let allocated = buffer.allocated_loss(&alice, deficit).unwrap()
        + buffer.allocated_loss(&dave, deficit).unwrap();
    assert!(allocated >= deficit);
}

#[test]
fn test_single_staker_exit_reads_zero() {
    let mut protocol = staked_alice();
    let alice = account("alice");

    set_price(&mut protocol, "SUSD", "0.8");
    protocol.exit(&alice).unwrap();
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 0);
    assert_eq!(protocol.earned(&alice).unwrap(), 0);
}

#[test]
fn test_dusd_to_usd_stays_live_with_auto_sync() {
    let mut protocol = staked_alice();
    let synced_at = protocol.snapshot().timestamp;

    // well past the snapshot tolerance, with fresh prices
    let later = synced_at + protocol.params().snapshot_tolerance_secs + 1;
    protocol.begin_block(2, later).unwrap();
    for symbol in ["DAI", "USDC", "USDT", "SUSD"] {
        set_price(&mut protocol, symbol, "1");
    }
    assert_eq!(protocol.dusd_to_usd(WAD, false).unwrap(), WAD);

    // the read values current prices without publishing a snapshot
    set_price(&mut protocol, "SUSD", "0.01");
    let value = protocol.dusd_to_usd(100 * WAD, false).unwrap();
    assert!(value < 100 * WAD);
    assert_eq!(protocol.snapshot().timestamp, synced_at);
}

#[test]
fn test_full_stake_absorbs_deficit() {
    let mut protocol = staked_alice();
    let alice = account("alice");

    set_price(&mut protocol, "SUSD", "0.8");
    protocol.sync_system().unwrap();

    assert_eq!(protocol.deficit(), 4 * WAD);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 6 * WAD);
    // deficit fully covered: outside holders still redeem at par
    assert!(!protocol.redemption_pricer().is_impaired());
    assert_eq!(protocol.dusd_to_usd(WAD, false).unwrap(), WAD);
}

#[test]
fn test_residual_deficit_uniform_redemption() {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let (bob, alice, charlie) = (account("bob"), account("alice"), account("charlie"));

    fund_and_mint(&mut protocol, &bob, &basket(25, 25, 35, 35));
    protocol.transfer(&bob, &alice, 10 * WAD).unwrap();
    protocol.transfer(&bob, &charlie, 10 * WAD).unwrap();
    stake(&mut protocol, &alice, 10 * WAD);

    set_price(&mut protocol, "SUSD", "0.01");
    let snapshot = protocol.sync_system().unwrap();
    assert_eq!(snapshot.total_system_assets, 85_350_000_000_000_000_000);
    assert_eq!(snapshot.deficit, 34_650_000_000_000_000_000);
    assert_eq!(protocol.withdraw_able(&alice).unwrap(), 0);

    let rate = protocol.redemption_pricer().as_fixed();
    assert!(rate > FixedPoint::from_bps(7_000));
    assert!(rate < FixedPoint::from_bps(8_000));

    let bob_receipt = protocol.redeem(&bob, 100 * WAD, &[]).unwrap();
    let charlie_receipt = protocol.redeem(&charlie, 10 * WAD, &[]).unwrap();

    // both redeemers got the same value per DUSD
    let bob_per_unit = bob_receipt.value / 100;
    let charlie_per_unit = charlie_receipt.value / 10;
    assert!(bob_per_unit.abs_diff(charlie_per_unit) < 10_000_000_000_000);

    assert!(protocol.reserves().balances().iter().all(|b| *b == 0));
    assert_eq!(protocol.total_supply(), 10 * WAD);
    assert_eq!(protocol.deficit(), 10 * WAD);
    assert_eq!(protocol.balance_of(&protocol.pool_account()), 10 * WAD);

    // reserves landed in the redeemers' wallets
    assert!(protocol.gateway().balance_of(&bob, 0) > 0);
    assert!(protocol.gateway().balance_of(&charlie, 3) > 0);
}

#[test]
fn test_redemption_order_does_not_matter() {
    let run = |bob_first: bool| -> (u128, u128) {
        let mut protocol = four_reserve_protocol(ProtocolParams::default());
        let (bob, alice, charlie) = (account("bob"), account("alice"), account("charlie"));

        fund_and_mint(&mut protocol, &bob, &basket(25, 25, 35, 35));
        protocol.transfer(&bob, &alice, 10 * WAD).unwrap();
        protocol.transfer(&bob, &charlie, 10 * WAD).unwrap();
        stake(&mut protocol, &alice, 10 * WAD);
        set_price(&mut protocol, "SUSD", "0.01");

        if bob_first {
            let b = protocol.redeem(&bob, 100 * WAD, &[]).unwrap();
            let c = protocol.redeem(&charlie, 10 * WAD, &[]).unwrap();
            (b.value / 100, c.value / 10)
        } else {
            let c = protocol.redeem(&charlie, 10 * WAD, &[]).unwrap();
            let b = protocol.redeem(&bob, 100 * WAD, &[]).unwrap();
            (b.value / 100, c.value / 10)
        }
    };

    let (bob_a, charlie_a) = run(true);
    let (bob_b, charlie_b) = run(false);
    let tolerance = 10_000_000_000_000;
    assert!(bob_a.abs_diff(bob_b) < tolerance);
    assert!(charlie_a.abs_diff(charlie_b) < tolerance);
    assert!(bob_a.abs_diff(charlie_b) < tolerance);
}

#[test]
fn test_mint_during_deficit_preserves_rate() {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let (bob, dave) = (account("bob"), account("dave"));

    fund_and_mint(&mut protocol, &bob, &basket(25, 25, 35, 35));
    set_price(&mut protocol, "SUSD", "0.5");
    protocol.sync_system().unwrap();
    let before = protocol.redemption_pricer().as_fixed();
    assert!(before < FixedPoint::ONE);

    let receipt = fund_and_mint(&mut protocol, &dave, &basket(10, 0, 0, 0));
    // 10 USD of collateral buys more than 10 DUSD at an impaired rate
    assert!(receipt.minted > 10 * WAD);

    let after = protocol.redemption_pricer().as_fixed();
    assert!(after.raw().abs_diff(before.raw()) < 1_000_000_000);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT FRESHNESS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_manual_sync_mode() {
    let params = ProtocolParams::default().with_auto_sync(false);
    let mut protocol = four_reserve_protocol(params);
    let bob = account("bob");

    for (index, amount) in basket(10, 0, 0, 0).iter().enumerate() {
        protocol.gateway_mut().fund(&bob, index, *amount).unwrap();
    }

    // genesis snapshot counts as stale
    let err = protocol.mint(&bob, &basket(10, 0, 0, 0), 0).unwrap_err();
    assert!(matches!(err, Error::StaleSnapshot { .. }));
    assert_eq!(protocol.gateway().balance_of(&bob, 0), 10 * WAD);

    protocol.sync_system().unwrap();
    protocol.mint(&bob, &basket(10, 0, 0, 0), 0).unwrap();
    assert_eq!(protocol.dusd_to_usd(WAD, false).unwrap(), WAD);

    let tolerance = protocol.params().snapshot_tolerance_secs;
    protocol.begin_block(2, 1000 + tolerance + 1).unwrap();
    assert!(matches!(
        protocol.dusd_to_usd(WAD, false),
        Err(Error::StaleSnapshot { .. })
    ));
}

#[test]
fn test_stale_price_blocks_redeem() {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let bob = account("bob");
    fund_and_mint(&mut protocol, &bob, &basket(10, 10, 10, 10));
    let version = protocol.snapshot().version;

    let max_age = protocol.params().max_price_age_secs;
    protocol.begin_block(2, 1000 + max_age + 1).unwrap();

    let err = protocol.redeem(&bob, WAD, &[]).unwrap_err();
    assert!(matches!(err, Error::StaleOrInvalidPrice { .. }));
    assert_eq!(protocol.balance_of(&bob), 40 * WAD);
    assert_eq!(protocol.snapshot().version, version);
}

#[test]
fn test_receivables_count_toward_assets() {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let bob = account("bob");
    fund_and_mint(&mut protocol, &bob, &basket(25, 25, 35, 35));

    set_price(&mut protocol, "SUSD", "0.8");
    protocol.sync_system().unwrap();
    assert_eq!(protocol.deficit(), 7 * WAD);

    protocol.set_receivables(7 * WAD);
    // unchanged until the next sync
    assert_eq!(protocol.deficit(), 7 * WAD);
    protocol.sync_system().unwrap();
    assert_eq!(protocol.deficit(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS AND FEES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_event_trail() {
    let mut protocol = staked_alice();
    let alice = account("alice");
    protocol.withdraw(&alice, WAD).unwrap();

    let events = protocol.events();
    assert_eq!(events.filter_by_type("ReserveRegistered").len(), 4);
    assert_eq!(events.filter_by_type("Minted").len(), 1);
    assert_eq!(events.filter_by_type("Staked").len(), 1);
    assert_eq!(events.filter_by_type("Withdrawn").len(), 1);
    assert_eq!(events.last().map(|e| e.event_type()), Some("Withdrawn"));
    assert!(events.iter().all(|e| e.timestamp() == 1000));
}

#[test]
fn test_fees_stay_as_surplus() {
    let params = ProtocolParams::default().with_fees(100, 100);
    let mut protocol = four_reserve_protocol(params);
    let bob = account("bob");

    let receipt = fund_and_mint(&mut protocol, &bob, &basket(100, 0, 0, 0));
    assert_eq!(receipt.fee, WAD);
    assert_eq!(receipt.minted, 99 * WAD);

    let snapshot = protocol.snapshot().clone();
    assert_eq!(snapshot.total_system_assets, 100 * WAD);
    assert_eq!(snapshot.deficit, 0);

    let redeemed = protocol.redeem(&bob, 10 * WAD, &[]).unwrap();
    assert_eq!(redeemed.fee, WAD / 10);
    assert_eq!(redeemed.value, 10 * WAD - WAD / 10);
}

#[test]
fn test_slippage_on_redeem() {
    let mut protocol = four_reserve_protocol(ProtocolParams::default());
    let bob = account("bob");
    fund_and_mint(&mut protocol, &bob, &basket(10, 10, 10, 10));

    let minimums = vec![3 * WAD, 0, 0, 0];
    let err = protocol.redeem(&bob, 4 * WAD, &minimums).unwrap_err();
    assert!(matches!(err, Error::SlippageExceeded { .. }));
    assert_eq!(protocol.balance_of(&bob), 40 * WAD);

    let bad_len = protocol.redeem(&bob, WAD, &[0]).unwrap_err();
    assert!(matches!(bad_len, Error::InvalidParameter { .. }));
}
