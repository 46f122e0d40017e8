//! State-machine scenarios from the testable-properties list: exercised directly
//! against `StockSnapshot`/`ReservationBook` rather than over a live broker, the way
//! the source's `catalog_test.go` exercises its map-backed store in isolation.

use chrono::{Duration, Utc};
use common_protocol::GoodAmount;
use uuid::Uuid;
use warehouse_service::reservations::{OpenReservation, ReservationBook};
use warehouse_service::stock::StockSnapshot;

fn good(id: &str) -> common_protocol::GoodId {
    common_protocol::GoodId::new(id)
}

/// Scenario 1: single warehouse, add then reserve.
#[test]
fn add_then_reserve() {
    let mut stock = StockSnapshot::new();
    stock.set_stocked(&good("g1"), stock.resolve_delta(&good("g1"), 10));
    assert!(stock.has_available(&good("g1"), 4));
    stock.increment_reserved(&good("g1"), 4);

    assert_eq!(stock.stocked(&good("g1")), 10);
    assert_eq!(stock.reserved(&good("g1")), 4);
    assert_eq!(stock.available(&good("g1")), 6);
}

/// Scenario 2: over-reserve leaves state unchanged and is rejected before any mutation.
#[test]
fn over_reserve_is_rejected() {
    let mut stock = StockSnapshot::new();
    stock.set_stocked(&good("g1"), 10);
    stock.increment_reserved(&good("g1"), 4);

    assert!(!stock.has_available(&good("g1"), 7));
    assert_eq!(stock.reserved(&good("g1")), 4);
    assert_eq!(stock.stocked(&good("g1")), 10);
}

/// Scenario 3 (warehouse side): each participating warehouse commits its own share and
/// the post-commit stocked values sum to the pre-order total minus the requested amount.
#[test]
fn multi_warehouse_commit_sums_correctly() {
    let mut w1 = StockSnapshot::new();
    w1.set_stocked(&good("g1"), 3);
    let mut w2 = StockSnapshot::new();
    w2.set_stocked(&good("g1"), 5);

    w1.increment_reserved(&good("g1"), 3);
    w2.increment_reserved(&good("g1"), 3);

    let remaining_w1 = w1.commit(&good("g1"), 3);
    let remaining_w2 = w2.commit(&good("g1"), 3);

    assert_eq!(remaining_w1 + remaining_w2, 2);
}

/// Scenario 5: a reservation expires after 31 simulated minutes and its stock is
/// released back into `available`.
#[test]
fn expired_reservation_releases_stock() {
    let mut stock = StockSnapshot::new();
    stock.set_stocked(&good("g1"), 10);
    stock.increment_reserved(&good("g1"), 4);
    assert_eq!(stock.available(&good("g1")), 6);

    let mut book = ReservationBook::new();
    let id = Uuid::new_v4();
    book.insert(OpenReservation {
        id,
        items: vec![GoodAmount::new(good("g1"), 4)],
        stream_sequence: 1,
        published_at: Utc::now() - Duration::minutes(31),
    });

    let expired = book.sweep_expired(Utc::now());
    assert_eq!(expired.len(), 1);
    for reservation in expired {
        for item in reservation.items {
            stock.release_reserved(&item.good_id, item.amount);
        }
    }

    assert_eq!(stock.reserved(&good("g1")), 0);
    assert_eq!(stock.available(&good("g1")), 10);
}

/// Scenario 6: cold-start replay — folding a sequence of stock-update messages onto an
/// empty snapshot reproduces the same state regardless of how many times it's replayed.
#[test]
fn cold_start_replay_is_deterministic() {
    use common_protocol::StockUpdateMessage;

    let sequence = [
        StockUpdateMessage::new(vec![GoodAmount::new(good("g1"), 3)]),
        StockUpdateMessage::new(vec![GoodAmount::new(good("g1"), 8)]),
        StockUpdateMessage::new(vec![GoodAmount::new(good("g1"), 2)]),
    ];

    let fold = |replays: usize| {
        let mut stock = StockSnapshot::new();
        for _ in 0..replays {
            for msg in &sequence {
                stock.apply_snapshot_replay(msg);
            }
        }
        stock
    };

    let once = fold(1);
    let twice = fold(2);
    assert_eq!(once.stocked(&good("g1")), 2);
    assert_eq!(once.stocked(&good("g1")), twice.stocked(&good("g1")));
    assert_eq!(once.reserved(&good("g1")), twice.reserved(&good("g1")));
}
