//! Planner scenarios from the testable-properties list, exercised against the
//! read-model directly rather than a live broker.

use common_protocol::{ErrorKind, GoodAmount, StockUpdateMessage, WarehouseId};
use order_service::planner::plan;
use order_service::readmodel::ReadModel;

/// Scenario 3: multi-warehouse split — parts sum to the requested amount.
#[test]
fn multi_warehouse_split_sums_to_request() {
    let mut model = ReadModel::new();
    model.apply(
        &WarehouseId::new("w1"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 3)]),
    );
    model.apply(
        &WarehouseId::new("w2"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 5)]),
    );

    let planned = plan(&model, &[GoodAmount::new("g1", 6)]).expect("plan should succeed");
    let total: u64 = planned.iter().flat_map(|w| w.parts.iter()).map(|p| p.amount).sum();
    assert_eq!(total, 6);

    let warehouses: Vec<_> = planned.iter().map(|w| w.warehouse_id.clone()).collect();
    assert!(warehouses.contains(&WarehouseId::new("w1")));
    assert!(warehouses.contains(&WarehouseId::new("w2")));
}

/// Scenario 4: insufficient aggregate stock across all warehouses is rejected before
/// any reservation would be attempted.
#[test]
fn insufficient_aggregate_is_rejected() {
    let mut model = ReadModel::new();
    model.apply(
        &WarehouseId::new("w1"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 1)]),
    );

    let err = plan(&model, &[GoodAmount::new("g1", 5)]).unwrap_err();
    assert_eq!(err, ErrorKind::InsufficientStock);
}

/// Planner totality: whenever aggregate stock across all warehouses meets the request,
/// the planner succeeds, regardless of how stock happens to be distributed.
#[test]
fn planner_totality_holds_across_distributions() {
    let mut model = ReadModel::new();
    model.apply(
        &WarehouseId::new("w1"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 2), GoodAmount::new("g2", 4)]),
    );
    model.apply(
        &WarehouseId::new("w2"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 6), GoodAmount::new("g2", 1)]),
    );

    let planned = plan(&model, &[GoodAmount::new("g1", 8), GoodAmount::new("g2", 5)])
        .expect("aggregate stock covers the request");
    let mut totals = std::collections::HashMap::new();
    for warehouse in &planned {
        for part in &warehouse.parts {
            *totals.entry(part.good_id.clone()).or_insert(0u64) += part.amount;
        }
    }
    assert_eq!(totals[&common_protocol::GoodId::new("g1")], 8);
    assert_eq!(totals[&common_protocol::GoodId::new("g2")], 5);
}
