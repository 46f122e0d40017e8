//! Read-model scenarios exercised against the gateway's public API directly, rather
//! than over a live broker + HTTP server.

use common_protocol::{GoodAmount, GoodId, OrderCreated, StockUpdateMessage, WarehouseId};
use gateway_service::readmodel::{warehouse_from_subject, ReadModel};
use uuid::Uuid;

#[test]
fn stock_converges_across_multiple_warehouses() {
    let mut model = ReadModel::default();
    model.apply_stock(
        &WarehouseId::new("w1"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 4)]),
    );
    model.apply_stock(
        &WarehouseId::new("w2"),
        &StockUpdateMessage::new(vec![GoodAmount::new("g1", 9)]),
    );

    let mut ids = model.warehouse_ids();
    ids.sort();
    assert_eq!(ids, vec![WarehouseId::new("w1"), WarehouseId::new("w2")]);
    assert_eq!(model.stock_for(&WarehouseId::new("w1")).unwrap()[&GoodId::new("g1")], 4);
    assert_eq!(model.stock_for(&WarehouseId::new("w2")).unwrap()[&GoodId::new("g1")], 9);
}

#[test]
fn replaying_history_out_of_order_within_a_warehouse_keeps_the_latest_snapshot() {
    let w1 = WarehouseId::new("w1");
    let mut model = ReadModel::default();
    model.apply_stock(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 1)]));
    model.apply_stock(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 2)]));
    model.apply_stock(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 3)]));

    assert_eq!(model.stock_for(&w1).unwrap()[&GoodId::new("g1")], 3);
}

#[test]
fn order_lookup_by_id_reflects_replayed_stream() {
    let mut model = ReadModel::default();
    let order = OrderCreated {
        order_id: Uuid::new_v4(),
        warehouses: vec![],
    };
    let id = order.order_id;
    model.apply_order(order);

    assert!(model.order(&id).is_some());
    assert!(model.order(&Uuid::new_v4()).is_none());
}

#[test]
fn subject_parsing_recovers_the_warehouse_id() {
    assert_eq!(
        warehouse_from_subject("stock_updates.w1"),
        Some(WarehouseId::new("w1"))
    );
    assert_eq!(warehouse_from_subject("reservations.w1"), None);
    assert_eq!(warehouse_from_subject("stock_updates."), None);
}
