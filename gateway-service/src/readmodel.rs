use std::collections::HashMap;
use std::sync::Arc;

use common_protocol::{subjects, GoodId, OrderCreated, StockUpdateMessage, WarehouseId};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Gateway read-model (spec §4.5): fed by consuming `stock_updates.>` and `orders`
/// with delivery `all`. Readers (HTTP handlers) take a read lock; the two stream
/// projections take a write lock — never both at once.
#[derive(Default)]
pub struct ReadModel {
    stock: HashMap<WarehouseId, HashMap<GoodId, u64>>,
    orders: HashMap<Uuid, OrderCreated>,
}

pub type SharedReadModel = Arc<RwLock<ReadModel>>;

impl ReadModel {
    pub fn shared() -> SharedReadModel {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn apply_stock(&mut self, warehouse_id: &WarehouseId, msg: &StockUpdateMessage) {
        let entry = self.stock.entry(warehouse_id.clone()).or_default();
        for row in &msg.0 {
            entry.insert(row.good_id.clone(), row.amount);
        }
    }

    pub fn apply_order(&mut self, order: OrderCreated) {
        self.orders.insert(order.order_id, order);
    }

    pub fn warehouse_ids(&self) -> Vec<WarehouseId> {
        self.stock.keys().cloned().collect()
    }

    pub fn stock_for(&self, warehouse_id: &WarehouseId) -> Option<HashMap<GoodId, u64>> {
        self.stock.get(warehouse_id).cloned()
    }

    pub fn order_ids(&self) -> Vec<Uuid> {
        self.orders.keys().copied().collect()
    }

    pub fn order(&self, order_id: &Uuid) -> Option<OrderCreated> {
        self.orders.get(order_id).cloned()
    }
}

pub fn warehouse_from_subject(subject: &str) -> Option<WarehouseId> {
    subjects::strip_prefix(subject, subjects::STOCK_UPDATES_PREFIX).map(WarehouseId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_protocol::GoodAmount;

    #[test]
    fn stock_is_latest_absolute_value_per_good() {
        let mut model = ReadModel::default();
        let w1 = WarehouseId::new("w1");
        model.apply_stock(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 3)]));
        model.apply_stock(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 7)]));
        assert_eq!(model.stock_for(&w1).unwrap()[&GoodId::new("g1")], 7);
    }

    #[test]
    fn unknown_warehouse_has_no_stock_entry() {
        let model = ReadModel::default();
        assert!(model.stock_for(&WarehouseId::new("nope")).is_none());
    }

    #[test]
    fn orders_are_retrievable_by_id() {
        let mut model = ReadModel::default();
        let order = OrderCreated {
            order_id: Uuid::new_v4(),
            warehouses: vec![],
        };
        let id = order.order_id;
        model.apply_order(order);
        assert!(model.order(&id).is_some());
        assert_eq!(model.order_ids(), vec![id]);
    }
}
