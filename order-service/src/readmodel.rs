use std::collections::HashMap;

use common_protocol::{subjects, GoodId, StockUpdateMessage, WarehouseId};

/// `perWarehouseStock` (spec §4.4): fed by consuming `stock_updates.>`, delivery `all`
/// at startup then `new`. Enumeration order of `warehouses()` is whatever `HashMap`
/// gives — the planner makes no tie-break guarantee either (spec §4.4 step 2).
#[derive(Debug, Default)]
pub struct ReadModel {
    per_warehouse: HashMap<WarehouseId, HashMap<GoodId, u64>>,
}

impl ReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `stock_updates.<wh>` message: absolute amounts, never deltas.
    pub fn apply(&mut self, warehouse_id: &WarehouseId, msg: &StockUpdateMessage) {
        let entry = self.per_warehouse.entry(warehouse_id.clone()).or_default();
        for row in &msg.0 {
            entry.insert(row.good_id.clone(), row.amount);
        }
    }

    pub fn warehouses(&self) -> impl Iterator<Item = (&WarehouseId, &HashMap<GoodId, u64>)> {
        self.per_warehouse.iter()
    }

    pub fn stock_for(&self, warehouse_id: &WarehouseId, good: &GoodId) -> u64 {
        self.per_warehouse
            .get(warehouse_id)
            .and_then(|m| m.get(good))
            .copied()
            .unwrap_or(0)
    }
}

/// Parse the warehouse-id a `stock_updates.<wh>` message's subject refers to, for the
/// consumer callback that feeds [`ReadModel::apply`].
pub fn warehouse_from_subject(subject: &str) -> Option<WarehouseId> {
    subjects::strip_prefix(subject, subjects::STOCK_UPDATES_PREFIX).map(WarehouseId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_protocol::GoodAmount;

    #[test]
    fn apply_overwrites_absolute_amounts() {
        let mut model = ReadModel::new();
        let w1 = WarehouseId::new("w1");
        model.apply(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 3)]));
        model.apply(&w1, &StockUpdateMessage::new(vec![GoodAmount::new("g1", 9)]));
        assert_eq!(model.stock_for(&w1, &GoodId::new("g1")), 9);
    }

    #[test]
    fn unknown_warehouse_or_good_reads_as_zero() {
        let model = ReadModel::new();
        assert_eq!(model.stock_for(&WarehouseId::new("nope"), &GoodId::new("g1")), 0);
    }
}
