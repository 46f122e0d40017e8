use std::collections::HashMap;

use common_protocol::{ErrorKind, GoodAmount, GoodId, WarehouseId};

use crate::readmodel::ReadModel;

/// One warehouse's share of a plan: the parts of the request it can cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWarehouse {
    pub warehouse_id: WarehouseId,
    pub parts: Vec<GoodAmount>,
}

/// Greedy, naive-by-design planning algorithm (spec §4.4 steps 1-3): walk warehouses in
/// whatever order the read-model enumerates them, committing as much of each remaining
/// good as each warehouse can cover, until every good is fully covered or the warehouses
/// are exhausted. Does not preserve fairness, proximity, or cost (spec §4.4).
pub fn plan(read_model: &ReadModel, items: &[GoodAmount]) -> Result<Vec<PlannedWarehouse>, ErrorKind> {
    let mut remaining: HashMap<GoodId, u64> = items
        .iter()
        .map(|item| (item.good_id.clone(), item.amount))
        .collect();
    let mut total: u64 = remaining.values().sum();

    let mut used_stock: HashMap<WarehouseId, Vec<GoodAmount>> = HashMap::new();

    'warehouses: for (warehouse_id, stock) in read_model.warehouses() {
        for (good, need) in remaining.iter_mut() {
            if *need == 0 {
                continue;
            }
            let available = stock.get(good).copied().unwrap_or(0);
            let used = available.min(*need);
            if used == 0 {
                continue;
            }
            *need -= used;
            total -= used;
            used_stock
                .entry(warehouse_id.clone())
                .or_default()
                .push(GoodAmount::new(good.clone(), used));
            if total == 0 {
                break 'warehouses;
            }
        }
    }

    if total > 0 {
        return Err(ErrorKind::InsufficientStock);
    }

    Ok(used_stock
        .into_iter()
        .map(|(warehouse_id, parts)| PlannedWarehouse { warehouse_id, parts })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_protocol::StockUpdateMessage;

    fn model_with(rows: &[(&str, &str, u64)]) -> ReadModel {
        let mut model = ReadModel::new();
        for (wh, good, amount) in rows {
            model.apply(
                &WarehouseId::new(*wh),
                &StockUpdateMessage::new(vec![GoodAmount::new(*good, *amount)]),
            );
        }
        model
    }

    #[test]
    fn single_warehouse_covers_whole_request() {
        let model = model_with(&[("w1", "g1", 10)]);
        let plan = plan(&model, &[GoodAmount::new("g1", 4)]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].warehouse_id, WarehouseId::new("w1"));
        assert_eq!(plan[0].parts, vec![GoodAmount::new("g1", 4)]);
    }

    #[test]
    fn splits_across_warehouses_when_one_is_insufficient() {
        let model = model_with(&[("w1", "g1", 3), ("w2", "g1", 5)]);
        let plan = plan(&model, &[GoodAmount::new("g1", 6)]).unwrap();
        let total: u64 = plan.iter().flat_map(|p| p.parts.iter()).map(|p| p.amount).sum();
        assert_eq!(total, 6);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn insufficient_aggregate_stock_is_rejected() {
        let model = model_with(&[("w1", "g1", 1)]);
        let err = plan(&model, &[GoodAmount::new("g1", 5)]).unwrap_err();
        assert_eq!(err, ErrorKind::InsufficientStock);
    }

    #[test]
    fn zero_warehouses_known_is_insufficient() {
        let model = ReadModel::new();
        let err = plan(&model, &[GoodAmount::new("g1", 1)]).unwrap_err();
        assert_eq!(err, ErrorKind::InsufficientStock);
    }
}
