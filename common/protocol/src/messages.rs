use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{GoodId, WarehouseId};

/// A good and an absolute amount. Used both as the payload row of a `stock_updates`
/// snapshot message and as a line item inside a reservation or order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodAmount {
    pub good_id: GoodId,
    pub amount: u64,
}

impl GoodAmount {
    pub fn new(good_id: impl Into<GoodId>, amount: u64) -> Self {
        Self {
            good_id: good_id.into(),
            amount,
        }
    }
}

/// A good and a signed delta, as sent to `warehouse.add_stock.<wh>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub good_id: GoodId,
    pub delta: i64,
}

/// Payload of `stock_updates.<wh>`. Carries absolute post-operation amounts, never
/// deltas — replaying any prefix of the subject onto an empty snapshot reproduces the
/// warehouse's current stock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockUpdateMessage(pub Vec<GoodAmount>);

impl StockUpdateMessage {
    pub fn new(rows: Vec<GoodAmount>) -> Self {
        Self(rows)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Request body of `warehouse.reserve.<wh>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveStockRequest {
    pub reservation_id: Uuid,
    pub items: Vec<GoodAmount>,
}

/// Payload of `reservations.<wh>` — the durable record of an accepted reservation.
/// `stream_sequence` and `published_at` are filled in by the warehouse from the broker's
/// own metadata at publish time, not chosen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub reserved_stock: Vec<GoodAmount>,
    #[serde(default)]
    pub stream_sequence: u64,
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

/// One warehouse's share of an accepted order: which reservation it honors and which
/// parts of the original request it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWarehouseAllocation {
    pub warehouse_id: WarehouseId,
    pub reservation_id: Uuid,
    pub parts: Vec<GoodAmount>,
}

/// Payload of the `orders` stream. A partition of the original request's per-good
/// amounts across the warehouses that accepted a reservation for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub warehouses: Vec<OrderWarehouseAllocation>,
}

/// Request body of `order.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<GoodAmount>,
}

/// A catalog entry, as stored (JSON-encoded) under its id in the `catalog` KV bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
}

/// Request body of `catalog.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatalogItemRequest {
    pub name: String,
}

/// Request body of `catalog.get` and `catalog.delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItemIdRequest {
    pub id: Uuid,
}

/// Request body of `catalog.update` — full replacement of the stored item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCatalogItemRequest {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_update_message_round_trips_through_json() {
        let msg = StockUpdateMessage::new(vec![
            GoodAmount::new("g1", 10),
            GoodAmount::new("g2", 0),
        ]);
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: StockUpdateMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn order_created_partitions_serialize_with_nested_parts() {
        let order = OrderCreated {
            order_id: Uuid::nil(),
            warehouses: vec![OrderWarehouseAllocation {
                warehouse_id: WarehouseId::new("w1"),
                reservation_id: Uuid::nil(),
                parts: vec![GoodAmount::new("g1", 4)],
            }],
        };
        let encoded = serde_json::to_value(&order).unwrap();
        assert_eq!(
            encoded["warehouses"][0]["parts"][0]["amount"],
            serde_json::json!(4)
        );
    }
}
