//! Subject-name construction and parsing. Centralised here so every service agrees on
//! the prefix/suffix convention described in spec §9 ("subject suffix as tenant key").

use crate::ids::WarehouseId;

pub const STOCK_UPDATES_STREAM: &str = "stock_updates";
pub const STOCK_UPDATES_PREFIX: &str = "stock_updates.";
pub const RESERVATIONS_STREAM: &str = "reservations";
pub const RESERVATIONS_PREFIX: &str = "reservations.";
pub const ORDERS_STREAM: &str = "orders";
pub const ORDERS_SUBJECT: &str = "orders";
pub const CATALOG_BUCKET: &str = "catalog";

pub fn stock_updates_subject(warehouse_id: &WarehouseId) -> String {
    format!("{STOCK_UPDATES_PREFIX}{}", warehouse_id.as_str())
}

pub fn reservations_subject(warehouse_id: &WarehouseId) -> String {
    format!("{RESERVATIONS_PREFIX}{}", warehouse_id.as_str())
}

pub fn warehouse_ping_subject(warehouse_id: &WarehouseId) -> String {
    format!("warehouse.ping.{}", warehouse_id.as_str())
}

pub fn warehouse_add_stock_subject(warehouse_id: &WarehouseId) -> String {
    format!("warehouse.add_stock.{}", warehouse_id.as_str())
}

pub fn warehouse_reserve_subject(warehouse_id: &WarehouseId) -> String {
    format!("warehouse.reserve.{}", warehouse_id.as_str())
}

/// Strict prefix check used when parsing a warehouse-id back out of a subject a
/// handler was invoked for. A mismatch is a bug, not a retryable condition — the
/// caller should terminate the message rather than retry it (spec §9).
pub fn strip_prefix<'a>(subject: &'a str, prefix: &str) -> Option<&'a str> {
    subject.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_subjects() {
        let wh = WarehouseId::new("w1");
        assert_eq!(stock_updates_subject(&wh), "stock_updates.w1");
        assert_eq!(reservations_subject(&wh), "reservations.w1");
        assert_eq!(warehouse_reserve_subject(&wh), "warehouse.reserve.w1");
    }

    #[test]
    fn strip_prefix_rejects_bare_prefix_and_mismatches() {
        assert_eq!(strip_prefix("stock_updates.w1", STOCK_UPDATES_PREFIX), Some("w1"));
        assert_eq!(strip_prefix("stock_updates.", STOCK_UPDATES_PREFIX), None);
        assert_eq!(strip_prefix("reservations.w1", STOCK_UPDATES_PREFIX), None);
    }
}
