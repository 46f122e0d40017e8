//! Wire types and error taxonomy shared by every service in the fulfillment system.
//!
//! Nothing in this crate talks to a broker; it only describes what goes over one.

pub mod error;
pub mod ids;
pub mod messages;
pub mod subjects;

pub use error::ErrorKind;
pub use ids::{GoodId, WarehouseId};
pub use messages::{
    CatalogItem, CatalogItemIdRequest, CreateCatalogItemRequest, CreateOrderRequest, GoodAmount,
    OrderCreated, OrderWarehouseAllocation, ReserveStockRequest, Reservation, StockDelta,
    StockUpdateMessage, UpdateCatalogItemRequest,
};
