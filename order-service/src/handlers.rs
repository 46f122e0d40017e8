use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common_broker::Broker;
use common_observability::ServiceMetrics;
use common_protocol::{
    subjects, CreateOrderRequest, ErrorKind, OrderCreated, OrderWarehouseAllocation,
    ReserveStockRequest,
};
use common_runtime::{Ack, StreamEvent};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::planner;
use crate::readmodel::{warehouse_from_subject, ReadModel};

pub const SERVICE_NAME: &str = "order-service";
const RESERVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Order-service state: one read-model mutex, held for the planner's whole execution
/// including the outbound reserve calls (spec §5 — correctness over throughput, a
/// named open question in §9 this revision resolves by keeping the simple behaviour).
#[derive(Clone)]
pub struct OrderState {
    pub read_model: Arc<Mutex<ReadModel>>,
    pub broker: Broker,
    pub metrics: Arc<ServiceMetrics>,
}

impl OrderState {
    pub fn new(broker: Broker, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            read_model: Arc::new(Mutex::new(ReadModel::new())),
            broker,
            metrics,
        }
    }
}

pub async fn ping(state: OrderState, _payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    state.metrics.record_invocation(SERVICE_NAME, "order.ping");
    Ok(b"pong".to_vec())
}

async fn apply_stock_event(state: &OrderState, event: &StreamEvent) {
    let Some(warehouse_id) = warehouse_from_subject(&event.subject) else {
        warn!(subject = %event.subject, "stock_updates message with unexpected subject");
        return;
    };
    let msg = match serde_json::from_slice(&event.payload) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%err, "malformed stock_updates payload, skipping");
            return;
        }
    };
    let mut read_model = state.read_model.lock().await;
    read_model.apply(&warehouse_id, &msg);
}

pub async fn project_stock_replay(state: OrderState, event: StreamEvent) {
    apply_stock_event(&state, &event).await;
}

pub async fn project_stock_live(state: OrderState, event: StreamEvent) -> Ack {
    apply_stock_event(&state, &event).await;
    Ack::Ack
}

/// `order.create` (spec §4.4): plan under the read-model lock, issue reserves while
/// still holding it, then publish the resulting `OrderCreated` to the `orders` stream.
pub async fn create_order(state: OrderState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    state.metrics.record_invocation(SERVICE_NAME, "order.create");
    let request: CreateOrderRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad order.create payload: {err}")))?;

    let read_model = state.read_model.lock().await;
    let planned = planner::plan(&read_model, &request.items).map_err(|err| {
        state.metrics.record_error(SERVICE_NAME, "order.create", err.code());
        err
    })?;

    let mut allocations = Vec::with_capacity(planned.len());
    for warehouse in planned {
        let reservation_id = Uuid::new_v4();
        let reserve_request = ReserveStockRequest {
            reservation_id,
            items: warehouse.parts.clone(),
        };
        let body = serde_json::to_vec(&reserve_request).map_err(|err| ErrorKind::internal(err))?;
        let subject = subjects::warehouse_reserve_subject(&warehouse.warehouse_id);

        let reply = state
            .broker
            .request(subject, body, RESERVE_TIMEOUT)
            .await
            .map_err(|err| {
                let kind: ErrorKind = err.into();
                state.metrics.record_error(SERVICE_NAME, "order.create", kind.code());
                kind
            })?;

        // Reservations accepted earlier in this loop are not compensated if a later one
        // fails — see the planner partial-failure note (spec §7, §9).
        if reply.as_ref() != b"ok" {
            let kind = ErrorKind::nats_error(format!(
                "warehouse {} rejected reservation: {}",
                warehouse.warehouse_id,
                String::from_utf8_lossy(&reply)
            ));
            state.metrics.record_error(SERVICE_NAME, "order.create", kind.code());
            return Err(kind);
        }

        allocations.push(OrderWarehouseAllocation {
            warehouse_id: warehouse.warehouse_id,
            reservation_id,
            parts: warehouse.parts,
        });
    }
    drop(read_model);

    let order_id = Uuid::new_v4();
    let order = OrderCreated {
        order_id,
        warehouses: allocations,
    };
    let body = serde_json::to_vec(&order).map_err(|err| ErrorKind::internal(err))?;
    state
        .broker
        .publish_durable(subjects::ORDERS_SUBJECT, body)
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            state.metrics.record_error(SERVICE_NAME, "order.create", kind.code());
            kind
        })?;

    Ok(format!("order {order_id} created").into_bytes())
}
