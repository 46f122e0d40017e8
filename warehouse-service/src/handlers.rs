use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use common_broker::Broker;
use common_observability::ServiceMetrics;
use common_protocol::{
    subjects, ErrorKind, GoodAmount, OrderCreated, ReserveStockRequest, Reservation as WireReservation,
    StockDelta, StockUpdateMessage, WarehouseId,
};
use common_runtime::{Ack, StreamEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::reservations::{OpenReservation, ReservationBook};
use crate::stock::StockSnapshot;

pub const SERVICE_NAME: &str = "warehouse-service";

/// Shared, lock-guarded state for one warehouse process (spec §4.3, §5). Two narrow
/// mutexes — `stock` and `reservations` — rather than one coarse lock; operations that
/// need both acquire `reservations` before `stock` to avoid deadlock (spec §5).
#[derive(Clone)]
pub struct WarehouseState {
    pub warehouse_id: WarehouseId,
    pub stock: Arc<Mutex<StockSnapshot>>,
    pub reservations: Arc<Mutex<ReservationBook>>,
    pub broker: Broker,
    pub metrics: Arc<ServiceMetrics>,
}

impl WarehouseState {
    pub fn new(warehouse_id: WarehouseId, broker: Broker, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            warehouse_id,
            stock: Arc::new(Mutex::new(StockSnapshot::new())),
            reservations: Arc::new(Mutex::new(ReservationBook::new())),
            broker,
            metrics,
        }
    }
}

fn record(metrics: &ServiceMetrics, subject: &str) {
    metrics.record_invocation(SERVICE_NAME, subject);
}

fn record_error(metrics: &ServiceMetrics, subject: &str, kind: &ErrorKind) {
    metrics.record_error(SERVICE_NAME, subject, kind.code());
}

/// `warehouse.ping.<wh>` — liveness check.
pub async fn ping(state: WarehouseState, _payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "warehouse.ping");
    Ok(b"pong".to_vec())
}

/// `warehouse.add_stock.<wh>` (spec §4.3): publish the absolute snapshot before
/// committing in memory, so a crash between the two leaves the stream authoritative.
pub async fn add_stock(state: WarehouseState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "warehouse.add_stock");
    let deltas: Vec<StockDelta> = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad add_stock payload: {err}")))?;

    let mut stock = state.stock.lock().await;
    let rows: Vec<GoodAmount> = deltas
        .iter()
        .map(|delta| GoodAmount::new(delta.good_id.clone(), stock.resolve_delta(&delta.good_id, delta.delta)))
        .collect();

    let subject = subjects::stock_updates_subject(&state.warehouse_id);
    let body = serde_json::to_vec(&StockUpdateMessage::new(rows.clone()))
        .map_err(|err| ErrorKind::internal(err))?;
    state
        .broker
        .publish_durable(subject, body)
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "warehouse.add_stock", &kind);
            kind
        })?;

    for row in &rows {
        stock.set_stocked(&row.good_id, row.amount);
    }

    Ok(b"ok".to_vec())
}

/// `warehouse.reserve.<wh>` (spec §4.3): feasibility check and publish happen under the
/// stock lock so concurrent reservations serialize; the reservations-stream's own
/// append order is what makes the durable record authoritative.
pub async fn reserve(state: WarehouseState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "warehouse.reserve");
    let req: ReserveStockRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad reserve payload: {err}")))?;

    let mut stock = state.stock.lock().await;
    let feasible = req
        .items
        .iter()
        .all(|item| stock.has_available(&item.good_id, item.amount));
    if !feasible {
        return Ok(b"not enough stock".to_vec());
    }

    let wire = WireReservation {
        id: req.reservation_id,
        reserved_stock: req.items.clone(),
        stream_sequence: 0,
        published_at: Utc::now(),
    };
    let subject = subjects::reservations_subject(&state.warehouse_id);
    let body = serde_json::to_vec(&wire).map_err(|err| ErrorKind::internal(err))?;
    state
        .broker
        .publish_durable(subject, body)
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "warehouse.reserve", &kind);
            kind
        })?;

    for item in &req.items {
        stock.increment_reserved(&item.good_id, item.amount);
    }

    Ok(b"ok".to_vec())
}

/// Startup and live projection of `stock_updates.<wh>` — replay resets `reserved` to
/// zero on each replayed key; the subsequent live feed (delivery `new`) only updates
/// `stocked` (spec §4.3).
pub async fn project_stock_replay(state: WarehouseState, event: StreamEvent) {
    apply_stock_event(&state, &event, true).await;
}

pub async fn project_stock_live(state: WarehouseState, event: StreamEvent) -> Ack {
    apply_stock_event(&state, &event, false).await;
    Ack::Ack
}

async fn apply_stock_event(state: &WarehouseState, event: &StreamEvent, is_replay: bool) {
    let Some(wh) = subjects::strip_prefix(&event.subject, subjects::STOCK_UPDATES_PREFIX) else {
        warn!(subject = %event.subject, "stock_updates message with unexpected subject");
        return;
    };
    if wh != state.warehouse_id.as_str() {
        return;
    }
    let msg: StockUpdateMessage = match serde_json::from_slice(&event.payload) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%err, "malformed stock_updates payload, skipping");
            return;
        }
    };
    let mut stock = state.stock.lock().await;
    if is_replay {
        stock.apply_snapshot_replay(&msg);
    } else {
        stock.apply_live_update(&msg);
    }
}

/// Startup and live projection of `reservations.<wh>` — builds the open-reservation
/// book this warehouse itself is the sole writer of (spec §4.3 startup).
pub async fn project_reservations_replay(state: WarehouseState, event: StreamEvent) {
    apply_reservation_event(&state, &event).await;
    drop_expired_now(&state).await;
}

pub async fn project_reservations_live(state: WarehouseState, event: StreamEvent) -> Ack {
    apply_reservation_event(&state, &event).await;
    Ack::Ack
}

async fn apply_reservation_event(state: &WarehouseState, event: &StreamEvent) {
    let Some(wh) = subjects::strip_prefix(&event.subject, subjects::RESERVATIONS_PREFIX) else {
        warn!(subject = %event.subject, "reservations message with unexpected subject");
        return;
    };
    if wh != state.warehouse_id.as_str() {
        return;
    }
    let wire: WireReservation = match serde_json::from_slice(&event.payload) {
        Ok(wire) => wire,
        Err(err) => {
            warn!(%err, "malformed reservation payload, skipping");
            return;
        }
    };
    let mut reservations = state.reservations.lock().await;
    reservations.insert(OpenReservation {
        id: wire.id,
        items: wire.reserved_stock,
        stream_sequence: event.stream_sequence,
        published_at: event.published_at,
    });
}

/// Drop any reservation that is already expired by the time it's replayed at startup
/// (spec §4.3 startup: "drop any whose timestamp plus `ReservationTimeout` is past").
async fn drop_expired_now(state: &WarehouseState) {
    let mut reservations = state.reservations.lock().await;
    let dropped = reservations.sweep_expired(Utc::now());
    drop(reservations);
    if dropped.is_empty() {
        return;
    }
    let mut stock = state.stock.lock().await;
    for reservation in dropped {
        for item in reservation.items {
            stock.release_reserved(&item.good_id, item.amount);
        }
    }
}

/// Every 5s, scan open reservations and release any whose deadline has passed back
/// into `available` stock (spec §4.3 decay loop, corrected per spec §9).
pub async fn decay_expired_reservations(state: &WarehouseState) {
    let expired = {
        let mut reservations = state.reservations.lock().await;
        reservations.sweep_expired(Utc::now())
    };
    if expired.is_empty() {
        return;
    }
    let mut stock = state.stock.lock().await;
    for reservation in &expired {
        for item in &reservation.items {
            stock.release_reserved(&item.good_id, item.amount);
        }
    }
    info!(count = expired.len(), "expired reservations released");
}

/// Consume the `orders` stream: commit this warehouse's share of an accepted order by
/// converting its reservation into a real stock decrement, then re-publish the
/// authoritative absolute stock so read-models converge (spec §4.3).
pub async fn handle_order_created(state: WarehouseState, event: StreamEvent) -> Ack {
    let order: OrderCreated = match serde_json::from_slice(&event.payload) {
        Ok(order) => order,
        Err(err) => {
            return Ack::Term(format!("malformed OrderCreated payload: {err}"));
        }
    };

    let Some(allocation) = order
        .warehouses
        .iter()
        .find(|w| w.warehouse_id == state.warehouse_id)
    else {
        // This warehouse is not responsible for this order.
        return Ack::Ack;
    };

    // Lock order: reservation, then stock (spec §5).
    let mut reservations = state.reservations.lock().await;
    let Some(reservation) = reservations.remove(&allocation.reservation_id) else {
        warn!(reservation_id = %allocation.reservation_id, "reservation expired or lost, skipping commit");
        return Ack::Ack;
    };
    drop(reservations);

    let mut stock = state.stock.lock().await;
    let mut rows = Vec::with_capacity(reservation.items.len());
    for item in &reservation.items {
        let remaining = stock.commit(&item.good_id, item.amount);
        rows.push(GoodAmount::new(item.good_id.clone(), remaining));
    }
    drop(stock);

    let subject = subjects::stock_updates_subject(&state.warehouse_id);
    let body = match serde_json::to_vec(&StockUpdateMessage::new(rows)) {
        Ok(body) => body,
        Err(err) => {
            warn!(%err, "failed to encode committed stock update");
            return Ack::Retry;
        }
    };
    match state.broker.publish_durable(subject, body).await {
        Ok(_) => Ack::Ack,
        Err(err) => {
            warn!(%err, "failed to publish committed stock update");
            Ack::Retry
        }
    }
}

/// Spawn the 5s decay loop; runs until `shutdown` is cancelled.
pub fn spawn_decay_loop(state: WarehouseState, shutdown: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => decay_expired_reservations(&state).await,
            }
        }
    });
}
