use std::sync::Arc;

use bytes::Bytes;
use common_broker::KvBucket;
use common_observability::ServiceMetrics;
use common_protocol::{
    CatalogItem, CatalogItemIdRequest, CreateCatalogItemRequest, ErrorKind, UpdateCatalogItemRequest,
};
use uuid::Uuid;

pub const SERVICE_NAME: &str = "catalog-service";

/// Shared state for the catalog process (spec §4.4): a single KV bucket keyed by item
/// id, one writer per key, no cross-key coordination needed.
#[derive(Clone)]
pub struct CatalogState {
    pub bucket: KvBucket,
    pub metrics: Arc<ServiceMetrics>,
}

fn record(metrics: &ServiceMetrics, subject: &str) {
    metrics.record_invocation(SERVICE_NAME, subject);
}

fn record_error(metrics: &ServiceMetrics, subject: &str, kind: &ErrorKind) {
    metrics.record_error(SERVICE_NAME, subject, kind.code());
}

fn encode(item: &CatalogItem) -> Result<Vec<u8>, ErrorKind> {
    serde_json::to_vec(item).map_err(ErrorKind::internal)
}

/// `catalog.ping` — liveness check.
pub async fn ping(state: CatalogState, _payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.ping");
    Ok(b"pong".to_vec())
}

/// `catalog.create` — mints a new id and stores `{id, name}` under it.
pub async fn create(state: CatalogState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.create");
    let req: CreateCatalogItemRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad create payload: {err}")))?;

    let item = CatalogItem {
        id: Uuid::new_v4(),
        name: req.name,
    };
    let body = encode(&item)?;
    state
        .bucket
        .put(&item.id.to_string(), body.clone())
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "catalog.create", &kind);
            kind
        })?;

    Ok(body)
}

/// `catalog.get` — returns the stored item or `not_found`.
pub async fn get(state: CatalogState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.get");
    let req: CatalogItemIdRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad get payload: {err}")))?;

    let value = state.bucket.get(&req.id.to_string()).await.map_err(|err| {
        let kind: ErrorKind = err.into();
        record_error(&state.metrics, "catalog.get", &kind);
        kind
    })?;

    match value {
        Some(bytes) => Ok(bytes.to_vec()),
        None => Err(ErrorKind::not_found(format!("catalog item {} not found", req.id))),
    }
}

/// `catalog.list` — watches the bucket until the `Drained` sentinel and returns the
/// resulting snapshot as a JSON array (spec §4.6).
pub async fn list(state: CatalogState, _payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.list");
    let values = state.bucket.snapshot_all().await.map_err(|err| {
        let kind: ErrorKind = err.into();
        record_error(&state.metrics, "catalog.list", &kind);
        kind
    })?;

    let items: Vec<CatalogItem> = values
        .iter()
        .filter_map(|bytes| serde_json::from_slice(bytes).ok())
        .collect();
    serde_json::to_vec(&items).map_err(ErrorKind::internal)
}

/// `catalog.update` — full replacement of the stored item; rejects unknown ids.
pub async fn update(state: CatalogState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.update");
    let req: UpdateCatalogItemRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad update payload: {err}")))?;

    if state
        .bucket
        .get(&req.id.to_string())
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "catalog.update", &kind);
            kind
        })?
        .is_none()
    {
        return Err(ErrorKind::not_found(format!("catalog item {} not found", req.id)));
    }

    let item = CatalogItem {
        id: req.id,
        name: req.name,
    };
    let body = encode(&item)?;
    state
        .bucket
        .put(&item.id.to_string(), body.clone())
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "catalog.update", &kind);
            kind
        })?;

    Ok(body)
}

/// `catalog.delete` — removes the item; rejects unknown ids.
pub async fn delete(state: CatalogState, payload: Bytes) -> Result<Vec<u8>, ErrorKind> {
    record(&state.metrics, "catalog.delete");
    let req: CatalogItemIdRequest = serde_json::from_slice(&payload)
        .map_err(|err| ErrorKind::invalid_request(format!("bad delete payload: {err}")))?;

    if state
        .bucket
        .get(&req.id.to_string())
        .await
        .map_err(|err| {
            let kind: ErrorKind = err.into();
            record_error(&state.metrics, "catalog.delete", &kind);
            kind
        })?
        .is_none()
    {
        return Err(ErrorKind::not_found(format!("catalog item {} not found", req.id)));
    }

    state.bucket.delete(&req.id.to_string()).await.map_err(|err| {
        let kind: ErrorKind = err.into();
        record_error(&state.metrics, "catalog.delete", &kind);
        kind
    })?;

    Ok(b"ok".to_vec())
}
