//! Wire-level scenarios for the catalog CRUD payloads (handlers themselves need a
//! live KV bucket, so the interesting logic to pin down here is on the message shapes).

use common_protocol::{CatalogItem, CatalogItemIdRequest, CreateCatalogItemRequest, UpdateCatalogItemRequest};
use uuid::Uuid;

#[test]
fn catalog_item_round_trips_through_json() {
    let item = CatalogItem {
        id: Uuid::new_v4(),
        name: "widget".to_string(),
    };
    let encoded = serde_json::to_vec(&item).unwrap();
    let decoded: CatalogItem = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(item, decoded);
}

#[test]
fn create_request_only_carries_a_name() {
    let encoded = serde_json::json!({ "name": "widget" });
    let req: CreateCatalogItemRequest = serde_json::from_value(encoded).unwrap();
    assert_eq!(req.name, "widget");
}

#[test]
fn update_request_replaces_name_for_an_existing_id() {
    let id = Uuid::new_v4();
    let encoded = serde_json::json!({ "id": id, "name": "renamed" });
    let req: UpdateCatalogItemRequest = serde_json::from_value(encoded).unwrap();
    assert_eq!(req.id, id);
    assert_eq!(req.name, "renamed");
}

#[test]
fn id_request_used_by_both_get_and_delete() {
    let id = Uuid::new_v4();
    let encoded = serde_json::json!({ "id": id });
    let req: CatalogItemIdRequest = serde_json::from_value(encoded).unwrap();
    assert_eq!(req.id, id);
}
