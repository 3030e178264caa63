use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use reactive_records::{
    Driver, DriverId, DriverRegistry, MemoryStore, Options, Records, RecordsError, Storage, Store,
};

use crate::records::support::{
    envelope, http_harness, now_seconds, seeded_entry, CountingStorage, MockDriver,
};

#[tokio::test]
async fn cache_hit_suppresses_the_network() {
    let h = http_harness();
    h.storage
        .set("K", seeded_entry("K", json!({ "a": 1 }), Some(now_seconds() + 60)))
        .await
        .unwrap();

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!({ "a": 1 }));
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn expired_entry_goes_to_network() {
    let h = http_harness();
    h.storage
        .set("K", seeded_entry("K", json!([1]), Some(now_seconds() - 1)))
        .await
        .unwrap();
    h.driver.reply_data(json!([1, 2]));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(h.driver.call_count(), 1);
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!([1, 2]));
}

#[tokio::test]
async fn cache_miss_persists_without_ttl() {
    let h = http_harness();
    h.driver.reply_data(json!([{ "x": 1 }]));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(emissions.len(), 1);
    let stored = h.storage.get("K").await.unwrap().unwrap();
    assert_eq!(stored.response.data, json!([{ "x": 1 }]));
    assert_eq!(stored.ttl, None);
}

#[tokio::test]
async fn ttl_option_persists_absolute_expiry() {
    let h = http_harness();
    h.driver.reply_data(json!([1]));
    let before = now_seconds();

    let stream = h.records.chain().key("K").ttl(60).get("/users").unwrap();
    let _ = stream.collect::<Vec<_>>().await;

    let stored = h.storage.get("K").await.unwrap().unwrap();
    let expiry = stored.ttl.unwrap();
    assert!(expiry >= before + 60 && expiry <= now_seconds() + 60);
}

#[tokio::test]
async fn identical_response_writes_cache_only_once() {
    let storage = CountingStorage::shared();
    let store = MemoryStore::shared();
    let driver = MockDriver::new(DriverId::Http);
    let mut registry = DriverRegistry::new();
    registry.register(driver.clone() as Arc<dyn Driver>);
    let records = Records::new(
        Options {
            collection: Some("users".into()),
            base_url: Some("https://api.example.com".into()),
            endpoint: Some("/v1".into()),
            ..Default::default()
        },
        registry,
        storage.clone() as Arc<dyn Storage>,
        store as Arc<dyn Store>,
    );

    // expired entry: the network runs, but its data matches the stored copy
    storage
        .set("K", seeded_entry("K", json!([1]), Some(now_seconds() - 1)))
        .await
        .unwrap();
    driver.reply_data(json!([1]));

    let stream = records.chain().key("K").state(false).get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    // unchanged data: nothing emitted, and the seed write stays the only one
    assert!(emissions.is_empty());
    assert_eq!(storage.set_count(), 1);
    assert_eq!(driver.call_count(), 1);
}

#[tokio::test]
async fn forced_network_emits_even_when_unchanged() {
    let h = http_harness();
    h.storage
        .set("K", seeded_entry("K", json!([1]), None))
        .await
        .unwrap();
    h.driver.reply_data(json!([1]));

    let stream = h
        .records
        .chain()
        .key("K")
        .cache(false)
        .network(true)
        .get("/users")
        .unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(h.driver.call_count(), 1);
    assert_eq!(emissions.len(), 1);
}

#[tokio::test]
async fn network_off_completes_after_local_branches() {
    let h = http_harness();
    let stream = h.records.chain().key("K").network(false).get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert!(emissions.is_empty());
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn state_emits_before_network() {
    let h = http_harness();
    h.store.dispatch(envelope("K", json!([1]), DriverId::Http));
    h.driver.reply_data(json!([1, 2]));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(emissions.len(), 2);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!([1]));
    assert_eq!(emissions[1].as_ref().unwrap().data, json!([1, 2]));
}

#[tokio::test]
async fn matching_state_and_cache_emit_once() {
    let h = http_harness();
    h.store.dispatch(envelope("K", json!([1]), DriverId::Http));
    h.storage
        .set("K", seeded_entry("K", json!([1]), Some(now_seconds() + 60)))
        .await
        .unwrap();

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    // state and cache carry the same payload: one emission, no network
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!([1]));
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn stale_state_is_followed_by_fresher_cache() {
    let h = http_harness();
    h.store.dispatch(envelope("K", json!([1]), DriverId::Http));
    h.storage
        .set("K", seeded_entry("K", json!([1, 2]), Some(now_seconds() + 60)))
        .await
        .unwrap();

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(emissions.len(), 2);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!([1]));
    assert_eq!(emissions[1].as_ref().unwrap().data, json!([1, 2]));
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn cache_off_still_diffs_against_stored_copy() {
    let storage = CountingStorage::shared();
    let store = MemoryStore::shared();
    let driver = MockDriver::new(DriverId::Http);
    let mut registry = DriverRegistry::new();
    registry.register(driver.clone() as Arc<dyn Driver>);
    let records = Records::new(
        Options {
            collection: Some("users".into()),
            base_url: Some("https://api.example.com".into()),
            endpoint: Some("/v1".into()),
            ..Default::default()
        },
        registry,
        storage.clone() as Arc<dyn Storage>,
        store as Arc<dyn Store>,
    );

    driver.reply_data(json!([1]));
    let first: Vec<_> = records
        .chain()
        .key("K")
        .cache(false)
        .state(false)
        .get("/users")
        .unwrap()
        .collect()
        .await;
    assert_eq!(first.len(), 1);
    assert_eq!(storage.set_count(), 1);

    // same payload again: the persisted copy is re-read before the diff,
    // so nothing is emitted and nothing is rewritten
    driver.reply_data(json!([1]));
    let second: Vec<_> = records
        .chain()
        .key("K")
        .cache(false)
        .state(false)
        .get("/users")
        .unwrap()
        .collect()
        .await;
    assert!(second.is_empty());
    assert_eq!(storage.set_count(), 1);
    assert_eq!(driver.call_count(), 2);
}

#[tokio::test]
async fn empty_cached_payload_never_hits() {
    let h = http_harness();
    h.storage
        .set("K", seeded_entry("K", json!([]), None))
        .await
        .unwrap();
    h.driver.reply_data(json!([5]));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(h.driver.call_count(), 1);
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].as_ref().unwrap().data, json!([5]));
}

#[tokio::test]
async fn transport_error_flows_through_the_stream() {
    let h = http_harness();
    h.driver.fail(RecordsError::transport_with_body(
        "409",
        json!({ "code": 409, "error": "conflict" }),
    ));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let emissions: Vec<_> = stream.collect().await;

    assert_eq!(emissions.len(), 1);
    let err = emissions[0].as_ref().unwrap_err();
    // consumers get the backend's nested body, not the bare message
    assert_eq!(err.error_payload(), json!({ "code": 409, "error": "conflict" }));
}

#[tokio::test]
async fn network_response_feeds_shared_state() {
    let h = http_harness();
    h.driver.reply_data(json!([7]));

    let stream = h.records.chain().key("K").get("/users").unwrap();
    let _ = stream.collect::<Vec<_>>().await;

    assert_eq!(h.store.get("K").unwrap().data, json!([7]));
}
