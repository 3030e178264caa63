use futures::StreamExt;
use serde_json::json;

use reactive_records::{RawResponse, Store};

use crate::records::support::parse_harness;

#[tokio::test]
async fn on_re_emits_every_upstream_change() {
    let h = parse_harness();
    let mut sub = h.records.chain().where_("active", "==", json!(true)).on().unwrap();

    h.driver.push_change(Ok(RawResponse::new(json!([{ "objectId": "a" }]))));
    let first = sub.next().await.unwrap().unwrap();
    assert_eq!(first.data[0]["id"], json!("a"));

    h.driver
        .push_change(Ok(RawResponse::new(json!([{ "objectId": "a" }, { "objectId": "b" }]))));
    let second = sub.next().await.unwrap().unwrap();
    assert_eq!(second.data.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn close_tears_down_the_feed() {
    let h = parse_harness();
    let mut sub = h.records.chain().on().unwrap();

    h.driver.push_change(Ok(RawResponse::new(json!([1]))));
    assert!(sub.next().await.is_some());

    sub.close();
    assert!(sub.is_closed());
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn realtime_emissions_feed_shared_state() {
    let h = parse_harness();
    let mut sub = h.records.chain().key("LIVE").on().unwrap();

    h.driver.push_change(Ok(RawResponse::new(json!([{ "objectId": "a" }]))));
    let _ = sub.next().await;

    assert!(h.store.get("LIVE").is_some());
}

#[tokio::test]
async fn upstream_errors_surface_without_closing_the_handle() {
    let h = parse_harness();
    let mut sub = h.records.chain().on().unwrap();

    h.driver
        .push_change(Err(reactive_records::RecordsError::transport("listener reset")));
    assert!(sub.next().await.unwrap().is_err());

    // the feed stays usable after an error item
    h.driver.push_change(Ok(RawResponse::new(json!([1]))));
    assert!(sub.next().await.unwrap().is_ok());
}
