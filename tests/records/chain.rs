use futures::StreamExt;
use serde_json::json;

use reactive_records::{ChainMethod, DriverId, RecordsError, SortOrder, VerbRequest};

use crate::records::support::parse_harness;

#[tokio::test]
async fn where_calls_accumulate_and_sort_calls_merge() {
    let h = parse_harness();
    let stream = h
        .records
        .chain()
        .where_("active", "==", json!(true))
        .where_("age", ">=", json!(18))
        .sort("name", SortOrder::Asc)
        .sort("age", SortOrder::Desc)
        .size(10)
        .find()
        .unwrap();
    let _ = stream.collect::<Vec<_>>().await;

    let calls = h.driver.calls();
    assert_eq!(calls.len(), 1);
    let VerbRequest::Read { chain, .. } = &calls[0] else {
        panic!("expected a read request, got {:?}", calls[0]);
    };
    assert_eq!(chain.where_clauses.len(), 2);
    assert_eq!(chain.where_clauses[0].field, "active");
    assert_eq!(chain.where_clauses[1].operator, ">=");
    assert_eq!(chain.sort.len(), 2);
    assert_eq!(chain.sort.get("age"), Some(&SortOrder::Desc));
    assert_eq!(chain.size, Some(10));
}

#[tokio::test]
async fn each_chain_starts_from_defaults() {
    let h = parse_harness();

    let first = h
        .records
        .chain()
        .where_("active", "==", json!(true))
        .size(5)
        .find()
        .unwrap();
    let _ = first.collect::<Vec<_>>().await;

    // a fresh chain carries nothing over from the previous call
    let second = h.records.chain().find().unwrap();
    let _ = second.collect::<Vec<_>>().await;

    let calls = h.driver.calls();
    let VerbRequest::Read { chain, .. } = &calls[1] else {
        panic!("expected a read request");
    };
    assert!(chain.where_clauses.is_empty());
    assert_eq!(chain.size, None);
}

#[tokio::test]
async fn browser_only_option_is_ignored_on_server() {
    // parse gates ttl to browser contexts; server default ignores it
    let h = parse_harness();
    let stream = h.records.chain().ttl(3600).find().unwrap();
    let _ = stream.collect::<Vec<_>>().await;

    let calls = h.driver.calls();
    let VerbRequest::Read { chain, .. } = &calls[0] else {
        panic!("expected a read request");
    };
    assert_eq!(chain.ttl, 0);
}

#[tokio::test]
async fn unsupported_option_fails_at_the_verb() {
    // http has no where support in any context
    let h = crate::records::support::http_harness();
    let Err(err) = h
        .records
        .chain()
        .where_("active", "==", json!(true))
        .get("/users")
    else {
        panic!("expected the verb to reject the chain");
    };
    assert!(matches!(
        err,
        RecordsError::UnsupportedChain {
            driver: DriverId::Http,
            method: ChainMethod::Where,
            ..
        }
    ));
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn first_unsupported_option_wins() {
    let h = crate::records::support::http_harness();
    let Err(err) = h
        .records
        .chain()
        .sort("name", SortOrder::Asc)
        .where_("active", "==", json!(true))
        .get("/users")
    else {
        panic!("expected the verb to reject the chain");
    };
    assert!(matches!(
        err,
        RecordsError::UnsupportedChain {
            method: ChainMethod::Sort,
            ..
        }
    ));
}

#[tokio::test]
async fn raw_disables_identifier_aliasing() {
    let h = parse_harness();
    h.driver.reply_data(json!([{ "objectId": "abc" }]));

    let mut stream = h.records.chain().raw(true).find().unwrap();
    let emission = stream.next().await.unwrap().unwrap();
    assert_eq!(emission.data, json!([{ "objectId": "abc" }]));
}

#[tokio::test]
async fn transform_applies_to_every_emission() {
    let h = parse_harness();
    h.driver.reply_data(json!([1, 2, 3]));

    let mut stream = h
        .records
        .chain()
        .transform(|mut response| {
            response.response["tagged"] = json!(true);
            response
        })
        .find()
        .unwrap();
    let emission = stream.next().await.unwrap().unwrap();
    assert_eq!(emission.response["tagged"], json!(true));
}
