//! The normalized response envelope and its shaping rules.
//!
//! Every consumer-visible emission is a [`Response`]: `data` carries the
//! domain payload, `response` the transport metadata, and the remaining
//! fields identify the request. Drivers hand the orchestrator a
//! [`RawResponse`]; [`normalize_response`] turns it into the envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::DriverId;

// ============================================================================
// Response envelope
// ============================================================================

/// The only shape ever emitted to a consumer, regardless of backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Domain payload (array or object), stripped of transport metadata.
    pub data: Value,
    /// Transport/driver metadata — counts, emptiness flags, raw snapshot
    /// metadata. Never contains a nested `data` field.
    pub response: Value,
    pub key: String,
    pub collection: String,
    pub driver: DriverId,
}

// ============================================================================
// CacheEntry
// ============================================================================

/// The persisted form of a response. `ttl`, when present, is an absolute
/// expiry timestamp (epoch seconds), not a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub response: Response,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl CacheEntry {
    /// Whether the entry is still fresh at `now` (epoch seconds).
    /// Entries without expiry tracking are always fresh.
    pub fn is_fresh(&self, now: u64) -> bool {
        match self.ttl {
            None | Some(0) => true,
            Some(expiry) => now < expiry,
        }
    }
}

// ============================================================================
// RawResponse — driver output before normalization
// ============================================================================

/// What a driver hands back: the payload plus whatever transport metadata
/// it wants to expose.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub data: Value,
    pub meta: Value,
}

impl RawResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            meta: Value::Null,
        }
    }

    pub fn with_meta(data: Value, meta: Value) -> Self {
        Self { data, meta }
    }
}

// ============================================================================
// Emptiness
// ============================================================================

/// Empty arrays/objects (and null/empty strings) are treated as "no data":
/// they never satisfy a cache hit and never suppress a network emission.
pub fn is_empty_data(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Context the normalizer stamps onto every envelope.
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub key: &'a str,
    pub collection: &'a str,
    pub driver: DriverId,
    /// Identifier field aliased to `id` on each record. `None` disables
    /// aliasing (the `raw` chain option).
    pub identifier: Option<&'a str>,
}

/// Shape arbitrary driver output into the standard envelope.
///
/// Guarantees: the four envelope fields are always present (`response`
/// defaults to `{}`), no `data` nesting inside `response`, and `empty`/`size`
/// flags derived from the payload.
pub fn normalize_response(raw: RawResponse, ctx: &NormalizeContext<'_>) -> Response {
    let mut data = raw.data;
    if let Some(identifier) = ctx.identifier {
        alias_identifier(&mut data, identifier);
    }

    let mut meta = match raw.meta {
        Value::Object(mut obj) => {
            // the envelope owns `data`; duplicates inside metadata are dropped
            obj.remove("data");
            obj
        }
        _ => serde_json::Map::new(),
    };

    let size = match &data {
        Value::Array(a) => Some(a.len() as u64),
        _ => None,
    };
    meta.entry("empty")
        .or_insert_with(|| Value::Bool(is_empty_data(&data)));
    if let Some(size) = size {
        meta.entry("size").or_insert_with(|| Value::from(size));
    }

    Response {
        data,
        response: Value::Object(meta),
        key: ctx.key.to_string(),
        collection: ctx.collection.to_string(),
        driver: ctx.driver,
    }
}

/// Copy the backend identifier field to `id` on each plain record.
fn alias_identifier(data: &mut Value, identifier: &str) {
    if identifier == "id" {
        return;
    }
    match data {
        Value::Object(obj) => {
            if let Some(ident) = obj.get(identifier).cloned() {
                obj.entry("id").or_insert(ident);
            }
        }
        Value::Array(items) => {
            for item in items {
                alias_identifier(item, identifier);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
