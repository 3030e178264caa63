//! Cache-key derivation.
//!
//! A key is a stable fingerprint of a logical request: identical
//! filters/sort/size/driver produce the identical key regardless of the order
//! chain methods were called in, and any request-shaping change produces a
//! different key. Volatile fields (`ttl`, explicit `key`, transform hooks)
//! are excluded by `ChainPayload`'s serialization.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::chain::ChainPayload;
use crate::types::{Options, Verb};

/// Derive the cache key for one dispatch.
///
/// Format: `"<collection>:/<endpoint><path>/<sha256-hex>"`, with accidental
/// `///` sequences collapsed to `//`. Callers must honor an explicit
/// `chain.key` override before calling this.
pub fn derive_key(verb: Verb, path: &str, chain: &ChainPayload, payload: &Value, options: &Options) -> String {
    let mut fingerprint = match serde_json::to_value(chain) {
        Ok(Value::Object(map)) => map,
        // ChainPayload always serializes to an object; never expected
        _ => serde_json::Map::new(),
    };
    fingerprint.insert("verb".into(), Value::String(verb.as_str().into()));
    fingerprint.insert("path".into(), Value::String(path.into()));
    if !crate::response::is_empty_data(payload) {
        fingerprint.insert("payload".into(), payload.clone());
    }

    let canonical = canonical_json(&Value::Object(fingerprint));
    let digest = hex::encode(Sha256::digest(canonical.as_bytes()));

    let key = format!(
        "{}:/{}{}/{}",
        options.collection_or_namespace(),
        options.endpoint.as_deref().unwrap_or(""),
        path,
        digest
    );
    key.replace("///", "//")
}

/// Serialize with object keys sorted at every level, so the digest does not
/// depend on map iteration order.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // object keys are plain strings; reuse Value's escaping
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
