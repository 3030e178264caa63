//! ChainPayload — the snapshot of one fluent chain, consumed by a terminal
//! verb. The fluent builder itself lives in [`crate::records`]; this module
//! owns the data shape and its per-collection defaults.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::response::Response;
use crate::types::{DriverId, Options, SortMap, WhereClause};

/// Response post-processing hook, applied to every emission of the chain.
pub type TransformFn = dyn Fn(Response) -> Response + Send + Sync;

// ============================================================================
// ChainPayload
// ============================================================================

/// Everything a single call accumulated before its terminal verb.
///
/// Serialization is the canonical form used by key derivation: `ttl`, `key`,
/// transform hooks and the forced-network marker are excluded so that
/// logically identical requests hash identically.
#[derive(Clone, Serialize)]
pub struct ChainPayload {
    pub driver: DriverId,
    pub use_cache: bool,
    pub use_state: bool,
    pub use_network: bool,
    pub use_worker: bool,
    pub save_network: bool,

    /// Cache time-to-live in seconds. `0` disables expiry tracking.
    #[serde(skip)]
    pub ttl: u64,
    /// Explicit cache-key override — always wins over the derived key.
    #[serde(skip)]
    pub key: Option<String>,
    /// Set when `network(true)` was called explicitly, as opposed to the
    /// default being true. Forces the network emission in the decision policy.
    #[serde(skip)]
    pub network_forced: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub where_clauses: Vec<WhereClause>,
    #[serde(skip_serializing_if = "SortMap::is_empty")]
    pub sort: SortMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Whether driver output goes through data normalization (identifier
    /// aliasing). `raw(true)` turns it off.
    #[serde(skip)]
    pub transform_data: bool,
    #[serde(skip)]
    pub transform_response: Option<Arc<TransformFn>>,

    pub use_master_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_session_token: Option<String>,
}

impl ChainPayload {
    /// A fresh chain carrying the collection's process-wide defaults.
    pub fn from_options(options: &Options) -> Self {
        Self {
            driver: options.driver,
            use_cache: options.use_cache,
            use_state: options.use_state,
            use_network: options.use_network,
            use_worker: options.use_worker,
            save_network: options.save_network,
            ttl: 0,
            key: None,
            network_forced: false,
            query: None,
            where_clauses: Vec::new(),
            sort: SortMap::new(),
            size: None,
            at: None,
            after: None,
            doc: None,
            ref_path: None,
            fields: Vec::new(),
            transform_data: true,
            transform_response: None,
            use_master_key: false,
            use_session_token: None,
        }
    }

    /// Apply the configured response transform, if any.
    pub fn transform(&self, response: Response) -> Response {
        match &self.transform_response {
            Some(f) => f(response),
            None => response,
        }
    }
}

impl fmt::Debug for ChainPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainPayload")
            .field("driver", &self.driver)
            .field("use_cache", &self.use_cache)
            .field("use_state", &self.use_state)
            .field("use_network", &self.use_network)
            .field("save_network", &self.save_network)
            .field("ttl", &self.ttl)
            .field("key", &self.key)
            .field("query", &self.query)
            .field("where", &self.where_clauses)
            .field("sort", &self.sort)
            .field("size", &self.size)
            .field("doc", &self.doc)
            .field("transform_response", &self.transform_response.as_ref().map(|_| "<fn>"))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
