//! Core shared types: driver/verb identifiers, chain method names,
//! where/sort primitives, and the collection-level `Options` struct.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// DriverId
// ============================================================================

/// Identifier of a backend adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverId {
    Http,
    Firestore,
    Firebase,
    Parse,
}

impl DriverId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Firestore => "firestore",
            Self::Firebase => "firebase",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Verb
// ============================================================================

/// A terminal operation that triggers request execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
    Find,
    FindOne,
    Set,
    Update,
    On,
    Count,
    Run,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::Set => "set",
            Self::Update => "update",
            Self::On => "on",
            Self::Count => "count",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ChainMethod
// ============================================================================

/// Name of a fluent chaining method, used by the per-driver capability tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChainMethod {
    Driver,
    Network,
    Save,
    Ttl,
    Cache,
    State,
    Key,
    Query,
    Where,
    Sort,
    Size,
    At,
    After,
    Ref,
    Doc,
    Include,
    Master,
    Token,
    Raw,
    Transform,
    Worker,
}

impl ChainMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Network => "network",
            Self::Save => "save",
            Self::Ttl => "ttl",
            Self::Cache => "cache",
            Self::State => "state",
            Self::Key => "key",
            Self::Query => "query",
            Self::Where => "where",
            Self::Sort => "sort",
            Self::Size => "size",
            Self::At => "at",
            Self::After => "after",
            Self::Ref => "ref",
            Self::Doc => "doc",
            Self::Include => "include",
            Self::Master => "master",
            Self::Token => "token",
            Self::Raw => "raw",
            Self::Transform => "transform",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for ChainMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Execution context. Browser-gated chain options are ignored (with a logged
/// warning) when the library runs on `Server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Server,
    Browser,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Server => "server",
            Self::Browser => "browser",
        })
    }
}

// ============================================================================
// Where / Sort primitives
// ============================================================================

/// A single predicate accumulated by `where_` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort specification. A `BTreeMap` so repeated `sort` calls merge keys and
/// so key derivation is deterministic regardless of call order.
pub type SortMap = BTreeMap<String, SortOrder>;

// ============================================================================
// Http config
// ============================================================================

/// Configuration applied to the HTTP driver's client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    pub headers: BTreeMap<String, String>,
    /// Overrides `Options::base_url` when set.
    pub base_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 60,
            headers: BTreeMap::new(),
            base_url: None,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Per-collection configuration passed to `Records::new`.
///
/// Boolean toggles here are the process-wide defaults a fresh chain starts
/// from; individual calls override them through the fluent methods.
#[derive(Debug, Clone)]
pub struct Options {
    pub driver: DriverId,
    pub collection: Option<String>,
    pub base_url: Option<String>,
    pub endpoint: Option<String>,
    pub http_config: HttpConfig,
    pub use_cache: bool,
    pub use_state: bool,
    pub use_network: bool,
    pub save_network: bool,
    pub use_worker: bool,
    /// Autofill created/updated timestamps on `set`/`update` payloads.
    pub timestamp: bool,
    pub timestamp_created: String,
    pub timestamp_updated: String,
    /// Field drivers use as the record identifier; the normalizer aliases it
    /// to `id` on every returned record.
    pub identifier: String,
    pub platform: Platform,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            driver: DriverId::Http,
            collection: None,
            base_url: None,
            endpoint: None,
            http_config: HttpConfig::default(),
            use_cache: true,
            use_state: true,
            use_network: true,
            save_network: true,
            use_worker: false,
            timestamp: true,
            timestamp_created: "created_at".into(),
            timestamp_updated: "updated_at".into(),
            identifier: "id".into(),
            platform: Platform::Server,
        }
    }
}

impl Options {
    /// Collection name, or the `"rr"` namespace fallback used in cache keys.
    pub fn collection_or_namespace(&self) -> &str {
        self.collection.as_deref().unwrap_or("rr")
    }

    /// The effective base URL: `http_config.base_url` wins over `base_url`.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.http_config
            .base_url
            .as_deref()
            .or(self.base_url.as_deref())
    }
}

// ============================================================================
// Tests
// ============================================================================
