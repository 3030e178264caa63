//! Backend adapter seam.
//!
//! A [`Driver`] turns one resolved verb into backend traffic and hands back a
//! [`RawResponse`] the orchestrator shapes into the public envelope. Requests
//! travel as a tagged union so every verb's arguments are explicit instead of
//! positional.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ChainPayload;
use crate::error::{RecordsError, Result};
use crate::response::RawResponse;
use crate::types::DriverId;

pub mod caps;
pub mod registry;

pub use caps::{chain_allowed, chain_availability, resolve_verb, verb_availability, Availability};
pub use registry::DriverRegistry;

/// Realtime change feed produced by `listen`. Each item is a fresh snapshot of
/// the watched query.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<RawResponse>> + Send>>;

// ============================================================================
// VerbRequest
// ============================================================================

/// Query verbs that read without mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Find,
    FindOne,
    Count,
}

/// Mutating verbs that carry a document payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Update,
}

/// Methods the HTTP driver executes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

/// One resolved verb dispatch, with the arguments that verb actually takes.
#[derive(Debug, Clone)]
pub enum VerbRequest {
    /// `find` / `findOne` / `count` — the chain carries all request shaping.
    Read {
        kind: ReadKind,
        chain: ChainPayload,
        key: String,
    },
    /// `set` / `update` — document payload plus an optional target id
    /// (falls back to the chain's `doc` pointer).
    Write {
        kind: WriteKind,
        chain: ChainPayload,
        data: Value,
        id: Option<String>,
    },
    /// Driver-native `delete` (by doc pointer or accumulated filters).
    Remove {
        path: String,
        key: String,
        payload: Value,
        chain: ChainPayload,
    },
    /// Plain HTTP traffic, including verbs redirected onto the HTTP driver.
    Http {
        method: HttpMethod,
        path: String,
        key: String,
        body: Value,
        chain: ChainPayload,
    },
    /// Cloud-function invocation.
    Run {
        name: String,
        payload: Value,
        key: String,
    },
}

impl VerbRequest {
    /// The cache key this request was dispatched under.
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key, .. }
            | Self::Remove { key, .. }
            | Self::Http { key, .. }
            | Self::Run { key, .. } => key,
            Self::Write { .. } => "",
        }
    }
}

// ============================================================================
// Bulk outcomes
// ============================================================================

/// Per-item failure inside a bulk remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub id: String,
    pub error: String,
}

/// Result of a bulk remove: how many items succeeded and which failed.
/// Drivers report it in `RawResponse` meta under `"outcome"`; the orchestrator
/// logs each failure and still resolves the verb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DeleteFailure>,
}

impl BulkOutcome {
    /// Extract an outcome from driver meta, if the driver reported one.
    pub fn from_meta(meta: &Value) -> Option<Self> {
        let outcome = meta.get("outcome")?;
        serde_json::from_value(outcome.clone()).ok()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// A backend adapter. Implementations live outside this crate (HTTP client,
/// vendor SDK bridges); tests use in-memory mocks.
#[async_trait]
pub trait Driver: Send + Sync {
    fn id(&self) -> DriverId;

    /// Execute one resolved request against the backend.
    async fn execute(&self, request: VerbRequest) -> Result<RawResponse>;

    /// Open a realtime feed for the chained query. Drivers without realtime
    /// support keep the default.
    fn listen(&self, _chain: ChainPayload, _key: String) -> Result<ChangeStream> {
        Err(RecordsError::UnsupportedVerb {
            driver: self.id(),
            verb: crate::types::Verb::On,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
