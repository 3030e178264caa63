//! The orchestrator: one [`Records`] instance binds a logical collection and
//! serves every verb through a fluent, consumed [`Chain`].
//!
//! A terminal verb snapshots the chain, validates options synchronously,
//! resolves the effective (driver, verb) pair, derives the cache key, and
//! returns a cold stream — no I/O happens until the stream is polled. Query
//! verbs route through the [`DecisionPolicy`]; mutations and cloud functions
//! dispatch directly; `on` opens a realtime [`Subscription`].

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures::{stream, FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::chain::{ChainPayload, TransformFn};
use crate::driver::{
    chain_allowed, BulkOutcome, Driver, DriverRegistry, HttpMethod, ReadKind, VerbRequest,
    WriteKind,
};
use crate::error::{RecordsError, Result};
use crate::key::derive_key;
use crate::policy::{CacheProbe, DecisionPolicy};
use crate::response::{is_empty_data, normalize_response, NormalizeContext, RawResponse, Response};
use crate::storage::Storage;
use crate::store::Store;
use crate::subscription::{ResponseStream, Subscription};
use crate::types::{ChainMethod, DriverId, Options, SortOrder, Verb, WhereClause};

// ============================================================================
// Records
// ============================================================================

/// A collection binding: fixed options, pluggable per-call driver.
#[derive(Clone)]
pub struct Records {
    options: Options,
    registry: DriverRegistry,
    policy: DecisionPolicy,
}

impl Records {
    pub fn new(
        options: Options,
        registry: DriverRegistry,
        storage: Arc<dyn Storage>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            options,
            registry,
            policy: DecisionPolicy::new(storage, store),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Start a fresh chain carrying this collection's defaults. Every call
    /// gets its own chain, so nothing leaks between unrelated requests.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            records: self,
            payload: ChainPayload::from_options(&self.options),
            pending: None,
        }
    }

    /// Replay every persisted cache entry belonging to this collection into
    /// shared state, so state consumers answer before any network traffic.
    pub async fn feed(&self) -> Result<()> {
        let collection = self.options.collection_or_namespace();
        for (_, entry) in self.policy.storage().entries().await? {
            if entry.response.collection == collection && !is_empty_data(&entry.response.data) {
                self.policy.store().dispatch(entry.response);
            }
        }
        Ok(())
    }

    /// Drop every persisted cache entry.
    pub async fn clear_cache(&self) -> Result<()> {
        self.policy.storage().clear().await
    }

    /// Drop one persisted cache entry by key.
    pub async fn unset_cache(&self, key: &str) -> Result<()> {
        self.policy.storage().remove(key).await
    }
}

impl std::fmt::Debug for Records {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records")
            .field("collection", &self.options.collection)
            .field("driver", &self.options.driver)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Chain — the fluent builder
// ============================================================================

/// Accumulates one call's configuration and is consumed by its terminal verb.
///
/// Each setter validates the chain method against the current driver's
/// capability table: browser-gated options invoked server-side are ignored
/// with a warning; options the driver cannot serve at all surface as an error
/// from the terminal verb (not from the setter, so builders stay infallible).
pub struct Chain<'a> {
    records: &'a Records,
    payload: ChainPayload,
    pending: Option<RecordsError>,
}

impl<'a> Chain<'a> {
    fn allow(&mut self, method: ChainMethod) -> bool {
        match chain_allowed(self.payload.driver, method, self.records.options.platform) {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    driver = %self.payload.driver,
                    method = %method,
                    "chaining method ignored outside browser context"
                );
                false
            }
            Err(err) => {
                if self.pending.is_none() {
                    self.pending = Some(err);
                }
                false
            }
        }
    }

    /// Select the driver answering this call.
    pub fn driver(mut self, driver: DriverId) -> Self {
        self.payload.driver = driver;
        self
    }

    /// Toggle the network branch. `network(true)` also forces the network
    /// emission even when it deep-equals the cache.
    pub fn network(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Network) {
            self.payload.use_network = active;
            self.payload.network_forced = active;
        }
        self
    }

    pub fn cache(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Cache) {
            self.payload.use_cache = active;
        }
        self
    }

    pub fn state(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::State) {
            self.payload.use_state = active;
        }
        self
    }

    /// Whether network responses are persisted to cache.
    pub fn save(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Save) {
            self.payload.save_network = active;
        }
        self
    }

    /// Cache time-to-live in seconds for this call's persisted entry.
    pub fn ttl(mut self, seconds: u64) -> Self {
        if self.allow(ChainMethod::Ttl) {
            self.payload.ttl = seconds;
        }
        self
    }

    /// Explicit cache-key override.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        if self.allow(ChainMethod::Key) {
            self.payload.key = Some(key.into());
        }
        self
    }

    /// Raw driver-specific query, bypassing the where/sort helpers.
    pub fn query(mut self, query: Value) -> Self {
        if self.allow(ChainMethod::Query) {
            self.payload.query = Some(query);
        }
        self
    }

    /// Add a predicate. Repeated calls accumulate.
    pub fn where_(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: Value,
    ) -> Self {
        if self.allow(ChainMethod::Where) {
            self.payload.where_clauses.push(WhereClause {
                field: field.into(),
                operator: operator.into(),
                value,
            });
        }
        self
    }

    /// Add a sort field. Repeated calls merge into the existing sort map.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        if self.allow(ChainMethod::Sort) {
            self.payload.sort.insert(field.into(), order);
        }
        self
    }

    pub fn size(mut self, limit: u64) -> Self {
        if self.allow(ChainMethod::Size) {
            self.payload.size = Some(limit);
        }
        self
    }

    /// Cursor: start at this value.
    pub fn at(mut self, cursor: Value) -> Self {
        if self.allow(ChainMethod::At) {
            self.payload.at = Some(cursor);
        }
        self
    }

    /// Cursor: start after this value.
    pub fn after(mut self, cursor: Value) -> Self {
        if self.allow(ChainMethod::After) {
            self.payload.after = Some(cursor);
        }
        self
    }

    /// Target a single document by id.
    pub fn doc(mut self, id: impl Into<String>) -> Self {
        if self.allow(ChainMethod::Doc) {
            self.payload.doc = Some(id.into());
        }
        self
    }

    /// Realtime-database path reference.
    pub fn ref_(mut self, path: impl Into<String>) -> Self {
        if self.allow(ChainMethod::Ref) {
            self.payload.ref_path = Some(path.into());
        }
        self
    }

    /// Related fields to resolve alongside each record.
    pub fn include(mut self, fields: Vec<String>) -> Self {
        if self.allow(ChainMethod::Include) {
            self.payload.fields = fields;
        }
        self
    }

    /// Use the backend master key for this call.
    pub fn master(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Master) {
            self.payload.use_master_key = active;
        }
        self
    }

    /// Attach a session token to this call.
    pub fn token(mut self, session: impl Into<String>) -> Self {
        if self.allow(ChainMethod::Token) {
            self.payload.use_session_token = Some(session.into());
        }
        self
    }

    /// Skip data normalization (identifier aliasing) on driver output.
    pub fn raw(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Raw) {
            self.payload.transform_data = !active;
        }
        self
    }

    /// Post-process every emission of this call.
    pub fn transform(mut self, f: impl Fn(Response) -> Response + Send + Sync + 'static) -> Self {
        if self.allow(ChainMethod::Transform) {
            self.payload.transform_response = Some(Arc::new(f) as Arc<TransformFn>);
        }
        self
    }

    /// Offload heavy work to a worker context, where one exists.
    pub fn worker(mut self, active: bool) -> Self {
        if self.allow(ChainMethod::Worker) {
            self.payload.use_worker = active;
        }
        self
    }

    // ------------------------------------------------------------------
    // Terminal verbs — HTTP-shaped
    // ------------------------------------------------------------------

    pub fn get(self, path: impl Into<String>) -> Result<ResponseStream> {
        self.dispatch_query(Verb::Get, path.into(), Value::Null)
    }

    pub fn post(self, path: impl Into<String>, body: Value) -> Result<ResponseStream> {
        self.dispatch_query(Verb::Post, path.into(), body)
    }

    pub fn patch(self, path: impl Into<String>, body: Value) -> Result<ResponseStream> {
        self.dispatch_query(Verb::Patch, path.into(), body)
    }

    pub fn delete(self, path: impl Into<String>, payload: Value) -> Result<ResponseStream> {
        self.dispatch_direct(Verb::Delete, path.into(), payload, None)
    }

    // ------------------------------------------------------------------
    // Terminal verbs — data-shaped
    // ------------------------------------------------------------------

    pub fn find(self) -> Result<ResponseStream> {
        self.dispatch_query(Verb::Find, String::new(), Value::Null)
    }

    /// `find` narrowed to the first record; emits `{}` when nothing matched.
    pub fn find_one(self) -> Result<ResponseStream> {
        self.dispatch_query(Verb::FindOne, String::new(), Value::Null)
    }

    pub fn count(self) -> Result<ResponseStream> {
        self.dispatch_query(Verb::Count, String::new(), Value::Null)
    }

    /// Create a record. Target id comes from `doc()` when set. Stamps the
    /// created-at timestamp unless the collection disables timestamps.
    pub fn set(self, data: Value) -> Result<ResponseStream> {
        let id = self.payload.doc.clone();
        self.dispatch_direct(Verb::Set, String::new(), data, id)
    }

    /// Update a record by id. Stamps the updated-at timestamp unless the
    /// collection disables timestamps.
    pub fn update(self, id: impl Into<String>, data: Value) -> Result<ResponseStream> {
        self.dispatch_direct(Verb::Update, String::new(), data, Some(id.into()))
    }

    /// Invoke a cloud function by name.
    pub fn run(self, name: impl Into<String>, payload: Value) -> Result<ResponseStream> {
        self.dispatch_direct(Verb::Run, name.into(), payload, None)
    }

    /// Open a realtime feed for the chained query.
    pub fn on(self) -> Result<Subscription> {
        let call = self.prepare(Verb::On, "", &Value::Null)?;
        let chain = call.chain.clone();
        let stream = call.driver.listen(chain, call.key.clone())?;

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let feed = stream
            .map(move |item| match item {
                Ok(raw) => {
                    let response = call.shape(raw);
                    if call.chain.use_state && !is_empty_data(&response.data) {
                        call.policy.store().dispatch(response.clone());
                    }
                    Ok(call.chain.transform(response))
                }
                Err(err) => Err(err),
            })
            .take_until(close_rx.map(|_| ()));
        Ok(Subscription::new(Box::pin(feed), close_tx))
    }

    // ------------------------------------------------------------------
    // Dispatch plumbing
    // ------------------------------------------------------------------

    /// Shared front half of every verb: pending-error check, verb resolution,
    /// base-option validation, key derivation. All synchronous.
    fn prepare(self, verb: Verb, path: &str, payload: &Value) -> Result<PreparedCall> {
        if let Some(err) = self.pending {
            return Err(err);
        }
        let records = self.records;
        let chain = self.payload;

        let (driver, effective_verb) = records.registry.resolve(chain.driver, verb)?;
        validate_base_options(&records.options, driver.id(), verb)?;

        let key = match &chain.key {
            Some(key) => key.clone(),
            None => derive_key(verb, path, &chain, payload, &records.options),
        };

        Ok(PreparedCall {
            policy: records.policy.clone(),
            driver,
            effective_verb,
            chain,
            key,
            collection: records.options.collection_or_namespace().to_owned(),
            identifier: records.options.identifier.clone(),
            timestamp: records.options.timestamp,
            timestamp_created: records.options.timestamp_created.clone(),
            timestamp_updated: records.options.timestamp_updated.clone(),
        })
    }

    /// Query verbs flow through the cache/state/network decision policy.
    fn dispatch_query(self, verb: Verb, path: String, body: Value) -> Result<ResponseStream> {
        let call = self.prepare(verb, &path, &body)?;
        let request = call.build_request(path, body, None);
        Ok(policy_stream(call, request, verb == Verb::FindOne))
    }

    /// Mutations and cloud functions skip the cache and dispatch directly.
    fn dispatch_direct(
        self,
        verb: Verb,
        path: String,
        data: Value,
        id: Option<String>,
    ) -> Result<ResponseStream> {
        let call = self.prepare(verb, &path, &data)?;
        let data = call.stamp(verb, data);
        let request = call.build_request(path, data, id);
        Ok(direct_stream(call, request))
    }
}

impl std::fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("payload", &self.payload)
            .field("pending", &self.pending)
            .finish()
    }
}

// ============================================================================
// Prepared call
// ============================================================================

struct PreparedCall {
    policy: DecisionPolicy,
    driver: Arc<dyn Driver>,
    effective_verb: Verb,
    chain: ChainPayload,
    key: String,
    collection: String,
    identifier: String,
    timestamp: bool,
    timestamp_created: String,
    timestamp_updated: String,
}

impl PreparedCall {
    /// Map the effective verb onto the request shape its driver expects.
    fn build_request(&self, path: String, body: Value, id: Option<String>) -> VerbRequest {
        let chain = self.chain.clone();
        let key = self.key.clone();
        match self.effective_verb {
            Verb::Find => VerbRequest::Read {
                kind: ReadKind::Find,
                chain,
                key,
            },
            Verb::FindOne => VerbRequest::Read {
                kind: ReadKind::FindOne,
                chain,
                key,
            },
            Verb::Count => VerbRequest::Read {
                kind: ReadKind::Count,
                chain,
                key,
            },
            Verb::Set => VerbRequest::Write {
                kind: WriteKind::Set,
                chain,
                data: body,
                id,
            },
            Verb::Update => VerbRequest::Write {
                kind: WriteKind::Update,
                chain,
                data: body,
                id,
            },
            Verb::Delete if self.driver.id() != DriverId::Http => VerbRequest::Remove {
                path,
                key,
                payload: body,
                chain,
            },
            Verb::Get | Verb::Post | Verb::Patch | Verb::Delete => VerbRequest::Http {
                method: match self.effective_verb {
                    Verb::Post => HttpMethod::Post,
                    Verb::Patch => HttpMethod::Patch,
                    Verb::Delete => HttpMethod::Delete,
                    _ => HttpMethod::Get,
                },
                path,
                key,
                body,
                chain,
            },
            Verb::Run => VerbRequest::Run {
                name: path,
                payload: body,
                key,
            },
            // `on` never reaches build_request; listen takes the chain as-is
            Verb::On => VerbRequest::Read {
                kind: ReadKind::Find,
                chain,
                key,
            },
        }
    }

    /// Shape driver output into the public envelope.
    fn shape(&self, raw: RawResponse) -> Response {
        let identifier = self.chain.transform_data.then_some(self.identifier.as_str());
        normalize_response(
            raw,
            &NormalizeContext {
                key: &self.key,
                collection: &self.collection,
                driver: self.chain.driver,
                identifier,
            },
        )
    }

    /// Autofill created/updated timestamps on write payloads.
    fn stamp(&self, verb: Verb, mut data: Value) -> Value {
        if !self.timestamp {
            return data;
        }
        if let Value::Object(fields) = &mut data {
            let field = match verb {
                Verb::Set => Some(&self.timestamp_created),
                Verb::Update => Some(&self.timestamp_updated),
                _ => None,
            };
            if let Some(field) = field {
                fields
                    .entry(field.clone())
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            }
        }
        data
    }
}

fn validate_base_options(options: &Options, effective_driver: DriverId, verb: Verb) -> Result<()> {
    if effective_driver == DriverId::Http {
        if options.effective_base_url().is_none() {
            return Err(RecordsError::Config {
                option: "baseURL",
                verb,
            });
        }
        if options.endpoint.is_none() {
            return Err(RecordsError::Config {
                option: "endpoint",
                verb,
            });
        }
    } else if options.collection.is_none() {
        return Err(RecordsError::Config {
            option: "collection",
            verb,
        });
    }
    Ok(())
}

// ============================================================================
// Streams
// ============================================================================

enum PolicyState {
    Begin(Box<(PreparedCall, VerbRequest, bool)>),
    Drain {
        pending: VecDeque<Result<Response>>,
        network: Option<Box<(PreparedCall, VerbRequest, bool, CacheProbe)>>,
    },
    Network(Box<(PreparedCall, VerbRequest, bool, CacheProbe)>),
    Done,
}

/// Cold stream for a query verb: `Idle → {state?, cache?} → network? → done`.
fn policy_stream(call: PreparedCall, request: VerbRequest, unwrap_first: bool) -> ResponseStream {
    let seed = PolicyState::Begin(Box::new((call, request, unwrap_first)));
    Box::pin(stream::unfold(seed, |state| async move {
        let mut state = state;
        loop {
            match state {
                PolicyState::Begin(boxed) => {
                    let (call, request, unwrap_first) = *boxed;
                    let mut pending = VecDeque::new();
                    let mut state_data = None;
                    if let Some(hit) = call.policy.state_emission(&call.key, &call.chain) {
                        state_data = Some(hit.data.clone());
                        pending.push_back(Ok(call.chain.transform(hit)));
                    }
                    let probe = call.policy.probe_cache(&call.key, &call.chain).await;
                    if probe.hit {
                        if let Some(entry) = &probe.entry {
                            // state already carries this payload; one emission is enough
                            if state_data.as_ref() != Some(&entry.response.data) {
                                pending.push_back(Ok(call.chain.transform(entry.response.clone())));
                            }
                        }
                    }
                    let network = (probe.network_required() && call.chain.use_network)
                        .then(|| Box::new((call, request, unwrap_first, probe)));
                    state = PolicyState::Drain { pending, network };
                }
                PolicyState::Drain {
                    mut pending,
                    network,
                } => {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, PolicyState::Drain { pending, network }));
                    }
                    match network {
                        Some(boxed) => state = PolicyState::Network(boxed),
                        None => return None,
                    }
                }
                PolicyState::Network(boxed) => {
                    let (call, request, unwrap_first, probe) = *boxed;
                    return match network_pass(&call, request, unwrap_first, &probe).await {
                        Ok(Some(response)) => Some((Ok(response), PolicyState::Done)),
                        Ok(None) => None,
                        Err(err) => Some((Err(err), PolicyState::Done)),
                    };
                }
                PolicyState::Done => return None,
            }
        }
    }))
}

/// Execute the network branch and apply the policy's emission verdict.
async fn network_pass(
    call: &PreparedCall,
    request: VerbRequest,
    unwrap_first: bool,
    probe: &CacheProbe,
) -> Result<Option<Response>> {
    let mut raw = call.driver.execute(request).await?;
    if unwrap_first {
        raw.data = unwrap_first_record(raw.data);
    }
    let response = call.shape(raw);
    let emit = call.policy.after_network(response.clone(), probe, &call.chain).await?;
    Ok(emit.then(|| call.chain.transform(response)))
}

/// Single-emission stream for mutations and cloud functions.
fn direct_stream(call: PreparedCall, request: VerbRequest) -> ResponseStream {
    Box::pin(stream::once(async move {
        let is_remove = matches!(&request, VerbRequest::Remove { .. });
        let raw = call.driver.execute(request).await?;
        if is_remove {
            if let Some(outcome) = BulkOutcome::from_meta(&raw.meta) {
                for failure in &outcome.failures {
                    warn!(
                        collection = %call.collection,
                        id = %failure.id,
                        error = %failure.error,
                        "bulk delete item failed"
                    );
                }
            }
        }
        let response = call.shape(raw);
        if call.chain.use_state && !is_empty_data(&response.data) {
            call.policy.store().dispatch(response.clone());
        }
        Ok(call.chain.transform(response))
    }))
}

/// `findOne` semantics: the first matched record, or `{}`.
fn unwrap_first_record(data: Value) -> Value {
    match data {
        Value::Array(mut items) => {
            if items.is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                items.remove(0)
            }
        }
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================
