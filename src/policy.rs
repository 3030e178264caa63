//! Cache/state/network decision policy.
//!
//! Evaluated once per dispatched verb: a single cache read decides whether
//! the network is required, state answers independently, and the network
//! completion decides emission and persistence through deep equality against
//! the cached envelope.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::chain::ChainPayload;
use crate::error::Result;
use crate::response::{is_empty_data, CacheEntry, Response};
use crate::storage::Storage;
use crate::store::Store;

/// Current time as epoch seconds, the unit `ttl` expiries are stored in.
pub fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Outcome of the single cache read performed before a verb dispatch.
#[derive(Debug)]
pub struct CacheProbe {
    pub now: u64,
    pub entry: Option<CacheEntry>,
    /// Fresh, non-empty entry under an active `use_cache` — the cached
    /// envelope is emitted and the network call suppressed.
    pub hit: bool,
    /// The hit check never touched storage, so `entry` carries no baseline
    /// for the post-network diff.
    pub read_skipped: bool,
}

impl CacheProbe {
    /// Whether the network branch must run for this call.
    pub fn network_required(&self) -> bool {
        !self.hit
    }
}

/// What to do with a completed network response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkVerdict {
    pub emit: bool,
    pub persist: bool,
}

/// The policy and its two collaborators.
#[derive(Clone)]
pub struct DecisionPolicy {
    storage: Arc<dyn Storage>,
    store: Arc<dyn Store>,
}

impl DecisionPolicy {
    pub fn new(storage: Arc<dyn Storage>, store: Arc<dyn Store>) -> Self {
        Self { storage, store }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Read the cache entry for `key` once and classify it.
    ///
    /// Skips the read entirely when caching is off but the network is on.
    /// Storage failures are logged and degrade to a miss; expired entries are
    /// treated as misses without being deleted (passive expiry).
    pub async fn probe_cache(&self, key: &str, chain: &ChainPayload) -> CacheProbe {
        let now = now_seconds();
        if !chain.use_cache && chain.use_network {
            return CacheProbe {
                now,
                entry: None,
                hit: false,
                read_skipped: true,
            };
        }
        let entry = match self.storage.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        };
        let hit = chain.use_cache
            && entry.as_ref().is_some_and(|e| {
                e.is_fresh(now) && !is_empty_data(&e.response.data)
            });
        CacheProbe {
            now,
            entry,
            hit,
            read_skipped: false,
        }
    }

    /// State answers synchronously and independently of the cache branch.
    pub fn state_emission(&self, key: &str, chain: &ChainPayload) -> Option<Response> {
        if !chain.use_state {
            return None;
        }
        self.store.get(key)
    }

    /// Classify a completed network response against the cached baseline.
    pub fn judge_network(
        &self,
        response: &Response,
        cached: Option<&CacheEntry>,
        chain: &ChainPayload,
    ) -> NetworkVerdict {
        let differs = match cached {
            Some(entry) => entry.response.data != response.data,
            None => true,
        };
        NetworkVerdict {
            emit: differs || chain.network_forced,
            persist: chain.save_network && differs,
        }
    }

    /// Apply a network completion: dispatch into shared state, persist when
    /// the verdict asks for it. Returns whether the caller should emit.
    ///
    /// When the probe skipped its read, the baseline is fetched here so a
    /// `cache(false)` call still diffs against what is persisted.
    pub async fn after_network(
        &self,
        response: Response,
        probe: &CacheProbe,
        chain: &ChainPayload,
    ) -> Result<bool> {
        let refetched;
        let baseline = if probe.read_skipped {
            refetched = match self.storage.get(&response.key).await {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(key = %response.key, error = %err, "cache read failed, treating as miss");
                    None
                }
            };
            refetched.as_ref()
        } else {
            probe.entry.as_ref()
        };
        let verdict = self.judge_network(&response, baseline, chain);

        if !is_empty_data(&response.data) {
            self.store.dispatch(response.clone());
        }

        if verdict.persist {
            let ttl = (chain.ttl > 0).then(|| probe.now + chain.ttl);
            let entry = CacheEntry {
                response: response.clone(),
                ttl,
            };
            if let Err(err) = self.storage.set(&response.key, entry).await {
                warn!(key = %response.key, error = %err, "cache write failed");
            }
        }

        Ok(verdict.emit)
    }
}

impl std::fmt::Debug for DecisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPolicy").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
