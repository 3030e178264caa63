//! Cache persistence seam.
//!
//! The decision policy talks to storage only through [`Storage`], so the
//! backing medium (memory, disk, a browser bridge) is swappable.
//! [`MemoryStorage`] is the bundled implementation and the default for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::response::CacheEntry;

/// Key/value persistence for [`CacheEntry`] values.
///
/// Methods are fallible so disk-backed implementations can surface IO errors;
/// the decision policy downgrades read failures to cache misses.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    /// Snapshot of every stored entry, used by cache warm-up feeds.
    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>>;
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Process-local storage backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.entries.write().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
