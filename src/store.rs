//! Shared in-memory state, keyed by cache key.
//!
//! The decision policy dispatches every emission here (when `use_state` is
//! on) so that later calls with the same key can answer synchronously, and so
//! external consumers can watch a key for updates via [`Store::select`].

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::response::Response;

/// Live feed of state updates for one key.
pub type StateStream = Pin<Box<dyn Stream<Item = Response> + Send>>;

/// Synchronous shared state. Unlike [`crate::storage::Storage`], state is
/// volatile and carries no TTL; it answers instantly or not at all.
pub trait Store: Send + Sync {
    /// Record the latest response for its key and notify watchers.
    fn dispatch(&self, response: Response);
    fn get(&self, key: &str) -> Option<Response>;
    /// Watch a key: the current value (if any) is delivered first, then every
    /// subsequent dispatch.
    fn select(&self, key: &str) -> StateStream;
    fn reset(&self);
}

// ============================================================================
// MemoryStore
// ============================================================================

struct Watcher {
    key: String,
    sender: mpsc::UnboundedSender<Response>,
}

/// Process-local [`Store`] with watcher fan-out.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<BTreeMap<String, Response>>,
    watchers: Mutex<Vec<Watcher>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Store for MemoryStore {
    fn dispatch(&self, response: Response) {
        let key = response.key.clone();
        self.state.lock().insert(key.clone(), response.clone());
        // drop watchers whose receiver went away
        self.watchers
            .lock()
            .retain(|w| w.key != key || w.sender.send(response.clone()).is_ok());
    }

    fn get(&self, key: &str) -> Option<Response> {
        self.state.lock().get(key).cloned()
    }

    fn select(&self, key: &str) -> StateStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(current) = self.get(key) {
            // receiver is still in scope, send cannot fail
            let _ = sender.send(current);
        }
        self.watchers.lock().push(Watcher {
            key: key.to_owned(),
            sender,
        });
        Box::pin(UnboundedReceiverStream::new(receiver))
    }

    fn reset(&self) {
        self.state.lock().clear();
        self.watchers.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
