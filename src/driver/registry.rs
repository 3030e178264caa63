//! Driver registry — the dependency-injection seat for backend adapters.
//!
//! Instances are registered once (typically at startup) and looked up on
//! every dispatch. Verb resolution happens before lookup, so a redirect like
//! `firestore.get -> http.get` requires the HTTP driver to be registered even
//! for a Firestore-backed collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{RecordsError, Result};
use crate::types::{DriverId, Verb};

use super::caps::resolve_verb;
use super::Driver;

/// Maps driver identifiers to live adapter instances.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<DriverId, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for its own id.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.id(), driver);
    }

    pub fn get(&self, id: DriverId) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(&id)
            .cloned()
            .ok_or(RecordsError::DriverNotRegistered(id))
    }

    /// Resolve `(driver, verb)` through the capability tables and return the
    /// adapter that will serve it, together with the effective verb.
    pub fn resolve(&self, driver: DriverId, verb: Verb) -> Result<(Arc<dyn Driver>, Verb)> {
        let (effective_driver, effective_verb) = resolve_verb(driver, verb)?;
        let instance = self.get(effective_driver)?;
        Ok((instance, effective_verb))
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("registered", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
