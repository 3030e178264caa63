//! Per-driver capability tables.
//!
//! Each driver declares, per verb and per chain method, whether the feature is
//! supported directly, redirected to another (driver, verb) pair, gated to
//! browser contexts, or unavailable. Tables are static and consulted on every
//! chain-method call and every verb dispatch.

use crate::error::{RecordsError, Result};
use crate::types::{ChainMethod, DriverId, Platform, Verb};

/// Whether a driver supports a verb or chain method, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Supported,
    Unsupported,
    /// Usable only in a browser execution context; ignored (with a warning)
    /// on the server.
    BrowserOnly,
    /// The verb is served by another (driver, verb) pair.
    RedirectTo(DriverId, Verb),
}

// ============================================================================
// Verb tables
// ============================================================================

pub fn verb_availability(driver: DriverId, verb: Verb) -> Availability {
    use Availability::*;
    use Verb::*;
    match driver {
        DriverId::Http => match verb {
            Get | Post | Patch | Delete => Supported,
            Find => RedirectTo(DriverId::Http, Get),
            FindOne => RedirectTo(DriverId::Http, Get),
            Set => RedirectTo(DriverId::Http, Post),
            Update => RedirectTo(DriverId::Http, Patch),
            On | Count | Run => Unsupported,
        },
        DriverId::Firestore => match verb {
            Find | FindOne | On | Set => Supported,
            Get => RedirectTo(DriverId::Http, Get),
            Post => RedirectTo(DriverId::Http, Post),
            Patch => RedirectTo(DriverId::Http, Patch),
            Update => RedirectTo(DriverId::Firestore, Set),
            Delete | Count | Run => Unsupported,
        },
        DriverId::Firebase => match verb {
            Find | FindOne | On => Supported,
            Get => RedirectTo(DriverId::Http, Get),
            Post => RedirectTo(DriverId::Http, Post),
            Patch => RedirectTo(DriverId::Http, Patch),
            Set | Update | Delete | Count | Run => Unsupported,
        },
        DriverId::Parse => match verb {
            Find | FindOne | On | Delete | Set | Count | Run => Supported,
            Get => RedirectTo(DriverId::Parse, Find),
            Post => RedirectTo(DriverId::Parse, Find),
            Update => Supported,
            Patch => RedirectTo(DriverId::Parse, Set),
        },
    }
}

// ============================================================================
// Chain-method tables
// ============================================================================

pub fn chain_availability(driver: DriverId, method: ChainMethod) -> Availability {
    use Availability::*;
    use ChainMethod::*;
    match driver {
        DriverId::Http => match method {
            Driver | Network | Key | Raw | Transform | Worker => Supported,
            Save | Ttl | State | Cache => Supported,
            Query | Where | Sort | Size | At | After | Ref | Doc | Include | Master | Token => {
                Unsupported
            }
        },
        DriverId::Firestore => match method {
            Driver | Network | Key | Where | Sort | Size | At | After | Doc | Raw | Transform => {
                Supported
            }
            Save | Ttl | State | Cache => BrowserOnly,
            Query | Ref | Include | Master | Token | Worker => Unsupported,
        },
        DriverId::Firebase => match method {
            Driver | Network | Key | Where | Size | Ref | Raw | Transform => Supported,
            Save | Ttl | State | Cache => BrowserOnly,
            Query | Sort | At | After | Doc | Include | Master | Token | Worker => Unsupported,
        },
        DriverId::Parse => match method {
            Driver | Network | Key | Query | Where | Sort | Size | After | Include | Doc
            | Master | Token | Raw | Transform | Worker => Supported,
            Save | Ttl | State | Cache => BrowserOnly,
            At | Ref => Unsupported,
        },
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a (driver, verb) pair to the effective pair that will execute,
/// following redirects. Fails with [`RecordsError::UnsupportedVerb`] when the
/// pair has no implementation.
pub fn resolve_verb(driver: DriverId, verb: Verb) -> Result<(DriverId, Verb)> {
    let mut current = (driver, verb);
    // redirect chains in the tables are at most one hop; the bound guards
    // against an accidental cycle in a future table edit
    for _ in 0..4 {
        match verb_availability(current.0, current.1) {
            Availability::Supported => return Ok(current),
            Availability::RedirectTo(d, v) if (d, v) != current => current = (d, v),
            _ => break,
        }
    }
    Err(RecordsError::UnsupportedVerb { driver, verb })
}

/// Whether a chain method may take effect for `driver` on `platform`.
/// `Ok(false)` means "ignore with a warning"; `Err` means the option has no
/// implementation for this driver at all.
pub fn chain_allowed(driver: DriverId, method: ChainMethod, platform: Platform) -> Result<bool> {
    match chain_availability(driver, method) {
        Availability::Supported => Ok(true),
        Availability::BrowserOnly => Ok(platform == Platform::Browser),
        Availability::Unsupported | Availability::RedirectTo(..) => {
            Err(RecordsError::UnsupportedChain {
                driver,
                method,
                platform,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
