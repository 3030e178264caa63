//! Reactive, chainable data access over pluggable backends.
//!
//! One [`Records`] instance binds a logical collection; a fluent [`Chain`]
//! configures each call; terminal verbs return cold streams that may emit a
//! shared-state snapshot, a cached envelope, and a fresh network response, in
//! that order, deduplicated by deep equality. Backends plug in through the
//! [`driver::Driver`] trait and a per-instance [`driver::DriverRegistry`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use reactive_records::{
//!     DriverRegistry, MemoryStorage, MemoryStore, Options, Records, SortOrder,
//! };
//!
//! # async fn example(registry: DriverRegistry) -> reactive_records::Result<()> {
//! let records = Records::new(
//!     Options {
//!         collection: Some("users".into()),
//!         ..Default::default()
//!     },
//!     registry,
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let mut stream = records
//!     .chain()
//!     .driver(reactive_records::DriverId::Parse)
//!     .where_("active", "==", serde_json::json!(true))
//!     .sort("name", SortOrder::Asc)
//!     .size(20)
//!     .find()?;
//!
//! while let Some(emission) = stream.next().await {
//!     let response = emission?;
//!     println!("{} records", response.data.as_array().map_or(0, |a| a.len()));
//! }
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod driver;
pub mod error;
pub mod key;
pub mod policy;
pub mod records;
pub mod response;
pub mod storage;
pub mod store;
pub mod subscription;
pub mod types;

pub use chain::ChainPayload;
pub use driver::{
    Availability, BulkOutcome, ChangeStream, DeleteFailure, Driver, DriverRegistry, HttpMethod,
    ReadKind, VerbRequest, WriteKind,
};
pub use error::{RecordsError, Result};
pub use key::derive_key;
pub use policy::DecisionPolicy;
pub use records::{Chain, Records};
pub use response::{CacheEntry, RawResponse, Response};
pub use storage::{MemoryStorage, Storage};
pub use store::{MemoryStore, StateStream, Store};
pub use subscription::{ResponseStream, Subscription};
pub use types::{
    ChainMethod, DriverId, HttpConfig, Options, Platform, SortOrder, Verb, WhereClause,
};
