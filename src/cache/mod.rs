//! Document Cache
//!
//! A disk-persisted cache in front of the remote document graph:
//!
//! - **Document cache**: full hash → document, short prefix → full hash,
//!   plus edges and the per-type index
//! - **Snapshot**: one JSON file holding the whole cache between runs
//! - **Loader**: restore the snapshot or rebuild from the chain, then
//!   resolve documents cache-aside
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `daoctl.toml`:
//!
//! ```toml
//! [cache]
//! snapshot_path = ".graph.cache"
//! document_ttl_secs = 3600
//! short_hash_len = 5
//! # ... see config.rs for all options
//! ```

mod config;
mod loader;
mod lock;
mod snapshot;
mod store;

pub use config::CacheConfig;
pub(crate) use config::expiry_after;
pub use loader::{CacheLoader, RebuildError, ResolveError};
pub use snapshot::{
    CacheSnapshot, Expiring, SNAPSHOT_VERSION, SnapshotError, SnapshotStore, TypeIndex,
};
pub use store::{CacheLookup, CacheStats, DocumentCache, RestoreError};
