//! Restore-or-rebuild of the document cache, and cache-aside document resolution.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docgraph_types::{Document, DocumentError, DocumentHash};

use crate::infra::telemetry::{DOCUMENT_HIT_TOTAL, DOCUMENT_MISS_TOTAL, REBUILD_MS, REBUILD_TOTAL};
use crate::remote::{RemoteError, RemoteSource};

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};
use super::snapshot::{SnapshotStore, TypeIndex};
use super::store::{CacheLookup, DocumentCache, RestoreError};

const TARGET: &str = "daoctl::cache::loader";

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("failed to load {what} from the remote source: {source}")]
    Remote {
        what: &'static str,
        #[source]
        source: RemoteError,
    },
    #[error("cannot index document {hash}: {source}")]
    InvalidType {
        hash: DocumentHash,
        #[source]
        source: DocumentError,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("document `{key}` not found")]
    NotFound {
        key: String,
        #[source]
        source: Option<RemoteError>,
    },
    #[error("document cache is unavailable")]
    CacheUnavailable,
}

impl ResolveError {
    fn not_found(key: &str, error: RemoteError) -> Self {
        let source = (!error.is_not_found()).then_some(error);
        Self::NotFound {
            key: key.to_string(),
            source,
        }
    }
}

pub struct CacheLoader {
    remote: Arc<dyn RemoteSource>,
    store: SnapshotStore,
    config: CacheConfig,
    // `None` until loaded, or after a failed load; lookups then read through
    // to the remote. `rebuild` replaces whatever is installed.
    cache: RwLock<Option<Arc<DocumentCache>>>,
    loaded: Mutex<bool>,
}

impl CacheLoader {
    pub fn new(remote: Arc<dyn RemoteSource>, config: CacheConfig) -> Self {
        Self {
            remote,
            store: SnapshotStore::new(config.snapshot_path.clone()),
            config,
            cache: RwLock::new(None),
            loaded: Mutex::new(false),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSource> {
        &self.remote
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The shared document cache, restored or rebuilt on first use.
    pub async fn cache(&self) -> Option<Arc<DocumentCache>> {
        let current = rw_read(&self.cache, TARGET, "cache").clone();
        if current.is_some() {
            return current;
        }

        let mut loaded = self.loaded.lock().await;
        if !*loaded {
            let cache = self.restore_or_rebuild().await;
            *rw_write(&self.cache, TARGET, "cache.install") = cache;
            *loaded = true;
        }
        drop(loaded);
        rw_read(&self.cache, TARGET, "cache").clone()
    }

    async fn restore_or_rebuild(&self) -> Option<Arc<DocumentCache>> {
        match DocumentCache::restore(&self.store, self.config.clone()) {
            Ok(cache) => {
                info!(
                    target = TARGET,
                    path = %self.store.path().display(),
                    documents = cache.stats().documents,
                    "document cache restored from snapshot"
                );
                return Some(Arc::new(cache));
            }
            Err(RestoreError::Snapshot(err)) if err.is_missing() => {
                info!(
                    target = TARGET,
                    path = %self.store.path().display(),
                    "no snapshot found; building document cache"
                );
            }
            Err(err) => {
                warn!(
                    target = TARGET,
                    path = %self.store.path().display(),
                    error = %err,
                    "snapshot unusable; rebuilding document cache"
                );
            }
        }

        match self.fresh_cache().await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(err) => {
                warn!(
                    target = TARGET,
                    error = %err,
                    "document cache rebuild failed; reading through to the remote source"
                );
                None
            }
        }
    }

    /// Rebuilds from the remote source and installs the result in place of
    /// any cache loaded earlier.
    pub async fn rebuild(&self) -> Result<Arc<DocumentCache>, RebuildError> {
        let cache = Arc::new(self.fresh_cache().await?);

        // Waits out a first load still in flight so it cannot overwrite this one.
        let mut loaded = self.loaded.lock().await;
        *rw_write(&self.cache, TARGET, "rebuild.install") = Some(Arc::clone(&cache));
        *loaded = true;
        Ok(cache)
    }

    /// Builds a complete cache from the remote source and persists it.
    ///
    /// A document without a usable `type` aborts the build before anything is
    /// written. Failing to persist is logged and the cache is still returned.
    pub async fn fresh_cache(&self) -> Result<DocumentCache, RebuildError> {
        let started_at = Instant::now();
        counter!(REBUILD_TOTAL).increment(1);
        info!(target = TARGET, "rebuilding document cache from remote source");

        let documents = self
            .remote
            .fetch_all_documents()
            .await
            .map_err(|source| RebuildError::Remote {
                what: "documents",
                source,
            })?;

        let cache = DocumentCache::new(self.config.clone());
        let mut index = TypeIndex::new();
        let document_count = documents.len();
        for document in documents {
            let document_type = document
                .document_type()
                .map_err(|source| RebuildError::InvalidType {
                    hash: document.hash.clone(),
                    source,
                })?
                .to_string();
            index
                .entry(document_type)
                .or_default()
                .push(document.hash.clone());
            cache.insert(document);
        }
        cache.install_type_index(index);

        let edges = self
            .remote
            .fetch_all_edges()
            .await
            .map_err(|source| RebuildError::Remote {
                what: "edges",
                source,
            })?;
        let edge_count = edges.len();
        for edge in edges {
            cache.insert_edge(edge);
        }

        if let Err(err) = cache.persist(&self.store) {
            warn!(
                target = TARGET,
                path = %self.store.path().display(),
                error = %err,
                "failed to persist document cache snapshot"
            );
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(REBUILD_MS).record(elapsed_ms);
        info!(
            target = TARGET,
            documents = document_count,
            edges = edge_count,
            elapsed_ms,
            "document cache rebuilt"
        );
        Ok(cache)
    }

    /// Resolves a full hash or short prefix to a document.
    ///
    /// Misses read through to the remote source using the most specific hash
    /// known. Fetched documents are only written back when backfill is enabled.
    pub async fn resolve(&self, key: &str) -> Result<Document, ResolveError> {
        let key = key.trim().to_ascii_lowercase();
        let cache = self.cache().await;
        let mut remote_key = key.clone();

        if let Some(cache) = cache.as_deref() {
            match cache.lookup(&key) {
                CacheLookup::Hit(document) => {
                    counter!(DOCUMENT_HIT_TOTAL).increment(1);
                    debug!(target = TARGET, op = "resolve", result = "hit", key = %key);
                    return Ok(document);
                }
                CacheLookup::Alias(full) => {
                    if let CacheLookup::Hit(document) = cache.lookup(full.as_str()) {
                        counter!(DOCUMENT_HIT_TOTAL).increment(1);
                        debug!(target = TARGET, op = "resolve", result = "alias_hit", key = %key);
                        return Ok(document);
                    }
                    remote_key = full.to_string();
                }
                CacheLookup::Miss => {}
            }
        }

        counter!(DOCUMENT_MISS_TOTAL).increment(1);
        debug!(
            target = TARGET,
            op = "resolve",
            result = "miss",
            key = %key,
            remote_key = %remote_key
        );

        let document = self
            .remote
            .fetch_document(&remote_key)
            .await
            .map_err(|err| ResolveError::not_found(&key, err))?;

        if self.config.backfill_on_miss
            && let Some(cache) = cache.as_deref()
        {
            cache.insert(document.clone());
        }
        Ok(document)
    }

    /// Documents of one type, in index order.
    pub async fn documents_of_type(&self, document_type: &str) -> Result<Vec<Document>, ResolveError> {
        let cache = self.cache().await.ok_or(ResolveError::CacheUnavailable)?;
        let mut documents = Vec::new();
        for hash in cache.documents_of_type(document_type) {
            documents.push(self.resolve(hash.as_str()).await?);
        }
        Ok(documents)
    }
}
