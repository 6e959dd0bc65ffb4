//! In-memory document cache.
//!
//! Two maps share one TTL policy: full hash → document, and short prefix →
//! full hash. Edges and the type index live next to them so that one
//! snapshot captures the whole graph.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use docgraph_types::{Document, DocumentHash, Edge};

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};
use super::snapshot::{
    CacheSnapshot, Expiring, SNAPSHOT_VERSION, SnapshotError, SnapshotStore, TypeIndex,
};

const SOURCE: &str = "cache::store";

/// Outcome of a single-level lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// `key` is the full hash of a live document.
    Hit(Document),
    /// `key` is a live alias; the full hash still has to be looked up.
    Alias(DocumentHash),
    Miss,
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("snapshot has no live type index")]
    MissingTypeIndex,
    #[error("snapshot aliases use {found} characters, configured length is {expected}")]
    AliasLength { found: usize, expected: usize },
}

/// Counts of live entries, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub documents: usize,
    pub aliases: usize,
    pub edges: usize,
    pub types: usize,
    pub type_index_expires_at: Option<OffsetDateTime>,
}

#[derive(Debug)]
pub struct DocumentCache {
    config: CacheConfig,
    documents: RwLock<HashMap<DocumentHash, Expiring<Document>>>,
    aliases: RwLock<HashMap<String, Expiring<DocumentHash>>>,
    edges: RwLock<HashMap<u64, Expiring<Edge>>>,
    type_index: RwLock<Option<Expiring<TypeIndex>>>,
}

impl DocumentCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            documents: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            edges: RwLock::new(HashMap::new()),
            type_index: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Alias under which `hash` is registered.
    pub fn short_key<'a>(&self, hash: &'a DocumentHash) -> &'a str {
        hash.prefix(self.config.short_hash_len_non_zero())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn lookup(&self, key: &str) -> CacheLookup {
        let key = key.trim().to_ascii_lowercase();
        let now = OffsetDateTime::now_utc();

        if let Some(entry) = rw_read(&self.documents, SOURCE, "lookup.documents").get(key.as_str())
            && entry.is_live(now)
        {
            return CacheLookup::Hit(entry.value.clone());
        }

        if let Some(entry) = rw_read(&self.aliases, SOURCE, "lookup.aliases").get(key.as_str())
            && entry.is_live(now)
        {
            return CacheLookup::Alias(entry.value.clone());
        }

        CacheLookup::Miss
    }

    /// Follows an alias to its document in one call.
    pub fn get(&self, key: &str) -> Option<Document> {
        match self.lookup(key) {
            CacheLookup::Hit(document) => Some(document),
            CacheLookup::Alias(full) => match self.lookup(full.as_str()) {
                CacheLookup::Hit(document) => Some(document),
                _ => None,
            },
            CacheLookup::Miss => None,
        }
    }

    pub fn type_index(&self) -> Option<TypeIndex> {
        let now = OffsetDateTime::now_utc();
        rw_read(&self.type_index, SOURCE, "type_index")
            .as_ref()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn documents_of_type(&self, document_type: &str) -> Vec<DocumentHash> {
        let now = OffsetDateTime::now_utc();
        rw_read(&self.type_index, SOURCE, "documents_of_type")
            .as_ref()
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.value.get(document_type).cloned())
            .unwrap_or_default()
    }

    pub fn edge(&self, id: u64) -> Option<Edge> {
        let now = OffsetDateTime::now_utc();
        rw_read(&self.edges, SOURCE, "edge")
            .get(&id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn stats(&self) -> CacheStats {
        let now = OffsetDateTime::now_utc();
        let live = |expires_at: OffsetDateTime| expires_at > now;
        let type_index = rw_read(&self.type_index, SOURCE, "stats.type_index");
        let type_index = type_index.as_ref().filter(|entry| entry.is_live(now));

        CacheStats {
            documents: rw_read(&self.documents, SOURCE, "stats.documents")
                .values()
                .filter(|entry| live(entry.expires_at))
                .count(),
            aliases: rw_read(&self.aliases, SOURCE, "stats.aliases")
                .values()
                .filter(|entry| live(entry.expires_at))
                .count(),
            edges: rw_read(&self.edges, SOURCE, "stats.edges")
                .values()
                .filter(|entry| live(entry.expires_at))
                .count(),
            types: type_index.map_or(0, |entry| entry.value.len()),
            type_index_expires_at: type_index.map(|entry| entry.expires_at),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stores `document` under its full hash and registers its alias.
    ///
    /// When two hashes share a prefix the most recent insert owns the alias;
    /// the other document stays reachable by its full hash.
    pub fn insert(&self, document: Document) {
        let expires_at = self.config.document_expiry(OffsetDateTime::now_utc());
        let hash = document.hash.clone();
        let alias = self.short_key(&hash).to_string();

        rw_write(&self.documents, SOURCE, "insert.documents")
            .insert(hash.clone(), Expiring::new(document, expires_at));
        let previous = rw_write(&self.aliases, SOURCE, "insert.aliases")
            .insert(alias.clone(), Expiring::new(hash.clone(), expires_at));

        if let Some(previous) = previous
            && previous.value != hash
        {
            debug!(
                target = "daoctl::cache::store",
                alias = %alias,
                replaced = %previous.value,
                hash = %hash,
                "alias reassigned to newer document"
            );
        }
    }

    pub fn insert_edge(&self, edge: Edge) {
        let expires_at = self.config.document_expiry(OffsetDateTime::now_utc());
        rw_write(&self.edges, SOURCE, "insert_edge").insert(edge.id, Expiring::new(edge, expires_at));
    }

    /// Replaces the type index wholesale.
    pub fn install_type_index(&self, index: TypeIndex) {
        let expires_at = self.config.document_expiry(OffsetDateTime::now_utc());
        *rw_write(&self.type_index, SOURCE, "install_type_index") =
            Some(Expiring::new(index, expires_at));
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot(&self) -> CacheSnapshot {
        let mut documents: Vec<Expiring<Document>> =
            rw_read(&self.documents, SOURCE, "snapshot.documents")
                .values()
                .cloned()
                .collect();
        documents.sort_by_key(|entry| entry.value.id);

        let mut edges: Vec<Expiring<Edge>> = rw_read(&self.edges, SOURCE, "snapshot.edges")
            .values()
            .cloned()
            .collect();
        edges.sort_by_key(|entry| entry.value.id);

        let aliases: BTreeMap<String, Expiring<DocumentHash>> =
            rw_read(&self.aliases, SOURCE, "snapshot.aliases")
                .iter()
                .map(|(alias, entry)| (alias.clone(), entry.clone()))
                .collect();

        CacheSnapshot {
            version: SNAPSHOT_VERSION,
            short_hash_len: self.config.short_hash_len_non_zero(),
            documents,
            aliases,
            edges,
            type_index: rw_read(&self.type_index, SOURCE, "snapshot.type_index").clone(),
        }
    }

    pub fn persist(&self, store: &SnapshotStore) -> Result<(), SnapshotError> {
        store.write(&self.snapshot())
    }

    /// Loads a snapshot, dropping expired entries.
    ///
    /// A snapshot without a live type index is treated exactly like a missing one.
    pub fn restore(store: &SnapshotStore, config: CacheConfig) -> Result<Self, RestoreError> {
        let snapshot = store.read()?;
        Self::from_snapshot(snapshot, config)
    }

    pub fn from_snapshot(snapshot: CacheSnapshot, config: CacheConfig) -> Result<Self, RestoreError> {
        let now = OffsetDateTime::now_utc();

        let type_index = snapshot
            .type_index
            .filter(|entry| entry.is_live(now))
            .ok_or(RestoreError::MissingTypeIndex)?;

        let expected = config.short_hash_len_non_zero();
        if snapshot.short_hash_len != expected {
            return Err(RestoreError::AliasLength {
                found: snapshot.short_hash_len,
                expected,
            });
        }

        let documents = snapshot
            .documents
            .into_iter()
            .filter(|entry| entry.is_live(now))
            .map(|entry| (entry.value.hash.clone(), entry))
            .collect();
        let aliases = snapshot
            .aliases
            .into_iter()
            .filter(|(_, entry)| entry.is_live(now))
            .collect();
        let edges = snapshot
            .edges
            .into_iter()
            .filter(|entry| entry.is_live(now))
            .map(|entry| (entry.value.id, entry))
            .collect();

        Ok(Self {
            config,
            documents: RwLock::new(documents),
            aliases: RwLock::new(aliases),
            edges: RwLock::new(edges),
            type_index: RwLock::new(Some(type_index)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Arc;
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::testing::{document, edge, hash_for};

    #[test]
    fn full_hash_and_alias_resolve() {
        let cache = DocumentCache::new(CacheConfig::default());
        let doc = document(1, "alpha", "member");
        cache.insert(doc.clone());

        assert_eq!(cache.lookup(doc.hash.as_str()), CacheLookup::Hit(doc.clone()));

        let alias = doc.hash.prefix(5).to_string();
        assert_eq!(cache.lookup(&alias), CacheLookup::Alias(doc.hash.clone()));
        assert_eq!(cache.get(&alias), Some(doc.clone()));
        assert_eq!(cache.get(&alias.to_ascii_uppercase()), Some(doc));
    }

    #[test]
    fn unknown_key_is_a_miss() {
        let cache = DocumentCache::new(CacheConfig::default());
        assert_eq!(cache.lookup("00000"), CacheLookup::Miss);
        assert_eq!(cache.get(hash_for("nobody").as_str()), None);
    }

    #[test]
    fn alias_without_live_document_is_a_miss() {
        let cache = DocumentCache::new(CacheConfig::default());
        let doc = document(1, "alpha", "member");
        let alias = doc.hash.prefix(5).to_string();
        cache.insert(doc.clone());
        rw_write(&cache.documents, SOURCE, "test").remove(&doc.hash);

        assert_eq!(cache.lookup(&alias), CacheLookup::Alias(doc.hash.clone()));
        assert_eq!(cache.get(&alias), None);
    }

    #[test]
    fn expired_entries_are_invisible() {
        let cache = DocumentCache::new(CacheConfig {
            document_ttl: Duration::from_millis(1),
            ..Default::default()
        });
        let doc = document(1, "alpha", "member");
        cache.insert(doc.clone());
        cache.install_type_index(TypeIndex::from([("member".to_string(), vec![doc.hash.clone()])]));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.lookup(doc.hash.as_str()), CacheLookup::Miss);
        assert!(cache.type_index().is_none());
        assert!(cache.documents_of_type("member").is_empty());
    }

    #[test]
    fn newest_insert_owns_shared_alias() {
        let cache = DocumentCache::new(CacheConfig {
            short_hash_len: 1,
            ..Default::default()
        });
        let first = document(1, "alpha", "member");
        let mut second = document(2, "beta", "member");
        // Force a prefix collision while keeping distinct full hashes.
        let mut forced = first.hash.as_str().to_string();
        forced.replace_range(63..64, if forced.ends_with('0') { "1" } else { "0" });
        second.hash = DocumentHash::parse(&forced).expect("hash");

        cache.insert(first.clone());
        cache.insert(second.clone());

        let alias = first.hash.prefix(1);
        assert_eq!(cache.get(alias), Some(second));
        assert_eq!(cache.get(first.hash.as_str()), Some(first));
    }

    #[test]
    fn persist_and_restore() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = SnapshotStore::new(dir.path().join(".graph.cache"));
        let cache = DocumentCache::new(CacheConfig::default());
        let a = document(1, "alpha", "member");
        let b = document(2, "beta", "role");
        cache.insert(a.clone());
        cache.insert(b.clone());
        cache.insert_edge(edge(7, &a, &b, "holds", datetime!(2021-01-01 00:00 UTC)));
        cache.install_type_index(TypeIndex::from([
            ("member".to_string(), vec![a.hash.clone()]),
            ("role".to_string(), vec![b.hash.clone()]),
        ]));
        cache.persist(&store).expect("persist");

        let restored = DocumentCache::restore(&store, CacheConfig::default()).expect("restore");
        assert_eq!(restored.get(a.hash.prefix(5)), Some(a));
        assert_eq!(restored.documents_of_type("role"), vec![b.hash.clone()]);
        assert_eq!(restored.edge(7).map(|edge| edge.edge_name), Some("holds".to_string()));
        assert_eq!(restored.stats().documents, 2);
        assert_eq!(restored.stats().types, 2);
    }

    #[test]
    fn restore_requires_live_type_index() {
        let cache = DocumentCache::new(CacheConfig::default());
        cache.insert(document(1, "alpha", "member"));
        let mut snapshot = cache.snapshot();
        assert!(matches!(
            DocumentCache::from_snapshot(snapshot.clone(), CacheConfig::default()),
            Err(RestoreError::MissingTypeIndex)
        ));

        snapshot.type_index = Some(Expiring::new(
            TypeIndex::new(),
            datetime!(2000-01-01 00:00 UTC),
        ));
        assert!(matches!(
            DocumentCache::from_snapshot(snapshot, CacheConfig::default()),
            Err(RestoreError::MissingTypeIndex)
        ));
    }

    #[test]
    fn restore_rejects_changed_alias_length() {
        let cache = DocumentCache::new(CacheConfig::default());
        cache.install_type_index(TypeIndex::new());
        let snapshot = cache.snapshot();

        let config = CacheConfig {
            short_hash_len: 8,
            ..Default::default()
        };
        assert!(matches!(
            DocumentCache::from_snapshot(snapshot, config),
            Err(RestoreError::AliasLength { found: 5, expected: 8 })
        ));
    }

    #[test]
    fn restore_drops_expired_documents() {
        let cache = DocumentCache::new(CacheConfig::default());
        cache.install_type_index(TypeIndex::new());
        let doc = document(1, "alpha", "member");
        cache.insert(doc.clone());
        let mut snapshot = cache.snapshot();
        snapshot.documents[0].expires_at = datetime!(2000-01-01 00:00 UTC);

        let restored = DocumentCache::from_snapshot(snapshot, CacheConfig::default()).expect("restore");
        assert_eq!(restored.get(doc.hash.as_str()), None);
        assert_eq!(restored.stats().documents, 0);
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let cache = DocumentCache::new(CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .documents
                .write()
                .expect("documents lock should be acquired");
            panic!("poison documents lock");
        }));

        let doc = document(1, "alpha", "member");
        cache.insert(doc.clone());
        assert_eq!(cache.get(doc.hash.as_str()), Some(doc));
    }

    #[test]
    fn parallel_writers_and_readers_keep_both_maps_consistent() {
        let cache = Arc::new(DocumentCache::new(CacheConfig {
            short_hash_len: 8,
            ..Default::default()
        }));
        let docs: Vec<Vec<Document>> = (0..4u64)
            .map(|writer| {
                (0..25u64)
                    .map(|i| document(writer * 100 + i, &format!("w{writer}-{i}"), "member"))
                    .collect()
            })
            .collect();

        std::thread::scope(|scope| {
            for batch in &docs {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for doc in batch {
                        cache.insert(doc.clone());
                        assert_eq!(cache.get(doc.hash.as_str()).as_ref(), Some(doc));
                    }
                });
            }
            for reader in 0..4usize {
                let cache = Arc::clone(&cache);
                let docs = &docs;
                scope.spawn(move || {
                    for round in 0..50usize {
                        let doc = &docs[reader][round % 25];
                        if let Some(found) = cache.get(doc.hash.prefix(8)) {
                            assert_eq!(&found, doc);
                        }
                        let snapshot = cache.snapshot();
                        assert_eq!(snapshot.short_hash_len, 8);
                        let mut index = TypeIndex::new();
                        index.insert(
                            "member".to_string(),
                            snapshot.documents.iter().map(|e| e.value.hash.clone()).collect(),
                        );
                        cache.install_type_index(index);
                    }
                });
            }
        });

        for doc in docs.iter().flatten() {
            assert_eq!(cache.lookup(doc.hash.as_str()), CacheLookup::Hit(doc.clone()));
            assert_eq!(
                cache.lookup(doc.hash.prefix(8)),
                CacheLookup::Alias(doc.hash.clone())
            );
        }
        let stats = cache.stats();
        assert_eq!(stats.documents, 100);
        assert_eq!(stats.aliases, 100);
        assert_eq!(cache.snapshot().documents.len(), 100);
    }
}
