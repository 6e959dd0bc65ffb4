//! In-memory remote source and fixture builders.
//!
//! Compiled for unit tests and behind the `testing` feature, which the
//! integration tests under `tests/` enable through the dev-dependency on this
//! crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use docgraph_types::{Content, ContentValue, Document, DocumentHash, Edge};

use crate::remote::{RemoteError, RemoteSource};

/// Deterministic document hash derived from `name`.
pub fn hash_for(name: &str) -> DocumentHash {
    let digest: [u8; 32] = Sha256::digest(name.as_bytes()).into();
    DocumentHash::from_bytes(digest)
}

/// Document named `name` with a `type` and `node_label` content.
pub fn document(id: u64, name: &str, document_type: &str) -> Document {
    Document {
        id,
        hash: hash_for(name),
        creator: "dao.hypha".to_string(),
        content_groups: vec![vec![
            Content {
                label: "type".to_string(),
                value: ContentValue::Name(document_type.to_string()),
            },
            Content {
                label: "node_label".to_string(),
                value: ContentValue::String(name.to_string()),
            },
        ]],
        created_date: OffsetDateTime::UNIX_EPOCH + time::Duration::days(id as i64),
    }
}

/// Document without any `type` content.
pub fn untyped_document(id: u64, name: &str) -> Document {
    Document {
        content_groups: vec![vec![Content {
            label: "node_label".to_string(),
            value: ContentValue::String(name.to_string()),
        }]],
        ..document(id, name, "untyped")
    }
}

pub fn edge(
    id: u64,
    from: &Document,
    to: &Document,
    edge_name: &str,
    created_date: OffsetDateTime,
) -> Edge {
    Edge {
        id,
        from_node: from.hash.clone(),
        to_node: to.hash.clone(),
        edge_name: edge_name.to_string(),
        created_date,
    }
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub fetch_document: AtomicUsize,
    pub fetch_all_documents: AtomicUsize,
    pub fetch_edges_from: AtomicUsize,
    pub fetch_edges_to: AtomicUsize,
    pub fetch_all_edges: AtomicUsize,
    pub fetch_last_document: AtomicUsize,
}

#[derive(Default)]
struct Graph {
    documents: Vec<Document>,
    edges: Vec<Edge>,
}

/// A [`RemoteSource`] backed by vectors, with call counting, failure
/// injection and artificial latency on edge fetches.
#[derive(Default)]
pub struct MemorySource {
    graph: RwLock<Graph>,
    edge_delays: RwLock<HashMap<DocumentHash, Duration>>,
    failing_edges: RwLock<Vec<DocumentHash>>,
    failing_documents: RwLock<Vec<DocumentHash>>,
    calls: CallCounts,
}

impl MemorySource {
    pub fn new(documents: Vec<Document>, edges: Vec<Edge>) -> Arc<Self> {
        Arc::new(Self {
            graph: RwLock::new(Graph { documents, edges }),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn add_document(&self, document: Document) {
        self.write_graph().documents.push(document);
    }

    /// Swaps in `document` for any stored document with the same hash.
    pub fn replace_document(&self, document: Document) {
        let mut graph = self.write_graph();
        graph.documents.retain(|existing| existing.hash != document.hash);
        graph.documents.push(document);
    }

    pub fn add_edge(&self, edge: Edge) {
        self.write_graph().edges.push(edge);
    }

    /// Delays edge fetches touching `hash`.
    pub fn delay_edges(&self, hash: &DocumentHash, delay: Duration) {
        if let Ok(mut delays) = self.edge_delays.write() {
            delays.insert(hash.clone(), delay);
        }
    }

    /// Makes edge fetches touching `hash` fail.
    pub fn fail_edges(&self, hash: &DocumentHash) {
        if let Ok(mut failing) = self.failing_edges.write() {
            failing.push(hash.clone());
        }
    }

    /// Makes direct document fetches of `hash` fail with a transport-like error.
    pub fn fail_document(&self, hash: &DocumentHash) {
        if let Ok(mut failing) = self.failing_documents.write() {
            failing.push(hash.clone());
        }
    }

    fn write_graph(&self) -> std::sync::RwLockWriteGuard<'_, Graph> {
        self.graph
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_graph(&self) -> std::sync::RwLockReadGuard<'_, Graph> {
        self.graph
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn edge_gate(&self, hash: &DocumentHash) -> Result<(), RemoteError> {
        let delay = self
            .edge_delays
            .read()
            .ok()
            .and_then(|delays| delays.get(hash).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing_edges
            .read()
            .map(|failing| failing.contains(hash))
            .unwrap_or(false);
        if failing {
            return Err(RemoteError::Rpc {
                status: 503,
                body: format!("edges of {hash} unavailable"),
            });
        }
        Ok(())
    }

    fn edges_matching(&self, predicate: impl Fn(&Edge) -> bool) -> Vec<Edge> {
        self.read_graph()
            .edges
            .iter()
            .filter(|edge| predicate(edge))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    async fn fetch_document(&self, hash: &str) -> Result<Document, RemoteError> {
        self.calls.fetch_document.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_documents
            .read()
            .map(|failing| failing.iter().any(|candidate| candidate.as_str() == hash))
            .unwrap_or(false);
        if failing {
            return Err(RemoteError::Rpc {
                status: 503,
                body: format!("document {hash} unavailable"),
            });
        }

        self.read_graph()
            .documents
            .iter()
            .find(|document| document.hash.as_str() == hash)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(hash.to_string()))
    }

    async fn fetch_all_documents(&self) -> Result<Vec<Document>, RemoteError> {
        self.calls.fetch_all_documents.fetch_add(1, Ordering::SeqCst);
        Ok(self.read_graph().documents.clone())
    }

    async fn fetch_edges_from(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError> {
        self.calls.fetch_edges_from.fetch_add(1, Ordering::SeqCst);
        self.edge_gate(hash).await?;
        Ok(self.edges_matching(|edge| &edge.from_node == hash))
    }

    async fn fetch_edges_to(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError> {
        self.calls.fetch_edges_to.fetch_add(1, Ordering::SeqCst);
        self.edge_gate(hash).await?;
        Ok(self.edges_matching(|edge| &edge.to_node == hash))
    }

    async fn fetch_all_edges(&self) -> Result<Vec<Edge>, RemoteError> {
        self.calls.fetch_all_edges.fetch_add(1, Ordering::SeqCst);
        Ok(self.read_graph().edges.clone())
    }

    async fn fetch_last_document(&self) -> Result<Document, RemoteError> {
        self.calls.fetch_last_document.fetch_add(1, Ordering::SeqCst);
        self.read_graph()
            .documents
            .iter()
            .max_by_key(|document| document.id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("latest document".to_string()))
    }
}
