//! Navigable neighborhood of one document.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use docgraph_types::{Document, DocumentHash, Edge};

use crate::cache::{CacheLoader, Expiring, ResolveError};
use crate::infra::telemetry::{PAGE_HIT_TOTAL, PAGE_MISS_TOTAL};
use crate::remote::RemoteError;

const TARGET: &str = "daoctl::graph::page";

/// Shown for neighbors whose type cannot be determined.
pub const UNTYPED: &str = "untyped";
/// Shown for neighbors without a usable label.
pub const UNLABELED: &str = "unlabeled";
/// Neighbor labels are cut to this many characters.
pub const LABEL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The primary document is the edge's `from_node`.
    Outbound,
    /// The primary document is the edge's `to_node`.
    Inbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeChoice {
    pub edge_name: String,
    pub direction: Direction,
    pub neighbor: DocumentHash,
    pub neighbor_type: String,
    pub neighbor_label: String,
    #[serde(with = "docgraph_types::timestamp")]
    pub created_date: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub primary: Document,
    pub outbound: Vec<Edge>,
    pub inbound: Vec<Edge>,
    /// Outbound then inbound choices, stably sorted by edge creation time.
    pub choices: Vec<EdgeChoice>,
}

impl Page {
    /// Distinct neighbor hashes in choice order, excluding the primary.
    pub fn neighbors(&self) -> Vec<DocumentHash> {
        let mut seen = HashSet::new();
        self.choices
            .iter()
            .map(|choice| &choice.neighbor)
            .filter(|hash| **hash != self.primary.hash)
            .filter(|hash| seen.insert((*hash).clone()))
            .cloned()
            .collect()
    }

    /// A document with no outbound edges ends the walk.
    pub fn is_terminal(&self) -> bool {
        self.outbound.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to load {direction} edges of {hash}: {source}")]
    Edges {
        direction: &'static str,
        hash: DocumentHash,
        #[source]
        source: RemoteError,
    },
}

/// Short-lived pages keyed by the requested hash or prefix.
pub struct PageCache {
    pages: DashMap<String, Expiring<Arc<Page>>>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pages: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Page>> {
        let now = OffsetDateTime::now_utc();
        let page = self
            .pages
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.value));
        if page.is_none() {
            self.pages.remove_if(key, |_, entry| !entry.is_live(now));
        }
        page
    }

    /// Stores `page` and sweeps every expired entry.
    pub fn insert(&self, key: String, page: Arc<Page>) {
        let now = OffsetDateTime::now_utc();
        self.pages.retain(|_, entry| entry.is_live(now));
        let expires_at = crate::cache::expiry_after(now, self.ttl);
        self.pages.insert(key, Expiring::new(page, expires_at));
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

pub struct PageBuilder {
    loader: Arc<CacheLoader>,
    pages: PageCache,
}

impl PageBuilder {
    pub fn new(loader: Arc<CacheLoader>) -> Self {
        let ttl = loader.config().page_ttl;
        Self {
            loader,
            pages: PageCache::new(ttl),
        }
    }

    pub fn loader(&self) -> &Arc<CacheLoader> {
        &self.loader
    }

    /// The cached page for `key`, without building it.
    pub fn cached(&self, key: &str) -> Option<Arc<Page>> {
        self.pages.get(&normalize(key))
    }

    /// Builds the page for a full hash or short prefix, or returns the cached one.
    pub async fn build(&self, key: &str) -> Result<Arc<Page>, PageError> {
        let key = normalize(key);
        if let Some(page) = self.pages.get(&key) {
            counter!(PAGE_HIT_TOTAL).increment(1);
            debug!(target = TARGET, op = "build", result = "hit", key = %key);
            return Ok(page);
        }
        counter!(PAGE_MISS_TOTAL).increment(1);

        let primary = self.loader.resolve(&key).await?;
        let hash = primary.hash.clone();
        let remote = self.loader.remote();

        let (outbound, inbound) = tokio::try_join!(
            async {
                remote
                    .fetch_edges_from(&hash)
                    .await
                    .map_err(|source| PageError::Edges {
                        direction: Direction::Outbound.as_str(),
                        hash: hash.clone(),
                        source,
                    })
            },
            async {
                remote
                    .fetch_edges_to(&hash)
                    .await
                    .map_err(|source| PageError::Edges {
                        direction: Direction::Inbound.as_str(),
                        hash: hash.clone(),
                        source,
                    })
            },
        )?;

        let mut choices = self.choices(&hash, &outbound, Direction::Outbound).await;
        choices.extend(self.choices(&hash, &inbound, Direction::Inbound).await);
        choices.sort_by_key(|choice| choice.created_date);

        debug!(
            target = TARGET,
            op = "build",
            result = "built",
            key = %key,
            outbound = outbound.len(),
            inbound = inbound.len()
        );

        let page = Arc::new(Page {
            primary,
            outbound,
            inbound,
            choices,
        });
        if key != hash.as_str() {
            self.pages.insert(hash.to_string(), Arc::clone(&page));
        }
        self.pages.insert(key, Arc::clone(&page));
        Ok(page)
    }

    async fn choices(
        &self,
        primary: &DocumentHash,
        edges: &[Edge],
        direction: Direction,
    ) -> Vec<EdgeChoice> {
        join_all(edges.iter().map(|edge| async move {
            let neighbor = edge.other_end(primary).clone();
            let (neighbor_type, neighbor_label) = self.describe(&neighbor).await;
            EdgeChoice {
                edge_name: edge.edge_name.clone(),
                direction,
                neighbor,
                neighbor_type,
                neighbor_label,
                created_date: edge.created_date,
            }
        }))
        .await
    }

    // Display metadata only; failures degrade to placeholders.
    async fn describe(&self, hash: &DocumentHash) -> (String, String) {
        match self.loader.resolve(hash.as_str()).await {
            Ok(document) => {
                let document_type = document
                    .document_type()
                    .map(str::to_string)
                    .unwrap_or_else(|_| UNTYPED.to_string());
                let label = document
                    .node_label()
                    .map(|label| truncate_label(&label))
                    .unwrap_or_else(|| UNLABELED.to_string());
                (document_type, label)
            }
            Err(err) => {
                debug!(
                    target = TARGET,
                    hash = %hash,
                    error = %err,
                    "neighbor metadata unavailable"
                );
                (UNTYPED.to_string(), UNLABELED.to_string())
            }
        }
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

pub fn truncate_label(label: &str) -> String {
    label.chars().take(LABEL_WIDTH).collect()
}
