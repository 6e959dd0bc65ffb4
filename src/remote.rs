//! Remote source of documents and edges.
//!
//! The ledger is the only authority for graph data. Everything else in the
//! crate is a cache in front of an implementation of [`RemoteSource`].

use async_trait::async_trait;
use thiserror::Error;

use docgraph_types::{Document, DocumentError, DocumentHash, Edge};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("document `{0}` was not found")]
    NotFound(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chain api returned status {status}: {body}")]
    Rpc { status: u16, body: String },
    #[error("failed to decode chain response: {0}")]
    Decode(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_document(&self, hash: &str) -> Result<Document, RemoteError>;

    async fn fetch_all_documents(&self) -> Result<Vec<Document>, RemoteError>;

    /// Edges whose `from_node` is `hash`.
    async fn fetch_edges_from(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError>;

    /// Edges whose `to_node` is `hash`.
    async fn fetch_edges_to(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError>;

    async fn fetch_all_edges(&self) -> Result<Vec<Edge>, RemoteError>;

    /// Most recently created document, if the table holds any.
    async fn fetch_last_document(&self) -> Result<Document, RemoteError>;
}
