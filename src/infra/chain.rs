//! `get_table_rows` adapter for the DAO contract's `documents` and `edges` tables.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docgraph_types::{Document, DocumentHash, Edge};

use crate::config::ChainSettings;
use crate::remote::{RemoteError, RemoteSource};

use super::error::InfraError;

const TABLE_ROWS_PATH: &str = "v1/chain/get_table_rows";
const DOCUMENTS_TABLE: &str = "documents";
const EDGES_TABLE: &str = "edges";
const SHA256_KEY: &str = "sha256";
const DOCUMENT_BY_HASH_INDEX: &str = "2";
const EDGE_BY_FROM_INDEX: &str = "2";
const EDGE_BY_TO_INDEX: &str = "3";

#[derive(Clone, Debug)]
pub struct ChainSource {
    client: Client,
    endpoint: Url,
    contract: String,
    page_size: u32,
}

#[derive(Debug, Clone, Serialize)]
struct TableQuery<'a> {
    code: &'a str,
    scope: &'a str,
    table: &'static str,
    json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    index_position: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lower_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upper_bound: Option<String>,
    limit: u32,
    reverse: bool,
}

#[derive(Debug, Deserialize)]
struct TableRows<T> {
    rows: Vec<T>,
    #[serde(default)]
    more: bool,
    #[serde(default)]
    next_key: String,
}

impl ChainSource {
    pub fn new(settings: &ChainSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()?;
        let endpoint = settings.endpoint.join("/").map_err(|err| {
            InfraError::configuration(format!("invalid chain endpoint: {err}"))
        })?;

        Ok(Self {
            client,
            endpoint,
            contract: settings.contract.clone(),
            page_size: settings.page_size.get(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("daoctl/", env!("CARGO_PKG_VERSION"))
    }

    fn query(&self, table: &'static str) -> TableQuery<'_> {
        TableQuery {
            code: &self.contract,
            scope: &self.contract,
            table,
            json: true,
            index_position: None,
            key_type: None,
            lower_bound: None,
            upper_bound: None,
            limit: self.page_size,
            reverse: false,
        }
    }

    fn by_hash<'a>(
        &'a self,
        table: &'static str,
        index: &'static str,
        hash: &str,
    ) -> TableQuery<'a> {
        TableQuery {
            index_position: Some(index),
            key_type: Some(SHA256_KEY),
            lower_bound: Some(hash.to_string()),
            upper_bound: Some(hash.to_string()),
            ..self.query(table)
        }
    }

    async fn table_rows<T: DeserializeOwned>(
        &self,
        query: &TableQuery<'_>,
    ) -> Result<TableRows<T>, RemoteError> {
        let url = self
            .endpoint
            .join(TABLE_ROWS_PATH)
            .map_err(|err| RemoteError::Decode(format!("invalid table url: {err}")))?;
        let resp = self.client.post(url).json(query).send().await?;
        Self::handle(resp).await
    }

    async fn handle<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(RemoteError::Rpc {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::Decode(format!("failed to parse body: {err}")))
    }

    /// Follows `next_key` until the node reports no more rows.
    async fn scan<T: DeserializeOwned>(
        &self,
        mut query: TableQuery<'_>,
    ) -> Result<Vec<T>, RemoteError> {
        let mut rows = Vec::new();
        loop {
            let page: TableRows<T> = self.table_rows(&query).await?;
            rows.extend(page.rows);

            if !page.more {
                break;
            }
            let stalled = query.lower_bound.as_deref() == Some(page.next_key.as_str());
            if page.next_key.is_empty() || stalled {
                warn!(
                    table = query.table,
                    rows = rows.len(),
                    "chain reported more rows without a usable next_key; stopping scan"
                );
                break;
            }
            debug!(table = query.table, next_key = %page.next_key, "fetching next table page");
            query.lower_bound = Some(page.next_key);
        }
        Ok(rows)
    }
}

#[async_trait]
impl RemoteSource for ChainSource {
    async fn fetch_document(&self, hash: &str) -> Result<Document, RemoteError> {
        // The hash index only answers exact keys; a prefix cannot be looked up remotely.
        let Ok(hash) = DocumentHash::parse(hash) else {
            return Err(RemoteError::NotFound(hash.to_string()));
        };

        let query = TableQuery {
            limit: 1,
            ..self.by_hash(DOCUMENTS_TABLE, DOCUMENT_BY_HASH_INDEX, hash.as_str())
        };
        let page: TableRows<Document> = self.table_rows(&query).await?;
        page.rows
            .into_iter()
            .find(|document| document.hash == hash)
            .ok_or_else(|| RemoteError::NotFound(hash.to_string()))
    }

    async fn fetch_all_documents(&self) -> Result<Vec<Document>, RemoteError> {
        self.scan(self.query(DOCUMENTS_TABLE)).await
    }

    async fn fetch_edges_from(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError> {
        let edges: Vec<Edge> = self
            .scan(self.by_hash(EDGES_TABLE, EDGE_BY_FROM_INDEX, hash.as_str()))
            .await?;
        Ok(edges.into_iter().filter(|edge| &edge.from_node == hash).collect())
    }

    async fn fetch_edges_to(&self, hash: &DocumentHash) -> Result<Vec<Edge>, RemoteError> {
        let edges: Vec<Edge> = self
            .scan(self.by_hash(EDGES_TABLE, EDGE_BY_TO_INDEX, hash.as_str()))
            .await?;
        Ok(edges.into_iter().filter(|edge| &edge.to_node == hash).collect())
    }

    async fn fetch_all_edges(&self) -> Result<Vec<Edge>, RemoteError> {
        self.scan(self.query(EDGES_TABLE)).await
    }

    async fn fetch_last_document(&self) -> Result<Document, RemoteError> {
        let query = TableQuery {
            limit: 1,
            reverse: true,
            ..self.query(DOCUMENTS_TABLE)
        };
        let page: TableRows<Document> = self.table_rows(&query).await?;
        page.rows
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound("latest document".to_string()))
    }
}
