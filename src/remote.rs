// src/remote.rs
//
// Outbound capabilities the engine consumes. Implementations wrap a real
// service client; tests substitute in-memory doubles.

use std::pin::Pin;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncBufRead;

use crate::record::Record;

/// One page of a query result, shaped like the remote service's JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default = "done_by_default")]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Value>,
    /// Locator for the next page when `done` is false.
    #[serde(default)]
    pub next_records_url: Option<String>,
}

fn done_by_default() -> bool {
    true
}

impl QueryResult {
    pub fn with_total(total_size: u64) -> Self {
        Self { total_size, done: true, ..Default::default() }
    }

    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            total_size: records.len() as u64,
            done: true,
            records,
            next_records_url: None,
        }
    }

    pub fn parse_records(&self) -> anyhow::Result<Vec<Record>> {
        self.records.iter().map(Record::from_json).collect()
    }
}

/// Query-execution capability.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Execute a query-language string.
    async fn query(&self, query: &str) -> anyhow::Result<QueryResult>;

    /// Fetch the page after one that reported `done == false`.
    async fn query_more(&self, next_records_url: &str) -> anyhow::Result<QueryResult> {
        anyhow::bail!("paging is not supported by this client (locator {next_records_url})")
    }
}

/// A streamed, row-oriented (CSV) bulk export payload.
pub type ExportPayload = Pin<Box<dyn AsyncBufRead + Send>>;

/// Bulk export/download capability.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    /// Start an export of `record_type` rows selected by `query` and return the
    /// payload stream. The stream is closed when dropped.
    async fn export(&self, record_type: &str, query: &str) -> anyhow::Result<ExportPayload>;
}
