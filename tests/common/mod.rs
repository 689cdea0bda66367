// tests/common/mod.rs
//
// In-memory stand-ins for the remote service so tests are deterministic and
// never touch the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, BufReader, ReadBuf};

use remote_sampler::{
    BulkTransport, ClientFactory, ClientHandle, ConnectError, ConnectionProvider, Engine,
    ExportPayload, QueryResult, RandomSource, RemoteClient, SamplerConfig,
};

/// Shared, ordered log of every remote interaction.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Answers queries from a fixed table keyed by the exact query string.
pub struct FakeClient {
    responses: HashMap<String, QueryResult>,
    pages: HashMap<String, QueryResult>,
    log: CallLog,
}

impl FakeClient {
    pub fn new(log: CallLog) -> Self {
        Self { responses: HashMap::new(), pages: HashMap::new(), log }
    }

    pub fn count(mut self, query: &str, total: u64) -> Self {
        self.responses.insert(query.to_string(), QueryResult::with_total(total));
        self
    }

    pub fn records(mut self, query: &str, records: Vec<Value>) -> Self {
        self.responses.insert(query.to_string(), QueryResult::with_records(records));
        self
    }

    pub fn respond(mut self, query: &str, result: QueryResult) -> Self {
        self.responses.insert(query.to_string(), result);
        self
    }

    pub fn page(mut self, locator: &str, result: QueryResult) -> Self {
        self.pages.insert(locator.to_string(), result);
        self
    }
}

#[async_trait]
impl RemoteClient for FakeClient {
    async fn query(&self, query: &str) -> Result<QueryResult> {
        self.log.lock().unwrap().push(query.to_string());
        match self.responses.get(query) {
            Some(r) => Ok(r.clone()),
            None => bail!("No mock response found for query `{query}`"),
        }
    }

    async fn query_more(&self, next_records_url: &str) -> Result<QueryResult> {
        self.log.lock().unwrap().push(format!("MORE {next_records_url}"));
        match self.pages.get(next_records_url) {
            Some(r) => Ok(r.clone()),
            None => bail!("No mock page found for `{next_records_url}`"),
        }
    }
}

/// Reader that flags when the payload stream has been released.
struct TrackedReader {
    inner: Cursor<Vec<u8>>,
    released: Arc<AtomicBool>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Serves a fixed CSV payload for every export.
pub struct FakeBulk {
    csv: String,
    fail: bool,
    log: CallLog,
    pub released: Arc<AtomicBool>,
}

impl FakeBulk {
    pub fn new(csv: &str, log: CallLog) -> Self {
        Self {
            csv: csv.to_string(),
            fail: false,
            log,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self { fail: true, ..Self::new("", log) }
    }

    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkTransport for FakeBulk {
    async fn export(&self, record_type: &str, query: &str) -> Result<ExportPayload> {
        self.log.lock().unwrap().push(format!("EXPORT {record_type}: {query}"));
        if self.fail {
            bail!("bulk job failed: InvalidBatch");
        }
        let reader = TrackedReader {
            inner: Cursor::new(self.csv.clone().into_bytes()),
            released: self.released.clone(),
        };
        Ok(Box::pin(BufReader::new(reader)))
    }
}

/// Hands out one prepared handle, or reports the client library missing.
pub struct FakeFactory {
    handle: Option<ClientHandle>,
    unavailable: Option<String>,
    log: CallLog,
}

impl FakeFactory {
    pub fn new(handle: ClientHandle, log: CallLog) -> Self {
        Self { handle: Some(handle), unavailable: None, log }
    }

    pub fn unavailable(message: &str, log: CallLog) -> Self {
        Self { handle: None, unavailable: Some(message.to_string()), log }
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn connect(&self, context: &str) -> std::result::Result<ClientHandle, ConnectError> {
        self.log.lock().unwrap().push(format!("CONNECT {context}"));
        if let Some(msg) = &self.unavailable {
            return Err(ConnectError::Unavailable(msg.clone()));
        }
        Ok(self.handle.clone().expect("handle configured"))
    }
}

/// Always draws `value` (reduced into range), like a patched `randrange`.
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
    fn next_below(&mut self, upper: u64) -> u64 {
        self.0 % upper
    }
}

pub fn engine_for(handle: ClientHandle, log: &CallLog, config: SamplerConfig) -> Engine {
    let provider = ConnectionProvider::new(Arc::new(FakeFactory::new(handle, log.clone())));
    Engine::new(config, provider)
}

pub fn engine_with_random(
    handle: ClientHandle,
    log: &CallLog,
    config: SamplerConfig,
    rng: impl RandomSource + 'static,
) -> Engine {
    let provider = ConnectionProvider::new(Arc::new(FakeFactory::new(handle, log.clone())));
    Engine::with_random(config, provider, rng)
}

/// `n` users whose Ids start with the user key prefix `005`.
pub fn users(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "attributes": {"type": "User"},
                "Id": format!("005000000000{i:03}"),
                "FirstName": format!("A{i}"),
                "LastName": format!("TestUser{i}"),
            })
        })
        .collect()
}
