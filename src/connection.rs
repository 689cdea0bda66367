// src/connection.rs
//
//! Connection Provider: one lazily-built remote client per Target Context.
//!
//! The client library is optional. It is represented by a [`ClientFactory`];
//! a provider built without one (or whose factory reports the library as
//! unloadable) fails with `DependencyUnavailable` on first use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Result, SamplerError};
use crate::remote::{BulkTransport, RemoteClient};

/// Live connection to the remote service for one context.
#[derive(Clone)]
pub struct ClientHandle {
    pub client: Arc<dyn RemoteClient>,
    /// Bulk export is a separate capability; not every client offers it.
    pub bulk: Option<Arc<dyn BulkTransport>>,
}

impl ClientHandle {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client, bulk: None }
    }

    pub fn with_bulk(mut self, bulk: Arc<dyn BulkTransport>) -> Self {
        self.bulk = Some(bulk);
        self
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("bulk", &self.bulk.is_some())
            .finish()
    }
}

/// Why a factory could not produce a client.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The library (or a piece of it) cannot be loaded at all.
    #[error("{0}")]
    Unavailable(String),
    /// The library loaded but the session could not be established.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Builds clients for a named context (auth/session setup lives behind this).
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, context: &str) -> std::result::Result<ClientHandle, ConnectError>;
}

pub struct ConnectionProvider {
    factory: Option<Arc<dyn ClientFactory>>,
    clients: Mutex<HashMap<String, Arc<OnceCell<ClientHandle>>>>,
}

impl ConnectionProvider {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory: Some(factory), clients: Mutex::new(HashMap::new()) }
    }

    /// A provider for builds where the client library is not present.
    pub fn unavailable() -> Self {
        Self { factory: None, clients: Mutex::new(HashMap::new()) }
    }

    /// Return the cached client for `context`, connecting on first use.
    ///
    /// A blank or absent context fails before any connection attempt.
    /// Failed connections are not cached; the next call tries again.
    pub async fn get_client(&self, context: Option<&str>) -> Result<ClientHandle> {
        let context = resolve_context(context)?;
        let factory = self.factory.as_ref().ok_or_else(|| {
            SamplerError::DependencyUnavailable(
                "remote client library is not available in this build".to_string(),
            )
        })?;

        let cell = {
            let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
            clients
                .entry(context.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let handle = cell
            .get_or_try_init(|| async {
                info!("Connecting to target context '{}'", context);
                factory.connect(context).await.map_err(|e| match e {
                    ConnectError::Unavailable(msg) => SamplerError::DependencyUnavailable(msg),
                    ConnectError::Failed(source) => SamplerError::ConnectionFailed {
                        context: context.to_string(),
                        source,
                    },
                })
            })
            .await?;

        debug!("Using client for context '{}'", context);
        Ok(handle.clone())
    }

    /// Number of contexts with an established client.
    pub fn connected_contexts(&self) -> usize {
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.values().filter(|c| c.initialized()).count()
    }
}

impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("available", &self.factory.is_some())
            .field("connected", &self.connected_contexts())
            .finish()
    }
}

fn resolve_context(context: Option<&str>) -> Result<&str> {
    match context.map(str::trim) {
        Some(ctx) if !ctx.is_empty() => Ok(ctx),
        _ => Err(SamplerError::MissingConfiguration(
            "a target context (org name) is required to query the remote service".to_string(),
        )),
    }
}
