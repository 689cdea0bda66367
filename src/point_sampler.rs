// src/point_sampler.rs
//
//! Point Sampler: single-record requests answered with targeted queries.
//!
//! `random_record` draws an offset uniformly from `[0, n)` where `n` is the
//! cached count, then fetches `LIMIT 1 OFFSET k`. Every call draws a fresh,
//! independent offset, so repeated calls sample *with* replacement.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::connection::{ClientHandle, ConnectionProvider};
use crate::count_cache::CountCache;
use crate::error::{Result, SamplerError};
use crate::query::QuerySpec;
use crate::random::RandomSource;
use crate::record::{Record, RecordId};

/// The run's random source, shared by the sampler and the extractor.
pub type SharedRandom = Arc<Mutex<Box<dyn RandomSource>>>;

pub fn shared_random(source: impl RandomSource + 'static) -> SharedRandom {
    Arc::new(Mutex::new(Box::new(source)))
}

#[derive(Clone)]
pub struct PointSampler {
    connections: Arc<ConnectionProvider>,
    counts: Arc<CountCache>,
    rng: SharedRandom,
    max_offset: Option<u64>,
}

impl PointSampler {
    pub fn new(connections: Arc<ConnectionProvider>, counts: Arc<CountCache>, rng: SharedRandom) -> Self {
        Self { connections, counts, rng, max_offset: None }
    }

    /// Cap the offset window; draws then come from `[0, min(n, max))`.
    /// A cap of 0 is raised to 1.
    pub fn with_max_offset(mut self, max_offset: Option<u64>) -> Self {
        self.max_offset = max_offset.map(|m| m.max(1));
        self
    }

    /// Identifier of a uniformly drawn `record_type` row.
    pub async fn random_record(&self, context: Option<&str>, record_type: &str) -> Result<RecordId> {
        let record = self.random_record_matching(context, &QuerySpec::new(record_type)).await?;
        identifier(&record, record_type)
    }

    /// A uniformly drawn row matching `spec`, projected onto its fields.
    pub async fn random_record_matching(&self, context: Option<&str>, spec: &QuerySpec) -> Result<Record> {
        spec.validate()?;
        let handle = self.connections.get_client(context).await?;

        let n = self.counts.get_count(handle.client.as_ref(), &spec.count_key()).await?;
        if n == 0 {
            return Err(SamplerError::empty(&spec.record_type, spec.count()));
        }

        let window = match self.max_offset {
            Some(max) if n > max => {
                warn!(
                    "{} has {} matching rows; sampling only the first {} (offset limit)",
                    spec.record_type, n, max
                );
                max
            }
            _ => n,
        };
        let offset = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.next_below(window)
        };
        debug!("Drew offset {} of {} for {}", offset, n, spec.record_type);

        fetch_first(&handle, spec, &spec.select_at_offset(offset)).await
    }

    /// Identifier of the first `record_type` row in the service's default order.
    pub async fn find_record(
        &self,
        context: Option<&str>,
        record_type: &str,
        filter: Option<&str>,
    ) -> Result<RecordId> {
        let spec = QuerySpec::new(record_type).filter(filter);
        let record = self.find_record_matching(context, &spec).await?;
        identifier(&record, record_type)
    }

    /// First row matching `spec`; no randomness and no count query.
    pub async fn find_record_matching(&self, context: Option<&str>, spec: &QuerySpec) -> Result<Record> {
        spec.validate()?;
        let handle = self.connections.get_client(context).await?;
        fetch_first(&handle, spec, &spec.select_first()).await
    }
}

async fn fetch_first(handle: &ClientHandle, spec: &QuerySpec, query: &str) -> Result<Record> {
    let result = handle
        .client
        .query(query)
        .await
        .map_err(|e| SamplerError::remote(query, e))?;
    let first = result
        .records
        .first()
        .ok_or_else(|| SamplerError::empty(&spec.record_type, query))?;
    Record::from_json(first)
        .and_then(|r| r.project(&spec.fields))
        .map_err(|e| SamplerError::remote(query, e))
}

fn identifier(record: &Record, record_type: &str) -> Result<RecordId> {
    record.id().ok_or_else(|| {
        SamplerError::remote(
            format!("SELECT Id FROM {record_type}"),
            anyhow!("record has no textual Id field"),
        )
    })
}
