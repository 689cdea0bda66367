// src/dataset/extractor.rs
//
//! Bulk Extractor: materializes every row matching a request and hands them
//! out one at a time.
//!
//! The strategy is chosen per call from the cached remote count:
//! * below the threshold: paged queries against the service, buffered.
//! * at/above it: a bulk export, parsed incrementally from its CSV payload.
//!
//! Shuffled extractions always buffer the full set before the first row is
//! yielded, so a partially consumed shuffled sequence never leaks the
//! underlying order. The export stream (and any spool file) is owned by the
//! returned sequence and released when it finishes or is dropped.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_stream::try_stream;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::connection::{ClientHandle, ConnectionProvider};
use crate::constants::{DEFAULT_BULK_THRESHOLD, DEFAULT_EXPORT_BUFFER_SIZE};
use crate::count_cache::CountCache;
use crate::dataset::RecordStream;
use crate::dataset::csv_payload::CsvRecordReader;
use crate::dataset::plan::{ExtractRequest, ExtractionPlan, OrderMode, Strategy};
use crate::error::{Result, SamplerError};
use crate::point_sampler::SharedRandom;
use crate::random::shuffle;
use crate::record::Record;
use crate::remote::{BulkTransport, ExportPayload, RemoteClient};

#[derive(Clone)]
pub struct Extractor {
    connections: Arc<ConnectionProvider>,
    counts: Arc<CountCache>,
    rng: SharedRandom,
    threshold: u64,
    spool_dir: Option<PathBuf>,
}

impl Extractor {
    pub fn new(connections: Arc<ConnectionProvider>, counts: Arc<CountCache>, rng: SharedRandom) -> Self {
        Self {
            connections,
            counts,
            rng,
            threshold: DEFAULT_BULK_THRESHOLD,
            spool_dir: None,
        }
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_spool_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.spool_dir = dir;
        self
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Resolve the plan for `request` without extracting anything.
    pub async fn plan(&self, context: Option<&str>, request: &ExtractRequest) -> Result<ExtractionPlan> {
        let (_, plan) = self.resolve(context, request).await?;
        Ok(plan)
    }

    /// Start an extraction. Rows are fetched when the sequence is first polled.
    pub async fn extract(&self, context: Option<&str>, request: ExtractRequest) -> Result<RecordStream> {
        let (handle, plan) = self.resolve(context, &request).await?;

        if plan.count == 0 && !request.allow_empty {
            return Err(SamplerError::empty(plan.record_type(), plan.query.count()));
        }
        info!(
            "Extracting {} ({} rows, {}, {:?})",
            plan.record_type(),
            plan.count,
            plan.strategy,
            plan.order
        );

        match plan.strategy {
            Strategy::Direct => Ok(self.direct_stream(handle.client, plan, request.allow_empty)),
            Strategy::BulkExport => {
                let bulk = handle.bulk.ok_or_else(|| {
                    SamplerError::DependencyUnavailable(format!(
                        "bulk export capability is required for {} rows of {} but the client does not provide it",
                        plan.count,
                        plan.record_type()
                    ))
                })?;
                Ok(self.bulk_stream(bulk, plan, request.allow_empty))
            }
        }
    }

    async fn resolve(&self, context: Option<&str>, request: &ExtractRequest) -> Result<(ClientHandle, ExtractionPlan)> {
        request.query.validate()?;
        let handle = self.connections.get_client(context).await?;
        let count = self
            .counts
            .get_count(handle.client.as_ref(), &request.query.count_key())
            .await?;
        let plan = ExtractionPlan::decide(request, count, self.threshold);
        debug!("Plan for {}: {:?} over {} rows", plan.query.select(), plan.strategy, count);
        Ok((handle, plan))
    }

    fn direct_stream(&self, client: Arc<dyn RemoteClient>, plan: ExtractionPlan, allow_empty: bool) -> RecordStream {
        let rng = self.rng.clone();
        Box::pin(try_stream! {
            let mut rows = fetch_direct(client.as_ref(), &plan).await?;
            if rows.is_empty() && !allow_empty {
                Err(SamplerError::empty(plan.record_type(), plan.query.select()))?;
            }
            if plan.order == OrderMode::Shuffled {
                let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
                shuffle(&mut rows, &mut **rng);
            }
            for row in rows {
                yield row;
            }
        })
    }

    fn bulk_stream(&self, bulk: Arc<dyn BulkTransport>, plan: ExtractionPlan, allow_empty: bool) -> RecordStream {
        let rng = self.rng.clone();
        let spool_dir = self.spool_dir.clone();
        Box::pin(try_stream! {
            let record_type = plan.record_type().to_string();
            let failed = |e: anyhow::Error| SamplerError::extraction(record_type.clone(), e);

            let query = plan.query.select();
            let mut payload = bulk
                .export(&record_type, &query)
                .await
                .with_context(|| format!("bulk export of `{query}` failed"))
                .map_err(failed)?;
            if let Some(dir) = &spool_dir {
                payload = spool(payload, dir).await.map_err(failed)?;
            }

            let mut reader = CsvRecordReader::open(payload).await.map_err(failed)?;
            reader.require_columns(&plan.query.fields).map_err(failed)?;

            let mut emitted = 0usize;
            match plan.order {
                OrderMode::InOrder => {
                    while let Some(row) = reader.next_record().await.map_err(failed)? {
                        emitted += 1;
                        yield row.project(&plan.query.fields).map_err(failed)?;
                    }
                }
                OrderMode::Shuffled => {
                    let mut rows = Vec::new();
                    while let Some(row) = reader.next_record().await.map_err(failed)? {
                        rows.push(row.project(&plan.query.fields).map_err(failed)?);
                    }
                    drop(reader);
                    {
                        let mut rng = rng.lock().unwrap_or_else(|e| e.into_inner());
                        shuffle(&mut rows, &mut **rng);
                    }
                    for row in rows {
                        emitted += 1;
                        yield row;
                    }
                }
            }
            info!("Bulk export of {} produced {} rows", record_type, emitted);
            if emitted == 0 && !allow_empty {
                Err(SamplerError::empty(record_type.clone(), query.clone()))?;
            }
        })
    }
}

/// Page through the direct query result, projecting each row.
async fn fetch_direct(client: &dyn RemoteClient, plan: &ExtractionPlan) -> Result<Vec<Record>> {
    let query = plan.query.select();
    let mut page = client
        .query(&query)
        .await
        .map_err(|e| SamplerError::remote(query.clone(), e))?;

    // Sized from what arrived, not from the reported count.
    let mut rows = Vec::with_capacity(page.records.len());
    loop {
        for raw in &page.records {
            let row = Record::from_json(raw)
                .and_then(|r| r.project(&plan.query.fields))
                .map_err(|e| SamplerError::remote(query.clone(), e))?;
            rows.push(row);
        }
        if page.done {
            break;
        }
        let next = page.next_records_url.take().ok_or_else(|| {
            SamplerError::remote(query.clone(), anyhow!("result not done but no next page locator"))
        })?;
        debug!("Fetching next page of {} ({} rows so far)", plan.record_type(), rows.len());
        page = client
            .query_more(&next)
            .await
            .map_err(|e| SamplerError::remote(next.clone(), e))?;
    }
    Ok(rows)
}

/// Copy the payload into an anonymous temp file under `dir` and close the
/// transport stream. The file is removed by the OS once the reader drops.
async fn spool(mut payload: ExportPayload, dir: &Path) -> anyhow::Result<ExportPayload> {
    let file = tempfile::tempfile_in(dir)
        .with_context(|| format!("cannot create spool file in {}", dir.display()))?;
    let mut file = tokio::fs::File::from_std(file);
    let bytes = tokio::io::copy_buf(&mut payload, &mut file)
        .await
        .context("failed while spooling bulk export")?;
    drop(payload);
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    debug!("Spooled {} bytes of bulk export to {}", bytes, dir.display());
    Ok(Box::pin(BufReader::with_capacity(DEFAULT_EXPORT_BUFFER_SIZE, file)))
}
