// src/engine.rs
//
//! Run-scoped facade wiring the Connection Provider, Count Cache, Point
//! Sampler and Bulk Extractor together, plus the step descriptors the
//! generation pipeline hands in.
//!
//! One `Engine` lives for one generation run. Its client handles, counts and
//! random source are never shared with another run.

use std::sync::Arc;

use futures_util::StreamExt;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::config::SamplerConfig;
use crate::connection::ConnectionProvider;
use crate::constants::DEFAULT_ID_FIELD;
use crate::count_cache::CountCache;
use crate::dataset::{
    EmittedRow, ExtractRequest, ExtractionPlan, Extractor, FieldMapping, OrderMode, RecordStream,
    RowEmitter, RowStream,
};
use crate::error::{Result, SamplerError};
use crate::point_sampler::{PointSampler, shared_random};
use crate::query::QuerySpec;
use crate::random::{RandomSource, SeededRandom};
use crate::record::{Record, RecordId};

/// Sampling operation named by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RandomRecord,
    FindRecord,
    #[serde(alias = "soql_dataset")]
    Dataset,
}

/// Either a plain field list or an explicit output → source mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldsSpec {
    List(Vec<String>),
    Mapping(IndexMap<String, String>),
}

impl FieldsSpec {
    pub fn to_mapping(&self) -> FieldMapping {
        match self {
            FieldsSpec::List(fields) => FieldMapping::identity(fields.iter().cloned()),
            FieldsSpec::Mapping(pairs) => pairs
                .iter()
                .fold(FieldMapping::default(), |m, (out, src)| m.map(out.clone(), src.clone())),
        }
    }
}

/// Declarative step handed in by the generation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StepDescriptor {
    pub operation: Operation,
    #[serde(rename = "from")]
    pub record_type: String,
    #[serde(rename = "where", default)]
    pub filter: Option<String>,
    /// Overrides the configured Target Context.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub fields: Option<FieldsSpec>,
    #[serde(default)]
    pub order: OrderMode,
    /// Entity name stamped on emitted rows; defaults to the record type.
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub allow_empty: bool,
}

impl StepDescriptor {
    pub fn new(operation: Operation, record_type: impl Into<String>) -> Self {
        Self {
            operation,
            record_type: record_type.into(),
            filter: None,
            context: None,
            fields: None,
            order: OrderMode::InOrder,
            entity: None,
            allow_empty: false,
        }
    }

    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn fields(mut self, fields: FieldsSpec) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn order(mut self, order: OrderMode) -> Self {
        self.order = order;
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn mapping(&self) -> FieldMapping {
        self.fields
            .as_ref()
            .map(FieldsSpec::to_mapping)
            .unwrap_or_else(|| FieldMapping::identity([DEFAULT_ID_FIELD]))
    }

    pub fn query(&self) -> QuerySpec {
        QuerySpec::new(self.record_type.clone())
            .fields(self.mapping().source_fields())
            .filter(self.filter.clone())
    }

    fn emitter(&self) -> RowEmitter {
        let entity = self.entity.clone().unwrap_or_else(|| self.record_type.clone());
        RowEmitter::new(entity, self.mapping())
    }

    fn wants_id_only(&self) -> bool {
        matches!(self.query().fields.as_slice(), [f] if f.eq_ignore_ascii_case(DEFAULT_ID_FIELD))
    }
}

/// What a step produced.
pub enum StepOutput {
    /// Point operation selecting only the identifier.
    Id(RecordId),
    /// Point operation selecting other fields.
    Record(Record),
    /// Dataset operation.
    Rows(RowStream),
}

impl std::fmt::Debug for StepOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutput::Id(id) => f.debug_tuple("Id").field(id).finish(),
            StepOutput::Record(r) => f.debug_tuple("Record").field(r).finish(),
            StepOutput::Rows(_) => f.write_str("Rows(..)"),
        }
    }
}

pub struct Engine {
    config: SamplerConfig,
    connections: Arc<ConnectionProvider>,
    counts: Arc<CountCache>,
    sampler: PointSampler,
    extractor: Extractor,
}

impl Engine {
    /// Random source seeded from `config.seed`, or from the OS when unset.
    pub fn new(config: SamplerConfig, connections: ConnectionProvider) -> Self {
        let rng = config.seed.map(SeededRandom::new).unwrap_or_else(SeededRandom::from_entropy);
        Self::with_random(config, connections, rng)
    }

    pub fn with_random(
        config: SamplerConfig,
        connections: ConnectionProvider,
        rng: impl RandomSource + 'static,
    ) -> Self {
        let connections = Arc::new(connections);
        let counts = Arc::new(CountCache::new());
        let rng = shared_random(rng);
        let sampler = PointSampler::new(connections.clone(), counts.clone(), rng.clone())
            .with_max_offset(config.max_offset);
        let extractor = Extractor::new(connections.clone(), counts.clone(), rng)
            .with_threshold(config.bulk_threshold)
            .with_spool_dir(config.spool_dir.clone());
        Self { config, connections, counts, sampler, extractor }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionProvider {
        &self.connections
    }

    pub fn count_cache(&self) -> &CountCache {
        &self.counts
    }

    pub fn sampler(&self) -> &PointSampler {
        &self.sampler
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn context<'a>(&'a self, step_context: Option<&'a str>) -> Option<&'a str> {
        step_context
            .filter(|c| !c.trim().is_empty())
            .or(self.config.target_context.as_deref())
    }

    /// `random_record` against the configured Target Context.
    pub async fn random_record(&self, record_type: &str) -> Result<RecordId> {
        self.sampler.random_record(self.context(None), record_type).await
    }

    /// `find_record` against the configured Target Context.
    pub async fn find_record(&self, record_type: &str, filter: Option<&str>) -> Result<RecordId> {
        self.sampler.find_record(self.context(None), record_type, filter).await
    }

    /// Dataset extraction against the configured Target Context.
    pub async fn extract(&self, request: ExtractRequest) -> Result<RecordStream> {
        self.extractor.extract(self.context(None), request).await
    }

    pub async fn plan(&self, request: &ExtractRequest) -> Result<ExtractionPlan> {
        self.extractor.plan(self.context(None), request).await
    }

    pub async fn run_step(&self, step: &StepDescriptor) -> Result<StepOutput> {
        let context = self.context(step.context.as_deref());
        let query = step.query();
        debug!("Running {:?} step on {}", step.operation, step.record_type);

        match step.operation {
            Operation::RandomRecord => {
                let record = self.sampler.random_record_matching(context, &query).await?;
                point_output(step, record)
            }
            Operation::FindRecord => {
                let record = self.sampler.find_record_matching(context, &query).await?;
                point_output(step, record)
            }
            Operation::Dataset => {
                let request = ExtractRequest::new(query)
                    .order(step.order)
                    .allow_empty(step.allow_empty);
                let records = self.extractor.extract(context, request).await?;
                Ok(StepOutput::Rows(step.emitter().emit_stream(records)))
            }
        }
    }

    /// Emit exactly `count` rows for `step`.
    ///
    /// Point operations run once per row. Dataset operations consume the
    /// extraction and start a fresh one (freshly shuffled, when shuffled)
    /// whenever it runs out before `count` rows have been produced.
    pub async fn generate_rows(&self, step: &StepDescriptor, count: usize) -> Result<Vec<EmittedRow>> {
        let emitter = step.emitter();
        let mut rows = Vec::with_capacity(count);

        while rows.len() < count {
            match self.run_step(step).await? {
                StepOutput::Id(id) => {
                    let record = Record::new().with(DEFAULT_ID_FIELD, id.0);
                    rows.push(emitter.emit(&record)?);
                }
                StepOutput::Record(record) => rows.push(emitter.emit(&record)?),
                StepOutput::Rows(mut stream) => {
                    let before = rows.len();
                    while rows.len() < count {
                        match stream.next().await {
                            Some(row) => rows.push(row?),
                            None => break,
                        }
                    }
                    if rows.len() == before {
                        // Only reachable with allow_empty: nothing to cycle through.
                        break;
                    }
                    if rows.len() < count {
                        debug!("{} exhausted after {} rows, re-extracting", step.record_type, rows.len());
                    }
                }
            }
        }
        Ok(rows)
    }
}

fn point_output(step: &StepDescriptor, record: Record) -> Result<StepOutput> {
    if step.wants_id_only() {
        record.id().map(StepOutput::Id).ok_or_else(|| {
            SamplerError::remote(step.query().select(), anyhow::anyhow!("record has no textual Id field"))
        })
    } else {
        Ok(StepOutput::Record(record))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("connections", &self.connections)
            .field("counts", &self.counts.stats())
            .finish()
    }
}
