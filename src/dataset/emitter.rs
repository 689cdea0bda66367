// src/dataset/emitter.rs
//
// Row Emitter: translate extracted records into the rows the generation
// pipeline consumes.

use anyhow::anyhow;
use futures_util::StreamExt;
use indexmap::IndexMap;
use serde::Serialize;

use crate::dataset::{RecordStream, RowStream};
use crate::error::{Result, SamplerError};
use crate::record::{FieldValue, Record};

/// Output field name → source field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    pairs: IndexMap<String, String>,
}

impl FieldMapping {
    /// Every source field keeps its own name.
    pub fn identity<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pairs: fields
                .into_iter()
                .map(|f| {
                    let f = f.into();
                    (f.clone(), f)
                })
                .collect(),
        }
    }

    pub fn map(mut self, output: impl Into<String>, source: impl Into<String>) -> Self {
        self.pairs.insert(output.into(), source.into());
        self
    }

    /// Distinct source fields, in first-use order; this is what gets requested remotely.
    pub fn source_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.pairs.len());
        for src in self.pairs.values() {
            if !out.iter().any(|f| f.eq_ignore_ascii_case(src)) {
                out.push(src.clone());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(o, s)| (o.as_str(), s.as_str()))
    }
}

/// One row handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedRow {
    pub entity: String,
    pub fields: IndexMap<String, FieldValue>,
}

impl EmittedRow {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct RowEmitter {
    entity: String,
    mapping: FieldMapping,
}

impl RowEmitter {
    pub fn new(entity: impl Into<String>, mapping: FieldMapping) -> Self {
        Self { entity: entity.into(), mapping }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn emit(&self, record: &Record) -> Result<EmittedRow> {
        let mut fields = IndexMap::with_capacity(self.mapping.pairs.len());
        for (output, source) in self.mapping.iter() {
            let value = record.get(source).ok_or_else(|| {
                SamplerError::extraction(
                    self.entity.clone(),
                    anyhow!("extracted record has no field '{source}' (mapped to '{output}')"),
                )
            })?;
            fields.insert(output.to_string(), value.clone());
        }
        Ok(EmittedRow { entity: self.entity.clone(), fields })
    }

    /// Lazily map a record sequence; upstream errors pass through untouched.
    pub fn emit_stream(self, records: RecordStream) -> RowStream {
        Box::pin(records.map(move |item| item.and_then(|rec| self.emit(&rec))))
    }
}
