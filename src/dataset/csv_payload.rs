// src/dataset/csv_payload.rs
//
// Incremental reader for the CSV payloads produced by bulk exports.
//
// Header-driven: the first record names the columns, matched to requested
// fields case-insensitively. Quoted fields may contain commas, doubled
// quotes and newlines, so one record can span several physical lines.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::record::{FieldValue, Record};

pub struct CsvRecordReader<R> {
    reader: R,
    columns: Vec<String>,
    lookup: HashMap<String, usize>,
    line_no: usize,
    rows: usize,
}

impl<R: AsyncBufRead + Unpin> CsvRecordReader<R> {
    /// Read the header record. An empty payload is an error: even an empty
    /// export carries its header.
    pub async fn open(reader: R) -> Result<Self> {
        let mut this = Self {
            reader,
            columns: Vec::new(),
            lookup: HashMap::new(),
            line_no: 0,
            rows: 0,
        };
        let header = this
            .next_fields()
            .await?
            .ok_or_else(|| anyhow!("bulk export payload is empty (no header row)"))?;

        for (idx, name) in header.into_iter().enumerate() {
            let name = name.unwrap_or_default().trim().to_string();
            if name.is_empty() {
                bail!("bulk export header has an empty column name at position {}", idx + 1);
            }
            this.lookup.insert(name.to_lowercase(), idx);
            this.columns.push(name);
        }
        debug!("CSV column mapping: {:?}", this.columns);
        Ok(this)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fail early when a requested field is not among the exported columns.
    pub fn require_columns(&self, fields: &[String]) -> Result<()> {
        for f in fields {
            if !self.lookup.contains_key(&f.to_lowercase()) {
                bail!(
                    "bulk export has no column '{}' (columns: {})",
                    f,
                    self.columns.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Next data row as a record keyed by header names.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(fields) = self.next_fields().await? else {
            debug!("CSV payload exhausted after {} rows", self.rows);
            return Ok(None);
        };
        if fields.len() != self.columns.len() {
            bail!(
                "row ending on line {} has {} fields, header has {}",
                self.line_no,
                fields.len(),
                self.columns.len()
            );
        }
        self.rows += 1;
        Ok(Some(
            self.columns
                .iter()
                .zip(fields)
                .map(|(name, value)| {
                    let value = value.map(FieldValue::Text).unwrap_or(FieldValue::Null);
                    (name.clone(), value)
                })
                .collect(),
        ))
    }

    /// One logical record; physical lines are joined while a quote is open.
    async fn next_fields(&mut self) -> Result<Option<Vec<Option<String>>>> {
        let mut buf = String::new();
        loop {
            let start = buf.len();
            let n = self
                .reader
                .read_line(&mut buf)
                .await
                .with_context(|| format!("failed to read line {}", self.line_no + 1))?;
            if n == 0 {
                if buf.trim().is_empty() {
                    return Ok(None);
                }
                bail!("unterminated quoted field at end of payload (line {})", self.line_no);
            }
            if self.line_no == 0 && buf.starts_with('\u{feff}') {
                buf.drain(..'\u{feff}'.len_utf8());
            }
            self.line_no += 1;

            if start == 0 && buf.trim().is_empty() {
                buf.clear();
                continue;
            }
            if buf.matches('"').count() % 2 == 0 {
                break;
            }
        }
        let record = buf.strip_suffix('\n').unwrap_or(&buf);
        let record = record.strip_suffix('\r').unwrap_or(record);
        split_record(record)
            .with_context(|| format!("malformed CSV record ending on line {}", self.line_no))
            .map(Some)
    }
}

/// Split one logical CSV record. Empty unquoted fields come back as `None`,
/// quoted ones (even `""`) as `Some`.
pub fn split_record(record: &str) -> Result<Vec<Option<String>>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            ',' => {
                fields.push(finish_field(std::mem::take(&mut field), quoted));
                quoted = false;
            }
            '"' if !quoted && field.trim().is_empty() => {
                field.clear();
                quoted = true;
                in_quotes = true;
            }
            '"' => bail!("stray quote in field {}", fields.len() + 1),
            c if quoted => {
                if !c.is_whitespace() {
                    bail!("unexpected '{}' after closing quote in field {}", c, fields.len() + 1);
                }
            }
            c => field.push(c),
        }
    }
    if in_quotes {
        bail!("unterminated quoted field {}", fields.len() + 1);
    }
    fields.push(finish_field(field, quoted));
    Ok(fields)
}

fn finish_field(field: String, quoted: bool) -> Option<String> {
    if !quoted && field.is_empty() { None } else { Some(field) }
}
