// src/query.rs
//
// Composition of the query-language strings sent to the remote service.

use std::fmt;

use crate::constants::DEFAULT_ID_FIELD;
use crate::error::{Result, SamplerError};

/// What to select: record type, fields and an optional filter clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySpec {
    pub record_type: String,
    pub fields: Vec<String>,
    pub filter: Option<String>,
}

impl QuerySpec {
    /// Select only the identifier field of `record_type`.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            fields: vec![DEFAULT_ID_FIELD.to_string()],
            filter: None,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Blank clauses are treated as no filter at all.
    pub fn filter(mut self, clause: Option<impl Into<String>>) -> Self {
        self.filter = clause
            .map(Into::into)
            .map(|c: String| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    /// Parse a comma separated field list such as `"Id, FirstName"`.
    pub fn fields_from_list(self, list: &str) -> Self {
        self.fields(
            list.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_type.trim().is_empty() {
            return Err(SamplerError::InvalidRequest(
                "query needs a record type to select from".to_string(),
            ));
        }
        if self.fields.iter().all(|f| f.trim().is_empty()) {
            return Err(SamplerError::InvalidRequest(format!(
                "query on {} needs at least one field",
                self.record_type
            )));
        }
        Ok(())
    }

    /// `SELECT <fields> FROM <type>[ WHERE <filter>]`
    pub fn select(&self) -> String {
        let mut q = format!("SELECT {} FROM {}", self.fields.join(", "), self.record_type);
        self.push_where(&mut q);
        q
    }

    /// `SELECT count() FROM <type>[ WHERE <filter>]`
    pub fn count(&self) -> String {
        let mut q = format!("SELECT count() FROM {}", self.record_type);
        self.push_where(&mut q);
        q
    }

    pub fn select_first(&self) -> String {
        format!("{} LIMIT 1", self.select())
    }

    pub fn select_at_offset(&self, offset: u64) -> String {
        format!("{} LIMIT 1 OFFSET {}", self.select(), offset)
    }

    pub fn count_key(&self) -> CountKey {
        CountKey {
            record_type: self.record_type.clone(),
            filter: self.filter.clone(),
        }
    }

    fn push_where(&self, q: &mut String) {
        if let Some(filter) = &self.filter {
            q.push_str(" WHERE ");
            q.push_str(filter);
        }
    }
}

/// Key of one Count Entry: the record type plus its optional filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountKey {
    pub record_type: String,
    pub filter: Option<String>,
}

impl CountKey {
    pub fn new(record_type: impl Into<String>, filter: Option<&str>) -> Self {
        QuerySpec::new(record_type).filter(filter).count_key()
    }

    pub fn count_query(&self) -> String {
        QuerySpec::new(self.record_type.clone())
            .filter(self.filter.clone())
            .count()
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{} WHERE {}", self.record_type, filter),
            None => write!(f, "{}", self.record_type),
        }
    }
}
