// src/dataset/plan.rs
//
// Extraction requests and the per-invocation plan derived from them.

use std::fmt;

use serde::Deserialize;

use crate::query::QuerySpec;

/// Order in which extracted rows are handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    /// As received from the service or export.
    #[default]
    #[serde(alias = "linear")]
    InOrder,
    /// Fully materialized, then uniformly permuted.
    #[serde(alias = "shuffle")]
    Shuffled,
}

/// How rows are pulled from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Paged queries, buffered locally.
    Direct,
    /// Streamed tabular export.
    BulkExport,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::BulkExport => f.write_str("bulk-export"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub query: QuerySpec,
    pub order: OrderMode,
    /// Yield an empty sequence instead of failing with `EmptyDataset`.
    pub allow_empty: bool,
}

impl ExtractRequest {
    pub fn new(query: QuerySpec) -> Self {
        Self { query, order: OrderMode::InOrder, allow_empty: false }
    }

    pub fn order(mut self, order: OrderMode) -> Self {
        self.order = order;
        self
    }

    pub fn shuffled(self) -> Self {
        self.order(OrderMode::Shuffled)
    }

    pub fn allow_empty(mut self, yes: bool) -> Self {
        self.allow_empty = yes;
        self
    }
}

/// Resolved {type, filter, ordering, strategy} for one extraction.
/// Built fresh per request and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub query: QuerySpec,
    pub order: OrderMode,
    pub strategy: Strategy,
    /// Remote count the strategy was chosen from.
    pub count: u64,
}

impl ExtractionPlan {
    /// Counts strictly below `threshold` go direct; anything else is exported.
    pub fn decide(request: &ExtractRequest, count: u64, threshold: u64) -> Self {
        let strategy = if count < threshold { Strategy::Direct } else { Strategy::BulkExport };
        Self {
            query: request.query.clone(),
            order: request.order,
            strategy,
            count,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.query.record_type
    }

    pub fn filter(&self) -> Option<&str> {
        self.query.filter.as_deref()
    }
}
