// src/error.rs
//
// Uniform error type surfaced to the generation pipeline.

use anyhow::Error as AnyError;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = SamplerError> = std::result::Result<T, E>;

/// Every failure the engine can report.
///
/// Nothing is retried internally and nothing is downgraded to an empty or
/// placeholder value; callers always see one of these.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// Required configuration (usually the Target Context) is absent or blank.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// The optional client library or one of its capabilities cannot be loaded.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The client library loaded but the session for `context` could not be established.
    #[error("could not connect to target context '{context}': {source}")]
    ConnectionFailed {
        context: String,
        #[source]
        source: AnyError,
    },

    /// Zero rows matched where at least one was required.
    #[error("no {record_type} records returned by query `{query}`")]
    EmptyDataset { record_type: String, query: String },

    /// Bulk export transport or payload parsing failed.
    #[error("extraction of {record_type} failed: {source}")]
    ExtractionFailed {
        record_type: String,
        #[source]
        source: AnyError,
    },

    /// The remote service rejected a query.
    #[error("remote query `{query}` failed: {source}")]
    RemoteQueryError {
        query: String,
        #[source]
        source: AnyError,
    },

    /// The request was malformed before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Field-less discriminant of [`SamplerError`], handy for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingConfiguration,
    DependencyUnavailable,
    ConnectionFailed,
    EmptyDataset,
    ExtractionFailed,
    RemoteQueryError,
    InvalidRequest,
}

impl SamplerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SamplerError::MissingConfiguration(_) => ErrorKind::MissingConfiguration,
            SamplerError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            SamplerError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            SamplerError::EmptyDataset { .. } => ErrorKind::EmptyDataset,
            SamplerError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            SamplerError::RemoteQueryError { .. } => ErrorKind::RemoteQueryError,
            SamplerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    pub(crate) fn remote(query: impl Into<String>, source: AnyError) -> Self {
        SamplerError::RemoteQueryError { query: query.into(), source }
    }

    pub(crate) fn extraction(record_type: impl Into<String>, source: AnyError) -> Self {
        SamplerError::ExtractionFailed { record_type: record_type.into(), source }
    }

    pub(crate) fn empty(record_type: impl Into<String>, query: impl Into<String>) -> Self {
        SamplerError::EmptyDataset { record_type: record_type.into(), query: query.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_the_cause() {
        let err = SamplerError::extraction("User", anyhow::anyhow!("connection reset"));
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
        assert!(err.to_string().contains("connection reset"));

        let err = SamplerError::DependencyUnavailable(
            "remote client module cannot be loaded".to_string(),
        );
        assert!(err.to_string().contains("cannot be loaded"));
    }

    #[test]
    fn empty_dataset_names_the_query() {
        let err = SamplerError::empty("Account", "SELECT count() FROM Account");
        assert_eq!(err.kind(), ErrorKind::EmptyDataset);
        assert_eq!(
            err.to_string(),
            "no Account records returned by query `SELECT count() FROM Account`"
        );
    }
}
