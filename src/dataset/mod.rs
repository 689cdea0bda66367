// src/dataset/mod.rs

//! Dataset extraction: planning, the two extraction paths, and row emission.

pub mod csv_payload;
pub mod emitter;
pub mod extractor;
pub mod plan;

use futures_core::stream::Stream;
use std::pin::Pin;

use crate::error::SamplerError;
use crate::record::Record;

/// A boxed, pinned, sendable stream of fallible items.
pub type DynStream<T> = Pin<Box<dyn Stream<Item = Result<T, SamplerError>> + Send + 'static>>;

/// Lazily produced records of one extraction. Finite; not restartable.
pub type RecordStream = DynStream<Record>;

/// Lazily produced pipeline rows.
pub type RowStream = DynStream<emitter::EmittedRow>;

pub use emitter::{EmittedRow, FieldMapping, RowEmitter};
pub use extractor::Extractor;
pub use plan::{ExtractRequest, ExtractionPlan, OrderMode, Strategy};
