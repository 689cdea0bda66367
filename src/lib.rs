// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: public re-exports.
//
// Remote-dataset sampling engine: supplies records from a large remote
// record store to a local data-generation pipeline, either one at a time
// through point queries or in bulk through an export that is iterated locally.

pub mod config;
pub mod connection;
pub mod constants;
pub mod count_cache;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod logging;
pub mod point_sampler;
pub mod query;
pub mod random;
pub mod record;
pub mod remote;

pub use config::SamplerConfig;
pub use connection::{ClientFactory, ClientHandle, ConnectError, ConnectionProvider};
pub use count_cache::{CacheStats, CountCache};
pub use dataset::{
    DynStream, EmittedRow, ExtractRequest, ExtractionPlan, Extractor, FieldMapping, OrderMode,
    RecordStream, RowEmitter, RowStream, Strategy,
};
pub use engine::{Engine, FieldsSpec, Operation, StepDescriptor, StepOutput};
pub use error::{ErrorKind, Result, SamplerError};
pub use logging::init_logging;
pub use point_sampler::{PointSampler, SharedRandom, shared_random};
pub use query::{CountKey, QuerySpec};
pub use random::{RandomSource, SeededRandom};
pub use record::{FieldValue, Record, RecordId};
pub use remote::{BulkTransport, ExportPayload, QueryResult, RemoteClient};
