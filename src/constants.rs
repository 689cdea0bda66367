// src/constants.rs
//
// Centralized constants so defaults are not scattered through the codebase

/// Record counts at or above this use the bulk-export path (5000 rows)
pub const DEFAULT_BULK_THRESHOLD: u64 = 5000;

/// Field selected when the caller does not name any
pub const DEFAULT_ID_FIELD: &str = "Id";

/// Read buffer for streamed bulk-export payloads (64 KB)
pub const DEFAULT_EXPORT_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Environment variables read by `SamplerConfig::from_env`
// ============================================================================

pub const ENV_TARGET_CONTEXT: &str = "SAMPLER_TARGET_CONTEXT";
pub const ENV_BULK_THRESHOLD: &str = "SAMPLER_BULK_THRESHOLD";
pub const ENV_SEED: &str = "SAMPLER_SEED";
pub const ENV_MAX_OFFSET: &str = "SAMPLER_MAX_OFFSET";
pub const ENV_SPOOL_DIR: &str = "SAMPLER_SPOOL_DIR";
