// src/config.rs
//
// Run-level configuration for the sampling engine.
//
// Builder helpers allow a fluent style:
//
// let cfg = SamplerConfig::default()
//     .with_target_context("qa-org")
//     .bulk_threshold(10_000)
//     .seed(42);

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Result, SamplerError};

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Default Target Context, used when a step does not name one.
    pub target_context: Option<String>,
    /// Counts at or above this switch extraction to the bulk-export path.
    pub bulk_threshold: u64,
    /// Seed for the run's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Optional cap on the random offset window.
    pub max_offset: Option<u64>,
    /// Spool bulk payloads into a temp file under this directory before parsing.
    pub spool_dir: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target_context: None,
            bulk_threshold: DEFAULT_BULK_THRESHOLD,
            seed: None,
            max_offset: None,
            spool_dir: None,
        }
    }
}

impl SamplerConfig {
    /// Build a config from the process environment (and `.env`, if present).
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut cfg = Self::default();
        if let Some(ctx) = env_string(ENV_TARGET_CONTEXT) {
            cfg.target_context = Some(ctx);
        }
        if let Some(n) = env_parse::<u64>(ENV_BULK_THRESHOLD)? {
            cfg = cfg.bulk_threshold(n);
        }
        cfg.seed = env_parse::<u64>(ENV_SEED)?;
        cfg = cfg.max_offset(env_parse::<u64>(ENV_MAX_OFFSET)?);
        cfg.spool_dir = env_string(ENV_SPOOL_DIR).map(PathBuf::from);
        Ok(cfg)
    }

    pub fn with_target_context(mut self, context: impl Into<String>) -> Self {
        self.target_context = Some(context.into());
        self
    }

    /// A threshold of 0 sends every extraction down the bulk-export path.
    pub fn bulk_threshold(mut self, threshold: u64) -> Self {
        self.bulk_threshold = threshold;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_offset(mut self, max: Option<u64>) -> Self {
        self.max_offset = max.map(|m| m.max(1));
        self
    }

    pub fn spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SamplerError::InvalidRequest(format!("{key}={raw} is not a valid number"))),
    }
}
