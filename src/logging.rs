// src/logging.rs
//
// Logging setup. Library code emits `tracing` events; with tracing's `log`
// feature they reach whatever `log` backend is installed, env_logger here.

use log::LevelFilter;

/// Install an env_logger backend at `level` (`trace|debug|info|warn|error`,
/// anything else means info). Safe to call more than once.
pub fn init_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn"  => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _       => LevelFilter::Info,
    };
    let _ = env_logger::builder().filter_level(filter).is_test(false).try_init();
}
