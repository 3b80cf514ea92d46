pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod explain;
pub mod ingest;
pub mod loader;
pub mod migrations;
pub mod pipeline;
pub mod report;
pub mod runs;
pub mod types;

pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for the seshat crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("seshat=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
