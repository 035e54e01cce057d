//! Utility functions shared by the binaries.
//!

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

/// Counter group used when reporting to Hadoop streaming.
pub const COUNTER_GROUP: &str = "logflow";

/// Install the global tracing subscriber.
///
/// Logs go to stderr; stdout carries records. The filter comes from
/// `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Format counters as Hadoop streaming reporter lines.
///
/// The task tracker picks up `reporter:counter:<group>,<counter>,<amount>`
/// lines from a task's stderr.
pub fn counter_lines(counters: &[(&str, u64)]) -> Vec<String> {
    counters
        .iter()
        .map(|(name, amount)| format!("reporter:counter:{COUNTER_GROUP},{name},{amount}"))
        .collect()
}

/// Write counters to stderr in Hadoop streaming's reporter format.
pub fn report_counters(counters: &[(&str, u64)]) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    for line in counter_lines(counters) {
        writeln!(stderr, "{line}")?;
    }
    Ok(())
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
