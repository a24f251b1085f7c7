//! Error types for the telemetry pipeline.

use thiserror::Error;

/// Errors that can occur while exporting log batches.
///
/// These never propagate into the logging path: the worker prints them to
/// stderr and drops the batch. They surface only through the exporter seam.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Transport-level failure talking to the collector.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("collector rejected batch with status {status}")]
    Collector { status: u16 },

    /// Configuration error (programmer error, fail fast).
    #[error("configuration error: {0}")]
    Config(String),
}
