//! Telemetry - Non-Blocking Structured Log Shipping
//!
//! A log pipeline for shipping structured records to an OTLP/HTTP collector:
//! - A `tracing` layer that enqueues records without ever blocking the caller
//! - A bounded producer queue (drop-on-full with a stderr diagnostic)
//! - A single background worker batching by count or age
//! - OTLP/HTTP JSON export with per-attempt timeout, no batch retry
//! - Ordered shutdown: records produced before `close()` returns are shipped
//! - Request-scoped ambient context attached to every record
//!
//! # Architecture
//!
//! ```text
//! tracing events (any thread/task)
//!   ↓ (OtlpLogLayer, try_send, drop on full)
//! bounded queue (capacity 1000)
//!   ↓ (single BatchWorker task)
//! batch (≥100 records or ≥5s old → flush)
//!   ↓ (LogExporter)
//! OTLP collector (HTTP 200/202 = success)
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use telemetry::{spawn_pipeline, RequestContext, TelemetryConfig};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let (layer, handle) = spawn_pipeline(
//!     TelemetryConfig::new("http://collector:4318/v1/logs")
//!         .with_service_name("answering-service"),
//! )?;
//! let subscriber = tracing_subscriber::registry().with(layer);
//! tracing::subscriber::set_global_default(subscriber)?;
//!
//! telemetry::context::scope(
//!     RequestContext::new().with_user_id("u-1"),
//!     handle_request(),
//! ).await;
//!
//! handle.close().await; // drains everything still queued
//! ```

mod config;
pub mod context;
mod error;
mod export;
mod layer;
mod record;
mod worker;

pub use config::TelemetryConfig;
pub use context::{ContextGuard, RequestContext};
pub use error::TelemetryError;
pub use export::{HttpLogExporter, LogExporter};
pub use layer::OtlpLogLayer;
pub use record::{
    build_export_request, AnyValue, AttributeValue, ExportLogsRequest, KeyValue, OtlpLogRecord,
    ProducerRecord, Resource, ResourceLogs, Scope, ScopeLogs, Severity,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use worker::{BatchWorker, WorkerCommand};

/// Start the pipeline against an HTTP collector.
///
/// Spawns the batch worker on the current tokio runtime and returns the
/// layer (to install in a subscriber) plus the handle that owns flushing
/// and shutdown.
pub fn spawn_pipeline(
    config: TelemetryConfig,
) -> Result<(OtlpLogLayer, TelemetryHandle), TelemetryError> {
    let exporter = Arc::new(HttpLogExporter::new(&config)?);
    spawn_pipeline_with_exporter(config, exporter)
}

/// Start the pipeline with a custom exporter behind the seam.
pub fn spawn_pipeline_with_exporter(
    config: TelemetryConfig,
    exporter: Arc<dyn LogExporter>,
) -> Result<(OtlpLogLayer, TelemetryHandle), TelemetryError> {
    config.validate()?;

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let shutdown = Arc::new(AtomicBool::new(false));

    let worker = BatchWorker::new(rx, exporter, &config);
    let join = tokio::spawn(worker.run());

    let layer = OtlpLogLayer::new(tx.clone(), shutdown.clone());
    let handle = TelemetryHandle {
        tx,
        shutdown,
        worker: Mutex::new(Some(join)),
    };
    Ok((layer, handle))
}

/// Owns the pipeline lifecycle: flush on demand, ordered shutdown.
///
/// The host creates one handle per process and calls [`close`] at shutdown.
///
/// [`close`]: TelemetryHandle::close
pub struct TelemetryHandle {
    tx: mpsc::Sender<WorkerCommand>,
    shutdown: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryHandle {
    /// Drain everything queued so far and wait for the export attempt.
    ///
    /// Records enqueued before this call are converted, batched, and handed
    /// to the exporter before it returns. No-op after `close`.
    pub async fn flush(&self) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WorkerCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Stop the pipeline: drain the queue, flush the batch, stop the worker.
    ///
    /// Enqueues after this point are no-ops. Idempotent.
    pub async fn close(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.tx.send(WorkerCommand::Shutdown).await;

        let join = self.worker.lock().unwrap().take();
        if let Some(join) = join {
            let _ = join.await;
        }
    }
}

impl Drop for TelemetryHandle {
    fn drop(&mut self) {
        // Best-effort drain when the host forgot to close; the worker sees
        // either the Shutdown command or the closed channel and flushes.
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            let _ = self.tx.try_send(WorkerCommand::Shutdown);
        }
    }
}
