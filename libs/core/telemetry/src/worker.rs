//! The batch worker: drains the producer queue, batches, exports.
//!
//! A single task owns the batch. Records accumulate until the batch reaches
//! `max_batch_size` or its oldest record reaches `max_batch_age`, whichever
//! comes first; either way the batch is swapped out and handed to the
//! exporter. Export failures go to stderr and the batch is dropped; the
//! telemetry path must never amplify a collector outage.

use crate::config::TelemetryConfig;
use crate::export::LogExporter;
use crate::record::{OtlpLogRecord, ProducerRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Messages from producers and the handle to the worker.
pub(crate) enum WorkerCommand {
    Record(ProducerRecord),
    /// Flush whatever is batched; ack when the export attempt finished.
    Flush(oneshot::Sender<()>),
    /// Drain and stop.
    Shutdown,
}

enum Wake {
    Command(Option<WorkerCommand>),
    BatchAged,
}

pub(crate) struct BatchWorker {
    rx: mpsc::Receiver<WorkerCommand>,
    exporter: Arc<dyn LogExporter>,
    max_batch_size: usize,
    max_batch_age: Duration,
    batch: Vec<OtlpLogRecord>,
    /// When the current batch must flush; None while the batch is empty.
    batch_deadline: Option<Instant>,
}

impl BatchWorker {
    pub(crate) fn new(
        rx: mpsc::Receiver<WorkerCommand>,
        exporter: Arc<dyn LogExporter>,
        config: &TelemetryConfig,
    ) -> Self {
        Self {
            rx,
            exporter,
            max_batch_size: config.max_batch_size,
            max_batch_age: config.max_batch_age,
            batch: Vec::new(),
            batch_deadline: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let deadline = self.batch_deadline;
            let wake = tokio::select! {
                command = self.rx.recv() => Wake::Command(command),
                _ = sleep_until_deadline(deadline) => Wake::BatchAged,
            };

            match wake {
                Wake::Command(Some(WorkerCommand::Record(record))) => {
                    if self.batch.is_empty() {
                        self.batch_deadline = Some(Instant::now() + self.max_batch_age);
                    }
                    self.batch.push(record.into());
                    if self.batch.len() >= self.max_batch_size {
                        self.flush().await;
                    }
                }
                Wake::Command(Some(WorkerCommand::Flush(ack))) => {
                    self.flush().await;
                    let _ = ack.send(());
                }
                Wake::Command(Some(WorkerCommand::Shutdown)) | Wake::Command(None) => {
                    self.flush().await;
                    break;
                }
                Wake::BatchAged => {
                    self.flush().await;
                }
            }
        }
    }

    /// Swap the batch out and export it. Empty batches are a no-op; the
    /// pending deadline is cancelled either way.
    async fn flush(&mut self) {
        self.batch_deadline = None;
        if self.batch.is_empty() {
            return;
        }

        let records = std::mem::take(&mut self.batch);
        let count = records.len();
        if let Err(e) = self.exporter.export(records).await {
            // stderr, not the logging system: recursion hazard.
            eprintln!("telemetry: failed to export batch of {count} records: {e}");
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
