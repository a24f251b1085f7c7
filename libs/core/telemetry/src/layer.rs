//! The producer side: a `tracing` layer that never blocks the caller.
//!
//! `on_event` captures the event into a [`ProducerRecord`] and enqueues it
//! with `try_send`. When the queue is full the record is dropped and a
//! diagnostic goes to stderr, never back through the logging system, which
//! would recurse.

use crate::context;
use crate::record::{AttributeValue, ProducerRecord, Severity};
use crate::worker::WorkerCommand;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Non-blocking log capture layer.
///
/// Clone-cheap; all clones feed the same pipeline.
#[derive(Clone)]
pub struct OtlpLogLayer {
    tx: mpsc::Sender<WorkerCommand>,
    shutdown: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl OtlpLogLayer {
    pub(crate) fn new(tx: mpsc::Sender<WorkerCommand>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            shutdown,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of records dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for OtlpLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let record = capture(event);
        match self.tx.try_send(WorkerCommand::Record(record)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                eprintln!("telemetry: log queue full, dropping record (total dropped: {dropped})");
            }
            // The worker is gone; nothing useful left to do.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Build a producer record from an event and the ambient request context.
fn capture(event: &Event<'_>) -> ProducerRecord {
    let metadata = event.metadata();

    let mut visitor = EventVisitor::default();
    event.record(&mut visitor);

    let mut attributes = visitor.attributes;
    if let Some(context) = context::current() {
        attributes.extend(context.attributes());
    }

    let timestamp_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    ProducerRecord {
        severity: Severity::from(metadata.level()),
        timestamp_nanos,
        message: visitor.message.unwrap_or_default(),
        logger: metadata.target().to_string(),
        file: metadata.file().map(str::to_string),
        line: metadata.line(),
        function: metadata.module_path().map(str::to_string),
        attributes,
    }
}

/// Collects the event message and typed field values.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    attributes: Vec<(String, AttributeValue)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.attributes
                .push((field.name().to_string(), AttributeValue::Str(value.to_string())));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attributes
            .push((field.name().to_string(), AttributeValue::Int(value)));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = match i64::try_from(value) {
            Ok(value) => AttributeValue::Int(value),
            Err(_) => AttributeValue::Str(value.to_string()),
        };
        self.attributes.push((field.name().to_string(), value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attributes
            .push((field.name().to_string(), AttributeValue::Double(value)));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attributes
            .push((field.name().to_string(), AttributeValue::Bool(value)));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.attributes.push((
                field.name().to_string(),
                AttributeValue::Str(format!("{value:?}")),
            ));
        }
    }
}
