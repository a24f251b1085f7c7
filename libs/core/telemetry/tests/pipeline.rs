//! End-to-end pipeline tests with a recording exporter behind the seam.
//!
//! These run on a current-thread runtime so the worker task only makes
//! progress at await points, which makes queue-full behavior deterministic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry::{
    context, spawn_pipeline_with_exporter, AnyValue, LogExporter, OtlpLogRecord, RequestContext,
    TelemetryConfig, TelemetryError,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;

/// Captures every exported batch.
#[derive(Default)]
struct RecordingExporter {
    batches: Mutex<Vec<Vec<OtlpLogRecord>>>,
}

impl RecordingExporter {
    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    fn all_records(&self) -> Vec<OtlpLogRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait::async_trait]
impl LogExporter for RecordingExporter {
    async fn export(&self, records: Vec<OtlpLogRecord>) -> Result<(), TelemetryError> {
        self.batches.lock().unwrap().push(records);
        Ok(())
    }
}

/// Always refuses the batch, like a collector returning 500.
#[derive(Default)]
struct FailingExporter {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl LogExporter for FailingExporter {
    async fn export(&self, _records: Vec<OtlpLogRecord>) -> Result<(), TelemetryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::Collector { status: 500 })
    }
}

fn seq_of(record: &OtlpLogRecord) -> i64 {
    record
        .attributes
        .iter()
        .find(|kv| kv.key == "seq")
        .and_then(|kv| match &kv.value {
            AnyValue::Int(value) => value.parse().ok(),
            _ => None,
        })
        .expect("record carries a seq attribute")
}

#[tokio::test]
async fn test_batches_by_count_and_preserves_order() {
    let exporter = Arc::new(RecordingExporter::default());
    let (layer, handle) = spawn_pipeline_with_exporter(
        TelemetryConfig::default().with_max_batch_size(100),
        exporter.clone(),
    )
    .unwrap();

    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        for seq in 0..250i64 {
            info!(seq, "pipeline record");
        }
    });

    handle.flush().await;

    // 250 records at batch size 100: two full batches plus the remainder.
    assert_eq!(exporter.batch_sizes(), vec![100, 100, 50]);

    let sequences: Vec<i64> = exporter.all_records().iter().map(seq_of).collect();
    let expected: Vec<i64> = (0..250).collect();
    assert_eq!(sequences, expected);

    handle.close().await;
}

#[tokio::test]
async fn test_age_flush_without_explicit_flush() {
    let exporter = Arc::new(RecordingExporter::default());
    let (layer, handle) = spawn_pipeline_with_exporter(
        TelemetryConfig::default()
            .with_max_batch_size(100)
            .with_max_batch_age(Duration::from_millis(50)),
        exporter.clone(),
    )
    .unwrap();

    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        for seq in 0..3i64 {
            info!(seq, "aged record");
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(exporter.batch_sizes(), vec![3]);
    handle.close().await;
}

#[tokio::test]
async fn test_queue_full_drops_and_counts() {
    let exporter = Arc::new(RecordingExporter::default());
    let (layer, handle) = spawn_pipeline_with_exporter(
        TelemetryConfig::default().with_queue_capacity(5),
        exporter.clone(),
    )
    .unwrap();

    let probe = layer.clone();
    let subscriber = tracing_subscriber::registry().with(layer);
    // No await between emits: the worker cannot drain, so the queue fills.
    tracing::subscriber::with_default(subscriber, || {
        for seq in 0..9i64 {
            info!(seq, "burst record");
        }
    });

    assert_eq!(probe.dropped_count(), 4);

    handle.flush().await;
    assert_eq!(exporter.batch_sizes(), vec![5]);

    // The survivors are the earliest records, in order.
    let sequences: Vec<i64> = exporter.all_records().iter().map(seq_of).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

    handle.close().await;
}

#[tokio::test]
async fn test_close_drains_and_silences_later_events() {
    let exporter = Arc::new(RecordingExporter::default());
    let (layer, handle) =
        spawn_pipeline_with_exporter(TelemetryConfig::default(), exporter.clone()).unwrap();

    let subscriber = tracing_subscriber::registry().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);

    info!(seq = 0i64, "before close");
    info!(seq = 1i64, "before close");

    handle.close().await;
    assert_eq!(exporter.all_records().len(), 2);

    // After close, enqueues are no-ops.
    info!(seq = 2i64, "after close");
    handle.close().await; // idempotent
    assert_eq!(exporter.all_records().len(), 2);

    drop(guard);
}

#[tokio::test]
async fn test_flush_on_empty_batch_is_noop() {
    let exporter = Arc::new(RecordingExporter::default());
    let (_layer, handle) =
        spawn_pipeline_with_exporter(TelemetryConfig::default(), exporter.clone()).unwrap();

    handle.flush().await;
    assert!(exporter.batch_sizes().is_empty());

    handle.close().await;
}

#[tokio::test]
async fn test_collector_failure_drops_batch_and_continues() {
    let exporter = Arc::new(FailingExporter::default());
    let (layer, handle) =
        spawn_pipeline_with_exporter(TelemetryConfig::default(), exporter.clone()).unwrap();

    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        info!("doomed record");
    });

    // The failed batch is dropped, never re-enqueued.
    handle.flush().await;
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);

    handle.flush().await;
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);

    handle.close().await;
}

#[tokio::test]
async fn test_request_context_attached_to_records() {
    let exporter = Arc::new(RecordingExporter::default());
    let (layer, handle) =
        spawn_pipeline_with_exporter(TelemetryConfig::default(), exporter.clone()).unwrap();

    let subscriber = tracing_subscriber::registry().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);

    context::scope(
        RequestContext::new()
            .with_user_id("u-1")
            .with_organization_id("org-7")
            .with_intelligence_level("standard"),
        async {
            info!("inside request");
        },
    )
    .await;

    info!("outside request");

    handle.flush().await;
    let records = exporter.all_records();
    assert_eq!(records.len(), 2);

    let inside = &records[0];
    let user = inside.attributes.iter().find(|kv| kv.key == "user.id");
    assert_eq!(
        user.map(|kv| &kv.value),
        Some(&AnyValue::String("u-1".to_string()))
    );
    assert!(inside.attributes.iter().any(|kv| kv.key == "organization.id"));
    assert!(inside
        .attributes
        .iter()
        .any(|kv| kv.key == "intelligence.level"));

    let outside = &records[1];
    assert!(!outside.attributes.iter().any(|kv| kv.key == "user.id"));

    drop(guard);
    handle.close().await;
}
