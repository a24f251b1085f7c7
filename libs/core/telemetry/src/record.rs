//! Log record models and the OTLP/HTTP JSON wire format.
//!
//! Producers capture a lightweight [`ProducerRecord`]; the batch worker
//! converts it to the wire [`OtlpLogRecord`] and wraps batches in the export
//! envelope (one resource block, one scope block, a record list).
//!
//! References:
//! - OTLP specification: <https://opentelemetry.io/docs/specs/otlp/>
//! - Log data model: <https://opentelemetry.io/docs/specs/otel/logs/data-model/>

use serde::Serialize;
use tracing::Level;

/// OTLP severity: number and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Unspecified,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn number(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl From<&Level> for Severity {
    fn from(level: &Level) -> Self {
        if *level == Level::TRACE {
            Self::Trace
        } else if *level == Level::DEBUG {
            Self::Debug
        } else if *level == Level::INFO {
            Self::Info
        } else if *level == Level::WARN {
            Self::Warn
        } else if *level == Level::ERROR {
            Self::Error
        } else {
            Self::Unspecified
        }
    }
}

/// A typed attribute value captured on the producer side.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

/// The record captured at the call site, before wire conversion.
///
/// Kept deliberately small: the producer path must never block, so all
/// formatting beyond field capture is deferred to the worker.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub severity: Severity,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_nanos: u128,
    /// The formatted event message.
    pub message: String,
    /// Logger name (the event target).
    pub logger: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
    /// Event fields plus request-context fields, captured at enqueue time.
    pub attributes: Vec<(String, AttributeValue)>,
}

/// OTLP JSON `AnyValue`. 64-bit integers are encoded as strings per the
/// OTLP/JSON mapping.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum AnyValue {
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "intValue")]
    Int(String),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "boolValue")]
    Bool(bool),
}

impl From<AttributeValue> for AnyValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Str(s) => Self::String(s),
            AttributeValue::Int(i) => Self::Int(i.to_string()),
            AttributeValue::Double(d) => Self::Double(d),
            AttributeValue::Bool(b) => Self::Bool(b),
        }
    }
}

/// An OTLP key/value attribute.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnyValue::String(value.into()),
        }
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: AnyValue::Int(value.to_string()),
        }
    }
}

/// One log record on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OtlpLogRecord {
    pub time_unix_nano: String,
    pub severity_number: u8,
    pub severity_text: &'static str,
    pub body: AnyValue,
    pub attributes: Vec<KeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

impl From<ProducerRecord> for OtlpLogRecord {
    fn from(record: ProducerRecord) -> Self {
        let mut attributes = vec![KeyValue::string("logger.name", record.logger)];
        if let Some(file) = record.file {
            attributes.push(KeyValue::string("source.file", file));
        }
        if let Some(line) = record.line {
            attributes.push(KeyValue::int("source.line", line as i64));
        }
        if let Some(function) = record.function {
            attributes.push(KeyValue::string("source.function", function));
        }

        // Trace context travels in dedicated fields when the caller attached
        // it; everything else becomes an attribute.
        let mut trace_id = None;
        let mut span_id = None;
        for (key, value) in record.attributes {
            match value {
                AttributeValue::Str(id) if key == "trace_id" => trace_id = Some(id),
                AttributeValue::Str(id) if key == "span_id" => span_id = Some(id),
                value => attributes.push(KeyValue {
                    key,
                    value: value.into(),
                }),
            }
        }

        Self {
            time_unix_nano: record.timestamp_nanos.to_string(),
            severity_number: record.severity.number(),
            severity_text: record.severity.text(),
            body: AnyValue::String(record.message),
            attributes,
            trace_id,
            span_id,
        }
    }
}

/// The `resource` block: service identity.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

/// The `scope` block.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Scope {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLogs {
    pub scope: Scope,
    pub log_records: Vec<OtlpLogRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLogs {
    pub resource: Resource,
    pub scope_logs: Vec<ScopeLogs>,
}

/// The export envelope: one resource block, one scope block, the records.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportLogsRequest {
    pub resource_logs: Vec<ResourceLogs>,
}

/// Wrap a batch in the export envelope.
pub fn build_export_request(
    service_name: &str,
    service_version: Option<&str>,
    scope_name: &str,
    records: Vec<OtlpLogRecord>,
) -> ExportLogsRequest {
    let mut resource_attrs = vec![KeyValue::string("service.name", service_name)];
    if let Some(version) = service_version {
        resource_attrs.push(KeyValue::string("service.version", version));
    }

    ExportLogsRequest {
        resource_logs: vec![ResourceLogs {
            resource: Resource {
                attributes: resource_attrs,
            },
            scope_logs: vec![ScopeLogs {
                scope: Scope {
                    name: scope_name.to_string(),
                },
                log_records: records,
            }],
        }],
    }
}
