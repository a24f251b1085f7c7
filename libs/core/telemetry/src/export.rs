//! The export seam and the HTTP collector exporter.

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::record::{build_export_request, OtlpLogRecord};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Ships converted batches somewhere.
///
/// The batch worker owns exactly one exporter; tests substitute a recording
/// implementation to observe batching behavior without a collector.
#[async_trait]
pub trait LogExporter: Send + Sync {
    /// Export one batch. A failed batch is dropped by the caller, never
    /// re-enqueued.
    async fn export(&self, records: Vec<OtlpLogRecord>) -> Result<(), TelemetryError>;
}

/// POSTs OTLP/HTTP JSON envelopes to a collector.
pub struct HttpLogExporter {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    service_name: String,
    service_version: Option<String>,
    scope_name: String,
}

impl HttpLogExporter {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TelemetryError::Config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TelemetryError::Config(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            headers,
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            scope_name: config.scope_name.clone(),
        })
    }
}

#[async_trait]
impl LogExporter for HttpLogExporter {
    async fn export(&self, records: Vec<OtlpLogRecord>) -> Result<(), TelemetryError> {
        let payload = build_export_request(
            &self.service_name,
            self.service_version.as_deref(),
            &self.scope_name,
            records,
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 202 {
            return Err(TelemetryError::Collector { status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_builds_from_config() {
        let config = TelemetryConfig::default()
            .with_header("authorization", "Bearer secret")
            .with_insecure(true);

        let exporter = HttpLogExporter::new(&config).unwrap();
        assert_eq!(exporter.endpoint, "http://localhost:4318/v1/logs");
        assert_eq!(exporter.headers.len(), 1);
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        let config = TelemetryConfig::default().with_header("bad header\n", "x");
        assert!(matches!(
            HttpLogExporter::new(&config),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let config = TelemetryConfig::default().with_header("x-token", "bad\nvalue");
        assert!(matches!(
            HttpLogExporter::new(&config),
            Err(TelemetryError::Config(_))
        ));
    }
}
