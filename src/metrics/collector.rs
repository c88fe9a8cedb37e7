//! Metrics collection and registry.

use crate::capture::{CaptureError, CaptureReport};
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// The textfile could not be written.
    #[error("failed to write metrics file: {0}")]
    Io(#[from] std::io::Error),
}

/// A snapshot of one finished capture, which may span several windows.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Capture windows that went into the payload.
    pub windows: u64,
    /// Samples consumed during the window.
    pub deliveries: u64,
    /// Raw bytes consumed during the window.
    pub delivered_bytes: u64,
    /// Bytes in the returned payload.
    pub payload_bytes: u64,
    /// Time spent in the window, in seconds.
    pub window_seconds: f64,
    /// Unix timestamp of the window start.
    pub started_at_seconds: i64,
}

impl MetricsSnapshot {
    /// Creates a snapshot from a capture report and its payload length.
    pub fn from_report(report: &CaptureReport, payload_bytes: usize) -> Self {
        Self {
            windows: u64::from(report.windows),
            deliveries: report.deliveries,
            delivered_bytes: report.delivered_bytes,
            payload_bytes: payload_bytes as u64,
            window_seconds: report.elapsed.as_secs_f64(),
            started_at_seconds: report.started_at.timestamp(),
        }
    }
}

/// Prometheus metrics registry for capture sessions.
pub struct MetricsRegistry {
    registry: Registry,

    // Totals
    captures_total: IntCounter,
    faults_total: IntCounterVec,
    deliveries_total: IntCounter,
    delivered_bytes_total: IntCounter,
    payload_bytes_total: IntCounter,

    // Last window
    last_payload_bytes: IntGauge,
    last_window_seconds: Gauge,
    last_capture_timestamp: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let captures_total = IntCounter::new(
            "sensor_entropy_captures_total",
            "Total capture windows that produced a payload",
        )?;
        let faults_total = IntCounterVec::new(
            Opts::new(
                "sensor_entropy_faults_total",
                "Total capture faults, by fault kind",
            ),
            &["kind"],
        )?;
        let deliveries_total = IntCounter::new(
            "sensor_entropy_deliveries_total",
            "Total samples delivered by capture devices",
        )?;
        let delivered_bytes_total = IntCounter::new(
            "sensor_entropy_delivered_bytes_total",
            "Total raw bytes delivered by capture devices",
        )?;
        let payload_bytes_total = IntCounter::new(
            "sensor_entropy_payload_bytes_total",
            "Total payload bytes returned by capture windows",
        )?;
        let last_payload_bytes = IntGauge::new(
            "sensor_entropy_last_payload_bytes",
            "Payload size of the most recent capture window",
        )?;
        let last_window_seconds = Gauge::new(
            "sensor_entropy_last_window_seconds",
            "Duration of the most recent capture window",
        )?;
        let last_capture_timestamp = IntGauge::new(
            "sensor_entropy_last_capture_timestamp_seconds",
            "Unix time the most recent capture window started",
        )?;

        registry.register(Box::new(captures_total.clone()))?;
        registry.register(Box::new(faults_total.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(delivered_bytes_total.clone()))?;
        registry.register(Box::new(payload_bytes_total.clone()))?;
        registry.register(Box::new(last_payload_bytes.clone()))?;
        registry.register(Box::new(last_window_seconds.clone()))?;
        registry.register(Box::new(last_capture_timestamp.clone()))?;

        Ok(Self {
            registry,
            captures_total,
            faults_total,
            deliveries_total,
            delivered_bytes_total,
            payload_bytes_total,
            last_payload_bytes,
            last_window_seconds,
            last_capture_timestamp,
        })
    }

    /// Records a successful capture window.
    pub fn record_capture(&self, snapshot: &MetricsSnapshot) {
        self.captures_total.inc_by(snapshot.windows);
        self.deliveries_total.inc_by(snapshot.deliveries);
        self.delivered_bytes_total.inc_by(snapshot.delivered_bytes);
        self.payload_bytes_total.inc_by(snapshot.payload_bytes);

        self.last_payload_bytes.set(snapshot.payload_bytes as i64);
        self.last_window_seconds.set(snapshot.window_seconds);
        self.last_capture_timestamp.set(snapshot.started_at_seconds);
    }

    /// Records a failed capture window.
    pub fn record_fault(&self, err: &CaptureError) {
        self.faults_total.with_label_values(&[err.kind()]).inc();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text exposition to `path`, replacing it atomically.
    pub fn write_textfile(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let path = path.as_ref();
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.encode()?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_record_capture() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            windows: 1,
            deliveries: 15,
            delivered_bytes: 4096,
            payload_bytes: 4000,
            window_seconds: 1.0,
            started_at_seconds: 1_700_000_000,
        };

        registry.record_capture(&snapshot);
        registry.record_capture(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("sensor_entropy_captures_total 2"));
        assert!(output.contains("sensor_entropy_deliveries_total 30"));
        assert!(output.contains("sensor_entropy_last_payload_bytes 4000"));
    }

    #[test]
    fn test_collected_capture_counts_every_window() {
        let registry = MetricsRegistry::new().unwrap();

        registry.record_capture(&MetricsSnapshot {
            windows: 3,
            payload_bytes: 6,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("sensor_entropy_captures_total 3"));
        assert!(output.contains("sensor_entropy_payload_bytes_total 6"));
    }

    #[test]
    fn test_record_fault_by_kind() {
        let registry = MetricsRegistry::new().unwrap();

        registry.record_fault(&CaptureError::DeliveryFault("dropped".into()));

        let output = registry.encode().unwrap();
        assert!(output.contains("sensor_entropy_faults_total{kind=\"delivery_fault\"} 1"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.prom");
        let registry = MetricsRegistry::new().unwrap();

        registry.write_textfile(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("sensor_entropy_captures_total"));
    }
}
