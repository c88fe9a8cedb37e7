//! Prometheus metrics for capture sessions.
//!
//! The binary runs one capture and exits, so metrics are written in the
//! Prometheus text format to a file (for the node exporter's textfile
//! collector) rather than served.
//!
//! # Metrics Exposed
//!
//! - `sensor_entropy_captures_total` - Capture windows that produced a payload
//! - `sensor_entropy_faults_total{kind}` - Faults, by fault kind
//! - `sensor_entropy_deliveries_total` - Samples delivered by devices
//! - `sensor_entropy_delivered_bytes_total` - Raw bytes delivered by devices
//! - `sensor_entropy_payload_bytes_total` - Payload bytes returned
//! - `sensor_entropy_last_payload_bytes` - Payload size of the last window
//! - `sensor_entropy_last_window_seconds` - Duration of the last window
//! - `sensor_entropy_last_capture_timestamp_seconds` - Start of the last window
//!
//! # Example
//!
//! ```no_run
//! use sensor_entropy::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     windows: 1,
//!     deliveries: 15,
//!     delivered_bytes: 41_472,
//!     payload_bytes: 40_960,
//!     window_seconds: 1.0,
//!     started_at_seconds: 1_700_000_000,
//! };
//!
//! registry.record_capture(&snapshot);
//! registry.write_textfile("/var/lib/node_exporter/sensor_entropy.prom").unwrap();
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
