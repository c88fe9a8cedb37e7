//! Sensor Entropy Capture Library
//!
//! Collects raw bytes from a physical sensor (a camera's image plane or a
//! microphone's waveform) over a fixed wall-clock window and returns them
//! as one opaque, text-like payload, for use as unpredictable input by
//! downstream consumers.
//!
//! # Architecture
//!
//! ```text
//! device (driver thread) → delivery queue → sink (worker thread) → payload
//!            ↑                                                      ↓
//!       capture session: start → wait(duration) → stop → finish
//! ```
//!
//! # Design Principles
//!
//! - **One result per window**: `capture` returns exactly once, after the
//!   device has stopped, with bytes observed only inside that window
//! - **No partial payloads**: any delivery fault discards the whole window
//! - **Lossless or nothing**: a dropped sample is a fault, not a gap
//! - **No quality claims**: bytes are passed through raw; there is no
//!   entropy estimation or whitening
//!
//! # Example
//!
//! ```no_run
//! use sensor_entropy::{
//!     capture::{CaptureSession, EmitMode, SessionConfig, SyntheticDevice},
//!     sink::ImageSampleSink,
//! };
//! use std::time::Duration;
//!
//! let device = SyntheticDevice::new(4096, Duration::from_millis(33)).unwrap();
//! let sink = ImageSampleSink::new(EmitMode::Streaming);
//! let mut session = CaptureSession::new(device, sink, &SessionConfig::default());
//!
//! let payload = session.capture_secs(1).unwrap();
//! println!("captured {} bytes", payload.len());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod metrics;
pub mod sink;

// Re-export commonly used types at crate root
pub use capture::{
    AudioConfig, CaptureDevice, CaptureError, CaptureSession, FileConfig, ImageConfig, Payload,
    SampleSink, SessionConfig,
};
pub use sink::{AudioSampleSink, ImageSampleSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
