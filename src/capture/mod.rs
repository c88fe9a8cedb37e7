//! Capture devices and the time-bounded capture session.
//!
//! This module provides the device abstraction, the delivery path from
//! driver callbacks into a session, and the session itself. Devices are
//! treated as opaque sources of raw bytes.

#[cfg(feature = "camera")]
mod camera;
mod config;
mod delivery;
mod device;
mod error;
#[cfg(feature = "microphone")]
mod microphone;
#[cfg(test)]
pub(crate) mod mock;
mod sample;
mod session;

#[cfg(feature = "camera")]
pub use camera::NokhwaCamera;
pub use config::{
    AudioConfig, AudioContainer, AudioQuality, ConfigError, EmitMode, FileConfig, ImageConfig,
    PixelFormat, SessionConfig,
};
pub use delivery::DeliverySender;
pub use device::{CaptureDevice, SyntheticDevice};
pub use error::CaptureError;
#[cfg(feature = "microphone")]
pub use microphone::CpalMicrophone;
pub use sample::Sample;
pub use session::{CaptureReport, CaptureSession, Payload, SampleSink, SessionState};
