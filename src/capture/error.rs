//! Capture fault taxonomy.
//!
//! Every fault a capture session can hit is a variant of [`CaptureError`].
//! The library never terminates the process; the binary decides which
//! faults are fatal (all of them, today).

use super::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening a device or running a capture window.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No device answered, or it could not be opened or started.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The device or the configuration refused the requested settings.
    #[error("device configuration rejected: {0}")]
    ConfigurationRejected(String),
    /// A sample was dropped, or the driver or encoder reported an error.
    #[error("delivery fault: {0}")]
    DeliveryFault(String),
    /// The recording artifact could not be read back after stop.
    #[error("failed to extract payload from {}: {reason}", .path.display())]
    ExtractionFault {
        /// Artifact that was read back.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The session is still marked running.
    #[error("a capture is already running on this session")]
    SessionBusy,
    /// Writing to the output channel failed.
    #[error("failed to write to output channel: {0}")]
    Output(#[from] std::io::Error),
}

impl CaptureError {
    /// Process exit code used when this fault terminates the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            CaptureError::DeviceUnavailable(_) => 2,
            CaptureError::ConfigurationRejected(_) => 3,
            CaptureError::DeliveryFault(_) => 4,
            CaptureError::ExtractionFault { .. } => 5,
            CaptureError::SessionBusy | CaptureError::Output(_) => 1,
        }
    }

    /// Short stable label, used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::DeviceUnavailable(_) => "device_unavailable",
            CaptureError::ConfigurationRejected(_) => "configuration_rejected",
            CaptureError::DeliveryFault(_) => "delivery_fault",
            CaptureError::ExtractionFault { .. } => "extraction_fault",
            CaptureError::SessionBusy => "session_busy",
            CaptureError::Output(_) => "output",
        }
    }
}

impl From<ConfigError> for CaptureError {
    fn from(err: ConfigError) -> Self {
        CaptureError::ConfigurationRejected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_nonzero() {
        let errors = [
            CaptureError::DeviceUnavailable("none".into()),
            CaptureError::ConfigurationRejected("bad".into()),
            CaptureError::DeliveryFault("dropped".into()),
            CaptureError::ExtractionFault {
                path: PathBuf::from("sound.wav"),
                reason: "short".into(),
            },
            CaptureError::SessionBusy,
        ];
        for err in &errors {
            assert_ne!(err.exit_code(), 0, "{}", err);
        }
    }

    #[test]
    fn test_config_error_is_rejection() {
        let err: CaptureError = ConfigError::InvalidDimensions.into();
        assert!(matches!(err, CaptureError::ConfigurationRejected(_)));
        assert_eq!(err.kind(), "configuration_rejected");
    }
}
