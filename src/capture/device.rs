//! Capture device abstraction.
//!
//! A device is a black box that, once started, delivers buffers of raw
//! bytes at its own cadence on its own thread, and stops delivering once
//! told to stop.

use super::{CaptureError, DeliverySender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Trait for capture device implementations.
///
/// Devices are opened in their constructors; `start` and `stop` may be
/// called any number of times afterwards, alternating.
pub trait CaptureDevice {
    /// Starts asynchronous delivery into `sender`.
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError>;

    /// Stops delivery.
    ///
    /// Must not return while a delivery callback is still executing, and
    /// no callback may run after it returns.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Checks if the device is currently delivering.
    fn is_running(&self) -> bool;

    /// Human-readable device name for diagnostics.
    fn name(&self) -> &str;
}

impl<D: CaptureDevice + ?Sized> CaptureDevice for Box<D> {
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError> {
        (**self).start(sender)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Synthetic device that generates a deterministic byte pattern.
///
/// Useful for exercising the capture pipeline without hardware. The output
/// is NOT a source of randomness.
#[derive(Debug)]
pub struct SyntheticDevice {
    chunk_len: usize,
    interval: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticDevice {
    /// Creates a device delivering `chunk_len` bytes every `interval`.
    pub fn new(chunk_len: usize, interval: Duration) -> Result<Self, CaptureError> {
        if chunk_len == 0 {
            return Err(CaptureError::ConfigurationRejected(
                "synthetic chunk length must be non-zero".into(),
            ));
        }
        Ok(Self {
            chunk_len,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    fn pattern(chunk_len: usize, sequence: u64) -> Vec<u8> {
        (0..chunk_len)
            .map(|i| ((i as u64 ^ sequence) % 256) as u8)
            .collect()
    }
}

impl CaptureDevice for SyntheticDevice {
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::ConfigurationRejected(
                "synthetic device already running".into(),
            ));
        }

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let chunk_len = self.chunk_len;
        let interval = self.interval;

        let worker = std::thread::Builder::new()
            .name("synthetic-device".into())
            .spawn(move || {
                let mut sequence = 0u64;
                loop {
                    std::thread::sleep(interval);
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    sequence += 1;
                    if !sender.deliver(&Self::pattern(chunk_len, sequence)) {
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        self.worker = Some(worker);
        tracing::debug!(chunk_len, ?interval, "SyntheticDevice started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| {
                CaptureError::DeliveryFault("synthetic device thread panicked".into())
            })?;
        }
        tracing::debug!("SyntheticDevice stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::delivery::{Delivery, WindowSignal};
    use std::sync::mpsc;

    #[test]
    fn test_synthetic_device_lifecycle() {
        let mut device = SyntheticDevice::new(16, Duration::from_millis(5)).unwrap();
        let (tx, rx) = mpsc::sync_channel(1024);
        let sender = DeliverySender::new(tx, Arc::new(WindowSignal::default()));

        assert!(!device.is_running());
        device.start(sender).unwrap();
        assert!(device.is_running());

        std::thread::sleep(Duration::from_millis(50));
        device.stop().unwrap();
        assert!(!device.is_running());

        let samples: Vec<_> = rx
            .try_iter()
            .filter_map(|d| match d {
                Delivery::Sample(s) => Some(s),
                Delivery::Stop => None,
            })
            .collect();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.len() == 16));
        assert!(samples.windows(2).all(|w| w[0].sequence() < w[1].sequence()));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        assert!(matches!(
            SyntheticDevice::new(0, Duration::from_millis(1)),
            Err(CaptureError::ConfigurationRejected(_))
        ));
    }
}
