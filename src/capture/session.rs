//! Time-bounded capture session.
//!
//! A session bridges a callback-driven device into a blocking
//! "capture for N seconds, then return the data" call:
//!
//! ```text
//! caller ── start ──▶ device thread ── deliver ──▶ bounded queue ──▶ delivery worker ──▶ sink
//!   │                                                                      ▲
//!   └── wait(duration) ── stop ── Stop marker ─────────────────────────────┘ ── join ── finish
//! ```
//!
//! The caller only touches the sink again after the worker has consumed the
//! `Stop` marker and been joined, so the payload is fully formed before it is
//! read, whatever ordering guarantees the driver gives.

use super::delivery::{Delivery, WindowSignal};
use super::{CaptureDevice, CaptureError, DeliverySender, Sample, SessionConfig};
use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consumer side of a capture session.
///
/// `begin` and `finish` run on the caller's thread; `deliver` runs on the
/// session's delivery worker, one sample at a time, in emission order.
pub trait SampleSink: Send {
    /// Resets the accumulation target for a new window.
    fn begin(&mut self) -> Result<(), CaptureError>;

    /// Consumes one sample.
    fn deliver(&mut self, sample: &Sample) -> Result<(), CaptureError>;

    /// Assembles the payload after the device has stopped.
    fn finish(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Discards the current window after a fault.
    fn abandon(&mut self) {}
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No capture has run yet.
    Idle,
    /// A capture window is open, or one unwound without cleaning up.
    Running,
    /// The last capture has returned.
    Stopped,
}

/// Bookkeeping for one capture window.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// Wall-clock time the device was started.
    pub started_at: DateTime<Utc>,
    /// Requested window length.
    pub requested: Duration,
    /// Time actually spent in the window.
    pub elapsed: Duration,
    /// Samples consumed by the sink.
    pub deliveries: u64,
    /// Raw bytes consumed by the sink, before any sanitization.
    pub delivered_bytes: u64,
    /// Capture windows that went into the payload.
    pub windows: u32,
}

impl CaptureReport {
    fn empty(started_at: DateTime<Utc>, requested: Duration) -> Self {
        Self {
            started_at,
            requested,
            elapsed: Duration::ZERO,
            deliveries: 0,
            delivered_bytes: 0,
            windows: 0,
        }
    }

    fn absorb(&mut self, window: &CaptureReport) {
        self.requested += window.requested;
        self.elapsed += window.elapsed;
        self.deliveries += window.deliveries;
        self.delivered_bytes += window.delivered_bytes;
        self.windows += window.windows;
    }
}

/// The result of one successful capture window.
#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Vec<u8>,
    report: CaptureReport,
}

impl Payload {
    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the payload, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the window produced no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the payload one byte per character (ISO-8859-1).
    pub fn to_text(&self) -> String {
        crate::sink::decode_latin1(&self.bytes)
    }

    /// Bookkeeping for the window that produced this payload.
    pub fn report(&self) -> &CaptureReport {
        &self.report
    }
}

#[derive(Default)]
struct WindowTally {
    deliveries: u64,
    bytes: u64,
}

/// A capture device paired with the sink that turns its deliveries into a
/// payload.
pub struct CaptureSession<D, S> {
    device: D,
    sink: S,
    state: SessionState,
    queue_depth: usize,
}

impl<D: CaptureDevice, S: SampleSink> CaptureSession<D, S> {
    /// Creates a session around an already opened device.
    pub fn new(device: D, sink: S, config: &SessionConfig) -> Self {
        Self {
            device,
            sink,
            state: SessionState::Idle,
            queue_depth: config.queue_depth.max(1),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The sink receiving this session's deliveries.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Captures for `secs` whole seconds.
    pub fn capture_secs(&mut self, secs: u64) -> Result<Payload, CaptureError> {
        self.capture(Duration::from_secs(secs))
    }

    /// Runs one capture window of `duration` and returns its payload.
    ///
    /// The device is stopped before this returns, on every path. Any fault
    /// during the window discards it: no partial payload is ever returned.
    pub fn capture(&mut self, duration: Duration) -> Result<Payload, CaptureError> {
        if self.state == SessionState::Running {
            return Err(CaptureError::SessionBusy);
        }
        // Left in Running if anything below unwinds.
        self.state = SessionState::Running;
        let started_at = Utc::now();
        let started = Instant::now();

        if let Err(err) = self.sink.begin() {
            self.state = SessionState::Stopped;
            return Err(err);
        }

        if duration.is_zero() {
            tracing::debug!(device = self.device.name(), "Zero-length capture window");
            self.state = SessionState::Stopped;
            // Nothing was delivered, so the accumulation target is discarded
            // rather than assembled.
            self.sink.abandon();
            return Ok(Payload {
                bytes: Vec::new(),
                report: CaptureReport {
                    elapsed: started.elapsed(),
                    windows: 1,
                    ..CaptureReport::empty(started_at, duration)
                },
            });
        }

        tracing::info!(
            device = self.device.name(),
            window_ms = duration.as_millis() as u64,
            "Capture window started"
        );

        let outcome = self.run_window(duration);
        self.state = SessionState::Stopped;

        let tally = match outcome {
            Ok(tally) => tally,
            Err(err) => {
                self.sink.abandon();
                return Err(err);
            }
        };

        let bytes = match self.sink.finish() {
            Ok(bytes) => bytes,
            Err(err) => {
                self.sink.abandon();
                return Err(err);
            }
        };

        let report = CaptureReport {
            started_at,
            requested: duration,
            elapsed: started.elapsed(),
            deliveries: tally.deliveries,
            delivered_bytes: tally.bytes,
            windows: 1,
        };
        tracing::info!(
            device = self.device.name(),
            deliveries = report.deliveries,
            delivered_bytes = report.delivered_bytes,
            payload_bytes = bytes.len(),
            "Capture window finished"
        );

        Ok(Payload { bytes, report })
    }

    /// Runs back-to-back capture windows of `window` until at least `n`
    /// payload bytes are buffered, then returns exactly the first `n`.
    ///
    /// Each window is a full [`capture`](Self::capture), emission included,
    /// so callers that only want the trimmed result should give the sink a
    /// discarding output. A fault in any window fails the whole collection.
    /// A window that yields no bytes is treated as a delivery fault, since
    /// repeating it cannot make progress.
    pub fn collect(&mut self, n: usize, window: Duration) -> Result<Payload, CaptureError> {
        let mut report = CaptureReport::empty(Utc::now(), Duration::ZERO);
        let mut bytes = Vec::new();
        if n == 0 {
            return Ok(Payload { bytes, report });
        }
        if window.is_zero() {
            return Err(CaptureError::ConfigurationRejected(
                "collecting bytes needs a non-zero capture window".into(),
            ));
        }

        while bytes.len() < n {
            let payload = self.capture(window)?;
            if payload.is_empty() {
                return Err(CaptureError::DeliveryFault(format!(
                    "capture window {} produced no payload bytes",
                    report.windows + 1
                )));
            }
            report.absorb(payload.report());
            bytes.extend_from_slice(payload.as_bytes());
            tracing::debug!(
                buffered = bytes.len(),
                requested = n,
                windows = report.windows,
                "Collecting payload"
            );
        }

        bytes.truncate(n);
        tracing::info!(bytes = n, windows = report.windows, "Collection complete");
        Ok(Payload { bytes, report })
    }

    fn run_window(&mut self, duration: Duration) -> Result<WindowTally, CaptureError> {
        let signal = Arc::new(WindowSignal::default());
        let (tx, rx) = mpsc::sync_channel(self.queue_depth);
        let sender = DeliverySender::new(tx.clone(), signal.clone());

        let device = &mut self.device;
        let sink = &mut self.sink;

        std::thread::scope(|scope| {
            let worker_signal = signal.clone();
            let worker = std::thread::Builder::new()
                .name("capture-delivery".into())
                .spawn_scoped(scope, move || drain(rx, sink, &worker_signal))
                .map_err(|e| {
                    CaptureError::DeliveryFault(format!("failed to spawn delivery worker: {}", e))
                })?;

            if let Err(err) = device.start(sender) {
                let _ = tx.send(Delivery::Stop);
                let _ = worker.join();
                return Err(err);
            }

            let completed = signal.wait(duration);
            if !completed {
                tracing::warn!("Capture window cut short by a delivery fault");
            }

            let stopped = device.stop();

            // Handoff barrier: the worker has seen every in-window sample once
            // it consumes this marker. If it already exited on a fault the
            // send fails, which is fine.
            let _ = tx.send(Delivery::Stop);
            let tally = worker
                .join()
                .map_err(|_| CaptureError::DeliveryFault("delivery worker panicked".into()))?;

            stopped?;
            match signal.take() {
                Some(err) => Err(err),
                None => Ok(tally),
            }
        })
    }
}

/// Delivery worker loop: hands queued samples to the sink until the
/// session's `Stop` marker arrives or the window faults.
fn drain<S: SampleSink>(rx: Receiver<Delivery>, sink: &mut S, signal: &WindowSignal) -> WindowTally {
    let mut tally = WindowTally::default();
    while let Ok(delivery) = rx.recv() {
        let sample = match delivery {
            Delivery::Sample(sample) => sample,
            Delivery::Stop => break,
        };
        if signal.is_raised() {
            break;
        }
        tracing::trace!(sequence = sample.sequence(), bytes = sample.len(), "Delivery");
        if let Err(err) = sink.deliver(&sample) {
            signal.raise(err);
            break;
        }
        tally.deliveries += 1;
        tally.bytes += sample.len() as u64;
    }
    tally
}
