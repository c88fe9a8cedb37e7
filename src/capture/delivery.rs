//! Device-to-session delivery path.
//!
//! Drivers call back on their own threads. A [`DeliverySender`] turns each
//! callback into an owned [`Sample`] on a bounded queue, which the session's
//! delivery worker drains in emission order. Faults raised on the driver
//! side are recorded on a [`WindowSignal`] that also wakes the waiting
//! caller early.

use super::{CaptureError, Sample};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Message carried by the delivery queue.
pub(crate) enum Delivery {
    Sample(Sample),
    /// Sent by the session after the device stopped; nothing behind it
    /// belongs to the window.
    Stop,
}

/// Per-window fault slot shared between the device, the worker and the caller.
#[derive(Default)]
pub(crate) struct WindowSignal {
    fault: Mutex<Option<CaptureError>>,
    wake: Condvar,
}

impl WindowSignal {
    fn lock(&self) -> MutexGuard<'_, Option<CaptureError>> {
        // A poisoned slot still holds a usable value.
        self.fault.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a fault. Only the first fault of a window is kept.
    pub(crate) fn raise(&self, err: CaptureError) {
        let mut slot = self.lock();
        if slot.is_none() {
            tracing::error!(error = %err, "Capture window faulted");
            *slot = Some(err);
        }
        self.wake.notify_all();
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.lock().is_some()
    }

    /// Blocks for `duration` unless a fault is raised first.
    ///
    /// Returns true if the full window elapsed without a fault.
    pub(crate) fn wait(&self, duration: Duration) -> bool {
        let slot = self.lock();
        let (slot, _timeout) = self
            .wake
            .wait_timeout_while(slot, duration, |fault| fault.is_none())
            .unwrap_or_else(|e| e.into_inner());
        slot.is_none()
    }

    pub(crate) fn take(&self) -> Option<CaptureError> {
        self.lock().take()
    }
}

/// Device-side handle for delivering samples into a running capture window.
///
/// Cloneable so drivers can hand it to callback closures. Every method is
/// non-blocking and safe to call from a real-time driver thread.
#[derive(Clone)]
pub struct DeliverySender {
    tx: SyncSender<Delivery>,
    signal: Arc<WindowSignal>,
    sequence: Arc<AtomicU64>,
}

impl DeliverySender {
    pub(crate) fn new(tx: SyncSender<Delivery>, signal: Arc<WindowSignal>) -> Self {
        Self {
            tx,
            signal,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Delivers one buffer of raw bytes.
    ///
    /// The buffer is borrowed for the duration of this call only and is
    /// copied before it is queued. A full queue means the sample is lost,
    /// which faults the window. Returns false once the window no longer
    /// accepts samples; drivers may use that to stop early.
    pub fn deliver(&self, bytes: &[u8]) -> bool {
        if self.signal.is_raised() {
            return false;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        match self
            .tx
            .try_send(Delivery::Sample(Sample::copy_from(bytes, sequence)))
        {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.signal.raise(CaptureError::DeliveryFault(format!(
                    "sample {} dropped: delivery queue full",
                    sequence
                )));
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Reports samples the driver itself dropped.
    pub fn dropped(&self, count: u64) {
        self.signal.raise(CaptureError::DeliveryFault(format!(
            "device dropped {} sample(s)",
            count
        )));
    }

    /// Reports a driver-level delivery error.
    pub fn fault(&self, reason: impl Into<String>) {
        self.signal
            .raise(CaptureError::DeliveryFault(reason.into()));
    }

    /// Number of samples offered so far in this window.
    pub fn offered(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DeliverySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySender")
            .field("offered", &self.offered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn sender(depth: usize) -> (DeliverySender, mpsc::Receiver<Delivery>, Arc<WindowSignal>) {
        let (tx, rx) = mpsc::sync_channel(depth);
        let signal = Arc::new(WindowSignal::default());
        (DeliverySender::new(tx, signal.clone()), rx, signal)
    }

    #[test]
    fn test_deliver_assigns_sequence() {
        let (sender, rx, _signal) = sender(4);

        assert!(sender.deliver(b"a"));
        assert!(sender.deliver(b"b"));

        let sequences: Vec<u64> = rx
            .try_iter()
            .map(|d| match d {
                Delivery::Sample(s) => s.sequence(),
                Delivery::Stop => 0,
            })
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_full_queue_faults_window() {
        let (sender, _rx, signal) = sender(1);

        assert!(sender.deliver(b"first"));
        assert!(!sender.deliver(b"second"));
        assert!(matches!(
            signal.take(),
            Some(CaptureError::DeliveryFault(_))
        ));
    }

    #[test]
    fn test_deliver_after_fault_is_refused() {
        let (sender, rx, _signal) = sender(4);

        sender.fault("encoder failed");
        assert!(!sender.deliver(b"late"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fault_wakes_waiter() {
        let (sender, _rx, signal) = sender(1);

        let started = Instant::now();
        let waiter = std::thread::spawn(move || signal.wait(Duration::from_secs(10)));
        std::thread::sleep(Duration::from_millis(20));
        sender.dropped(1);

        assert!(!waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_runs_full_window() {
        let (_sender, _rx, signal) = sender(1);
        let window = Duration::from_millis(30);

        let started = Instant::now();
        assert!(signal.wait(window));
        assert!(started.elapsed() >= window);
    }
}
