//! Scripted device for driving capture sessions in tests.

use super::{CaptureDevice, CaptureError, DeliverySender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One step a [`ScriptedDevice`] performs after start.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Vec<u8>),
    Drop,
    Fault(String),
}

/// Plays a script of deliveries on its own thread after each start.
///
/// With several scripts, start `n` plays script `n`; the last one repeats.
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    scripts: Vec<Vec<Step>>,
    fail_start: bool,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedDevice {
    pub fn new(script: Vec<Step>) -> Self {
        Self::windows(vec![script])
    }

    pub fn windows(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts,
            ..Default::default()
        }
    }

    pub fn frames<I, B>(frames: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::new(
            frames
                .into_iter()
                .map(|f| Step::Frame(f.as_ref().to_vec()))
                .collect(),
        )
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    /// Shared (starts, stops) counters, readable after the device moves
    /// into a session.
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.starts.clone(), self.stops.clone())
    }
}

impl CaptureDevice for ScriptedDevice {
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceUnavailable("scripted failure".into()));
        }
        let started = self.starts.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(started.min(self.scripts.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        self.worker = Some(std::thread::spawn(move || {
            for step in script {
                match step {
                    Step::Frame(bytes) => {
                        sender.deliver(&bytes);
                    }
                    Step::Drop => sender.dropped(1),
                    Step::Fault(reason) => sender.fault(reason),
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
