//! Camera device backed by nokhwa.
//!
//! The nokhwa camera handle is owned by a dedicated device thread for the
//! lifetime of the device and driven by commands. Frames are read and
//! delivered on that thread, and `stop` is processed between frames, so
//! once `stop` returns no frame callback is in flight.

use super::{CaptureDevice, CaptureError, DeliverySender, ImageConfig, PixelFormat};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

type Reply = Sender<Result<(), CaptureError>>;

enum Command {
    Start(DeliverySender, Reply),
    Stop(Reply),
    Shutdown,
}

impl PixelFormat {
    fn frame_format(&self) -> FrameFormat {
        match self {
            PixelFormat::Yuyv => FrameFormat::YUYV,
            PixelFormat::Nv12 => FrameFormat::NV12,
            PixelFormat::Gray => FrameFormat::GRAY,
            PixelFormat::Rgb => FrameFormat::RAWRGB,
        }
    }
}

/// Camera capture device.
pub struct NokhwaCamera {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    running: bool,
    name: String,
}

impl NokhwaCamera {
    /// Opens the camera described by `config`.
    ///
    /// Fails with `DeviceUnavailable` if no camera answers at the index and
    /// with `ConfigurationRejected` if the driver will not use the requested
    /// raw pixel format.
    pub fn open(config: &ImageConfig) -> Result<Self, CaptureError> {
        config.validate()?;

        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_config = config.clone();

        let worker = std::thread::Builder::new()
            .name("camera-device".into())
            .spawn(move || {
                let camera = match open_camera(&thread_config) {
                    Ok(camera) => {
                        let _ = ready_tx.send(Ok(()));
                        camera
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_device(camera, command_rx);
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        ready_rx.recv().map_err(|_| {
            CaptureError::DeviceUnavailable("camera thread exited during open".into())
        })??;

        tracing::info!(
            index = config.device_index,
            width = config.width,
            height = config.height,
            format = ?config.pixel_format,
            "Camera opened"
        );

        Ok(Self {
            commands,
            worker: Some(worker),
            running: false,
            name: format!("camera:{}", config.device_index),
        })
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), CaptureError> {
        let (reply, reply_rx) = mpsc::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| CaptureError::DeliveryFault("camera thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::DeliveryFault("camera thread is gone".into()))?
    }
}

fn open_camera(config: &ImageConfig) -> Result<Camera, CaptureError> {
    let wanted = config.pixel_format.frame_format();
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(Resolution::new(config.width, config.height), wanted, config.fps),
    ));

    let camera = Camera::new(CameraIndex::Index(config.device_index), requested)
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

    let negotiated = camera.camera_format();
    if negotiated.format() != wanted {
        return Err(CaptureError::ConfigurationRejected(format!(
            "driver offered {:?} instead of {:?}",
            negotiated.format(),
            wanted
        )));
    }
    tracing::debug!(format = ?negotiated, "Camera format negotiated");
    Ok(camera)
}

fn run_device(mut camera: Camera, commands: Receiver<Command>) {
    let mut streaming: Option<DeliverySender> = None;

    loop {
        let command = if streaming.is_some() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(Command::Start(sender, reply)) => {
                let result = camera
                    .open_stream()
                    .map(|()| streaming = Some(sender))
                    .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()));
                let _ = reply.send(result);
            }
            Some(Command::Stop(reply)) => {
                let result = if streaming.take().is_some() {
                    camera
                        .stop_stream()
                        .map_err(|e| CaptureError::DeliveryFault(e.to_string()))
                } else {
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Some(Command::Shutdown) => break,
            None => {
                let Some(sender) = streaming.as_ref() else {
                    continue;
                };
                match camera.frame() {
                    Ok(buffer) => {
                        // The first plane's raw bytes; the buffer is borrowed
                        // only for this call.
                        sender.deliver(buffer.buffer());
                    }
                    Err(e) => {
                        sender.fault(format!("camera frame error: {}", e));
                        streaming = None;
                        let _ = camera.stop_stream();
                    }
                }
            }
        }
    }

    if camera.is_stream_open() {
        let _ = camera.stop_stream();
    }
    tracing::debug!("Camera thread exiting");
}

impl CaptureDevice for NokhwaCamera {
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError> {
        self.request(|reply| Command::Start(sender, reply))?;
        self.running = true;
        tracing::debug!(device = %self.name, "Camera stream started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running = false;
        self.request(Command::Stop)?;
        tracing::debug!(device = %self.name, "Camera stream stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
