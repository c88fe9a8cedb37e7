//! Microphone device backed by cpal.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated device
//! thread that builds it on start and drops it on stop. Samples arrive as
//! `f32` and are delivered as 16-bit little-endian PCM.

use super::{AudioConfig, CaptureDevice, CaptureError, DeliverySender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

type Reply = Sender<Result<(), CaptureError>>;

enum Command {
    Start(DeliverySender, Reply),
    Stop(Reply),
}

/// Microphone capture device.
pub struct CpalMicrophone {
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    running: bool,
    name: String,
}

impl CpalMicrophone {
    /// Opens the default input device and checks it supports `config`.
    pub fn open(config: &AudioConfig) -> Result<Self, CaptureError> {
        config.validate()?;

        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let worker = std::thread::Builder::new()
            .name("microphone-device".into())
            .spawn(move || {
                let device = match open_input(&stream_config) {
                    Ok(device) => {
                        let name = device.name().unwrap_or_else(|_| "default".to_string());
                        let _ = ready_tx.send(Ok(name));
                        device
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_device(device, stream_config, command_rx);
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let name = ready_rx.recv().map_err(|_| {
            CaptureError::DeviceUnavailable("microphone thread exited during open".into())
        })??;

        tracing::info!(
            device = %name,
            sample_rate = config.sample_rate,
            channels = config.channels,
            "Microphone opened"
        );

        Ok(Self {
            commands: Some(commands),
            worker: Some(worker),
            running: false,
            name: format!("microphone:{}", name),
        })
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), CaptureError> {
        let gone = || CaptureError::DeliveryFault("microphone thread is gone".into());
        let (reply, reply_rx) = mpsc::channel();
        self.commands
            .as_ref()
            .ok_or_else(gone)?
            .send(command(reply))
            .map_err(|_| gone())?;
        reply_rx.recv().map_err(|_| gone())?
    }
}

fn open_input(config: &StreamConfig) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::DeviceUnavailable("no input audio device available".into()))?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
        .any(|range| {
            range.channels() == config.channels
                && range.sample_format() == SampleFormat::F32
                && range.min_sample_rate() <= config.sample_rate
                && range.max_sample_rate() >= config.sample_rate
        });
    if !supported {
        return Err(CaptureError::ConfigurationRejected(format!(
            "input device does not support {} Hz, {} channel(s), f32",
            config.sample_rate.0, config.channels
        )));
    }
    Ok(device)
}

fn run_device(device: cpal::Device, config: StreamConfig, commands: Receiver<Command>) {
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(command) = commands.recv() {
        match command {
            Command::Start(sender, reply) => {
                let result = build_stream(&device, &config, sender).map(|s| stream = Some(s));
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                // Dropping the stream stops the callback before returning.
                let _ = stream.take();
                let _ = reply.send(Ok(()));
            }
        }
    }
    tracing::debug!("Microphone thread exiting");
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sender: DeliverySender,
) -> Result<cpal::Stream, CaptureError> {
    let errors = sender.clone();
    let mut pcm: Vec<u8> = Vec::new();

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                pcm.clear();
                for sample in data {
                    let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    pcm.extend_from_slice(&amplitude.to_le_bytes());
                }
                sender.deliver(&pcm);
            },
            move |err| {
                errors.fault(format!("audio stream error: {}", err));
            },
            None,
        )
        .map_err(|e| CaptureError::ConfigurationRejected(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
    Ok(stream)
}

impl CaptureDevice for CpalMicrophone {
    fn start(&mut self, sender: DeliverySender) -> Result<(), CaptureError> {
        self.request(|reply| Command::Start(sender, reply))?;
        self.running = true;
        tracing::debug!(device = %self.name, "Recording started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running = false;
        self.request(Command::Stop)?;
        tracing::debug!(device = %self.name, "Recording stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        // Closing the command channel ends the device thread.
        self.commands = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
