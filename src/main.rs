//! Sensor Entropy CLI
//!
//! Captures raw bytes from the camera or the microphone for a fixed window
//! and writes the payload to standard output. Diagnostics go to standard
//! error. Every fault terminates the process with a non-zero exit code.
//! With `--bytes N`, windows are repeated until N bytes are collected and
//! only those N bytes are written, once, after the last window succeeds.

use clap::{Parser, Subcommand};
use sensor_entropy::{
    capture::{
        AudioConfig, CaptureDevice, CaptureError, CaptureSession, EmitMode, FileConfig,
        ImageConfig, Payload, SampleSink, SyntheticDevice,
    },
    metrics::{MetricsRegistry, MetricsSnapshot},
    sink::{AudioSampleSink, ImageSampleSink},
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "sensor-entropy", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write Prometheus text metrics to this file after the capture.
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    /// Repeat capture windows until this many payload bytes are collected,
    /// then write exactly that many.
    #[arg(long, global = true)]
    bytes: Option<usize>,

    #[command(subcommand)]
    source: Source,
}

#[derive(Debug, Subcommand)]
enum Source {
    /// Capture raw image planes from the camera.
    Image {
        /// Capture window in whole seconds.
        #[arg(long, env = "SENSOR_ENTROPY_DURATION")]
        duration: Option<u64>,
        /// Use a synthetic pattern generator instead of the camera.
        #[arg(long)]
        synthetic: bool,
        /// Emit the payload once after a successful window instead of per
        /// frame. Per-frame output reaches stdout before the window ends,
        /// so a later fault can leave partial output behind; buffered
        /// output never does.
        #[arg(long)]
        buffered: bool,
    },
    /// Record the microphone and extract the waveform bytes.
    Audio {
        /// Capture window in whole seconds.
        #[arg(long, env = "SENSOR_ENTROPY_DURATION")]
        duration: Option<u64>,
        /// Use a synthetic pattern generator instead of the microphone.
        #[arg(long)]
        synthetic: bool,
        /// Strip newline, tab and space bytes from the payload.
        #[arg(long)]
        sanitize: bool,
    },
}

fn main() {
    // Stdout is the payload channel; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Sensor Entropy v{}", sensor_entropy::VERSION);

    let metrics = match MetricsRegistry::new() {
        Ok(registry) => Some(registry),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let result = load_config(&cli).and_then(|config| run(cli.source, cli.bytes, &config));

    if let (Some(registry), Some(path)) = (&metrics, &cli.metrics_file) {
        match &result {
            Ok(payload) => registry.record_capture(&MetricsSnapshot::from_report(
                payload.report(),
                payload.len(),
            )),
            Err(e) => registry.record_fault(e),
        }
        if let Err(e) = registry.write_textfile(path) {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    match result {
        Ok(payload) => {
            info!(
                "Captured {} payload bytes from {} deliveries over {} window(s) in {:?}",
                payload.len(),
                payload.report().deliveries,
                payload.report().windows,
                payload.report().elapsed
            );
        }
        Err(e) => {
            eprintln!("Capture failed: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig, CaptureError> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(FileConfig::from_file(path)?)
        }
        None => Ok(FileConfig::default()),
    }
}

fn run(
    source: Source,
    bytes: Option<usize>,
    config: &FileConfig,
) -> Result<Payload, CaptureError> {
    config.session.validate()?;

    match source {
        Source::Image {
            duration,
            synthetic,
            buffered,
        } => {
            let device = open_camera(&config.image, synthetic)?;
            let emit = if buffered {
                EmitMode::Buffered
            } else {
                config.session.emit
            };
            let sink = match bytes {
                // Only the trimmed collection is written.
                Some(_) => ImageSampleSink::with_output(emit, std::io::sink()),
                None => ImageSampleSink::new(emit),
            };
            let window = duration
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.session.image_duration());

            gather(CaptureSession::new(device, sink, &config.session), window, bytes)
        }
        Source::Audio {
            duration,
            synthetic,
            sanitize,
        } => {
            let device = open_microphone(&config.audio, synthetic)?;
            let sink = match bytes {
                Some(_) => AudioSampleSink::with_output(&config.audio, std::io::sink())?,
                None => AudioSampleSink::new(&config.audio)?,
            }
            .sanitized(sanitize);
            info!("Recording to {}", sink.artifact().display());
            let window = duration
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.session.audio_duration());

            gather(CaptureSession::new(device, sink, &config.session), window, bytes)
        }
    }
}

/// Runs one window, or collects `bytes` across windows and writes them.
fn gather<D: CaptureDevice, S: SampleSink>(
    mut session: CaptureSession<D, S>,
    window: Duration,
    bytes: Option<usize>,
) -> Result<Payload, CaptureError> {
    let Some(n) = bytes else {
        return session.capture(window);
    };

    let payload = session.collect(n, window)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(payload.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(payload)
}

fn open_camera(
    config: &ImageConfig,
    synthetic: bool,
) -> Result<Box<dyn CaptureDevice>, CaptureError> {
    config.validate()?;
    if synthetic {
        // Two bytes per pixel, like a YUYV plane.
        let plane = config.plane_len();
        let interval = Duration::from_secs(1) / config.fps;
        return Ok(Box::new(SyntheticDevice::new(plane, interval)?));
    }

    #[cfg(feature = "camera")]
    {
        return Ok(Box::new(sensor_entropy::capture::NokhwaCamera::open(config)?));
    }
    #[cfg(not(feature = "camera"))]
    {
        Err(CaptureError::DeviceUnavailable(
            "camera support not compiled in (build with --features camera, or pass --synthetic)"
                .into(),
        ))
    }
}

fn open_microphone(
    config: &AudioConfig,
    synthetic: bool,
) -> Result<Box<dyn CaptureDevice>, CaptureError> {
    config.validate()?;
    if synthetic {
        // 10 ms of 16-bit PCM per delivery.
        let chunk = (config.sample_rate / 100) as usize * config.channels as usize * 2;
        return Ok(Box::new(SyntheticDevice::new(
            chunk,
            Duration::from_millis(10),
        )?));
    }

    #[cfg(feature = "microphone")]
    {
        return Ok(Box::new(sensor_entropy::capture::CpalMicrophone::open(config)?));
    }
    #[cfg(not(feature = "microphone"))]
    {
        Err(CaptureError::DeviceUnavailable(
            "microphone support not compiled in (build with --features microphone, or pass --synthetic)"
                .into(),
        ))
    }
}
