//! Audio sample sink.
//!
//! Deliveries are 16-bit little-endian PCM. The sink records them into a
//! WAV artifact on disk; once the device has stopped, the artifact is
//! reopened and everything after the container header becomes the payload.
//! No payload view exists while the window is running.

use crate::capture::{AudioConfig, CaptureError, Sample, SampleSink};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::sanitize::sanitize;

/// Size of the container preamble skipped when extracting the payload.
///
/// This is the canonical 44-byte RIFF/WAVE header that `hound` writes for
/// integer PCM with at most two channels and at most 16 bits per sample:
/// RIFF chunk (12) + `fmt ` chunk (8 + 16) + `data` chunk header (8).
/// Sample rate does not affect it. [`AudioConfig::validate`] rejects the
/// channel counts that would switch the writer to the 68-byte extensible
/// header; revisit this constant whenever the recording format changes.
pub const HEADER_SKIP_BYTES: usize = 44;

/// Returns the bytes following the container header, or `None` if the
/// artifact is too short to contain one.
pub fn strip_header(raw: &[u8]) -> Option<&[u8]> {
    raw.get(HEADER_SKIP_BYTES..)
}

/// Sink that records PCM deliveries into a WAV artifact and reads the
/// payload back after stop.
pub struct AudioSampleSink {
    artifact: PathBuf,
    spec: WavSpec,
    writer: Option<WavWriter<BufWriter<File>>>,
    carry: Option<u8>,
    sanitize: bool,
    output: Box<dyn Write + Send>,
}

impl AudioSampleSink {
    /// Creates a sink emitting to standard output.
    ///
    /// The artifact (and its directory) is created here and overwritten by
    /// every capture. It is never deleted by the sink.
    pub fn new(config: &AudioConfig) -> Result<Self, CaptureError> {
        Self::with_output(config, std::io::stdout())
    }

    /// Creates a sink emitting to `output`.
    pub fn with_output(
        config: &AudioConfig,
        output: impl Write + Send + 'static,
    ) -> Result<Self, CaptureError> {
        config.validate()?;

        let artifact = config.artifact_path();
        if let Some(dir) = artifact.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CaptureError::ConfigurationRejected(format!(
                    "cannot create artifact directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        File::create(&artifact).map_err(|e| {
            CaptureError::ConfigurationRejected(format!(
                "cannot create artifact {}: {}",
                artifact.display(),
                e
            ))
        })?;

        let spec = WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample: config.quality.bits_per_sample(),
            sample_format: SampleFormat::Int,
        };
        tracing::debug!(artifact = %artifact.display(), ?spec, "Audio artifact prepared");

        Ok(Self {
            artifact,
            spec,
            writer: None,
            carry: None,
            sanitize: false,
            output: Box::new(output),
        })
    }

    /// Strips newline, tab and space bytes from the extracted payload.
    pub fn sanitized(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Path of the recording artifact.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    fn write_sample(&mut self, amplitude: i16) -> Result<(), hound::Error> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        if self.spec.bits_per_sample == 8 {
            writer.write_sample((amplitude >> 8) as i8)
        } else {
            writer.write_sample(amplitude)
        }
    }

    fn extraction_fault(&self, reason: impl Into<String>) -> CaptureError {
        CaptureError::ExtractionFault {
            path: self.artifact.clone(),
            reason: reason.into(),
        }
    }
}

impl SampleSink for AudioSampleSink {
    fn begin(&mut self) -> Result<(), CaptureError> {
        let writer = WavWriter::create(&self.artifact, self.spec).map_err(|e| {
            CaptureError::DeliveryFault(format!(
                "cannot start recording to {}: {}",
                self.artifact.display(),
                e
            ))
        })?;
        self.writer = Some(writer);
        self.carry = None;
        Ok(())
    }

    fn deliver(&mut self, sample: &Sample) -> Result<(), CaptureError> {
        let mut bytes = sample.bytes();

        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    self.write_sample(i16::from_le_bytes([low, high]))
                        .map_err(|e| CaptureError::DeliveryFault(format!("encode error: {}", e)))?;
                    bytes = rest;
                }
                None => {
                    self.carry = Some(low);
                    return Ok(());
                }
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in pairs.by_ref() {
            self.write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CaptureError::DeliveryFault(format!("encode error: {}", e)))?;
        }
        self.carry = pairs.remainder().first().copied();
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CaptureError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| {
                CaptureError::DeliveryFault(format!("failed to finalize recording: {}", e))
            })?;
        }
        if self.carry.take().is_some() {
            tracing::trace!("Discarded trailing half sample");
        }
        tracing::info!(artifact = %self.artifact.display(), "Recording finished");

        let raw = std::fs::read(&self.artifact).map_err(|e| self.extraction_fault(e.to_string()))?;
        let body = strip_header(&raw).ok_or_else(|| {
            self.extraction_fault(format!(
                "artifact is {} bytes, shorter than the {}-byte header",
                raw.len(),
                HEADER_SKIP_BYTES
            ))
        })?;

        let payload = if self.sanitize {
            sanitize(body)
        } else {
            body.to_vec()
        };

        self.output.write_all(&payload)?;
        self.output.write_all(b"\n")?;
        self.output.flush()?;

        tracing::debug!(
            artifact_bytes = raw.len(),
            payload_bytes = payload.len(),
            "Audio payload extracted"
        );
        Ok(payload)
    }

    fn abandon(&mut self) {
        // Dropping the writer finalizes what was recorded; the artifact is
        // overwritten by the next window anyway.
        self.writer = None;
        self.carry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::{ScriptedDevice, Step};
    use crate::capture::{AudioQuality, CaptureSession, SessionConfig};
    use crate::sink::SharedOutput;
    use std::time::Duration;

    fn config(dir: &Path) -> AudioConfig {
        AudioConfig {
            artifact_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_artifact_created_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AudioSampleSink::with_output(&config(dir.path()), SharedOutput::default())
            .unwrap();

        assert!(sink.artifact().exists());
        assert_eq!(sink.artifact(), dir.path().join("sound.wav"));
    }

    #[test]
    fn test_payload_skips_exactly_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let mut sink = AudioSampleSink::with_output(&config(dir.path()), output.clone()).unwrap();
        let samples = pcm(&[0, 1, -1, i16::MAX, i16::MIN, 0x0A20]);

        sink.begin().unwrap();
        sink.deliver(&Sample::copy_from(&samples, 1)).unwrap();
        let payload = sink.finish().unwrap();

        let raw = std::fs::read(sink.artifact()).unwrap();
        assert_eq!(&raw[0..4], b"RIFF");
        assert_eq!(&raw[36..40], b"data");
        assert_eq!(raw.len() - HEADER_SKIP_BYTES, payload.len());
        assert_eq!(payload, samples);

        let mut emitted = samples.clone();
        emitted.push(b'\n');
        assert_eq!(output.contents(), emitted);
    }

    #[test]
    fn test_samples_split_across_deliveries() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AudioSampleSink::with_output(&config(dir.path()), SharedOutput::default())
            .unwrap();
        let samples = pcm(&[0x1234, -2, 77]);

        sink.begin().unwrap();
        sink.deliver(&Sample::copy_from(&samples[..1], 1)).unwrap();
        sink.deliver(&Sample::copy_from(&samples[1..4], 2)).unwrap();
        sink.deliver(&Sample::copy_from(&samples[4..], 3)).unwrap();

        assert_eq!(sink.finish().unwrap(), samples);
    }

    #[test]
    fn test_low_quality_writes_one_byte_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let config = AudioConfig {
            quality: AudioQuality::Low,
            ..config(dir.path())
        };
        let mut sink = AudioSampleSink::with_output(&config, SharedOutput::default()).unwrap();

        sink.begin().unwrap();
        sink.deliver(&Sample::copy_from(&pcm(&[100, 200, 300, 400]), 1))
            .unwrap();

        assert_eq!(sink.finish().unwrap().len(), 4);
    }

    #[test]
    fn test_sanitized_audio_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AudioSampleSink::with_output(&config(dir.path()), SharedOutput::default())
            .unwrap()
            .sanitized(true);

        sink.begin().unwrap();
        sink.deliver(&Sample::copy_from(b" A\tB\n", 1)).unwrap();
        // The fifth byte is half a sample and is not recorded.
        assert_eq!(sink.finish().unwrap(), b"AB");
    }

    #[test]
    fn test_short_artifact_is_extraction_fault() {
        assert!(strip_header(&[0u8; HEADER_SKIP_BYTES - 1]).is_none());
        assert_eq!(strip_header(&[0u8; HEADER_SKIP_BYTES]), Some(&[][..]));

        let dir = tempfile::tempdir().unwrap();
        let mut sink = AudioSampleSink::with_output(&config(dir.path()), SharedOutput::default())
            .unwrap();
        // Finishing without recording leaves the empty artifact from
        // construction in place.
        assert!(matches!(
            sink.finish(),
            Err(CaptureError::ExtractionFault { .. })
        ));
    }

    #[test]
    fn test_session_round_trip_without_carryover() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let sink = AudioSampleSink::with_output(&config(dir.path()), output.clone()).unwrap();
        let device = ScriptedDevice::windows(vec![
            vec![Step::Frame(pcm(&[1, 2, 3]))],
            vec![Step::Frame(pcm(&[4]))],
        ]);
        let mut session = CaptureSession::new(device, sink, &SessionConfig::default());

        let first = session.capture(Duration::from_millis(100)).unwrap();
        let second = session.capture(Duration::from_millis(100)).unwrap();

        assert_eq!(first.as_bytes(), pcm(&[1, 2, 3]));
        assert_eq!(second.as_bytes(), pcm(&[4]));
    }

    #[test]
    fn test_zero_window_leaves_next_window_clean() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let sink = AudioSampleSink::with_output(&config(dir.path()), output.clone()).unwrap();
        let artifact = sink.artifact().to_path_buf();
        let device = ScriptedDevice::new(vec![Step::Frame(pcm(&[1, 2]))]);
        let (starts, _stops) = device.counters();
        let mut session = CaptureSession::new(device, sink, &SessionConfig::default());

        let empty = session.capture(Duration::ZERO).unwrap();
        assert!(empty.is_empty());
        assert_eq!(starts.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(output.contents().is_empty());
        // Only the header was written before the window was discarded.
        assert_eq!(std::fs::read(&artifact).unwrap().len(), HEADER_SKIP_BYTES);

        let next = session.capture(Duration::from_millis(100)).unwrap();
        assert_eq!(next.as_bytes(), [1, 0, 2, 0]);
        assert_eq!(output.contents(), [1, 0, 2, 0, b'\n']);
    }

    #[test]
    fn test_collect_across_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AudioSampleSink::with_output(&config(dir.path()), SharedOutput::default())
            .unwrap();
        let device = ScriptedDevice::windows(vec![
            vec![Step::Frame(pcm(&[1, 2]))],
            vec![Step::Frame(pcm(&[3, 4]))],
        ]);
        let mut session = CaptureSession::new(device, sink, &SessionConfig::default());

        let payload = session.collect(6, Duration::from_millis(100)).unwrap();

        assert_eq!(payload.as_bytes(), [1, 0, 2, 0, 3, 0]);
        assert_eq!(payload.report().windows, 2);
    }

    #[test]
    fn test_session_fault_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let sink = AudioSampleSink::with_output(&config(dir.path()), output.clone()).unwrap();
        let device = ScriptedDevice::new(vec![
            Step::Frame(pcm(&[1, 2])),
            Step::Fault("encode error".into()),
        ]);
        let mut session = CaptureSession::new(device, sink, &SessionConfig::default());

        assert!(matches!(
            session.capture(Duration::from_millis(100)),
            Err(CaptureError::DeliveryFault(_))
        ));
        assert!(output.contents().is_empty());
    }
}
