//! Image sample sink.
//!
//! Each delivered frame is the raw first plane of an image buffer. Frames
//! are sanitized one at a time and, in streaming mode, written to the
//! output channel as they arrive. The payload `capture` returns is the
//! concatenation of every sanitized frame in the window, so the returned
//! bytes and the emitted bytes are always the same run of characters.

use crate::capture::{CaptureError, EmitMode, Sample, SampleSink};
use std::io::Write;

use super::sanitize::sanitize_into;

/// Sink that sanitizes image frames and relays them to an output channel.
pub struct ImageSampleSink {
    output: Box<dyn Write + Send>,
    emit: EmitMode,
    accumulated: Vec<u8>,
    frames: u64,
    stripped: u64,
}

impl ImageSampleSink {
    /// Creates a sink emitting to standard output.
    pub fn new(emit: EmitMode) -> Self {
        Self::with_output(emit, std::io::stdout())
    }

    /// Creates a sink emitting to `output`.
    pub fn with_output(emit: EmitMode, output: impl Write + Send + 'static) -> Self {
        Self {
            output: Box::new(output),
            emit,
            accumulated: Vec::new(),
            frames: 0,
            stripped: 0,
        }
    }

    /// Frames consumed in the current or last window.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whitespace bytes removed in the current or last window.
    pub fn stripped(&self) -> u64 {
        self.stripped
    }
}

impl SampleSink for ImageSampleSink {
    fn begin(&mut self) -> Result<(), CaptureError> {
        self.accumulated.clear();
        self.frames = 0;
        self.stripped = 0;
        Ok(())
    }

    fn deliver(&mut self, sample: &Sample) -> Result<(), CaptureError> {
        let start = self.accumulated.len();
        self.stripped += sanitize_into(sample.bytes(), &mut self.accumulated) as u64;
        self.frames += 1;

        if self.emit == EmitMode::Streaming {
            self.output.write_all(&self.accumulated[start..])?;
            self.output.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.emit == EmitMode::Buffered {
            self.output.write_all(&self.accumulated)?;
        }
        self.output.write_all(b"\n")?;
        self.output.flush()?;

        tracing::debug!(
            frames = self.frames,
            stripped = self.stripped,
            bytes = self.accumulated.len(),
            "Image payload assembled"
        );
        Ok(std::mem::take(&mut self.accumulated))
    }

    fn abandon(&mut self) {
        self.accumulated.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SharedOutput;

    fn frame(bytes: &[u8], sequence: u64) -> Sample {
        Sample::copy_from(bytes, sequence)
    }

    #[test]
    fn test_streaming_emits_per_frame() {
        let output = SharedOutput::default();
        let mut sink = ImageSampleSink::with_output(EmitMode::Streaming, output.clone());

        sink.begin().unwrap();
        sink.deliver(&frame(b"AB CD", 1)).unwrap();
        assert_eq!(output.contents(), b"ABCD");

        sink.deliver(&frame(b"EF\tGH", 2)).unwrap();
        assert_eq!(output.contents(), b"ABCDEFGH");

        let payload = sink.finish().unwrap();
        assert_eq!(payload, b"ABCDEFGH");
        assert_eq!(output.contents(), b"ABCDEFGH\n");
        assert_eq!(sink.frames(), 2);
        assert_eq!(sink.stripped(), 2);
    }

    #[test]
    fn test_buffered_emits_on_finish_only() {
        let output = SharedOutput::default();
        let mut sink = ImageSampleSink::with_output(EmitMode::Buffered, output.clone());

        sink.begin().unwrap();
        sink.deliver(&frame(b"a b\nc", 1)).unwrap();
        assert!(output.contents().is_empty());

        assert_eq!(sink.finish().unwrap(), b"abc");
        assert_eq!(output.contents(), b"abc\n");
    }

    #[test]
    fn test_begin_resets_window() {
        let mut sink = ImageSampleSink::with_output(EmitMode::Buffered, SharedOutput::default());

        sink.begin().unwrap();
        sink.deliver(&frame(b"stale", 1)).unwrap();
        sink.abandon();

        sink.begin().unwrap();
        sink.deliver(&frame(b"fresh", 1)).unwrap();
        assert_eq!(sink.finish().unwrap(), b"fresh");
        assert_eq!(sink.frames(), 1);
    }
}
