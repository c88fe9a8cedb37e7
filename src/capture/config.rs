//! Capture device and session configuration.
//!
//! Device settings are fixed at construction. They are named here rather
//! than inlined so the session contract stays configuration-agnostic.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw pixel layout requested from the camera driver.
///
/// Only uncompressed layouts are offered: the payload is the first plane
/// exactly as the driver hands it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 4:2:2 luma/chroma, two bytes per pixel.
    Yuyv,
    /// Planar 4:2:0; the first plane is luma.
    Nv12,
    /// 8-bit luma only.
    Gray,
    /// Packed 24-bit RGB.
    Rgb,
}

/// Configuration for the image capture device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Camera device index.
    pub device_index: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel format of the first plane.
    pub pixel_format: PixelFormat,
    /// Target frames per second.
    pub fps: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        // Low-resolution profile.
        Self {
            device_index: 0,
            width: 192,
            height: 144,
            pixel_format: PixelFormat::Yuyv,
            fps: 15,
        }
    }
}

impl ImageConfig {
    /// Largest accepted frame edge, in pixels.
    pub const MAX_DIMENSION: u32 = 8192;

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0
            || self.height == 0
            || self.width > Self::MAX_DIMENSION
            || self.height > Self::MAX_DIMENSION
        {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }

    /// Size in bytes of one synthetic two-bytes-per-pixel plane.
    pub fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}

/// Container the audio recorder writes the artifact in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioContainer {
    /// RIFF/WAVE with integer PCM samples.
    Wav,
}

impl AudioContainer {
    /// File extension for artifacts in this container.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::Wav => "wav",
        }
    }
}

/// Encoder quality, expressed as PCM sample depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// 8-bit samples.
    Low,
    /// 16-bit samples.
    High,
}

impl AudioQuality {
    /// PCM sample depth written to the artifact.
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            AudioQuality::Low => 8,
            AudioQuality::High => 16,
        }
    }
}

/// Configuration for the audio recorder and its artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Artifact container.
    pub container: AudioContainer,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Encoder quality.
    pub quality: AudioQuality,
    /// Directory holding the artifact. Defaults to a per-process directory
    /// under the system temp dir.
    pub artifact_dir: Option<PathBuf>,
    /// Artifact file name, without extension.
    pub file_name: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            container: AudioContainer::Wav,
            sample_rate: 44_100,
            channels: 1,
            quality: AudioQuality::High,
            artifact_dir: None,
            file_name: "sound".to_string(),
        }
    }
}

impl AudioConfig {
    /// Validates the configuration parameters.
    ///
    /// Channel counts above two change the WAV header layout, which would
    /// silently shift the payload offset, so they are rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate < 8_000 || self.sample_rate > 192_000 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(ConfigError::InvalidChannels(self.channels));
        }
        if self.file_name.is_empty() || self.file_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidFileName(self.file_name.clone()));
        }
        Ok(())
    }

    /// Resolves the artifact path.
    pub fn artifact_path(&self) -> PathBuf {
        let dir = self.artifact_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("sensor-entropy-{}", std::process::id()))
        });
        dir.join(format!("{}.{}", self.file_name, self.container.extension()))
    }
}

/// When the image sink writes sanitized frames to the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Each frame is written as it arrives.
    #[default]
    Streaming,
    /// The whole payload is written once, after a successful stop.
    Buffered,
}

/// Session-level settings shared by both sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the delivery queue between device and worker.
    pub queue_depth: usize,
    /// Default image capture window, in whole seconds.
    pub image_duration_secs: u64,
    /// Default audio capture window, in whole seconds.
    pub audio_duration_secs: u64,
    /// When the image sink writes frames to the output channel.
    pub emit: EmitMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            image_duration_secs: 1,
            audio_duration_secs: 2,
            emit: EmitMode::Streaming,
        }
    }
}

impl SessionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }
        Ok(())
    }

    /// Default image capture window.
    pub fn image_duration(&self) -> Duration {
        Duration::from_secs(self.image_duration_secs)
    }

    /// Default audio capture window.
    pub fn audio_duration(&self) -> Duration {
        Duration::from_secs(self.audio_duration_secs)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Zero or oversized frame edge.
    #[error("invalid frame dimensions (each edge must be 1-8192 pixels)")]
    InvalidDimensions,
    /// Frame rate outside 1-120.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// Sample rate outside 8-192 kHz.
    #[error("invalid sample rate {0} Hz (must be 8000-192000)")]
    InvalidSampleRate(u32),
    /// Channel count other than one or two.
    #[error("invalid channel count {0} (must be 1 or 2)")]
    InvalidChannels(u16),
    /// Empty file name, or one containing a path separator.
    #[error("invalid artifact file name {0:?}")]
    InvalidFileName(String),
    /// Zero-capacity delivery queue.
    #[error("delivery queue depth must be non-zero")]
    InvalidQueueDepth,
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[image]` section.
    #[serde(default)]
    pub image: ImageConfig,
    /// `[audio]` section.
    #[serde(default)]
    pub audio: AudioConfig,
    /// `[session]` section.
    #[serde(default)]
    pub session: SessionConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.image.validate()?;
        config.audio.validate()?;
        config.session.validate()?;
        Ok(config)
    }
}
