use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BandscopeError, Result, TransformBackend};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analyzer: AnalyzerConfig,
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Parses a JSON document. Missing sections and fields keep their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analyzer.validate()
    }
}

/// Configuration of the stream the device layer delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Frames per callback block.
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(BandscopeError::invalid_config("sample rate must be non-zero"));
        }
        if self.block_size == 0 {
            return Err(BandscopeError::invalid_config("block size must be non-zero"));
        }
        Ok(())
    }
}

/// Construction-time settings of a [`SpectrumPipeline`](crate::SpectrumPipeline).
/// None of these can change once the pipeline exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Requested transform length. Rounded up to the next power of two.
    pub fft_size: usize,
    /// Number of logarithmic output bands.
    pub bands: usize,
    /// Interleaved channels per frame handed to `push`.
    pub channels: usize,
    pub backend: TransformBackend,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            bands: 64,
            channels: 2,
            backend: TransformBackend::Auto,
        }
    }
}

impl AnalyzerConfig {
    pub fn new(fft_size: usize, bands: usize) -> Self {
        Self {
            fft_size,
            bands,
            ..Default::default()
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_backend(mut self, backend: TransformBackend) -> Self {
        self.backend = backend;
        self
    }

    /// The transform length actually used: the smallest power of two that is
    /// at least the requested size.
    pub fn effective_fft_size(&self) -> usize {
        self.fft_size.next_power_of_two()
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size == 0 {
            return Err(BandscopeError::invalid_config("fft size must be non-zero"));
        }
        if self.fft_size.checked_next_power_of_two().is_none() {
            return Err(BandscopeError::invalid_config(format!(
                "fft size {} is too large",
                self.fft_size
            )));
        }
        if self.bands == 0 {
            return Err(BandscopeError::invalid_config("band count must be non-zero"));
        }
        if self.channels == 0 {
            return Err(BandscopeError::invalid_config("channel count must be non-zero"));
        }
        Ok(())
    }
}
