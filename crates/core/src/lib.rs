//! Real-time audio-to-spectrum pipeline for music visualisers.
//!
//! An audio device callback pushes interleaved blocks into a
//! [`SpectrumProducer`]; a render loop asks the matching [`SpectrumConsumer`]
//! for a log-spaced, per-frame normalised band vector and a smoothed loudness
//! level. The two halves share a lock-free single-producer/single-consumer
//! ring, so the callback never blocks on the renderer.

pub mod bands;
pub mod config;
pub mod error;
pub mod level;
pub mod pipeline;
pub mod ring;
pub mod signal;
pub mod transform;
pub mod window;

pub use bands::BandMapper;
pub use config::{AnalyzerConfig, AppConfig, AudioConfig};
pub use error::{BandscopeError, Result};
pub use level::{LevelReader, LevelSmoother};
pub use pipeline::{Readiness, SpectrumConsumer, SpectrumFrame, SpectrumPipeline, SpectrumProducer};
pub use ring::{RingReader, RingWriter, SampleRing};
pub use signal::ToneGenerator;
#[cfg(feature = "realfft")]
pub use transform::RealFftTransform;
pub use transform::{build_transform, DirectTransform, SpectralTransform, TransformBackend};
pub use window::WindowTable;
