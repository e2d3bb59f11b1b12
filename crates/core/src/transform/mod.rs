//! Windowed block → linear magnitude spectrum.
//!
//! Backends are interchangeable strategies behind [`SpectralTransform`]. The
//! direct transform is always compiled in so a pipeline can always be built;
//! the FFT backend is only available with the `realfft` feature.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{BandscopeError, Result};

mod direct;
#[cfg(feature = "realfft")]
mod fft;

pub use direct::DirectTransform;
#[cfg(feature = "realfft")]
pub use fft::RealFftTransform;

/// Converts a windowed time-domain block of `len()` samples into `bins()`
/// magnitudes, `|X[k]|` for `k` in `0..len()/2`.
pub trait SpectralTransform: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Transform length in samples.
    fn len(&self) -> usize;

    fn bins(&self) -> usize {
        self.len() / 2
    }

    /// `windowed` must hold `len()` samples and `out` exactly `bins()` slots.
    fn magnitudes(&mut self, windowed: &[f32], out: &mut [f32]) -> Result<()>;
}

/// Which backend a pipeline should try to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformBackend {
    /// The FFT when compiled in, otherwise the direct transform.
    #[default]
    Auto,
    /// Ask for the FFT explicitly. Falls back with a warning when missing.
    Fft,
    /// Always use the portable O(N²) transform.
    Direct,
}

impl fmt::Display for TransformBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Fft => "fft",
            Self::Direct => "direct",
        };
        f.write_str(name)
    }
}

impl FromStr for TransformBackend {
    type Err = BandscopeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "fft" => Ok(Self::Fft),
            "direct" => Ok(Self::Direct),
            other => Err(BandscopeError::invalid_config(format!(
                "unknown transform backend `{other}` (expected auto, fft or direct)"
            ))),
        }
    }
}

/// Builds the transform for `backend`. Never fails: an unavailable
/// accelerated backend degrades to [`DirectTransform`].
pub fn build_transform(backend: TransformBackend, len: usize) -> Box<dyn SpectralTransform> {
    if backend == TransformBackend::Direct {
        return Box::new(DirectTransform::new(len));
    }

    match accelerated(len) {
        Ok(transform) => transform,
        Err(err) => {
            if backend == TransformBackend::Fft {
                tracing::warn!(%err, len, "falling back to direct transform");
            } else {
                tracing::debug!(%err, len, "using direct transform");
            }
            Box::new(DirectTransform::new(len))
        }
    }
}

#[cfg(feature = "realfft")]
fn accelerated(len: usize) -> Result<Box<dyn SpectralTransform>> {
    if len < 2 {
        return Err(BandscopeError::BackendUnavailable(format!(
            "fft needs at least two samples, got {len}"
        )));
    }
    Ok(Box::new(RealFftTransform::new(len)))
}

#[cfg(not(feature = "realfft"))]
fn accelerated(_len: usize) -> Result<Box<dyn SpectralTransform>> {
    Err(BandscopeError::BackendUnavailable(
        "built without the `realfft` feature".to_string(),
    ))
}
