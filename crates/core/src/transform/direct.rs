use std::f64::consts::PI;

use super::SpectralTransform;
use crate::Result;

/// Portable direct-summation DFT. O(N²) per block, but has no dependencies,
/// and its output is bit-for-bit reproducible for a given input.
#[derive(Debug, Clone)]
pub struct DirectTransform {
    len: usize,
    /// `cos(2πm/N)` and `sin(2πm/N)` for `m` in `0..N`.
    cos: Box<[f64]>,
    sin: Box<[f64]>,
}

impl DirectTransform {
    pub fn new(len: usize) -> Self {
        let angle = |m: usize| 2.0 * PI * m as f64 / len as f64;
        Self {
            len,
            cos: (0..len).map(|m| angle(m).cos()).collect(),
            sin: (0..len).map(|m| angle(m).sin()).collect(),
        }
    }

    /// Infallible form of [`SpectralTransform::magnitudes`].
    pub fn compute(&self, windowed: &[f32], out: &mut [f32]) {
        debug_assert_eq!(windowed.len(), self.len);
        debug_assert_eq!(out.len(), self.len / 2);

        for (k, slot) in out.iter_mut().enumerate() {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            // (k * n) mod N, advanced incrementally to stay inside the table.
            let mut phase = 0usize;
            for &sample in windowed {
                let sample = sample as f64;
                re += sample * self.cos[phase];
                im -= sample * self.sin[phase];
                phase += k;
                if phase >= self.len {
                    phase -= self.len;
                }
            }
            *slot = (re * re + im * im).sqrt() as f32;
        }
    }
}

impl SpectralTransform for DirectTransform {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn len(&self) -> usize {
        self.len
    }

    fn magnitudes(&mut self, windowed: &[f32], out: &mut [f32]) -> Result<()> {
        self.compute(windowed, out);
        Ok(())
    }
}
