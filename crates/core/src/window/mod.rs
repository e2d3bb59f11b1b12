use std::f32::consts::PI;

/// Precomputed Hann attenuation coefficients, one per transform sample.
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTable {
    coefficients: Box<[f32]>,
}

impl WindowTable {
    /// Builds a `len`-point Hann table, `0.5 - 0.5 cos(2πi / (len - 1))`.
    pub fn hann(len: usize) -> Self {
        Self {
            coefficients: (0..len).map(|index| hann_value(index, len)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Writes `input[i] * w[i]` into `out`. Both slices must match the table
    /// length.
    pub fn apply(&self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), self.len());
        debug_assert_eq!(out.len(), self.len());

        for ((slot, sample), weight) in out.iter_mut().zip(input).zip(self.coefficients.iter()) {
            *slot = sample * weight;
        }
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
