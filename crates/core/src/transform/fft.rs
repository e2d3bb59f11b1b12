use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use super::SpectralTransform;
use crate::{BandscopeError, Result};

/// Real-input FFT backed by `realfft`. Buffers are planned once so a block
/// never allocates.
pub struct RealFftTransform {
    len: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl RealFftTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(len);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Self {
            len,
            plan,
            input,
            spectrum,
            scratch,
        }
    }
}

impl SpectralTransform for RealFftTransform {
    fn name(&self) -> &'static str {
        "realfft"
    }

    fn len(&self) -> usize {
        self.len
    }

    fn magnitudes(&mut self, windowed: &[f32], out: &mut [f32]) -> Result<()> {
        // The plan uses its input as scratch space, so it gets a copy.
        self.input.copy_from_slice(windowed);
        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|err| BandscopeError::BackendUnavailable(err.to_string()))?;

        for (slot, bin) in out.iter_mut().zip(&self.spectrum) {
            *slot = bin.norm();
        }
        Ok(())
    }
}

impl fmt::Debug for RealFftTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealFftTransform")
            .field("len", &self.len)
            .finish()
    }
}
