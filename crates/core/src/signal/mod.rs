//! Synthetic interleaved audio, standing in for a capture device.

use std::f64::consts::TAU;

/// Phase-continuous sine generator that fills interleaved blocks with the same
/// value on every channel. An amplitude of zero produces silence.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    channels: usize,
    phase: f64,
}

impl ToneGenerator {
    /// A tone of `frequency` Hz and peak `amplitude`, written to `channels`
    /// interleaved channels at `sample_rate`. Zero channels is treated as one.
    pub fn new(frequency: f64, amplitude: f32, sample_rate: u32, channels: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            channels: channels.max(1),
            phase: 0.0,
        }
    }

    /// Stereo silence.
    pub fn silence(sample_rate: u32) -> Self {
        Self::new(0.0, 0.0, sample_rate, 2)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fills `out` with whole frames; a trailing partial frame is zeroed.
    pub fn fill(&mut self, out: &mut [f32]) {
        let step = TAU * self.frequency / self.sample_rate.max(1) as f64;
        let mut frames = out.chunks_exact_mut(self.channels);

        for frame in &mut frames {
            let value = self.amplitude * self.phase.sin() as f32;
            frame.fill(value);
            self.phase = (self.phase + step) % TAU;
        }
        frames.into_remainder().fill(0.0);
    }

    /// Allocates and fills a block of `frames` frames.
    pub fn block(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels];
        self.fill(&mut out);
        out
    }
}
