use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

const DECAY: f64 = 0.85;
const ATTACK: f64 = 0.15;

/// Producer-side loudness estimator.
///
/// Each block updates `level = level * 0.85 + rms * 0.15`, capped at 1, and
/// publishes it with a relaxed store. Readers may lag by one block.
#[derive(Debug)]
pub struct LevelSmoother {
    shared: Arc<AtomicU32>,
    level: f32,
}

impl LevelSmoother {
    /// Creates a smoother at level 0 together with the reader that observes
    /// it.
    pub fn with_reader() -> (Self, LevelReader) {
        let shared = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        (
            Self {
                shared: shared.clone(),
                level: 0.0,
            },
            LevelReader { shared },
        )
    }

    /// Folds one block of mono samples into the level. An empty block leaves
    /// it unchanged.
    #[inline]
    pub fn observe<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = f32>,
    {
        let (sum, count) = samples
            .into_iter()
            .fold((0.0f64, 0usize), |(sum, count), s| (sum + (s as f64) * (s as f64), count + 1));
        if count == 0 {
            return;
        }

        let rms = (sum / count as f64).sqrt();
        self.level = ((self.level as f64) * DECAY + rms * ATTACK).min(1.0) as f32;
        self.shared.store(self.level.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

/// Read-only view of the smoothed loudness scalar.
#[derive(Debug, Clone)]
pub struct LevelReader {
    shared: Arc<AtomicU32>,
}

impl LevelReader {
    #[inline]
    pub fn level(&self) -> f32 {
        f32::from_bits(self.shared.load(Ordering::Relaxed))
    }
}
