//! The object the audio callback and the render loop share.
//!
//! [`SpectrumPipeline`] owns both halves. Single-threaded callers can use it
//! directly; threaded callers [`split`](SpectrumPipeline::split) it into a
//! [`SpectrumProducer`] for the device callback and a [`SpectrumConsumer`] for
//! the render loop. Neither half is `Clone`, so there is exactly one writer and
//! one reader of the ring.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    build_transform, AnalyzerConfig, BandMapper, BandscopeError, DirectTransform, LevelReader,
    LevelSmoother, Result, RingReader, RingWriter, SampleRing, SpectralTransform, WindowTable,
};

/// Ring capacity as a multiple of the transform length.
const RING_WINDOWS: usize = 4;

/// Outcome of a `compute` call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Fewer than one transform length of samples has ever been pushed. The
    /// output was left untouched.
    Filling,
    /// The output holds a fresh band vector. Once reached, never left.
    Ready,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

/// What a render loop needs for one displayed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumFrame {
    /// Count of ready frames produced so far, starting at 1.
    pub index: u64,
    /// Smoothed loudness in `[0, 1]`.
    pub level: f32,
    /// Normalised band values, ascending frequency.
    pub bands: Vec<f32>,
}

/// Audio-thread half: downmixes, meters and stores incoming blocks.
#[derive(Debug)]
pub struct SpectrumProducer {
    ring: RingWriter,
    level: LevelSmoother,
    channels: usize,
}

impl SpectrumProducer {
    /// Ingests an interleaved block of `channels`-sample frames. Each frame is
    /// averaged to one mono sample; a trailing partial frame is dropped.
    ///
    /// Safe to call from a real-time callback: no locks, allocation, logging or
    /// system calls.
    #[inline]
    pub fn push(&mut self, interleaved: &[f32]) {
        let channels = self.channels;
        let downmix = move |frame: &[f32]| frame.iter().sum::<f32>() / channels as f32;

        self.level.observe(interleaved.chunks_exact(channels).map(downmix));
        self.ring.write(interleaved.chunks_exact(channels).map(downmix));
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Mono samples ingested since construction.
    pub fn total_samples(&self) -> u64 {
        self.ring.total_written()
    }
}

/// Render-thread half: turns the latest window of samples into bands.
pub struct SpectrumConsumer {
    ring: RingReader,
    level: LevelReader,
    window: WindowTable,
    transform: Box<dyn SpectralTransform>,
    mapper: BandMapper,
    block: Vec<f32>,
    windowed: Vec<f32>,
    magnitudes: Vec<f32>,
    frames: u64,
}

impl SpectrumConsumer {
    /// Computes the band vector for the most recent transform window into
    /// `out`, resized to the band count. Leaves `out` alone while filling.
    pub fn compute(&mut self, out: &mut Vec<f32>) -> Readiness {
        if !self.ring.copy_latest(&mut self.block) {
            return Readiness::Filling;
        }

        self.window.apply(&self.block, &mut self.windowed);
        self.transform_block();
        self.mapper.map(&self.magnitudes, out);
        Readiness::Ready
    }

    /// Fills a reusable frame with the current level and, when ready, a new
    /// band vector. While filling the previous bands are kept.
    pub fn snapshot(&mut self, frame: &mut SpectrumFrame) -> Readiness {
        frame.level = self.level();
        let readiness = self.compute(&mut frame.bands);
        if readiness.is_ready() {
            self.frames += 1;
            frame.index = self.frames;
        }
        readiness
    }

    /// Current smoothed loudness. May lag the producer by one block.
    pub fn level(&self) -> f32 {
        self.level.level()
    }

    /// A cloneable handle to the loudness scalar for other readers.
    pub fn level_reader(&self) -> LevelReader {
        self.level.clone()
    }

    pub fn readiness(&self) -> Readiness {
        if self.ring.total_written() >= self.block.len() as u64 {
            Readiness::Ready
        } else {
            Readiness::Filling
        }
    }

    pub fn fft_size(&self) -> usize {
        self.block.len()
    }

    pub fn band_count(&self) -> usize {
        self.mapper.len()
    }

    pub fn band_mapper(&self) -> &BandMapper {
        &self.mapper
    }

    pub fn backend_name(&self) -> &'static str {
        self.transform.name()
    }

    /// Runs the active backend. A failing backend is replaced by the direct
    /// transform for the rest of the consumer's life, and the block is redone
    /// with it.
    fn transform_block(&mut self) {
        let Err(err) = self.transform.magnitudes(&self.windowed, &mut self.magnitudes) else {
            return;
        };

        tracing::warn!(
            %err,
            backend = self.transform.name(),
            "spectral backend failed, switching to direct transform"
        );
        let fallback = DirectTransform::new(self.block.len());
        fallback.compute(&self.windowed, &mut self.magnitudes);
        self.transform = Box::new(fallback);
    }
}

impl fmt::Debug for SpectrumConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumConsumer")
            .field("fft_size", &self.fft_size())
            .field("bands", &self.band_count())
            .field("backend", &self.backend_name())
            .field("frames", &self.frames)
            .finish()
    }
}

/// Facade owning the ring, window table, transform backend and level meter.
#[derive(Debug)]
pub struct SpectrumPipeline {
    producer: SpectrumProducer,
    consumer: SpectrumConsumer,
}

impl SpectrumPipeline {
    /// Builds a pipeline with the backend requested in `config`.
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let transform = build_transform(config.backend, config.effective_fft_size());
        Self::with_transform(config, transform)
    }

    /// Builds a pipeline around a caller-supplied transform. Its length must
    /// equal the effective transform length of `config`.
    pub fn with_transform(
        config: &AnalyzerConfig,
        transform: Box<dyn SpectralTransform>,
    ) -> Result<Self> {
        config.validate()?;
        let fft_size = config.effective_fft_size();
        if transform.len() != fft_size {
            return Err(BandscopeError::invalid_config(format!(
                "transform `{}` has length {}, expected {fft_size}",
                transform.name(),
                transform.len()
            )));
        }

        let capacity = fft_size.checked_mul(RING_WINDOWS).ok_or_else(|| {
            BandscopeError::invalid_config(format!("fft size {fft_size} is too large"))
        })?;
        let (writer, reader) = SampleRing::with_capacity(capacity);
        let (smoother, level) = LevelSmoother::with_reader();
        let bins = fft_size / 2;

        tracing::info!(
            requested = config.fft_size,
            fft_size,
            bands = config.bands,
            channels = config.channels,
            backend = transform.name(),
            "spectrum pipeline ready"
        );

        Ok(Self {
            producer: SpectrumProducer {
                ring: writer,
                level: smoother,
                channels: config.channels,
            },
            consumer: SpectrumConsumer {
                ring: reader,
                level,
                window: WindowTable::hann(fft_size),
                transform,
                mapper: BandMapper::new(bins, config.bands),
                block: vec![0.0; fft_size],
                windowed: vec![0.0; fft_size],
                magnitudes: vec![0.0; bins],
                frames: 0,
            },
        })
    }

    pub fn push(&mut self, interleaved: &[f32]) {
        self.producer.push(interleaved);
    }

    pub fn compute(&mut self, out: &mut Vec<f32>) -> Readiness {
        self.consumer.compute(out)
    }

    pub fn snapshot(&mut self, frame: &mut SpectrumFrame) -> Readiness {
        self.consumer.snapshot(frame)
    }

    pub fn level(&self) -> f32 {
        self.consumer.level()
    }

    pub fn readiness(&self) -> Readiness {
        self.consumer.readiness()
    }

    pub fn fft_size(&self) -> usize {
        self.consumer.fft_size()
    }

    pub fn band_count(&self) -> usize {
        self.consumer.band_count()
    }

    /// Ring capacity in mono samples.
    pub fn capacity(&self) -> usize {
        self.producer.ring.capacity()
    }

    pub fn backend_name(&self) -> &'static str {
        self.consumer.backend_name()
    }

    pub fn band_mapper(&self) -> &BandMapper {
        self.consumer.band_mapper()
    }

    /// Hands out the two halves for use on separate threads.
    pub fn split(self) -> (SpectrumProducer, SpectrumConsumer) {
        (self.producer, self.consumer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::{ToneGenerator, TransformBackend};

    fn pipeline(fft_size: usize, bands: usize) -> SpectrumPipeline {
        SpectrumPipeline::new(&AnalyzerConfig::new(fft_size, bands)).unwrap()
    }

    struct FailingTransform {
        len: usize,
    }

    impl SpectralTransform for FailingTransform {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn len(&self) -> usize {
            self.len
        }

        fn magnitudes(&mut self, _windowed: &[f32], _out: &mut [f32]) -> Result<()> {
            Err(BandscopeError::BackendUnavailable("device lost".to_string()))
        }
    }

    #[test]
    fn sizes_follow_configuration() {
        let pipeline = pipeline(2000, 64);
        assert_eq!(pipeline.fft_size(), 2048);
        assert_eq!(pipeline.capacity(), 4 * 2048);
        assert_eq!(pipeline.band_count(), 64);
    }

    #[test]
    fn silent_stream_yields_zero_bands() {
        let mut pipeline = pipeline(2000, 64);
        let silence = vec![0.0f32; 1024 * 2];
        let mut bands = vec![0.5f32; 3];

        pipeline.push(&silence);
        assert_eq!(pipeline.compute(&mut bands), Readiness::Filling);
        assert_eq!(bands, vec![0.5; 3]);
        assert_eq!(pipeline.level(), 0.0);

        for _ in 0..3 {
            pipeline.push(&silence);
            assert_eq!(pipeline.compute(&mut bands), Readiness::Ready);
            assert_eq!(bands.len(), 64);
            assert!(bands.iter().all(|v| *v == 0.0));
            assert_eq!(pipeline.level(), 0.0);
        }
    }

    #[test]
    fn stays_filling_until_one_window_is_ingested() {
        let mut pipeline = pipeline(256, 16);
        let mut tone = ToneGenerator::new(1_000.0, 0.8, 48_000, 2);
        let mut bands = vec![-1.0f32; 16];

        for _ in 0..255 {
            pipeline.push(&tone.block(1));
            assert_eq!(pipeline.readiness(), Readiness::Filling);
            assert_eq!(pipeline.compute(&mut bands), Readiness::Filling);
        }
        assert_eq!(bands, vec![-1.0; 16]);

        pipeline.push(&tone.block(1));
        for _ in 0..3 {
            assert_eq!(pipeline.compute(&mut bands), Readiness::Ready);
        }
        assert_eq!(pipeline.readiness(), Readiness::Ready);
    }

    #[test]
    fn sine_energy_concentrates_in_its_band() {
        let mut pipeline = pipeline(2048, 64);
        let mut tone = ToneGenerator::new(440.0, 0.5, 48_000, 2);
        for _ in 0..48_000 / 1_000 {
            pipeline.push(&tone.block(1_000));
        }

        let mut bands = Vec::new();
        assert!(pipeline.compute(&mut bands).is_ready());

        let bin_hz = 48_000.0f64 / 2048.0;
        let mapper = pipeline.band_mapper();
        let tone_band = mapper.band_for_bin((440.0 / bin_hz).round() as usize).unwrap();
        let high_band = mapper.band_for_bin((18_000.0 / bin_hz) as usize).unwrap();

        assert!(bands[tone_band] > 0.8, "tone band {tone_band}: {}", bands[tone_band]);
        for (band, value) in bands.iter().enumerate().skip(high_band) {
            assert!(*value < 0.01, "band {band} near 20 kHz: {value}");
        }
        for (band, value) in bands.iter().enumerate().take(tone_band.saturating_sub(8)) {
            assert!(*value < bands[tone_band] * 0.1, "band {band}: {value}");
        }
        assert!(pipeline.level() > 0.3);
    }

    #[test]
    fn ready_frames_are_normalised() {
        let mut pipeline = pipeline(512, 24);
        let mut low = ToneGenerator::new(150.0, 0.9, 44_100, 2);
        let mut high = ToneGenerator::new(6_000.0, 0.2, 44_100, 2);
        let mut bands = Vec::new();

        for _ in 0..20 {
            let mixed: Vec<f32> = low
                .block(300)
                .iter()
                .zip(high.block(300))
                .map(|(a, b)| a + b)
                .collect();
            pipeline.push(&mixed);

            if pipeline.compute(&mut bands).is_ready() {
                assert_eq!(bands.len(), 24);
                assert!(bands.iter().all(|v| (0.0..=1.0).contains(v)));
                assert!(bands.iter().any(|v| *v == 1.0));
            }
        }
    }

    #[test]
    fn direct_backend_is_deterministic() {
        let config = AnalyzerConfig::new(256, 16).with_backend(TransformBackend::Direct);
        let mut first = SpectrumPipeline::new(&config).unwrap();
        let mut second = SpectrumPipeline::new(&config).unwrap();
        assert_eq!(first.backend_name(), "direct");

        let block = ToneGenerator::new(3_000.0, 0.6, 48_000, 2).block(700);
        first.push(&block);
        second.push(&block);

        let (mut a, mut b) = (Vec::new(), Vec::new());
        assert!(first.compute(&mut a).is_ready());
        assert!(second.compute(&mut b).is_ready());
        assert!(first.compute(&mut b).is_ready());

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn failing_backend_falls_back_to_direct() {
        let config = AnalyzerConfig::new(128, 8);
        let mut failing =
            SpectrumPipeline::with_transform(&config, Box::new(FailingTransform { len: 128 }))
                .unwrap();
        let direct_config = config.clone().with_backend(TransformBackend::Direct);
        let mut direct = SpectrumPipeline::new(&direct_config).unwrap();
        assert_eq!(failing.backend_name(), "failing");

        let block = ToneGenerator::new(2_500.0, 0.5, 48_000, 2).block(256);
        failing.push(&block);
        direct.push(&block);

        let (mut a, mut b) = (Vec::new(), Vec::new());
        assert_eq!(failing.compute(&mut a), Readiness::Ready);
        assert_eq!(failing.backend_name(), "direct");
        assert!(direct.compute(&mut b).is_ready());
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_transform() {
        let config = AnalyzerConfig::new(100, 8);
        let err = SpectrumPipeline::with_transform(&config, Box::new(FailingTransform { len: 100 }))
            .unwrap_err();
        assert!(matches!(err, BandscopeError::InvalidConfig(_)));
    }

    #[test]
    fn downmixes_configured_channel_count() {
        let config = AnalyzerConfig::new(4, 2).with_channels(3);
        let (mut producer, _consumer) = SpectrumPipeline::new(&config).unwrap().split();

        // Two whole frames plus a partial one.
        producer.push(&[0.3, 0.6, 0.9, -1.0, -1.0, -1.0, 5.0]);
        assert_eq!(producer.total_samples(), 2);
        assert_eq!(producer.channels(), 3);

        let config = AnalyzerConfig::new(4, 2).with_channels(1);
        let mut mono = SpectrumPipeline::new(&config).unwrap();
        mono.push(&[1.0, 1.0, 1.0, 1.0]);
        assert!(mono.readiness().is_ready());
        assert!((mono.level() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn level_reader_follows_the_producer() {
        let (mut producer, consumer) = pipeline(64, 8).split();
        let reader = consumer.level_reader();
        assert_eq!(reader.level(), 0.0);

        producer.push(&[0.5; 32]);
        assert!((reader.level() - 0.075).abs() < 1e-6);
        assert_eq!(reader.level(), consumer.level());
        assert_eq!(reader.clone().level(), consumer.level());
    }

    #[test]
    fn single_sample_transform_degrades_to_zeros() {
        let mut pipeline = pipeline(1, 4);
        let mut bands = Vec::new();
        pipeline.push(&[0.5, 0.5]);
        assert!(pipeline.compute(&mut bands).is_ready());
        assert_eq!(bands, vec![0.0; 4]);
    }

    #[test]
    fn snapshot_keeps_bands_while_filling() {
        let mut pipeline = pipeline(64, 8);
        let mut frame = SpectrumFrame {
            bands: vec![0.25; 8],
            ..Default::default()
        };

        assert_eq!(pipeline.snapshot(&mut frame), Readiness::Filling);
        assert_eq!(frame.bands, vec![0.25; 8]);
        assert_eq!(frame.index, 0);

        pipeline.push(&ToneGenerator::new(5_000.0, 0.5, 48_000, 2).block(64));
        assert!(pipeline.snapshot(&mut frame).is_ready());
        assert!(pipeline.snapshot(&mut frame).is_ready());
        assert_eq!(frame.index, 2);
        assert!(frame.level > 0.0);
        assert_eq!(frame.level, pipeline.level());
    }

    #[test]
    fn producer_and_consumer_run_on_separate_threads() {
        let config = AnalyzerConfig::new(512, 32);
        let (mut producer, mut consumer) = SpectrumPipeline::new(&config).unwrap().split();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut tone = ToneGenerator::new(880.0, 0.7, 48_000, 2);
                let mut block = vec![0.0f32; 128 * 2];
                for _ in 0..400 {
                    tone.fill(&mut block);
                    producer.push(&block);
                }
                done.store(true, Ordering::Release);
            });

            let mut bands = Vec::new();
            let mut ready_seen = false;
            loop {
                let finished = done.load(Ordering::Acquire);
                match consumer.compute(&mut bands) {
                    Readiness::Ready => {
                        ready_seen = true;
                        assert_eq!(bands.len(), 32);
                        assert!(bands.iter().all(|v| (0.0..=1.0).contains(v)));
                        assert!((0.0..=1.0).contains(&consumer.level()));
                    }
                    Readiness::Filling => assert!(!ready_seen, "went back to filling"),
                }
                if finished {
                    break;
                }
            }
            assert!(ready_seen);
        });
    }
}
