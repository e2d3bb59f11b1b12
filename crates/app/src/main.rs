use std::{
    io::Write,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use bandscope_core::{
    AppConfig, BandscopeError, Readiness, SpectrumFrame, SpectrumPipeline, ToneGenerator,
    TransformBackend,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const BAR_GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn main() -> bandscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.analyzer.resolve()?;

    match cli.command {
        Commands::Live {
            signal,
            seconds,
            fps,
        } => run_live(&config, &signal, seconds, fps),
        Commands::Snapshot {
            signal,
            seconds,
            output,
        } => run_snapshot(&config, &signal, seconds, output.as_ref()),
    }
}

/// Emulates a capture device on one thread and a render loop on another.
fn run_live(
    config: &AppConfig,
    signal: &SignalArgs,
    seconds: f32,
    fps: u32,
) -> bandscope_core::Result<()> {
    let run_for = run_duration(seconds)?;
    let pipeline = SpectrumPipeline::new(&config.analyzer)?;
    tracing::info!(
        tone = signal.tone,
        seconds,
        fps,
        backend = pipeline.backend_name(),
        "starting live mode"
    );

    let (mut producer, mut consumer) = pipeline.split();
    let mut source = signal.generator(config);
    let block_frames = config.audio.block_size;
    let block_period =
        Duration::from_secs_f64(block_frames as f64 / config.audio.sample_rate as f64);
    let frame_period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let stop = AtomicBool::new(false);

    let started = Instant::now();
    let deadline = started.checked_add(run_for).ok_or_else(|| {
        BandscopeError::invalid_config(format!("--seconds {seconds} is too far in the future"))
    })?;

    thread::scope(|scope| {
        scope.spawn(|| {
            let mut block = vec![0.0f32; block_frames * source.channels()];
            let mut next = Instant::now();
            while !stop.load(Ordering::Relaxed) {
                source.fill(&mut block);
                producer.push(&block);
                next += block_period;
                thread::sleep(next.saturating_duration_since(Instant::now()));
            }
        });

        let mut frame = SpectrumFrame::default();
        let mut last_report = started;
        let mut stdout = std::io::stdout();

        while Instant::now() < deadline {
            if consumer.snapshot(&mut frame) == Readiness::Ready {
                let _ = write!(stdout, "\r{} {:>5.3}", render_bars(&frame.bands), frame.level);
                let _ = stdout.flush();
            }
            if last_report.elapsed() >= Duration::from_secs(1) {
                tracing::info!(frame = frame.index, level = frame.level, "render loop");
                last_report = Instant::now();
            }
            thread::sleep(frame_period);
        }

        stop.store(true, Ordering::Relaxed);
    });

    println!();
    Ok(())
}

/// Feeds a fixed stretch of signal, computes once and prints the frame as JSON.
fn run_snapshot(
    config: &AppConfig,
    signal: &SignalArgs,
    seconds: f32,
    output: Option<&PathBuf>,
) -> bandscope_core::Result<()> {
    tracing::info!(tone = signal.tone, seconds, ?output, "taking spectrum snapshot");

    let run_for = run_duration(seconds)?;
    let mut pipeline = SpectrumPipeline::new(&config.analyzer)?;
    let mut source = signal.generator(config);
    let total_frames = (run_for.as_secs_f64() * config.audio.sample_rate as f64) as usize;
    let mut block = vec![0.0f32; config.audio.block_size * source.channels()];

    let mut remaining = total_frames;
    while remaining > 0 {
        let frames = remaining.min(config.audio.block_size);
        let block = &mut block[..frames * source.channels()];
        source.fill(block);
        pipeline.push(block);
        remaining -= frames;
    }

    let mut frame = SpectrumFrame::default();
    if pipeline.snapshot(&mut frame) == Readiness::Filling {
        return Err(format!(
            "{seconds}s of audio is not enough to fill a {}-sample window",
            pipeline.fft_size()
        )
        .into());
    }

    let json = serde_json::to_string_pretty(&frame)?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Converts `--seconds` into a run length. Negative, non-finite and
/// unrepresentable values are rejected before any thread is started.
fn run_duration(seconds: f32) -> bandscope_core::Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .map_err(|err| BandscopeError::invalid_config(format!("--seconds {seconds}: {err}")))
}

fn render_bars(bands: &[f32]) -> String {
    bands
        .iter()
        .map(|value| {
            let index = (value.clamp(0.0, 1.0) * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[index]
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Log-spaced audio spectrum pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    analyzer: AnalyzerArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Configuration file plus command line overrides.
#[derive(Args, Debug)]
struct AnalyzerArgs {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Requested transform length, rounded up to a power of two.
    #[arg(long, global = true)]
    fft_size: Option<usize>,
    /// Number of logarithmic bands.
    #[arg(long, global = true)]
    bands: Option<usize>,
    /// Transform backend: auto, fft or direct.
    #[arg(long, global = true)]
    backend: Option<TransformBackend>,
}

impl AnalyzerArgs {
    fn resolve(&self) -> bandscope_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::live_defaults(),
        };
        if let Some(fft_size) = self.fft_size {
            config.analyzer.fft_size = fft_size;
        }
        if let Some(bands) = self.bands {
            config.analyzer.bands = bands;
        }
        if let Some(backend) = self.backend {
            config.analyzer.backend = backend;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct SignalArgs {
    /// Frequency of the synthetic input tone in Hz.
    #[arg(long, default_value_t = 440.0)]
    tone: f64,
    /// Peak amplitude of the tone. Zero feeds silence.
    #[arg(long, default_value_t = 0.5)]
    amplitude: f32,
}

impl SignalArgs {
    fn generator(&self, config: &AppConfig) -> ToneGenerator {
        ToneGenerator::new(
            self.tone,
            self.amplitude,
            config.audio.sample_rate,
            config.analyzer.channels,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline in real time against a synthetic capture thread.
    Live {
        #[command(flatten)]
        signal: SignalArgs,
        /// How long to run.
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,
        /// Render loop rate.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
    /// Analyse a stretch of synthetic audio offline and print one frame.
    Snapshot {
        #[command(flatten)]
        signal: SignalArgs,
        /// Seconds of audio to push before computing.
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
        /// Write the JSON frame here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
