//! target-locator CLI: replay, single-image detection and synthetic frames.

use std::path::{Path, PathBuf};
use std::sync::mpsc::sync_channel;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use nalgebra::Vector3;
use target_locator::core::Pose;
use target_locator::supervisor::{supervise, RestartPolicy};
use target_locator::synthetic::render_target;
use target_locator::{
    CaptureSettings, DebugFrame, FrameSource, ImageSequenceSource, LocatorConfig, OutputSink,
    Pipeline, PipelineError, ProcessExit, ReadingMessage, SharedYaw, TargetLocator,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "target-locator")]
#[command(about = "Locate a color-coded planar target and report bearing, distance and field position")]
#[command(version)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    /// Emit logs through `tracing` as JSON (requires the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a directory of images through a supervised pipeline, printing
    /// one JSON reading per line.
    Run(RunArgs),

    /// Locate the target in a single image.
    Detect(DetectArgs),

    /// Render a synthetic frame of the configured target.
    Synth(SynthArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct ConfigArg {
    /// JSON config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ConfigArg {
    fn load(&self) -> CliResult<LocatorConfig> {
        match &self.config {
            Some(path) => Ok(LocatorConfig::load_json(path)?),
            None => Ok(LocatorConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Directory of png/jpeg frames, replayed in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Restart from the first frame instead of failing at the end.
    #[arg(long = "loop")]
    looping: bool,

    /// Stop after this many frames have been read (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_frames: u64,

    /// Restarts granted after the pipeline exits.
    #[arg(long, default_value_t = 0)]
    max_restarts: usize,

    /// Delay before each restart, milliseconds.
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Fixed robot yaw, degrees.
    #[arg(long, default_value_t = 0.0)]
    yaw: f64,

    /// Write debug images (`<frame>_<label>.png`) into this directory.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArg,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Input image.
    #[arg(long)]
    image: PathBuf,

    /// Robot yaw at capture time, degrees.
    #[arg(long, default_value_t = 0.0)]
    yaw: f64,

    /// Write the annotated color frame here.
    #[arg(long)]
    annotated: Option<PathBuf>,

    /// Write the threshold mask here.
    #[arg(long)]
    mask: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArg,
}

#[derive(Debug, Clone, Args)]
struct SynthArgs {
    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Camera position in the field frame, target units.
    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    x: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    y: f64,
    #[arg(long, default_value_t = -0.3, allow_negative_numbers = true)]
    z: f64,

    /// Camera heading, degrees counter-clockwise from facing the target.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading: f64,

    #[command(flatten)]
    config: ConfigArg,
}

fn init_logging(level: LevelFilter, json: bool) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        tracing_log::LogTracer::init()?;
        target_locator::core::init_tracing(level, json)?;
    }
    #[cfg(not(feature = "tracing"))]
    {
        target_locator::core::init_with_level(level)?;
        if json {
            warn!("--log-json needs the `tracing` feature; using plain logs");
        }
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Detect(args) => detect(args),
        Commands::Synth(args) => synth(args),
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&LocatorConfig::default())?);
            Ok(())
        }
    }
}

/// Wraps the replay source to stop after a frame budget.
struct Limited {
    inner: ImageSequenceSource,
    remaining: Option<u64>,
}

impl FrameSource for Limited {
    fn configure(&mut self, settings: &CaptureSettings) {
        self.inner.configure(settings);
    }

    fn read(&mut self) -> Option<image::RgbImage> {
        if let Some(left) = self.remaining.as_mut() {
            if *left == 0 {
                return None;
            }
            *left -= 1;
        }
        self.inner.read()
    }
}

fn run(args: RunArgs) -> CliResult<()> {
    let config = args.config.load()?;
    let locator = TargetLocator::from_config(&config)?;
    let yaw = SharedYaw::new(args.yaw);

    let (target_tx, target_rx) = sync_channel(config.channels.target_capacity);
    let (debug_tx, debug_rx) = sync_channel::<DebugFrame>(config.channels.debug_capacity);

    let printer = thread::Builder::new()
        .name("readings".to_string())
        .spawn(move || {
            for reading in target_rx {
                let msg = ReadingMessage::from(reading);
                match serde_json::to_string(&msg) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("failed to encode reading: {e}"),
                }
            }
        })?;

    let debug_dir = args.debug_dir.clone();
    if let Some(dir) = &debug_dir {
        std::fs::create_dir_all(dir)?;
    }
    let debug_writer = thread::Builder::new()
        .name("debug".to_string())
        .spawn(move || {
            for frame in debug_rx {
                if let Some(dir) = &debug_dir {
                    save_debug(dir, &frame);
                }
            }
        })?;

    let policy = RestartPolicy {
        max_restarts: args.max_restarts,
        backoff: Duration::from_millis(args.backoff_ms),
    };
    let max_frames = (args.max_frames > 0).then_some(args.max_frames);
    let exit = supervise(
        "locator",
        move |attempt| {
            info!("starting pipeline (attempt {attempt})");
            let source = Limited {
                inner: ImageSequenceSource::open(&args.frames, args.looping)?,
                remaining: max_frames,
            };
            Ok(Pipeline::new(
                source,
                &config.capture,
                locator.clone(),
                OutputSink::new(target_tx.clone(), debug_tx.clone()),
                yaw.clone(),
                config.debug_period,
            ))
        },
        policy,
    )?;

    let _ = printer.join();
    let _ = debug_writer.join();

    match exit {
        ProcessExit::Fault(PipelineError::NoFrame { frame }) => {
            info!("replay finished after {} frames", frame - 1);
            Ok(())
        }
        other => Err(other.into()),
    }
}

fn save_debug(dir: &Path, frame: &DebugFrame) {
    let path = dir.join(format!("{:06}_{}.png", frame.frame, frame.label));
    if let Err(e) = frame.image.save(&path) {
        warn!("failed to write {}: {e}", path.display());
    }
}

fn detect(args: DetectArgs) -> CliResult<()> {
    let config = args.config.load()?;
    let locator = TargetLocator::from_config(&config)?;
    let frame = image::open(&args.image)?.to_rgb8();
    info!(
        "loaded {} ({}x{})",
        args.image.display(),
        frame.width(),
        frame.height()
    );

    let report = locator.locate(&frame, args.yaw);
    info!("detection: {:?}", report.detection);
    if let Some(path) = &args.annotated {
        report.annotated.save(path)?;
    }
    if let Some(path) = &args.mask {
        report.mask.save(path)?;
    }

    let msg = ReadingMessage::from(report.detection.reading());
    println!("{}", serde_json::to_string(&msg)?);
    Ok(())
}

fn synth(args: SynthArgs) -> CliResult<()> {
    let config = args.config.load()?;
    let pose = Pose::from_camera_placement(Vector3::new(args.x, args.y, args.z), args.heading);
    let frame = render_target(
        &config.camera,
        &config.target,
        &pose,
        config.capture.width,
        config.capture.height,
    );
    frame.save(&args.out)?;
    info!("wrote {}", args.out.display());
    Ok(())
}
