//! assembly-guide CLI: calibration checks, rectification, detection and replay.

use assembly_guide::core::{CalibrationQuad, Rectifier};
use assembly_guide::io::{canonical_to_image, draw_zone_outlines, load_rgb};
use assembly_guide::session::{
    CursorStore, Engine, EngineConfig, InMemoryCatalog, JsonCursorStore, MemoryCursorStore,
    ZoneView,
};
use assembly_guide::zones::{
    layout_page, GridLayout, OccupancyDetector, ZoneLayout, ZoneShape, ZoneSize,
};
use assembly_guide::{replay, ReplayOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "assembly-guide")]
#[command(about = "Calibrate, rectify and detect occupied zones for projected assembly guides")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve and print the canonical-to-frame homography for a calibration.
    Homography {
        /// Capture frame width in pixels.
        #[arg(long)]
        frame_width: usize,
        /// Capture frame height in pixels.
        #[arg(long)]
        frame_height: usize,
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Print the zones of a grid layout.
    Layout {
        #[command(flatten)]
        grid: GridArgs,
        /// Only print this page.
        #[arg(long)]
        page: Option<usize>,
        /// Engine config JSON (canonical size).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rectify a camera frame into canonical space and write it as an image.
    Rectify {
        /// Input camera frame.
        #[arg(long)]
        image: PathBuf,
        /// Output image path.
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Score the zones of one page on a single camera frame.
    Detect {
        /// Input camera frame.
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        /// Page to score.
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Write the rectified frame with zone outlines here.
        #[arg(long)]
        overlay: Option<PathBuf>,
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Replay a directory of frames through a preset and print transitions as JSON lines.
    Replay {
        /// Catalog JSON with presets, grid layouts and images.
        #[arg(long)]
        catalog: PathBuf,
        /// Preset to run.
        #[arg(long)]
        preset: String,
        /// Directory of frames, replayed in file-name order.
        #[arg(long)]
        frames: PathBuf,
        /// Simulated time between frames.
        #[arg(long, default_value_t = 200)]
        frame_interval_ms: u64,
        /// Simulated time to keep ticking after the last frame.
        #[arg(long, default_value_t = 0)]
        drain_ms: u64,
        /// Persist the session cursor here instead of in memory.
        #[arg(long)]
        cursor: Option<PathBuf>,
        #[command(flatten)]
        setup: SetupArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct SetupArgs {
    /// Calibration quad JSON; defaults to the 10%/90% quad.
    #[arg(long)]
    calibration: Option<PathBuf>,
    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl SetupArgs {
    fn load(&self) -> CliResult<(CalibrationQuad, EngineConfig)> {
        let quad = match &self.calibration {
            Some(path) => CalibrationQuad::load_json(path)?,
            None => CalibrationQuad::default(),
        };
        Ok((quad, load_config(self.config.as_deref())?))
    }
}

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    Ok(match path {
        Some(path) => EngineConfig::load_json(path)?,
        None => EngineConfig::default(),
    })
}

#[derive(Debug, Clone, Args)]
struct GridArgs {
    #[arg(long, value_enum)]
    shape: ShapeArg,
    #[arg(long, value_enum)]
    size: SizeArg,
    /// Number of items in the step.
    #[arg(long)]
    amount: usize,
}

impl GridArgs {
    fn to_layout(&self) -> GridLayout {
        GridLayout {
            shape: self.shape.to_core(),
            size: self.size.to_core(),
            amount: self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    Circle,
    Rectangle,
    Square,
}

impl ShapeArg {
    fn to_core(self) -> ZoneShape {
        match self {
            Self::Circle => ZoneShape::Circle,
            Self::Rectangle => ZoneShape::Rectangle,
            Self::Square => ZoneShape::Square,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SizeArg {
    Small,
    Medium,
    Large,
}

impl SizeArg {
    fn to_core(self) -> ZoneSize {
        match self {
            Self::Small => ZoneSize::Small,
            Self::Medium => ZoneSize::Medium,
            Self::Large => ZoneSize::Large,
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Homography {
            frame_width,
            frame_height,
            setup,
        } => run_homography(frame_width, frame_height, &setup),
        Commands::Layout { grid, page, config } => run_layout(&grid, page, config.as_deref()),
        Commands::Rectify { image, out, setup } => run_rectify(&image, &out, &setup),
        Commands::Detect {
            image,
            grid,
            page,
            overlay,
            setup,
        } => run_detect(&image, &grid, page, overlay.as_deref(), &setup),
        Commands::Replay {
            catalog,
            preset,
            frames,
            frame_interval_ms,
            drain_ms,
            cursor,
            setup,
        } => run_replay(
            &catalog,
            &preset,
            &frames,
            ReplayOptions {
                frame_interval: Duration::from_millis(frame_interval_ms),
                drain: Duration::from_millis(drain_ms),
            },
            cursor,
            &setup,
        ),
    }
}

#[cfg(feature = "tracing")]
fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    assembly_guide::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging() {
    let _ = assembly_guide::core::init_from_env(log::LevelFilter::Warn);
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_homography(frame_width: usize, frame_height: usize, setup: &SetupArgs) -> CliResult<()> {
    let (quad, config) = setup.load()?;
    let h = quad.canonical_to_frame(config.canonical, frame_width, frame_height)?;
    log::info!("solved homography for {frame_width}x{frame_height}");
    print_json(&serde_json::json!({
        "canonical": config.canonical,
        "frame": [frame_width, frame_height],
        "frame_from_canonical": h,
        "canonical_from_frame": h.inverse(),
    }))
}

fn run_layout(grid: &GridArgs, page: Option<usize>, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let layout = ZoneLayout::new(grid.to_layout(), config.canonical);
    let pages: Vec<usize> = match page {
        Some(p) => vec![p],
        None => (0..layout.page_count()).collect(),
    };
    let zones: Vec<_> = pages.iter().map(|&p| layout.page_zones(p)).collect();
    print_json(&serde_json::json!({
        "spec": layout.spec(),
        "page_count": layout.page_count(),
        "pages": zones,
    }))
}

fn build_rectifier(
    quad: &CalibrationQuad,
    config: &EngineConfig,
    frame_width: usize,
    frame_height: usize,
) -> CliResult<Rectifier> {
    Ok(Rectifier::from_quad(
        quad,
        config.canonical,
        frame_width,
        frame_height,
        config.photometric,
    )?)
}

fn run_rectify(image: &Path, out: &Path, setup: &SetupArgs) -> CliResult<()> {
    let (quad, config) = setup.load()?;
    let frame = load_rgb(image)?;
    let rectifier = build_rectifier(&quad, &config, frame.width, frame.height)?;
    let canonical = rectifier.rectify(&frame.view())?;
    canonical_to_image(&canonical, [0, 0, 0]).save(out)?;
    log::info!(
        "wrote {} ({} of {} pixels with data)",
        out.display(),
        canonical.valid_count(),
        canonical.width * canonical.height
    );
    Ok(())
}

fn run_detect(
    image: &Path,
    grid: &GridArgs,
    page: usize,
    overlay: Option<&Path>,
    setup: &SetupArgs,
) -> CliResult<()> {
    let (quad, config) = setup.load()?;
    let frame = load_rgb(image)?;
    let rectifier = build_rectifier(&quad, &config, frame.width, frame.height)?;
    let canonical = rectifier.rectify(&frame.view())?;

    let layout = grid.to_layout();
    let zones = layout_page(
        layout.shape,
        layout.size,
        page,
        layout.amount,
        config.canonical,
    );
    if zones.is_empty() {
        return Err(format!("page {page} has no zones").into());
    }
    let readings = OccupancyDetector::new(config.detector).detect(&canonical, &zones);

    if let Some(path) = overlay {
        let mut img = canonical_to_image(&canonical, [0, 0, 0]);
        let views: Vec<ZoneView> = zones
            .iter()
            .zip(&readings)
            .map(|(zone, r)| ZoneView {
                zone: *zone,
                occupied: r.occupied,
                completed: false,
            })
            .collect();
        draw_zone_outlines(&mut img, &views);
        img.save(path)?;
    }

    let occupied = readings.iter().filter(|r| r.occupied).count();
    log::info!("page {page}: {occupied} of {} zones occupied", readings.len());
    print_json(&readings)
}

fn list_frames(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    matches!(
                        e.to_ascii_lowercase().as_str(),
                        "png" | "jpg" | "jpeg" | "bmp"
                    )
                })
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn run_replay(
    catalog: &Path,
    preset: &str,
    frames_dir: &Path,
    options: ReplayOptions,
    cursor: Option<PathBuf>,
    setup: &SetupArgs,
) -> CliResult<()> {
    let (quad, config) = setup.load()?;
    let catalog = Arc::new(InMemoryCatalog::load_json(catalog)?);
    let store: Arc<dyn CursorStore> = match cursor {
        Some(path) => Arc::new(JsonCursorStore::new(path)),
        None => Arc::new(MemoryCursorStore::new()),
    };

    let paths = list_frames(frames_dir)?;
    let Some(first) = paths.first() else {
        return Err(format!("no frames in {}", frames_dir.display()).into());
    };
    let first = load_rgb(first)?;
    let rectifier = build_rectifier(&quad, &config, first.width, first.height)?;

    let start = Instant::now();
    let mut engine = Engine::start(config, catalog, store, preset, start)?;
    log::info!("replaying {} frames for preset {preset}", paths.len());

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        frames.push(load_rgb(path)?);
    }
    let events = replay(&mut engine, &rectifier, frames, options, start)?;
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
