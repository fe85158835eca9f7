use std::{error::Error, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use freethrow::batch::phase_batch;
use freethrow::detect::load_gray;
use freethrow::pipeline::{calibrate_directory, rectify_side_by_side, triangulate_tables};
use freethrow::stereo::{KeypointUnits, StereoCalibration};
use freethrow::tables::write_phase_table;
use freethrow::{CalibrationPattern, PipelineConfig};

/// Stereo free-throw capture: calibration, rectification, triangulation and
/// phase segmentation.
#[derive(Debug, Parser)]
#[command(author, version, about = "Stereo free-throw motion capture pipeline")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON pipeline config; flags override its fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate the rig from side-by-side `pair_*.png` captures.
    Calibrate(CalibrateArgs),
    /// Write a rectified side-by-side QA image with epipolar lines.
    Rectify(RectifyArgs),
    /// Triangulate left and right keypoint tables into a 3D table.
    Triangulate(TriangulateArgs),
    /// Segment every `.mot` or 3D `.csv` throw in a directory.
    Phases(PhasesArgs),
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    #[arg(long)]
    images: PathBuf,
    /// Inner corners per row.
    #[arg(long)]
    cols: Option<usize>,
    /// Inner corners per column.
    #[arg(long)]
    rows: Option<usize>,
    /// Square edge length; every metric output inherits its unit.
    #[arg(long)]
    square: Option<f64>,
    #[arg(long, default_value = "stereo_calib.json")]
    out: PathBuf,
    /// Write the calibration even when its RMS exceeds the acceptance limit.
    #[arg(long)]
    accept_high_rms: bool,
}

#[derive(Debug, Args)]
struct RectifyArgs {
    #[arg(long)]
    calib: PathBuf,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    line_spacing: Option<usize>,
}

#[derive(Debug, Args)]
struct TriangulateArgs {
    #[arg(long)]
    calib: PathBuf,
    #[arg(long)]
    left: PathBuf,
    #[arg(long)]
    right: PathBuf,
    #[arg(long)]
    out: PathBuf,
    /// Keypoints are already in pixels rather than normalized to [0, 1].
    #[arg(long)]
    pixels: bool,
}

#[derive(Debug, Args)]
struct PhasesArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "phases.csv")]
    out: PathBuf,
    #[arg(long)]
    fps: Option<f64>,
    /// Arm speed threshold, degrees per second.
    #[arg(long)]
    threshold: Option<f64>,
    /// Frames the speed must stay above the threshold.
    #[arg(long)]
    window: Option<usize>,
}

fn init_logging(verbose: u8) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        let _ = tracing_log::LogTracer::init();
        freethrow::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        if let Err(err) = freethrow::core::init_with_level(level) {
            eprintln!("logger: {err}");
        }
    }
}

fn calibrate(args: CalibrateArgs, mut cfg: PipelineConfig) -> Result<(), Box<dyn Error>> {
    if args.cols.is_some() || args.rows.is_some() || args.square.is_some() {
        cfg.pattern = CalibrationPattern::new(
            args.cols.unwrap_or(cfg.pattern.cols),
            args.rows.unwrap_or(cfg.pattern.rows),
            args.square.unwrap_or(cfg.pattern.square_size),
        )?;
    }

    let run = calibrate_directory(&args.images, &cfg)?;
    let calib = &run.calibration;
    println!(
        "pairs: {} total, {} used ({} left only, {} right only, {} neither)",
        run.stats.instants,
        run.stats.paired,
        run.stats.left_only,
        run.stats.right_only,
        run.stats.neither
    );
    println!("stereo RMS: {:.4} px, baseline {:.3}", calib.rms, calib.baseline());

    if let Err(err) = cfg.acceptance.check(calib) {
        if !args.accept_high_rms {
            return Err(format!("{err}; rerun with --accept-high-rms to keep it").into());
        }
        log::warn!("{err}; kept on request");
    }
    calib.write_json(&args.out)?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn rectify(args: RectifyArgs, cfg: PipelineConfig) -> Result<(), Box<dyn Error>> {
    let calib = StereoCalibration::load_json(&args.calib)?;
    let pair = load_gray(&args.image)?;
    let spacing = args.line_spacing.unwrap_or(cfg.rectify.line_spacing);
    let out = rectify_side_by_side(&calib, &pair, spacing)?;
    out.save(&args.out)?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn triangulate(args: TriangulateArgs) -> Result<(), Box<dyn Error>> {
    let calib = StereoCalibration::load_json(&args.calib)?;
    let units = if args.pixels {
        KeypointUnits::Pixels
    } else {
        KeypointUnits::Normalized
    };
    let summary = triangulate_tables(&calib, units, &args.left, &args.right, &args.out)?;
    println!(
        "{} frames: {} of {} samples reconstructed ({} missing input, {} degenerate)",
        summary.frames,
        summary.reconstructed(),
        summary.samples,
        summary.missing_input,
        summary.degenerate
    );
    println!("wrote {}", args.out.display());
    Ok(())
}

fn phases(args: PhasesArgs, mut cfg: PipelineConfig) -> Result<(), Box<dyn Error>> {
    if let Some(fps) = args.fps {
        cfg.phases.fps = fps;
    }
    if let Some(threshold) = args.threshold {
        cfg.phases.velocity_threshold = threshold;
    }
    if let Some(window) = args.window {
        cfg.phases.sustained_window = window;
    }

    let report = phase_batch(&args.input, &cfg.phases)?;
    for (file, reason) in &report.failed {
        eprintln!("failed: {file}: {reason}");
    }
    write_phase_table(&args.out, &report.phase_rows())?;
    println!(
        "{} succeeded, {} failed; wrote {}",
        report.succeeded.len(),
        report.failed.len(),
        args.out.display()
    );
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Calibrate(args) => calibrate(args, cfg),
        Command::Rectify(args) => rectify(args, cfg),
        Command::Triangulate(args) => triangulate(args),
        Command::Phases(args) => phases(args, cfg),
    }
}
