use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use guscal::calibration::optimizer::FitOptions;
use guscal::hardware::GeometryConstants;
use guscal::report::value_lines;
use guscal::run::{run, RunConfig, RunOutcome, DEFAULT_CALIBRATION_FILE, DEFAULT_POINTS_FILE};

/// Derives shoulder heights and maximum arm lengths for a three-arm rig from measured points.
#[derive(Debug, Parser)]
#[command(author, version, about = "Three-arm rig calibration")]
struct Args {
    /// Point data file, one triple of arm measurements per line.
    #[arg(short, long, default_value = DEFAULT_POINTS_FILE)]
    input: PathBuf,

    /// Calibration result file.
    #[arg(short, long, default_value = DEFAULT_CALIBRATION_FILE)]
    output: PathBuf,

    /// Optional JSON file overriding the rig geometry constants.
    #[arg(short, long)]
    geometry: Option<PathBuf>,

    /// Optimizer iteration budget.
    #[arg(long)]
    max_iters: Option<usize>,

    /// Recalibrate even if the calibration file is newer than the point file.
    #[arg(long)]
    force: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let geometry = match &args.geometry {
        Some(path) => GeometryConstants::from_json_file(path)?,
        None => GeometryConstants::default(),
    };

    let mut fit = FitOptions::default();
    if let Some(max_iters) = args.max_iters {
        fit.max_iters = max_iters;
    }

    let config = RunConfig { input: args.input, output: args.output, geometry, fit, force: args.force };

    match run(&config)? {
        RunOutcome::UpToDate => {}
        RunOutcome::Calibrated(result) => {
            let (heights, lengths) = value_lines(&result.params);
            println!("{}", heights);
            println!("{}", lengths);
        }
    }

    Ok(())
}
