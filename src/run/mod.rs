//!
//! A single batch run: freshness guard, point loading, fitting and output
//!

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::calibration::error::CalibrationError;
use crate::calibration::optimizer::FitOptions;
use crate::calibration::{calibrate, CalibrationResult};
use crate::hardware::GeometryConstants;
use crate::points::error::PointError;
use crate::points::{load_points, FilePointSource, PointSource};
use crate::report::{write_aborted, write_calibration};
use error::RunError;

pub mod error;

/// The point file read when none is given.
pub const DEFAULT_POINTS_FILE: &str = "Points.GUS";
/// The calibration file written when none is given.
pub const DEFAULT_CALIBRATION_FILE: &str = "Calibration.GUS";

///
/// Everything a run needs, fixed before any point is loaded.
///
/// # Fields:
/// - `input`: The point file path
/// - `output`: The calibration file path
/// - `geometry`: The rig geometry
/// - `fit`: The optimizer tuning
/// - `force`: Recalibrate even when the output is newer than the input
///
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub geometry: GeometryConstants,
    pub fit: FitOptions,
    pub force: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            input: PathBuf::from(DEFAULT_POINTS_FILE),
            output: PathBuf::from(DEFAULT_CALIBRATION_FILE),
            geometry: GeometryConstants::default(),
            fit: FitOptions::default(),
            force: false,
        }
    }
}

///
/// How a run finished without error.
///
/// - `UpToDate`: The calibration file was newer than the point file, nothing was computed
/// - `Calibrated`: A calibration was computed and written
///
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    UpToDate,
    Calibrated(CalibrationResult),
}

///
/// Checks whether the calibration file is newer than the point file.
///
/// # Parameters:
/// - `input`: The point file path, which must exist
/// - `output`: The calibration file path, which may not exist yet
///
/// # Returns:
/// - `true` if the output was modified after the input
/// - A `PointError` if the input is missing or its metadata unreadable
///
pub fn output_is_current(input: &Path, output: &Path) -> Result<bool, PointError> {
    let input_name = input.display().to_string();
    let input_modified = std::fs::metadata(input)
        .and_then(|meta| meta.modified())
        .map_err(|err| PointError::from_io(&input_name, err))?;

    let output_modified = match std::fs::metadata(output).and_then(|meta| meta.modified()) {
        Ok(modified) => modified,
        Err(_) => return Ok(false),
    };

    Ok(output_modified > input_modified)
}

///
/// Runs a calibration from the files named in `config`.
///
/// # Parameters:
/// - `config`: The run configuration
///
/// # Returns:
/// - The `RunOutcome`
/// - A `RunError` explaining why the run was aborted
///
pub fn run(config: &RunConfig) -> Result<RunOutcome, RunError> {
    if !config.force && output_is_current(&config.input, &config.output)? {
        info!("Calibration file is newer than point data file. Done.");
        return Ok(RunOutcome::UpToDate);
    }

    let source = FilePointSource::new(&config.input);
    let result = run_with_source(&source, &config.output, &config.geometry, &config.fit)?;
    Ok(RunOutcome::Calibrated(result))
}

///
/// Loads points from any source, fits them and writes the calibration file. When too few points
/// are valid a partial file noting the abort is written before the error is returned.
///
/// # Parameters:
/// - `source`: The point source
/// - `output`: The calibration file path
/// - `geometry`: The rig geometry
/// - `options`: The optimizer tuning
///
/// # Returns:
/// - The `CalibrationResult` which was written
/// - A `RunError` explaining why the run was aborted
///
pub fn run_with_source(source: &dyn PointSource, output: &Path, geometry: &GeometryConstants, options: &FitOptions) -> Result<CalibrationResult, RunError> {
    let points = load_points(source, geometry.height_compensation())?;
    info!(source = %source.name(), points = points.points.len(), invalid = points.invalid.len(), "loaded points");

    let output_name = output.display().to_string();
    let file = File::create(output).map_err(|source| RunError::Output { path: output_name.clone(), source })?;
    let mut writer = BufWriter::new(file);

    match calibrate(&points.points, geometry, options) {
        Ok(result) => {
            write_calibration(&mut writer, &points, &result).map_err(|source| RunError::Output { path: output_name, source })?;
            Ok(result)
        }
        Err(err @ CalibrationError::InsufficientPoints { .. }) => {
            warn!("{}", err);
            write_aborted(&mut writer, &points).map_err(|source| RunError::Output { path: output_name, source })?;
            Err(err.into())
        }
    }
}
