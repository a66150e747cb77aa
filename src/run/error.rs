use thiserror::Error;

use crate::calibration::error::CalibrationError;
use crate::points::error::PointError;

///
/// All errors which end a calibration run.
///
/// - `Points`: When the point source could not be found or read
/// - `Calibration`: When the points were insufficient for a fit; a partial output is still written
/// - `Output`: When the calibration file could not be written
///     Parameters:
///     - `path`: The output path
///     - `source`: The underlying io error
///
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Points(#[from] PointError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Failed to write calibration file {}: {}", .path, .source)]
    Output { path: String, source: std::io::Error },
}
