use thiserror::Error;

///
/// All errors emitted from the calibration module.
///
/// - `InsufficientPoints`: When fewer valid points were supplied than a fit requires
///     Parameters:
///     - `found`: The number of valid points supplied
///     - `required`: The minimum number of points
///
#[derive(Error, Debug, PartialEq)]
pub enum CalibrationError {
    #[error("Insufficient valid points in points file: found {}, need at least {}", .found, .required)]
    InsufficientPoints { found: usize, required: usize },
}
