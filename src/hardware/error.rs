use thiserror::Error;

///
/// All errors emitted while building the rig geometry.
///
/// - `InvalidSize`: When the shoulder triangle side length is not a positive, finite number
/// - `NonFinite`: When another geometry constant is NaN or infinite
///     Parameters:
///     - `name`: The name of the rejected field
///     - `value`: The rejected value
/// - `Io`: When the geometry file could not be read
/// - `Json`: When the geometry file is not valid JSON for the constants
///
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("The shoulder pivot spacing must be a positive number, got {}", .0)]
    InvalidSize(f64),

    #[error("The geometry constant `{}` must be finite, got {}", .name, .value)]
    NonFinite { name: &'static str, value: f64 },

    #[error("Failed to read geometry file {}: {}", .path, .source)]
    Io { path: String, source: std::io::Error },

    #[error("Failed to parse geometry file: {}", .0)]
    Json(#[from] serde_json::Error),
}
