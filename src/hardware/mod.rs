//!
//! Physical rig representations and handling
//!

use std::path::Path;

use serde::Deserialize;

use error::GeometryError;

pub mod error;
pub mod math;

/// Distance between the shoulder pivot bolts, in millimetres.
pub const SIZE: f64 = 250.0;
/// Approximate vertical distance between the arm pivot bolts when the effector touches the bed.
pub const BED_Z: f64 = 79.5;
/// Approximate bolt-to-bolt arm length when the endstop is triggered.
pub const MAX_ARM_LENGTH: f64 = 282.0;
/// Offset added to every measured arm length to correct a known systematic bias.
pub const HEIGHT_COMPENSATION: f64 = 0.1;

///
/// A simple container for the physical dimensions of the rig layout.
/// All fields are measured in millimetres and have an associated copy getter.
///
/// # Fields:
/// - `size`: The side length of the equilateral triangle formed by the shoulder pivots
/// - `bed_z`: The nominal vertical separation of the arm pivots, seeds the shoulder heights
/// - `max_arm_length`: The nominal maximum arm length, seeds the per-arm lengths
/// - `height_compensation`: The offset added to each measured component at load time
///
#[derive(getset::CopyGetters, Deserialize, Debug, Clone, Copy, PartialEq)]
#[get_copy = "pub"]
#[serde(default)]
pub struct GeometryConstants {
    size: f64,
    bed_z: f64,
    max_arm_length: f64,
    height_compensation: f64,
}

impl Default for GeometryConstants {
    fn default() -> Self {
        GeometryConstants { size: SIZE, bed_z: BED_Z, max_arm_length: MAX_ARM_LENGTH, height_compensation: HEIGHT_COMPENSATION }
    }
}

impl GeometryConstants {
    ///
    /// Creates a new, validated, set of geometry constants.
    ///
    /// # Parameters:
    /// - `size`: The distance between shoulder pivots, must be positive
    /// - `bed_z`: The nominal shoulder height
    /// - `max_arm_length`: The nominal maximum arm length
    /// - `height_compensation`: The offset added to each measured component
    ///
    /// # Returns:
    /// - A new `GeometryConstants` instance
    /// - A `GeometryError` explaining which value was rejected
    ///
    pub fn new(size: f64, bed_z: f64, max_arm_length: f64, height_compensation: f64) -> Result<GeometryConstants, GeometryError> {
        GeometryConstants { size, bed_z, max_arm_length, height_compensation }.validated()
    }

    ///
    /// Loads geometry constants from a JSON file. Missing fields fall back to the defaults.
    ///
    /// # Parameters:
    /// - `path`: The path of the JSON file
    ///
    /// # Returns:
    /// - The validated `GeometryConstants`
    /// - A `GeometryError` if the file could not be read, parsed or validated
    ///
    pub fn from_json_file(path: &Path) -> Result<GeometryConstants, GeometryError> {
        let text = std::fs::read_to_string(path).map_err(|source| GeometryError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&text)
    }

    ///
    /// Parses geometry constants from a JSON string. Missing fields fall back to the defaults.
    ///
    pub fn from_json_str(text: &str) -> Result<GeometryConstants, GeometryError> {
        let geometry: GeometryConstants = serde_json::from_str(text)?;
        geometry.validated()
    }

    ///
    /// The (x, y) positions of the three shoulder pivots: `(0, 0)`, `(d, 0)` and `(i, j)`.
    ///
    /// # Returns:
    /// - The pivots, in arm order
    ///
    pub fn shoulder_pivots(&self) -> [(f64, f64); 3] {
        let (d, i, j) = self.triangle();
        [(0., 0.), (d, 0.), (i, j)]
    }

    ///
    /// # Returns:
    /// - The triangle constants `(d, i, j)` used by the trilateration
    ///
    pub fn triangle(&self) -> (f64, f64, f64) {
        (self.size, self.size / 2., self.size * f64::sqrt(3.) / 2.)
    }

    fn validated(self) -> Result<GeometryConstants, GeometryError> {
        if !self.size.is_finite() || self.size <= 0. {
            return Err(GeometryError::InvalidSize(self.size));
        }

        for (name, value) in [("bed_z", self.bed_z), ("max_arm_length", self.max_arm_length), ("height_compensation", self.height_compensation)] {
            if !value.is_finite() {
                return Err(GeometryError::NonFinite { name, value });
            }
        }

        Ok(self)
    }
}
