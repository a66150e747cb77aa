//!
//! Synthetic measurement generation for a rig with known calibration
//!

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calibration::ParameterVector;
use crate::hardware::GeometryConstants;
use crate::hardware::math::cartesian_to_arms;
use crate::points::MeasuredPoint;

///
/// A virtual rig whose true calibration is known, used to produce measurement sets.
///
/// # Fields:
/// - `params`: The true shoulder heights and arm lengths
/// - `geometry`: The rig geometry
///
pub struct SyntheticRig {
    params: ParameterVector,
    geometry: GeometryConstants,
}

impl SyntheticRig {
    pub fn new(params: ParameterVector, geometry: GeometryConstants) -> SyntheticRig {
        SyntheticRig { params, geometry }
    }

    ///
    /// Six (x, y) probe positions spread over the pivot triangle: near each corner, near an
    /// edge and inside. Scales with the triangle size.
    ///
    pub fn spread_positions(geometry: &GeometryConstants) -> Vec<(f64, f64)> {
        let scale = geometry.size() / 250.;
        [(40., 25.), (210., 25.), (125., 190.), (125., 20.), (65., 120.), (185., 120.)]
            .iter()
            .map(|(x, y)| (x * scale, y * scale))
            .collect()
    }

    ///
    /// Computes where the effector sits at (x, y) when touching the plane through the three
    /// shoulder reference points.
    ///
    /// # Parameters:
    /// - `x`: The x coordinate, relative to the first shoulder pivot
    /// - `y`: The y coordinate, relative to the first shoulder pivot
    ///
    /// # Returns:
    /// - The effector position on the shoulder plane
    ///
    pub fn effector_at(&self, x: f64, y: f64) -> Point3<f64> {
        let (d, i, j) = self.geometry.triangle();
        let [z1, z2, z3] = self.params.shoulder_heights;

        let slope_x = (z2 - z1) / d;
        let slope_y = (z3 - z1 - slope_x * i) / j;

        Point3::new(x, y, z1 + slope_x * x + slope_y * y)
    }

    ///
    /// Produces the exact compensated measurements the rig reports at each position.
    ///
    pub fn sample_points(&self, positions: &[(f64, f64)]) -> Vec<MeasuredPoint> {
        positions.iter().map(|(x, y)| self.measure(&self.effector_at(*x, *y))).collect()
    }

    ///
    /// Produces measurements with uniform noise in `[-amplitude, amplitude]` added to every
    /// component. The sequence is reproducible for a given `seed`.
    ///
    /// # Parameters:
    /// - `positions`: The (x, y) probe positions
    /// - `amplitude`: The maximum absolute noise per component, in millimetres
    /// - `seed`: The random seed
    ///
    /// # Returns:
    /// - One perturbed point per position
    ///
    pub fn sample_noisy_points(&self, positions: &[(f64, f64)], amplitude: f64, seed: u64) -> Vec<MeasuredPoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        let amplitude = amplitude.abs();

        self.sample_points(positions)
            .into_iter()
            .map(|point| MeasuredPoint::new(point.arms().map(|arm| arm + rng.random_range(-amplitude..=amplitude))))
            .collect()
    }

    fn measure(&self, effector: &Point3<f64>) -> MeasuredPoint {
        let radii = cartesian_to_arms(effector, &self.geometry);
        let [l1, l2, l3] = self.params.arm_lengths;

        MeasuredPoint::new([l1 - radii[0], l2 - radii[1], l3 - radii[2]])
    }
}

///
/// Renders points as the text of a point file. The height compensation is removed again so that
/// loading the text reproduces `points`.
///
/// # Parameters:
/// - `points`: The compensated points
/// - `compensation`: The height compensation the loader will add
///
/// # Returns:
/// - The point file text, one comma-separated triple per line
///
pub fn to_point_file(points: &[MeasuredPoint], compensation: f64) -> String {
    let mut text = String::from("# synthetic points\n");
    for point in points {
        let [a, b, c] = point.arms().map(|arm| arm - compensation);
        text.push_str(&format!("{}, {}, {}\n", a, b, c));
    }
    text
}
