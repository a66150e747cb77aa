use nalgebra::Point3;

use crate::hardware::GeometryConstants;

///
/// The outcome of a trilateration.
///
/// # Fields:
/// - `position`: The effector position relative to the first shoulder pivot, in millimetres
/// - `degenerate`: Whether the radii could not meet above the pivot plane, in which case `z` was
/// clamped to 0
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trilateration {
    pub position: Point3<f64>,
    pub degenerate: bool,
}

///
/// Converts three arm radii into cartesian coordinates using trilateration against the shoulder
/// pivots `(0, 0)`, `(d, 0)` and `(i, j)`. All values are in millimetres.
///
/// The function never fails for finite input. When the sphere of radius `r1` does not reach the
/// trilaterated (x, y) the height is clamped to 0 and the result is flagged as degenerate.
///
/// # Parameters:
/// - `r1`: The remaining length of the first arm
/// - `r2`: The remaining length of the second arm
/// - `r3`: The remaining length of the third arm
/// - `geometry`: The rig geometry, providing the pivot triangle
///
/// # Returns:
/// - The effector position and degeneracy flag
///
pub fn arms_to_cartesian(r1: f64, r2: f64, r3: f64, geometry: &GeometryConstants) -> Trilateration {
    let (d, i, j) = geometry.triangle();

    let x = (f64::powi(r1, 2) - f64::powi(r2, 2) + f64::powi(d, 2)) / (2. * d);
    let y = (f64::powi(r1, 2) - f64::powi(r3, 2) - f64::powi(x, 2) + f64::powi(x - i, 2) + f64::powi(j, 2)) / (2. * j);
    let zsq = f64::powi(r1, 2) - f64::powi(x, 2) - f64::powi(y, 2);

    if zsq < 0. {
        return Trilateration { position: Point3::new(x, y, 0.), degenerate: true };
    }

    Trilateration { position: Point3::new(x, y, zsq.sqrt()), degenerate: false }
}

///
/// Converts an effector position into the distance from each shoulder pivot. This is the forward
/// counterpart of `arms_to_cartesian`.
///
/// # Parameters:
/// - `position`: The effector position, relative to the first shoulder pivot
/// - `geometry`: The rig geometry, providing the pivot triangle
///
/// # Returns:
/// - The three radii, in arm order
///
pub fn cartesian_to_arms(position: &Point3<f64>, geometry: &GeometryConstants) -> [f64; 3] {
    geometry.shoulder_pivots().map(|(px, py)| {
        f64::sqrt(f64::powi(position.x - px, 2) + f64::powi(position.y - py, 2) + f64::powi(position.z, 2))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!((actual - expected).abs() < tol, "expected {expected}, got {actual}");
    }

    #[test]
    fn equal_radii_land_on_centroid() {
        let result = arms_to_cartesian(200., 200., 200., &GeometryConstants::default());

        assert!(!result.degenerate);
        assert_close(result.position.x, 125.0, 1e-3);
        assert_close(result.position.y, 72.169, 1e-3);
        assert_close(result.position.z, 138.444, 1e-3);
    }

    #[test]
    fn short_radii_are_degenerate() {
        let result = arms_to_cartesian(100., 100., 100., &GeometryConstants::default());

        assert!(result.degenerate);
        assert_eq!(result.position.z, 0.);
        assert_close(result.position.x, 125.0, 1e-9);
    }

    #[test]
    fn zero_radii_do_not_panic() {
        let result = arms_to_cartesian(0., 0., 0., &GeometryConstants::default());
        assert!(result.degenerate);
        assert!(result.position.x.is_finite() && result.position.y.is_finite());
    }

    #[test]
    fn forward_then_inverse_recovers_position() {
        let geometry = GeometryConstants::default();
        let position = Point3::new(60., 40., 95.);
        let [r1, r2, r3] = cartesian_to_arms(&position, &geometry);
        let result = arms_to_cartesian(r1, r2, r3, &geometry);

        assert!(!result.degenerate);
        assert_close(result.position.x, 60., 1e-9);
        assert_close(result.position.y, 40., 1e-9);
        assert_close(result.position.z, 95., 1e-9);
    }
}
