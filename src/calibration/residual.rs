use nalgebra::{DVector, Matrix4, Point3};

use crate::calibration::ParameterVector;
use crate::hardware::GeometryConstants;
use crate::hardware::math::arms_to_cartesian;
use crate::points::MeasuredPoint;

///
/// One evaluation of the residual model.
///
/// # Fields:
/// - `values`: The coplanarity determinant of every point, in point order
/// - `degenerate_points`: Zero-indexed points whose trilateration was clamped
///
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualEvaluation {
    pub values: DVector<f64>,
    pub degenerate_points: Vec<usize>,
}

impl ResidualEvaluation {
    /// The per-point squared determinants, for reporting how far each point is from consistent.
    pub fn squared(&self) -> DVector<f64> {
        self.values.map(|det| det * det)
    }

    /// Half the sum of squared residuals, matching the optimizer's objective.
    pub fn cost(&self) -> f64 {
        0.5 * self.values.norm_squared()
    }
}

///
/// Computes the determinant of the matrix with rows `[0, 0, Z1, 1]`, `[d, 0, Z2, 1]`,
/// `[i, j, Z3, 1]` and `[X, Y, Z, 1]`. It is zero exactly when the effector is coplanar with the
/// three shoulder reference points.
///
/// # Parameters:
/// - `params`: The candidate parameters, providing the shoulder heights
/// - `effector`: The trilaterated effector position
/// - `geometry`: The rig geometry
///
/// # Returns:
/// - The signed determinant
///
pub fn consistency_determinant(params: &ParameterVector, effector: &Point3<f64>, geometry: &GeometryConstants) -> f64 {
    let (d, i, j) = geometry.triangle();
    let [z1, z2, z3] = params.shoulder_heights;

    Matrix4::new(
        0., 0., z1, 1.,
        d, 0., z2, 1.,
        i, j, z3, 1.,
        effector.x, effector.y, effector.z, 1.,
    )
    .determinant()
}

///
/// Evaluates the residual of every point against a candidate parameter vector. Each residual is
/// the raw consistency determinant; the least-squares driver squares it.
///
/// # Parameters:
/// - `params`: The candidate parameter vector
/// - `points`: The measured points
/// - `geometry`: The rig geometry
///
/// # Returns:
/// - The residuals along with any degenerate trilaterations
///
pub fn residuals(params: &ParameterVector, points: &[MeasuredPoint], geometry: &GeometryConstants) -> ResidualEvaluation {
    let mut values = DVector::zeros(points.len());
    let mut degenerate_points = vec![];

    for (idx, point) in points.iter().enumerate() {
        let [m1, m2, m3] = point.arms();
        let [l1, l2, l3] = params.arm_lengths;

        let trilateration = arms_to_cartesian(l1 - m1, l2 - m2, l3 - m3, geometry);
        if trilateration.degenerate {
            degenerate_points.push(idx);
        }

        values[idx] = consistency_determinant(params, &trilateration.position, geometry);
    }

    ResidualEvaluation { values, degenerate_points }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRig;

    fn truth() -> ParameterVector {
        ParameterVector { shoulder_heights: [80., 81., 79.], arm_lengths: [280., 281., 279.] }
    }

    #[test]
    fn zero_at_ground_truth() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));

        let evaluation = residuals(&truth(), &points, &geometry);

        assert!(evaluation.degenerate_points.is_empty());
        for value in evaluation.values.iter() {
            assert!(value.abs() < 1e-6, "residual {value} not near zero");
        }
    }

    #[test]
    fn nonzero_away_from_ground_truth() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));

        let mut wrong = truth();
        wrong.arm_lengths[0] += 2.;
        let evaluation = residuals(&wrong, &points, &geometry);

        assert!(evaluation.cost() > 1.);
        assert_eq!(evaluation.squared().len(), points.len());
    }

    #[test]
    fn determinant_scales_with_height_offset() {
        let geometry = GeometryConstants::default();
        let params = ParameterVector { shoulder_heights: [0., 0., 0.], arm_lengths: [0., 0., 0.] };
        let (d, _, j) = geometry.triangle();

        let on_plane = consistency_determinant(&params, &Point3::new(50., 50., 0.), &geometry);
        let above = consistency_determinant(&params, &Point3::new(50., 50., 1.), &geometry);

        assert!(on_plane.abs() < 1e-9);
        assert!((above.abs() - d * j).abs() < 1e-6);
    }

    #[test]
    fn degenerate_points_are_collected() {
        let geometry = GeometryConstants::default();
        let params = ParameterVector::initial(&geometry);
        let points = vec![MeasuredPoint::new([100., 100., 100.]), MeasuredPoint::new([182., 182., 182.]), MeasuredPoint::new([100., 100., 100.])];

        let evaluation = residuals(&params, &points, &geometry);

        assert_eq!(evaluation.degenerate_points, vec![1]);
        assert!(evaluation.values.iter().all(|value| value.is_finite()));
    }
}
