//!
//! Calibration parameters, residual model and the least-squares fit
//!

use std::fmt;

use nalgebra::DVector;
use tracing::{info, warn};

use crate::hardware::GeometryConstants;
use crate::points::{MeasuredPoint, MIN_POINTS};
use error::CalibrationError;
use optimizer::{fit, FitOptions};
use residual::residuals;

pub mod error;
pub mod optimizer;
pub mod residual;

///
/// The six calibration values being fitted.
///
/// # Fields:
/// - `shoulder_heights`: The heights Z1, Z2, Z3 of each shoulder reference point
/// - `arm_lengths`: The maximum bolt-to-bolt lengths L1, L2, L3 of each arm
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterVector {
    pub shoulder_heights: [f64; 3],
    pub arm_lengths: [f64; 3],
}

impl ParameterVector {
    ///
    /// The starting guess of a fit: the nominal bed height for every shoulder and the nominal
    /// maximum length for every arm.
    ///
    pub fn initial(geometry: &GeometryConstants) -> ParameterVector {
        ParameterVector {
            shoulder_heights: [geometry.bed_z(); 3],
            arm_lengths: [geometry.max_arm_length(); 3],
        }
    }

    /// The values in fit order `[Z1, Z2, Z3, L1, L2, L3]`.
    pub fn to_array(&self) -> [f64; 6] {
        let [z1, z2, z3] = self.shoulder_heights;
        let [l1, l2, l3] = self.arm_lengths;
        [z1, z2, z3, l1, l2, l3]
    }

    pub fn to_dvector(&self) -> DVector<f64> {
        DVector::from_row_slice(&self.to_array())
    }

    ///
    /// Builds a parameter vector from a 6-element vector in fit order.
    ///
    pub fn from_dvector(values: &DVector<f64>) -> ParameterVector {
        debug_assert_eq!(values.len(), 6);
        ParameterVector {
            shoulder_heights: [values[0], values[1], values[2]],
            arm_lengths: [values[3], values[4], values[5]],
        }
    }
}

///
/// A non-fatal observation made while fitting, written into the calibration output as a comment.
///
/// - `TrilaterationFailure`: A point could not be trilaterated at the final parameters
///     Parameters:
///     - `point`: The one-indexed valid point number
/// - `DegenerateDuringSearch`: Some intermediate evaluations clamped a trilateration
///     Parameters:
///     - `evaluations`: The number of affected evaluations
/// - `NotConverged`: The search stopped before meeting its tolerances
///     Parameters:
///     - `reason`: The termination reason of the search
///
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    TrilaterationFailure { point: usize },
    DegenerateDuringSearch { evaluations: usize },
    NotConverged { reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TrilaterationFailure { point } => write!(f, "Trilateration failure at point {} - calibration suspect", point),
            Diagnostic::DegenerateDuringSearch { evaluations } => write!(f, "Trilateration failure in {} intermediate evaluations", evaluations),
            Diagnostic::NotConverged { reason } => write!(f, "Optimizer did not converge ({}) - calibration suspect", reason),
        }
    }
}

///
/// The outcome of a calibration run.
///
/// # Fields:
/// - `params`: The fitted parameter vector, best effort when `converged` is unset
/// - `converged`: Whether the optimizer met its tolerances
/// - `termination`: The reason the optimizer stopped
/// - `evaluations`: The number of residual evaluations the optimizer performed
/// - `final_cost`: Half the sum of squared residuals at `params`
/// - `diagnostics`: Non-fatal observations, in reporting order
///
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub params: ParameterVector,
    pub converged: bool,
    pub termination: String,
    pub evaluations: usize,
    pub final_cost: f64,
    pub diagnostics: Vec<Diagnostic>,
}

///
/// Fits the shoulder heights and arm lengths to a set of measured points, starting from the
/// nominal geometry. Diagnostics raised during the search are collected and reported once the
/// fit completes.
///
/// # Parameters:
/// - `points`: The compensated measured points
/// - `geometry`: The rig geometry
/// - `options`: The optimizer tuning
///
/// # Returns:
/// - The `CalibrationResult`
/// - `CalibrationError::InsufficientPoints` if fewer than six points were supplied, in which case
/// no fit is attempted
///
pub fn calibrate(points: &[MeasuredPoint], geometry: &GeometryConstants, options: &FitOptions) -> Result<CalibrationResult, CalibrationError> {
    if points.len() < MIN_POINTS {
        return Err(CalibrationError::InsufficientPoints { found: points.len(), required: MIN_POINTS });
    }

    info!(points = points.len(), "fitting calibration");
    let report = fit(&ParameterVector::initial(geometry), points, geometry, options);

    let mut diagnostics = vec![];
    let final_evaluation = residuals(&report.params, points, geometry);
    for idx in final_evaluation.degenerate_points.iter() {
        diagnostics.push(Diagnostic::TrilaterationFailure { point: idx + 1 });
    }
    if final_evaluation.degenerate_points.is_empty() && report.degenerate_evaluations > 0 {
        diagnostics.push(Diagnostic::DegenerateDuringSearch { evaluations: report.degenerate_evaluations });
    }
    if !report.converged {
        diagnostics.push(Diagnostic::NotConverged { reason: report.termination.clone() });
    }

    for diagnostic in diagnostics.iter() {
        warn!("{}", diagnostic);
    }
    info!(evaluations = report.evaluations, cost = report.final_cost, converged = report.converged, "fit finished");

    Ok(CalibrationResult {
        params: report.params,
        converged: report.converged,
        termination: report.termination,
        evaluations: report.evaluations,
        final_cost: report.final_cost,
        diagnostics,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRig;

    fn truth() -> ParameterVector {
        ParameterVector { shoulder_heights: [80., 80., 80.], arm_lengths: [280., 280., 280.] }
    }

    #[test]
    fn initial_guess_uses_nominal_geometry() {
        let initial = ParameterVector::initial(&GeometryConstants::default());
        assert_eq!(initial.to_array(), [79.5, 79.5, 79.5, 282., 282., 282.]);
        assert_eq!(ParameterVector::from_dvector(&initial.to_dvector()), initial);
    }

    #[test]
    fn five_points_are_rejected() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry)[..5]);

        assert_eq!(
            calibrate(&points, &geometry, &FitOptions::default()),
            Err(CalibrationError::InsufficientPoints { found: 5, required: 6 })
        );
    }

    #[test]
    fn six_points_are_fitted() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));

        let result = calibrate(&points, &geometry, &FitOptions::default()).unwrap();
        assert!(result.evaluations > 0);
        assert!(result.converged);
        assert!(
            !result.diagnostics.iter().any(|d| matches!(d, Diagnostic::TrilaterationFailure { .. } | Diagnostic::NotConverged { .. })),
            "unexpected diagnostics: {:?}",
            result.diagnostics
        );
    }

    #[test]
    fn perturbed_points_recover_within_one_percent() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_noisy_points(&SyntheticRig::spread_positions(&geometry), 0.01, 42);

        let result = calibrate(&points, &geometry, &FitOptions::default()).unwrap();

        for (fitted, expected) in result.params.to_array().iter().zip(truth().to_array().iter()) {
            assert!(((fitted - expected) / expected).abs() < 0.01, "expected {expected}, got {fitted}");
        }
    }

    #[test]
    fn unconverged_fit_is_flagged() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));
        let options = FitOptions { max_iters: 1, ftol: f64::MIN_POSITIVE, xtol: f64::MIN_POSITIVE, gtol: f64::MIN_POSITIVE, ..FitOptions::default() };

        let result = calibrate(&points, &geometry, &options).unwrap();

        assert!(!result.converged);
        assert!(result.diagnostics.iter().any(|d| matches!(d, Diagnostic::NotConverged { .. })));
    }

    #[test]
    fn degenerate_points_are_reported_not_fatal() {
        let geometry = GeometryConstants::default();
        let points = vec![MeasuredPoint::new([182., 182., 182.]); 6];

        let result = calibrate(&points, &geometry, &FitOptions::default()).unwrap();

        let failures: Vec<usize> = result
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::TrilaterationFailure { point } => Some(*point),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![1, 2, 3, 4, 5, 6]);
        assert!(result.params.to_array().iter().all(|value| value.is_finite()));
    }

    #[test]
    fn diagnostics_render_as_text() {
        assert_eq!(Diagnostic::TrilaterationFailure { point: 3 }.to_string(), "Trilateration failure at point 3 - calibration suspect");
    }
}
