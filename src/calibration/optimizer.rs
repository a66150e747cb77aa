use std::cell::{Cell, RefCell};

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use tracing::debug;

use crate::calibration::ParameterVector;
use crate::calibration::residual::{residuals, ResidualEvaluation};
use crate::hardware::GeometryConstants;
use crate::points::MeasuredPoint;

///
/// Tuning for the Levenberg-Marquardt search.
///
/// # Fields:
/// - `max_iters`: The iteration budget; the search stops after `max_iters * (n + 1)` residual
/// evaluations
/// - `ftol`: Relative tolerance on the cost reduction
/// - `xtol`: Relative tolerance on the parameter step
/// - `gtol`: Tolerance on the orthogonality between residuals and the jacobian columns
/// - `jacobian_step`: The relative step used for the finite-difference jacobian
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iters: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub jacobian_step: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions { max_iters: 100, ftol: 1e-10, xtol: 1e-10, gtol: 1e-10, jacobian_step: 1e-6 }
    }
}

///
/// The outcome of a fit.
///
/// # Fields:
/// - `params`: The best parameter vector found
/// - `converged`: Whether the search met a tolerance rather than running out of budget or failing
/// - `termination`: The reason the search stopped
/// - `evaluations`: The number of residual evaluations performed by the search
/// - `final_cost`: Half the sum of squared residuals at `params`
/// - `degenerate_evaluations`: How many evaluations contained at least one clamped trilateration
///
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub params: ParameterVector,
    pub converged: bool,
    pub termination: String,
    pub evaluations: usize,
    pub final_cost: f64,
    pub degenerate_evaluations: usize,
}

struct ArmProblem<'a> {
    points: &'a [MeasuredPoint],
    geometry: &'a GeometryConstants,
    params: DVector<f64>,
    jacobian_step: f64,
    degenerate_evaluations: Cell<usize>,
    best: RefCell<Option<(f64, DVector<f64>)>>,
}

impl ArmProblem<'_> {
    fn evaluate(&self, params: &DVector<f64>) -> ResidualEvaluation {
        residuals(&ParameterVector::from_dvector(params), self.points, self.geometry)
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ArmProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let evaluation = self.evaluate(&self.params);
        if !evaluation.degenerate_points.is_empty() {
            self.degenerate_evaluations.set(self.degenerate_evaluations.get() + 1);
        }

        let cost = evaluation.cost();
        let mut best = self.best.borrow_mut();
        if cost.is_finite() && best.as_ref().is_none_or(|(best_cost, _)| cost < *best_cost) {
            *best = Some((cost, self.params.clone()));
        }

        Some(evaluation.values)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(self.points.len(), self.params.len());

        // central differences, step relative to the parameter magnitude
        for col in 0..self.params.len() {
            let h = self.jacobian_step * self.params[col].abs().max(1.);

            let mut forward = self.params.clone();
            forward[col] += h;
            let mut backward = self.params.clone();
            backward[col] -= h;

            let derivative = (self.evaluate(&forward).values - self.evaluate(&backward).values) / (2. * h);
            jacobian.set_column(col, &derivative);
        }

        Some(jacobian)
    }
}

///
/// Runs a Levenberg-Marquardt search for the parameter vector which makes every point coplanar
/// with the shoulder reference points. The search never fails: when it stops without converging
/// the best vector found is returned with `converged` unset.
///
/// # Parameters:
/// - `initial`: The starting parameter vector
/// - `points`: The measured points
/// - `geometry`: The rig geometry
/// - `options`: Tolerances and iteration budget
///
/// # Returns:
/// - A `FitReport` holding the best parameter vector
///
pub fn fit(initial: &ParameterVector, points: &[MeasuredPoint], geometry: &GeometryConstants, options: &FitOptions) -> FitReport {
    let lm = LevenbergMarquardt::new()
        .with_ftol(options.ftol)
        .with_xtol(options.xtol)
        .with_gtol(options.gtol)
        .with_patience(options.max_iters.max(1));

    let problem = ArmProblem {
        points,
        geometry,
        params: initial.to_dvector(),
        jacobian_step: options.jacobian_step,
        degenerate_evaluations: Cell::new(0),
        best: RefCell::new(None),
    };

    let (problem, report) = lm.minimize(problem);

    // the search may stop on a rejected trial step, so report the best evaluation seen
    let (final_cost, best) = match problem.best.take() {
        Some(best) => best,
        None => (report.objective_function, problem.params()),
    };
    let params = ParameterVector::from_dvector(&best);

    debug!(evaluations = report.number_of_evaluations, cost = report.objective_function, termination = ?report.termination, "levenberg-marquardt finished");

    FitReport {
        params,
        converged: report.termination.was_successful(),
        termination: format!("{:?}", report.termination),
        evaluations: report.number_of_evaluations,
        final_cost,
        degenerate_evaluations: problem.degenerate_evaluations.get(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRig;

    fn truth() -> ParameterVector {
        ParameterVector { shoulder_heights: [80., 80., 80.], arm_lengths: [280., 280., 280.] }
    }

    #[test]
    fn recovers_exact_parameters() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));

        let report = fit(&ParameterVector::initial(&geometry), &points, &geometry, &FitOptions::default());

        assert!(report.converged, "fit did not converge: {:?}", report);
        assert!(report.evaluations > 0);
        for (fitted, expected) in report.params.to_array().iter().zip(truth().to_array().iter()) {
            assert!((fitted - expected).abs() < 1e-3, "expected {expected}, got {fitted}");
        }
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let geometry = GeometryConstants::default();
        let rig = SyntheticRig::new(truth(), geometry);
        let points = rig.sample_points(&SyntheticRig::spread_positions(&geometry));
        let options = FitOptions { max_iters: 1, ftol: f64::MIN_POSITIVE, xtol: f64::MIN_POSITIVE, gtol: f64::MIN_POSITIVE, ..FitOptions::default() };

        let initial = ParameterVector::initial(&geometry);
        let report = fit(&initial, &points, &geometry, &options);
        let start_cost = residuals(&initial, &points, &geometry).cost();

        assert!(!report.converged);
        assert!(report.final_cost <= start_cost);
        assert!(report.params.to_array().iter().all(|value| value.is_finite()));
    }
}
