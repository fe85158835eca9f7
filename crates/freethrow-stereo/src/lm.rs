//! Levenberg–Marquardt refinement for the calibration problems, backed by
//! the `levenberg-marquardt` crate.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

/// Non-linear least-squares problem over a dense parameter vector.
pub trait NllsProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;

    /// Residuals for the parameters `x`. Non-finite entries stop the solver.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of [`residuals`](Self::residuals). Defaults to forward
    /// differences with a step relative to each parameter's magnitude.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let r0 = self.residuals(x);
        let mut j = DMatrix::zeros(r0.len(), x.len());
        let mut xp = x.clone();
        for c in 0..x.len() {
            let h = 1e-7 * x[c].abs().max(1e-2);
            xp[c] = x[c] + h;
            let r1 = self.residuals(&xp);
            j.column_mut(c).copy_from(&((r1 - &r0) / h));
            xp[c] = x[c];
        }
        j
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Patience: the solver gives up after `max_iters * (n + 1)` evaluations.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction of an accepted step.
    pub ftol: f64,
    /// Relative tolerance on the parameter update.
    pub xtol: f64,
    /// Orthogonality tolerance between residuals and Jacobian columns.
    pub gtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Residual evaluations spent by the solver.
    pub iterations: usize,
    /// Half the squared residual norm at the solution.
    pub final_cost: f64,
    pub converged: bool,
}

struct LmAdapter<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmAdapter<'_, P> {
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
        let r = self.problem.residuals(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let j = self.problem.jacobian(&self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

/// `NoImprovementPossible` means the tolerances sit below working precision,
/// so the solver is at a minimum too.
fn reached_minimum(reason: &TerminationReason) -> bool {
    reason.was_successful() || matches!(reason, TerminationReason::NoImprovementPossible(_))
}

/// Minimize `0.5 * |r(x)|²` starting from `x0`.
pub fn solve<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &SolveOptions,
) -> (DVector<f64>, SolveReport) {
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iters.max(1));

    let (adapter, report) = lm.minimize(LmAdapter { problem, params: x0 });
    let converged = reached_minimum(&report.termination);
    log::debug!(
        "lm: {} evaluations, cost {:.6e}, {:?}",
        report.number_of_evaluations,
        report.objective_function,
        report.termination
    );

    (
        adapter.params,
        SolveReport {
            iterations: report.number_of_evaluations,
            final_cost: report.objective_function,
            converged,
        },
    )
}
