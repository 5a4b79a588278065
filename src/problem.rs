use nalgebra::{DMatrix, DVector, RealField};
use thiserror::Error;

/// Request from a user callback to stop the solver.
///
/// Every callback of [`Problem`], [`Jacobian`] and [`JacobianRows`] may return
/// `Err(Abort)`. The solver stops immediately and reports
/// [`TerminationReason::User`](crate::TerminationReason::User); the status is
/// handed back verbatim as the `info` code of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("user callback requested termination with status {status}")]
pub struct Abort {
    status: i32,
}

impl Abort {
    /// Create an abort request.
    ///
    /// The status must be negative. Zero or positive values are replaced
    /// by `-1` so they can never be mistaken for a termination code of the solver.
    pub fn new(status: i32) -> Self {
        Self {
            status: if status < 0 { status } else { -1 },
        }
    }

    /// The (negative) status passed to [`Abort::new`].
    pub fn status(&self) -> i32 {
        self.status
    }
}

impl Default for Abort {
    fn default() -> Self {
        Self { status: -1 }
    }
}

/// A system of `$m$` residual functions in `$n$` unknowns.
///
/// For equation systems solved by [`Hybrid`](crate::Hybrid) we need `$m = n$`,
/// the least-squares solvers in [`LevenbergMarquardt`](crate::LevenbergMarquardt)
/// require `$m \geq n$`.
pub trait Problem<F: RealField> {
    /// The number `$m$` of residuals.
    fn residual_count(&self) -> usize;

    /// Compute the residuals at `x` and store them in `fvec`.
    ///
    /// `fvec` has length [`residual_count`](Problem::residual_count). The solver
    /// calls this with perturbed parameters when it approximates the Jacobian,
    /// so the result must only depend on `x`.
    fn evaluate(&mut self, x: &DVector<F>, fvec: &mut DVector<F>) -> Result<(), Abort>;

    /// Progress callback.
    ///
    /// Called with the current iterate every `nprint` iterations if the solver
    /// was configured with a report interval, and once more after termination.
    /// Returning `Err` during the iteration stops the solver.
    fn report(&mut self, iteration: usize, x: &DVector<F>, fvec: &DVector<F>) -> Result<(), Abort> {
        let _ = (iteration, x, fvec);
        Ok(())
    }
}

/// A [`Problem`] with an analytic Jacobian.
pub trait Jacobian<F: RealField>: Problem<F> {
    /// Compute the Jacobian `$\mathbf{J}\in\R^{m\times n}$` at `x`.
    ///
    /// Every entry of `fjac` must be written, the matrix holds stale values
    /// from the previous iteration.
    fn jacobian(&mut self, x: &DVector<F>, fjac: &mut DMatrix<F>) -> Result<(), Abort>;
}

/// A [`Problem`] which provides its Jacobian one row at a time.
///
/// Used by [`LevenbergMarquardt::minimize_rowwise`](crate::LevenbergMarquardt::minimize_rowwise)
/// which never stores the `$m\times n$` Jacobian.
pub trait JacobianRows<F: RealField>: Problem<F> {
    /// Store row `row` of the Jacobian at `x` in `fjrow` (length `$n$`).
    fn jacobian_row(&mut self, x: &DVector<F>, row: usize, fjrow: &mut DVector<F>)
        -> Result<(), Abort>;
}
