use core::fmt;

use thiserror::Error;

use crate::problem::Abort;

/// Problems with the solver input. Detected before the first evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The number of parameters `$n$` is zero.
    #[error("the number of parameters is zero")]
    NoParameters,
    /// Least squares needs `$m \geq n$`.
    #[error("{residuals} residuals are not enough for {parameters} parameters")]
    NotEnoughResiduals { residuals: usize, parameters: usize },
    /// An equation system needs exactly as many equations as unknowns.
    #[error("expected {parameters} equations, got {residuals}")]
    NotSquare { residuals: usize, parameters: usize },
    /// A tolerance is negative or NaN.
    #[error("{0} must be >= 0")]
    NegativeTolerance(&'static str),
    /// The evaluation budget is zero.
    #[error("patience must be > 0")]
    NoPatience,
    /// The initial step bound factor is not positive.
    #[error("stepbound must be > 0")]
    NonPositiveStepBound,
    /// The user supplied scaling has the wrong length.
    #[error("expected {expected} scaling factors, got {found}")]
    ScaleLength { expected: usize, found: usize },
    /// A user supplied scaling factor is not positive.
    #[error("scaling factor {index} is not positive")]
    NonPositiveScale { index: usize },
}

/// The tolerance which is too small for further progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    Ftol,
    Xtol,
    Gtol,
}

/// How the hybrid method detected that it does not make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// Five Jacobian evaluations in a row without a good reduction.
    JacobianEvaluations,
    /// Ten iterations in a row without a good reduction.
    Iterations,
}

/// Reasons for terminating a solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The input was rejected, no function was evaluated.
    InvalidInput(InputError),
    /// A user callback returned [`Abort`].
    User(Abort),
    /// The residual vector is exactly zero.
    ResidualsZero,
    /// The relative reduction in the sum of squares (`ftol`) and/or the relative
    /// change of the iterate (`xtol`) dropped below the tolerance.
    Converged { ftol: bool, xtol: bool },
    /// The residual vector is orthogonal to the columns of the Jacobian
    /// up to `gtol`.
    Orthogonal,
    /// The maximal number of function evaluations was hit.
    LostPatience,
    /// The given tolerance is too small, no further improvement is possible.
    NoImprovementPossible(Tolerance),
    /// The iteration is not making good progress.
    NoProgress(Stall),
}

impl TerminationReason {
    /// Whether the reason indicates convergence.
    pub fn was_successful(&self) -> bool {
        matches!(
            self,
            TerminationReason::ResidualsZero
                | TerminationReason::Converged { .. }
                | TerminationReason::Orthogonal
        )
    }

    /// The MINPACK `info` code of the Levenberg-Marquardt drivers.
    pub(crate) fn lm_info(&self) -> i32 {
        match self {
            TerminationReason::InvalidInput(_) => 0,
            TerminationReason::User(abort) => abort.status(),
            TerminationReason::ResidualsZero => 1,
            TerminationReason::Converged { ftol, xtol } => match (ftol, xtol) {
                (true, true) => 3,
                (false, true) => 2,
                _ => 1,
            },
            TerminationReason::Orthogonal => 4,
            TerminationReason::LostPatience => 5,
            TerminationReason::NoImprovementPossible(Tolerance::Ftol) => 6,
            TerminationReason::NoImprovementPossible(Tolerance::Xtol) => 7,
            TerminationReason::NoImprovementPossible(Tolerance::Gtol) => 8,
            // not produced by the LM drivers
            TerminationReason::NoProgress(_) => 5,
        }
    }

    /// The MINPACK `info` code of the hybrid drivers.
    pub(crate) fn hybrid_info(&self) -> i32 {
        match self {
            TerminationReason::InvalidInput(_) => 0,
            TerminationReason::User(abort) => abort.status(),
            TerminationReason::ResidualsZero
            | TerminationReason::Converged { .. }
            | TerminationReason::Orthogonal => 1,
            TerminationReason::LostPatience => 2,
            TerminationReason::NoImprovementPossible(_) => 3,
            TerminationReason::NoProgress(Stall::JacobianEvaluations) => 4,
            TerminationReason::NoProgress(Stall::Iterations) => 5,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::InvalidInput(err) => write!(f, "improper input: {}", err),
            TerminationReason::User(abort) => write!(f, "{}", abort),
            TerminationReason::ResidualsZero => f.write_str("residuals are zero"),
            TerminationReason::Converged { ftol, xtol } => match (ftol, xtol) {
                (true, true) => f.write_str("converged in the sum of squares and the iterate"),
                (false, true) => f.write_str("converged in the iterate"),
                _ => f.write_str("converged in the sum of squares"),
            },
            TerminationReason::Orthogonal => {
                f.write_str("residuals are orthogonal to the columns of the Jacobian")
            }
            TerminationReason::LostPatience => f.write_str("evaluation budget exhausted"),
            TerminationReason::NoImprovementPossible(tol) => {
                let name = match tol {
                    Tolerance::Ftol => "ftol",
                    Tolerance::Xtol => "xtol",
                    Tolerance::Gtol => "gtol",
                };
                write!(f, "{} is too small, no further improvement is possible", name)
            }
            TerminationReason::NoProgress(Stall::JacobianEvaluations) => {
                f.write_str("no progress over the last five Jacobian evaluations")
            }
            TerminationReason::NoProgress(Stall::Iterations) => {
                f.write_str("no progress over the last ten iterations")
            }
        }
    }
}
