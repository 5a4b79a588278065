//! Forward-difference approximations of the Jacobian.
use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use crate::problem::{Abort, Problem};
use crate::utils::epsmch;

/// Relative step `$\sqrt{\max(\mathtt{epsfcn}, \epsilon)}$`.
#[inline]
fn relative_step<F: RealField + Float>(epsfcn: F) -> F {
    Float::sqrt(Float::max(epsfcn, epsmch()))
}

/// Compute a forward-difference approximation to the `$m\times n$` Jacobian.
///
/// Column `$j$` is `$(\vec{f}(\vec{x} + h_j\vec{e}_j) - \vec{f}(\vec{x}))/h_j$` with
/// `$h_j = \sqrt{\max(\mathtt{epsfcn}, \epsilon)}\,|x_j|$` (or without the
/// factor `$|x_j|$` if it is zero). `epsfcn` is the relative error of the
/// residual computation, pass zero if the residuals are accurate to machine precision.
///
/// `fvec` must hold the residuals at `x`, `wa` is workspace of length `$m$`.
/// `x` is restored before this returns, also when a callback aborts.
///
/// This resembles `FDJAC2` from `MINPACK`.
pub fn forward_difference<F, P>(
    problem: &mut P,
    x: &mut DVector<F>,
    fvec: &DVector<F>,
    fjac: &mut DMatrix<F>,
    epsfcn: F,
    wa: &mut DVector<F>,
) -> Result<(), Abort>
where
    F: RealField + Float,
    P: Problem<F> + ?Sized,
{
    let eps = relative_step(epsfcn);
    for j in 0..x.len() {
        let temp = x[j];
        let mut h = eps * Float::abs(temp);
        if h.is_zero() {
            h = eps;
        }
        x[j] = temp + h;
        let evaluation = problem.evaluate(x, wa);
        x[j] = temp;
        evaluation?;
        for i in 0..fvec.len() {
            fjac[(i, j)] = (wa[i] - fvec[i]) / h;
        }
    }
    Ok(())
}

/// Compute a forward-difference approximation to the `$n\times n$` Jacobian
/// of an equation system with a banded Jacobian.
///
/// `ml` and `mu` are the number of sub- and superdiagonals within the band.
/// If `$\mathtt{ml} + \mathtt{mu} + 1 \geq n$` this falls back to
/// [`forward_difference`] with `$n$` evaluations. Otherwise all columns which are
/// congruent modulo `$\mathtt{ml} + \mathtt{mu} + 1$` are perturbed at once and the
/// Jacobian is approximated with `$\mathtt{ml} + \mathtt{mu} + 1$` evaluations.
/// Entries outside of the band are set to zero.
///
/// `wa1` and `wa2` are workspaces of length `$n$`.
///
/// This resembles `FDJAC1` from `MINPACK`.
#[allow(clippy::too_many_arguments)]
pub fn forward_difference_banded<F, P>(
    problem: &mut P,
    x: &mut DVector<F>,
    fvec: &DVector<F>,
    fjac: &mut DMatrix<F>,
    ml: usize,
    mu: usize,
    epsfcn: F,
    wa1: &mut DVector<F>,
    wa2: &mut DVector<F>,
) -> Result<(), Abort>
where
    F: RealField + Float,
    P: Problem<F> + ?Sized,
{
    let n = x.len();
    let msum = ml.saturating_add(mu).saturating_add(1);
    if msum >= n {
        return forward_difference(problem, x, fvec, fjac, epsfcn, wa1);
    }

    let eps = relative_step(epsfcn);
    let step = |xj: F| {
        let h = eps * Float::abs(xj);
        if h.is_zero() {
            eps
        } else {
            h
        }
    };
    for k in 0..msum {
        for j in (k..n).step_by(msum) {
            wa2[j] = x[j];
            x[j] = wa2[j] + step(wa2[j]);
        }
        let evaluation = problem.evaluate(x, wa1);
        for j in (k..n).step_by(msum) {
            x[j] = wa2[j];
        }
        evaluation?;
        for j in (k..n).step_by(msum) {
            let h = step(wa2[j]);
            for i in 0..n {
                fjac[(i, j)] = if i + mu >= j && i <= j + ml {
                    (wa1[i] - fvec[i]) / h
                } else {
                    F::zero()
                };
            }
        }
    }
    Ok(())
}
