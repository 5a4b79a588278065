//! Consistency check of a user supplied Jacobian.
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

use crate::problem::{Abort, Jacobian};
use crate::utils::epsmch;

/// Point close to `x` at which the residuals are evaluated for [`jacobian_error`].
pub fn perturbed_point<F: RealField + Float>(x: &DVector<F>) -> DVector<F> {
    let eps = Float::sqrt(epsmch::<F>());
    x.map(|xj| {
        let temp = eps * Float::abs(xj);
        if temp.is_zero() {
            xj + eps
        } else {
            xj + temp
        }
    })
}

/// Rate the Jacobian `fjac` at `x` for each residual.
///
/// `fvec` holds the residuals at `x` and `fvecp` the residuals at
/// [`perturbed_point(x)`](perturbed_point). Entry `$i$` of the result is close
/// to one if the gradient of residual `$i$` is probably correct and close to
/// zero if it is probably wrong. Values in between indicate that the residual
/// is either inaccurate or too nonlinear for a first-order check.
///
/// This resembles `CHKDER` (mode 2) from `MINPACK`.
pub fn jacobian_error<F: RealField + Float>(
    x: &DVector<F>,
    fvec: &DVector<F>,
    fjac: &DMatrix<F>,
    fvecp: &DVector<F>,
) -> DVector<F> {
    let factor: F = convert(100.);
    let log10e: F = convert(core::f64::consts::LOG10_E);
    let eps = Float::sqrt(epsmch::<F>());
    let epsf = factor * epsmch::<F>();
    let epslog = log10e * Float::ln(eps);

    let m = fvec.len();
    let mut err = DVector::zeros(m);
    for (j, &xj) in x.iter().enumerate() {
        let temp = if xj.is_zero() { F::one() } else { Float::abs(xj) };
        for i in 0..m {
            err[i] += temp * fjac[(i, j)];
        }
    }
    for i in 0..m {
        let mut temp = F::one();
        if !fvec[i].is_zero()
            && !fvecp[i].is_zero()
            && Float::abs(fvecp[i] - fvec[i]) >= epsf * Float::abs(fvec[i])
        {
            temp = eps * Float::abs((fvecp[i] - fvec[i]) / eps - err[i])
                / (Float::abs(fvec[i]) + Float::abs(fvecp[i]));
        }
        err[i] = F::one();
        if temp > epsmch() && temp < eps {
            err[i] = (log10e * Float::ln(temp) - epslog) / epslog;
        }
        if temp >= eps {
            err[i] = F::zero();
        }
    }
    err
}

/// Check the Jacobian of `problem` at `x`.
///
/// Evaluates the residuals at `x` and at a nearby point as well as the Jacobian at `x`
/// and rates each residual with [`jacobian_error`].
///
/// The check is first order: a residual rated close to one has a correct
/// gradient with high probability, but a correct gradient of a badly scaled or
/// strongly nonlinear residual may get a lower rating.
pub fn check_jacobian<F, P>(problem: &mut P, x: &DVector<F>) -> Result<DVector<F>, Abort>
where
    F: RealField + Float,
    P: Jacobian<F> + ?Sized,
{
    let m = problem.residual_count();
    let mut fvec = DVector::zeros(m);
    let mut fvecp = DVector::zeros(m);
    let mut fjac = DMatrix::zeros(m, x.len());
    problem.evaluate(x, &mut fvec)?;
    problem.jacobian(x, &mut fjac)?;
    problem.evaluate(&perturbed_point(x), &mut fvecp)?;
    Ok(jacobian_error(x, &fvec, &fjac, &fvecp))
}
