//! Solvers for the trust-region subproblems of both drivers.
//!
//! The Levenberg-Marquardt driver determines the damping parameter with
//! [`determine_lambda_and_parameter_update`], the hybrid driver combines
//! Gauss-Newton and steepest descent with [`dogleg`].
use nalgebra::{convert, DMatrix, RealField};
use num_traits::Float;

use crate::qr::solve_with_diagonal;
use crate::utils::{dwarf, enorm, epsmch};

/// Approximately solve the LM trust-region subproblem.
///
/// Given `$\mathbf{A}\in\R^{m\times n}$`, `$\vec{b}\in\R^m$` and a non-singular
/// diagonal matrix `$\mathbf{D}$` this routine approximately solves the problem
/// ```math
///   \min_{\vec{p}\in\R^n}\|\mathbf{A}\vec{p} - \vec{b}\|^2\text{ subject to }\|\mathbf{D}\vec{p}\|\leq\Delta.
/// ```
///
/// It can be shown that `$\vec{p}$` with `$\|\mathbf{D}\vec{p}\|\leq\Delta$` is
/// a solution if and only if there exists `$\lambda\geq 0$` such that
/// ```math
/// \begin{aligned}
/// (\mathbf{A}^\top\mathbf{A} + \lambda \mathbf{D}\mathbf{D})\vec{p} &= \mathbf{A}^\top\vec{b}, \\
/// \lambda(\Delta - \|\mathbf{D}\vec{p}\|) &= 0.
/// \end{aligned}
/// ```
///
/// The returned `$\lambda$` is either zero, if the Gauss-Newton step satisfies
/// `$\|\mathbf{D}\vec{p}\| - \Delta \leq 0.1\Delta$`, or positive with
/// `$|\|\mathbf{D}\vec{p}\| - \Delta| \leq 0.1\Delta$`. At most ten iterations
/// are done, after which the current estimate is returned.
///
/// # Inputs
///
/// - `r` holds the upper triangular `$\mathbf{R}$` of `$\mathbf{A}\mathbf{P} = \mathbf{Q}\mathbf{R}$`
///   in its leading `$n\times n$` block. Its strict lower triangle is overwritten,
///   see [`solve_with_diagonal`].
/// - `ipvt` is the permutation of `$\mathbf{P}$`, `qtb` the first `$n$`
///   elements of `$\mathbf{Q}^\top\vec{b}$`.
/// - `lambda` is an initial estimate, usually the result of the previous call.
///
/// On return `x` holds `$\vec{p}$` and `sdiag` the diagonal of the triangular `$\mathbf{S}$`
/// with `$\mathbf{P}^\top(\mathbf{A}^\top\mathbf{A} + \lambda\mathbf{D}\mathbf{D})\mathbf{P} = \mathbf{S}^\top\mathbf{S}$`.
/// `wa1` and `wa2` are workspaces of length `$n$`.
///
/// # Reference
///
/// This method resembles `LMPAR` from `MINPACK`. See the following paper
/// on how it works:
///
/// > Moré J.J. (1978) The Levenberg-Marquardt algorithm: Implementation and theory. In: Watson G.A. (eds) Numerical Analysis. Lecture Notes in Mathematics, vol 630. Springer, Berlin, Heidelberg.
///
/// Chapter 4.3 of "Numerical Optimization" by Nocedal and Wright also contains
/// information about this algorithm but is misses a few details.
#[allow(clippy::too_many_arguments)]
pub fn determine_lambda_and_parameter_update<F: RealField + Float>(
    r: &mut DMatrix<F>,
    ipvt: &[usize],
    diag: &[F],
    qtb: &[F],
    delta: F,
    lambda: F,
    x: &mut [F],
    sdiag: &mut [F],
    wa1: &mut [F],
    wa2: &mut [F],
) -> F {
    let n = ipvt.len();
    let p1: F = convert(0.1);
    let p001: F = convert(0.001);

    // compute and store in x the Gauss-Newton direction. If the
    // jacobian is rank-deficient, obtain a least squares solution.
    let mut nsing = n;
    for j in 0..n {
        wa1[j] = qtb[j];
        if r[(j, j)].is_zero() && nsing == n {
            nsing = j;
        }
        if nsing < n {
            wa1[j] = F::zero();
        }
    }
    for j in (0..nsing).rev() {
        wa1[j] /= r[(j, j)];
        let temp = wa1[j];
        for i in 0..j {
            wa1[i] -= r[(i, j)] * temp;
        }
    }
    for j in 0..n {
        x[ipvt[j]] = wa1[j];
    }

    // evaluate the function at the origin, and test
    // for acceptance of the Gauss-Newton direction
    for j in 0..n {
        wa2[j] = diag[j] * x[j];
    }
    let mut dxnorm = enorm(&wa2[..n]);
    let mut fp = dxnorm - delta;
    if fp <= p1 * delta {
        return F::zero();
    }

    // if the jacobian is not rank deficient, the Newton
    // step provides a lower bound, parl, for the zero of
    // the function. Otherwise set this bound to zero.
    let mut parl = F::zero();
    if nsing == n {
        for j in 0..n {
            let l = ipvt[j];
            wa1[j] = diag[l] * (wa2[l] / dxnorm);
        }
        for j in 0..n {
            let mut sum = F::zero();
            for i in 0..j {
                sum += r[(i, j)] * wa1[i];
            }
            wa1[j] = (wa1[j] - sum) / r[(j, j)];
        }
        let temp = enorm(&wa1[..n]);
        parl = ((fp / delta) / temp) / temp;
    }

    // calculate an upper bound, paru, for the zero of the function
    for j in 0..n {
        let mut sum = F::zero();
        for i in 0..=j {
            sum += r[(i, j)] * qtb[i];
        }
        wa1[j] = sum / diag[ipvt[j]];
    }
    let gnorm = enorm(&wa1[..n]);
    let mut paru = gnorm / delta;
    if paru.is_zero() {
        paru = dwarf::<F>() / Float::min(delta, p1);
    }

    // if the input par lies outside of the interval (parl,paru),
    // set par to the closer endpoint
    let mut par = Float::min(Float::max(lambda, parl), paru);
    if par.is_zero() {
        par = gnorm / dxnorm;
    }

    let mut iter = 0;
    loop {
        iter += 1;

        // evaluate the function at the current value of par
        if par.is_zero() {
            par = Float::max(dwarf(), p001 * paru);
        }
        let temp = Float::sqrt(par);
        for j in 0..n {
            wa1[j] = temp * diag[j];
        }
        solve_with_diagonal(r, ipvt, &wa1[..n], qtb, x, sdiag, wa2);
        for j in 0..n {
            wa2[j] = diag[j] * x[j];
        }
        dxnorm = enorm(&wa2[..n]);
        let temp = fp;
        fp = dxnorm - delta;

        // if the function is small enough, accept the current value
        // of par. also test for the exceptional cases where parl
        // is zero or the number of iterations has reached 10.
        if Float::abs(fp) <= p1 * delta
            || (parl.is_zero() && fp <= temp && temp < F::zero())
            || iter == 10
        {
            return par;
        }

        // compute the Newton correction
        for j in 0..n {
            let l = ipvt[j];
            wa1[j] = diag[l] * (wa2[l] / dxnorm);
        }
        for j in 0..n {
            wa1[j] /= sdiag[j];
            let temp = wa1[j];
            for i in j + 1..n {
                wa1[i] -= r[(i, j)] * temp;
            }
        }
        let temp = enorm(&wa1[..n]);
        let parc = ((fp / delta) / temp) / temp;

        // depending on the sign of the function, update parl or paru
        if fp > F::zero() {
            parl = Float::max(parl, par);
        }
        if fp < F::zero() {
            paru = Float::min(paru, par);
        }

        // compute an improved estimate for par
        par = Float::max(parl, par + parc);
    }
}

/// Compute the dogleg step for the trust-region subproblem
/// ```math
///   \min_{\vec{p}}\|\mathbf{A}\vec{p} - \vec{b}\|\text{ subject to }\|\mathbf{D}\vec{p}\|\leq\Delta.
/// ```
///
/// The step is the Gauss-Newton direction if it lies in the trust region.
/// Otherwise it is the convex combination of the Gauss-Newton direction and
/// the scaled gradient direction which has `$\|\mathbf{D}\vec{p}\| = \Delta$`,
/// or the scaled gradient direction itself if the unconstrained minimum along it
/// is already outside of the region.
///
/// `r` is the `$n\times n$` upper triangular `$\mathbf{R}$` of `$\mathbf{A} = \mathbf{Q}\mathbf{R}$`
/// stored row by row (length `$n(n+1)/2$`). `qtb` holds `$\mathbf{Q}^\top\vec{b}$`.
/// A zero diagonal element of `$\mathbf{R}$` is replaced by a small multiple of the
/// largest element of its column. `wa1` and `wa2` are workspaces of length `$n$`.
///
/// This resembles `DOGLEG` from `MINPACK`.
pub fn dogleg<F: RealField + Float>(
    r: &[F],
    diag: &[F],
    qtb: &[F],
    delta: F,
    x: &mut [F],
    wa1: &mut [F],
    wa2: &mut [F],
) {
    let n = diag.len();
    let epsmch = epsmch::<F>();

    // first, calculate the Gauss-Newton direction
    let mut jj = n * (n + 1) / 2;
    for k in 1..=n {
        let j = n - k;
        jj -= k;
        let mut sum = F::zero();
        for (i, &rl) in (j + 1..n).zip(&r[jj + 1..]) {
            sum += rl * x[i];
        }
        let mut temp = r[jj];
        if temp.is_zero() {
            let mut l = j;
            for i in 0..=j {
                temp = Float::max(temp, Float::abs(r[l]));
                l += n - i - 1;
            }
            temp = epsmch * temp;
            if temp.is_zero() {
                temp = epsmch;
            }
        }
        x[j] = (qtb[j] - sum) / temp;
    }

    // test whether the Gauss-Newton direction is acceptable
    for j in 0..n {
        wa1[j] = F::zero();
        wa2[j] = diag[j] * x[j];
    }
    let qnorm = enorm(&wa2[..n]);
    if qnorm <= delta {
        return;
    }

    // the Gauss-Newton direction is not acceptable.
    // next, calculate the scaled gradient direction.
    let mut l = 0;
    for j in 0..n {
        let temp = qtb[j];
        for wa1i in &mut wa1[j..n] {
            *wa1i += r[l] * temp;
            l += 1;
        }
        wa1[j] /= diag[j];
    }

    // calculate the norm of the scaled gradient and test for
    // the special case in which the scaled gradient is zero
    let gnorm = enorm(&wa1[..n]);
    let mut sgnorm = F::zero();
    let mut alpha = delta / qnorm;
    if !gnorm.is_zero() {
        // calculate the point along the scaled gradient
        // at which the quadratic is minimized
        for j in 0..n {
            wa1[j] = (wa1[j] / gnorm) / diag[j];
        }
        let mut l = 0;
        for j in 0..n {
            let mut sum = F::zero();
            for &wa1i in &wa1[j..n] {
                sum += r[l] * wa1i;
                l += 1;
            }
            wa2[j] = sum;
        }
        let temp = enorm(&wa2[..n]);
        sgnorm = (gnorm / temp) / temp;

        // test whether the scaled gradient direction is acceptable
        alpha = F::zero();
        if sgnorm < delta {
            // the scaled gradient direction is not acceptable.
            // finally, calculate the point along the dogleg
            // at which the quadratic is minimized.
            let bnorm = enorm(&qtb[..n]);
            let dq = delta / qnorm;
            let sd = sgnorm / delta;
            let mut temp = (bnorm / gnorm) * (bnorm / qnorm) * sd;
            temp = temp - dq * sd * sd
                + Float::sqrt(
                    Float::powi(temp - dq, 2)
                        + (F::one() - dq * dq) * (F::one() - sd * sd),
                );
            alpha = (dq * (F::one() - sd * sd)) / temp;
        }
    }

    // form appropriate convex combination of the Gauss-Newton
    // direction and the scaled gradient direction
    let temp = (F::one() - alpha) * Float::min(sgnorm, delta);
    for j in 0..n {
        x[j] = temp * wa1[j] + alpha * x[j];
    }
}
