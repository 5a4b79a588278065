//! Pivoted QR factorization and the regularized least-squares solver built on it.
//!
//! The factorization is stored in-place in the style of `MINPACK`: the
//! Householder vectors are in the lower trapezoid, the strictly upper triangle
//! holds `$\mathbf{R}$` and its diagonal is returned separately.
use nalgebra::{convert, DMatrix, RealField};
use num_traits::Float;

use crate::utils::{column, enorm, epsmch, givens};

/// Householder QR decomposition with optional column pivoting.
///
/// Let `$\mathbf{A}\in\R^{m\times n}$`. This computes an orthogonal matrix `$\mathbf{Q}$`,
/// an upper trapezoidal matrix `$\mathbf{R}$` and, if `pivot` is set, a permutation
/// matrix `$\mathbf{P}$` such that `$\mathbf{A}\mathbf{P} = \mathbf{Q}\mathbf{R}$`.
/// Pivoting chooses the remaining column of largest norm in every step, so the
/// diagonal of `$\mathbf{R}$` has nonincreasing magnitude.
///
/// On return
///
/// - `a` contains the strictly upper part of `$\mathbf{R}$` and the Householder
///   vectors `$\vec{w}_j$` in its lower trapezoid. `$\mathbf{Q} = \prod_j(\mathbf{I} - \vec{w}_j\vec{w}_j^\top/w_{jj})$`.
/// - `rdiag` contains the diagonal of `$\mathbf{R}$`.
/// - `acnorm` contains the norms of the columns of the input.
/// - `ipvt[j]` is the column of `$\mathbf{A}$` moved to position `$j$`. Not touched
///   without pivoting, so an empty slice can be passed.
///
/// `rdiag`, `acnorm` and `wa` must have length `$n$`.
///
/// This resembles `QRFAC` from `MINPACK`.
pub fn pivoted_qr<F: RealField + Float>(
    a: &mut DMatrix<F>,
    pivot: bool,
    ipvt: &mut [usize],
    rdiag: &mut [F],
    acnorm: &mut [F],
    wa: &mut [F],
) {
    let (m, n) = a.shape();
    let p05: F = convert(0.05);

    for j in 0..n {
        acnorm[j] = enorm(column(a, j, 0));
        rdiag[j] = acnorm[j];
        wa[j] = rdiag[j];
        if pivot {
            ipvt[j] = j;
        }
    }

    for j in 0..m.min(n) {
        if pivot {
            // bring the column of largest norm into the pivot position
            let mut kmax = j;
            for k in j..n {
                if rdiag[k] > rdiag[kmax] {
                    kmax = k;
                }
            }
            if kmax != j {
                a.swap_columns(j, kmax);
                rdiag[kmax] = rdiag[j];
                wa[kmax] = wa[j];
                ipvt.swap(j, kmax);
            }
        }

        // compute the Householder transformation which reduces the
        // j-th column of a to a multiple of the j-th unit vector
        let mut ajnorm = enorm(column(a, j, j));
        if !ajnorm.is_zero() {
            if a[(j, j)] < F::zero() {
                ajnorm = -ajnorm;
            }
            for i in j..m {
                a[(i, j)] /= ajnorm;
            }
            a[(j, j)] += F::one();

            // apply the transformation to the remaining columns
            // and update the norms
            for k in j + 1..n {
                let mut sum = F::zero();
                for i in j..m {
                    sum += a[(i, j)] * a[(i, k)];
                }
                let temp = sum / a[(j, j)];
                for i in j..m {
                    let w = a[(i, j)];
                    a[(i, k)] -= temp * w;
                }
                if pivot && !rdiag[k].is_zero() {
                    let temp = a[(j, k)] / rdiag[k];
                    rdiag[k] *= Float::sqrt(Float::max(F::zero(), F::one() - temp * temp));
                    if p05 * Float::powi(rdiag[k] / wa[k], 2) <= epsmch() {
                        rdiag[k] = enorm(column(a, k, j + 1));
                        wa[k] = rdiag[k];
                    }
                }
            }
        }
        rdiag[j] = -ajnorm;
    }
}

/// Multiply `b` (length `$m$`) with `$\mathbf{Q}^\top$` of a factorization
/// computed by [`pivoted_qr`].
///
/// `a` must still hold the Householder vectors, i.e. its diagonal must not
/// have been overwritten with `rdiag` yet.
pub fn apply_qt<F: RealField + Float>(a: &DMatrix<F>, b: &mut [F]) {
    let (m, n) = a.shape();
    for j in 0..m.min(n) {
        let ajj = a[(j, j)];
        if ajj.is_zero() {
            continue;
        }
        let w = column(a, j, j);
        let mut sum = F::zero();
        for (wi, bi) in w.iter().zip(&b[j..]) {
            sum += *wi * *bi;
        }
        let temp = -sum / ajj;
        for (wi, bi) in w.iter().zip(&mut b[j..]) {
            *bi += *wi * temp;
        }
    }
}

/// Accumulate the orthogonal factor `$\mathbf{Q}\in\R^{m\times m}$` from the
/// factored form.
///
/// On input the first `$\min(m, n)$` columns of the square matrix `q` contain the
/// output `a` of [`pivoted_qr`] for an `$m\times n$` matrix. On output `q` is
/// `$\mathbf{Q}$` itself. `wa` must have length `$m$`.
///
/// This resembles `QFORM` from `MINPACK`.
pub fn form_q<F: RealField + Float>(q: &mut DMatrix<F>, n: usize, wa: &mut [F]) {
    let m = q.nrows();
    let minmn = m.min(n);

    // zero out the upper triangle in the first min(m,n) columns
    for j in 1..minmn {
        for i in 0..j {
            q[(i, j)] = F::zero();
        }
    }
    // initialize the remaining columns to those of the identity
    for j in n..m {
        for i in 0..m {
            q[(i, j)] = F::zero();
        }
        q[(j, j)] = F::one();
    }

    for k in (0..minmn).rev() {
        for i in k..m {
            wa[i] = q[(i, k)];
            q[(i, k)] = F::zero();
        }
        q[(k, k)] = F::one();
        if wa[k].is_zero() {
            continue;
        }
        for j in k..m {
            let mut sum = F::zero();
            for i in k..m {
                sum += q[(i, j)] * wa[i];
            }
            let temp = sum / wa[k];
            for i in k..m {
                q[(i, j)] -= temp * wa[i];
            }
        }
    }
}

/// Solve the least squares problem
/// ```math
///   \min_{\vec{x}}\left\|\begin{pmatrix}\mathbf{A}\\ \mathbf{D}\end{pmatrix}\vec{x} - \begin{pmatrix}\vec{b}\\ \vec{0}\end{pmatrix}\right\|
/// ```
/// for a diagonal matrix `$\mathbf{D}$`, given the QR decomposition
/// `$\mathbf{A}\mathbf{P} = \mathbf{Q}\mathbf{R}$` and `$\mathbf{Q}^\top\vec{b}$`.
///
/// Inputs
///
/// - the upper triangle of the leading `$n\times n$` block of `r` is `$\mathbf{R}$`
///   (including its diagonal),
/// - `ipvt` is the permutation of `$\mathbf{P}$`,
/// - `diag` the diagonal of `$\mathbf{D}$`,
/// - `qtb` the first `$n$` elements of `$\mathbf{Q}^\top\vec{b}$`.
///
/// The diagonal elements of `$\mathbf{D}$` are eliminated with Givens rotations
/// which yields `$\mathbf{P}^\top(\mathbf{A}^\top\mathbf{A} + \mathbf{D}\mathbf{D})\mathbf{P} = \mathbf{S}^\top\mathbf{S}$`
/// with an upper triangular `$\mathbf{S}$`. The strict lower triangle of `r`
/// receives `$\mathbf{S}^\top$`, `sdiag` the diagonal of `$\mathbf{S}$`.
/// The upper triangle of `r` is preserved.
/// If `$\mathbf{S}$` is singular, the components of the solution
/// past the first zero diagonal entry are set to zero.
///
/// `x`, `sdiag` and `wa` must have length `$n$`.
///
/// This resembles `QRSOLV` from `MINPACK`.
pub fn solve_with_diagonal<F: RealField + Float>(
    r: &mut DMatrix<F>,
    ipvt: &[usize],
    diag: &[F],
    qtb: &[F],
    x: &mut [F],
    sdiag: &mut [F],
    wa: &mut [F],
) {
    let n = ipvt.len();

    // copy R and Q^T b to preserve input and initialize S;
    // save the diagonal elements of R in x
    for j in 0..n {
        for i in j..n {
            r[(i, j)] = r[(j, i)];
        }
        x[j] = r[(j, j)];
        wa[j] = qtb[j];
    }

    // eliminate the diagonal matrix D using Givens rotations
    for j in 0..n {
        let dj = diag[ipvt[j]];
        if !dj.is_zero() {
            for s in &mut sdiag[j..n] {
                *s = F::zero();
            }
            sdiag[j] = dj;

            // the transformations to eliminate the row of D modify only a
            // single element of Q^T b beyond the first n, which is initially zero
            let mut qtbpj = F::zero();
            for k in j..n {
                if sdiag[k].is_zero() {
                    continue;
                }
                let (cos, sin) = givens(r[(k, k)], sdiag[k]);

                // compute the modified diagonal element of R and
                // the modified element of (Q^T b, 0)
                r[(k, k)] = cos * r[(k, k)] + sin * sdiag[k];
                let temp = cos * wa[k] + sin * qtbpj;
                qtbpj = -sin * wa[k] + cos * qtbpj;
                wa[k] = temp;

                // accumulate the transformation in the row of S
                for i in k + 1..n {
                    let temp = cos * r[(i, k)] + sin * sdiag[i];
                    sdiag[i] = -sin * r[(i, k)] + cos * sdiag[i];
                    r[(i, k)] = temp;
                }
            }
        }
        // store the diagonal element of S and restore
        // the corresponding diagonal element of R
        sdiag[j] = r[(j, j)];
        r[(j, j)] = x[j];
    }

    // solve the triangular system for z; if the system is
    // singular, obtain a least squares solution
    let nsing = sdiag[..n].iter().position(|s| s.is_zero()).unwrap_or(n);
    for w in &mut wa[nsing..n] {
        *w = F::zero();
    }
    for j in (0..nsing).rev() {
        let mut sum = F::zero();
        for i in j + 1..nsing {
            sum += r[(i, j)] * wa[i];
        }
        wa[j] = (wa[j] - sum) / sdiag[j];
    }

    // permute the components of z back to components of x
    for j in 0..n {
        x[ipvt[j]] = wa[j];
    }
}
