//! Covariance of the least-squares solution.
use nalgebra::{DMatrix, RealField};
use num_traits::Float;

/// Covariance matrix of the parameters together with the numerical
/// rank of the Jacobian it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<F: RealField> {
    pub matrix: DMatrix<F>,
    pub rank: usize,
}

/// Compute `$(\mathbf{J}^\top\mathbf{J})^{-1}$` from the pivoted QR decomposition
/// `$\mathbf{J}\mathbf{P} = \mathbf{Q}\mathbf{R}$`.
///
/// The leading `$n\times n$` block of `r` must contain the full upper triangle of
/// `$\mathbf{R}$`, `ipvt` the permutation `$\mathbf{P}$` (`$n$` = `ipvt.len()`).
/// On return the block contains the symmetric covariance matrix.
///
/// A diagonal element of `$\mathbf{R}$` with `$|r_{kk}| \leq \mathtt{tol}\,|r_{11}|$`
/// determines the numerical rank `$l = k - 1$`: only the leading `$l\times l$`
/// block of `$\mathbf{R}$` is inverted and rows and columns of the covariance
/// belonging to the other parameters are zero. The rank is returned.
///
/// `wa` is workspace of length `$n$`.
///
/// This resembles `COVAR` from `MINPACK`.
pub fn covariance<F: RealField + Float>(
    r: &mut DMatrix<F>,
    ipvt: &[usize],
    tol: F,
    wa: &mut [F],
) -> usize {
    let n = ipvt.len();
    if n == 0 {
        return 0;
    }
    let tolr = tol * Float::abs(r[(0, 0)]);

    // form the inverse of r in the full upper triangle of r
    let mut l = 0;
    for k in 0..n {
        if Float::abs(r[(k, k)]) <= tolr {
            break;
        }
        r[(k, k)] = F::one() / r[(k, k)];
        for j in 0..k {
            let temp = r[(k, k)] * r[(j, k)];
            r[(j, k)] = F::zero();
            for i in 0..=j {
                let rij = r[(i, j)];
                r[(i, k)] -= temp * rij;
            }
        }
        l = k + 1;
    }

    // form the full upper triangle of the inverse of (r transpose)*r
    // in the full upper triangle of r
    for k in 0..l {
        for j in 0..k {
            let temp = r[(j, k)];
            for i in 0..=j {
                let rik = r[(i, k)];
                r[(i, j)] += temp * rik;
            }
        }
        let temp = r[(k, k)];
        for i in 0..=k {
            r[(i, k)] *= temp;
        }
    }

    // form the full lower triangle of the covariance matrix
    // in the strict lower triangle of r and in wa
    for j in 0..n {
        let jj = ipvt[j];
        let singular = j >= l;
        for i in 0..=j {
            if singular {
                r[(i, j)] = F::zero();
            }
            let ii = ipvt[i];
            if ii > jj {
                r[(ii, jj)] = r[(i, j)];
            }
            if ii < jj {
                r[(jj, ii)] = r[(i, j)];
            }
        }
        wa[jj] = r[(j, j)];
    }

    // symmetrize the covariance matrix in r
    for j in 0..n {
        for i in 0..j {
            r[(i, j)] = r[(j, i)];
        }
        r[(j, j)] = wa[j];
    }
    l
}
