//! Updates of a triangular factor with Givens rotations.
//!
//! These keep a QR factorization current without refactoring: a rank-one
//! modification for the Broyden update of the hybrid method and the
//! row by row accumulation used by the memory-conserving least-squares driver.
use nalgebra::{DMatrix, RealField};
use num_traits::Float;

use crate::utils::givens;

/// Encode a rotation computed by [`givens`] in one number.
///
/// The sine is stored if it is the smaller of the two, otherwise the secant
/// (or one if the cosine is too small to invert).
#[inline]
fn encode<F: RealField + Float>(a: F, b: F, cos: F, sin: F) -> F {
    if Float::abs(a) < Float::abs(b) {
        if Float::abs(cos) * <F as Float>::max_value() > F::one() {
            F::one() / cos
        } else {
            F::one()
        }
    } else {
        sin
    }
}

/// Decode a rotation stored by [`encode`].
#[inline]
fn decode<F: RealField + Float>(tau: F) -> (F, F) {
    if Float::abs(tau) > F::one() {
        let cos = F::one() / tau;
        (cos, Float::sqrt(F::one() - cos * cos))
    } else {
        (Float::sqrt(F::one() - tau * tau), tau)
    }
}

/// Update a lower trapezoidal matrix after a rank-one modification.
///
/// Given an `$m\times n$` lower trapezoidal matrix `$\mathbf{S}$`, an `$m$`-vector
/// `$\vec{u}$` and an `$n$`-vector `$\vec{v}$`, determine an orthogonal matrix
/// `$\mathbf{Q}$` such that `$(\mathbf{S} + \vec{u}\vec{v}^\top)\mathbf{Q}$` is
/// again lower trapezoidal.
///
/// `$\mathbf{Q}$` is the product of `$2(n-1)$` Givens rotations
/// ```math
///   \mathbf{Q} = \mathbf{G}_{v,n-1}\cdots\mathbf{G}_{v,1}\,\mathbf{G}_{w,1}\cdots\mathbf{G}_{w,n-1},
/// ```
/// each acting in the plane of column `$j$` and column `$n$`. The first
/// sequence transforms `$\vec{v}$` into a multiple of the last unit vector, the
/// second one removes the resulting spike from the last column.
///
/// - `s` holds `$\mathbf{S}$` column by column, only the lower trapezoid
///   (length `$n(2m - n + 1)/2$`). It is overwritten with the updated matrix.
///   Since `$\mathbf{S} = \mathbf{R}^\top$` for an upper triangular `$\mathbf{R}$`
///   this is the same as `$\mathbf{R}$` stored row by row.
/// - `v` (length `$n$`) is overwritten with the first rotation sequence, encoded
///   as in [`apply_rotations`].
/// - `w` (length `$m$`) receives the second rotation sequence.
///
/// Returns `true` if any diagonal element of the updated matrix is zero.
///
/// This resembles `R1UPDT` from `MINPACK`.
pub fn rank1_update<F: RealField + Float>(
    m: usize,
    s: &mut [F],
    u: &[F],
    v: &mut [F],
    w: &mut [F],
) -> bool {
    let n = v.len();
    if n == 0 {
        return false;
    }
    // position of the diagonal element of the last column
    let mut jj = n * (2 * m - n + 1) / 2 - (m - n + 1);

    // move the nontrivial part of the last column of S into w
    let mut l = jj;
    for i in n - 1..m {
        w[i] = s[l];
        l += 1;
    }

    // rotate the vector v into a multiple of the n-th unit vector
    // in such a way that a spike is introduced into w
    for j in (0..n - 1).rev() {
        jj -= m - j;
        w[j] = F::zero();
        if v[j].is_zero() {
            continue;
        }
        let (cos, sin) = givens(v[n - 1], v[j]);
        let tau = encode(v[n - 1], v[j], cos, sin);
        v[n - 1] = sin * v[j] + cos * v[n - 1];
        v[j] = tau;

        // apply the transformation to S and extend the spike in w
        let mut l = jj;
        for i in j..m {
            let temp = cos * s[l] - sin * w[i];
            w[i] = sin * s[l] + cos * w[i];
            s[l] = temp;
            l += 1;
        }
    }

    // add the spike from the rank one update to w
    for (wi, &ui) in w.iter_mut().zip(u).take(m) {
        *wi += v[n - 1] * ui;
    }

    // eliminate the spike
    let mut singular = false;
    for j in 0..n - 1 {
        if !w[j].is_zero() {
            let (cos, sin) = givens(s[jj], w[j]);
            let tau = encode(s[jj], w[j], cos, sin);

            // apply the transformation to S and reduce the spike in w
            let mut l = jj;
            for i in j..m {
                let temp = cos * s[l] + sin * w[i];
                w[i] = -sin * s[l] + cos * w[i];
                s[l] = temp;
                l += 1;
            }
            w[j] = tau;
        }
        if s[jj].is_zero() {
            singular = true;
        }
        jj += m - j;
    }

    // move w back into the last column of the output S
    let mut l = jj;
    for i in n - 1..m {
        s[l] = w[i];
        l += 1;
    }
    if s[jj].is_zero() {
        singular = true;
    }
    singular
}

/// Multiply the `$m\times n$` matrix `a` (column-major, leading dimension `$m$`)
/// from the right with the orthogonal matrix computed by [`rank1_update`].
///
/// `v` and `w` (length `$n$`, only the first `$n-1$` entries are used) hold
/// the two rotation sequences. Rotation `$j$` is stored as a single number
/// `$\tau$`: if `$|\tau| \leq 1$` it is the sine, otherwise the reciprocal
/// of the cosine.
///
/// With `$m = 1$` this computes `$\mathbf{Q}^\top\vec{b}$` for a vector `$\vec{b}$`.
///
/// This resembles `R1MPYQ` from `MINPACK`.
pub fn apply_rotations<F: RealField + Float>(m: usize, a: &mut [F], v: &[F], w: &[F]) {
    let n = v.len();
    if n < 2 {
        return;
    }
    let last = (n - 1) * m;

    // apply the first set of Givens rotations to a
    for j in (0..n - 1).rev() {
        let (cos, sin) = decode(v[j]);
        let col = j * m;
        for i in 0..m {
            let temp = cos * a[col + i] - sin * a[last + i];
            a[last + i] = sin * a[col + i] + cos * a[last + i];
            a[col + i] = temp;
        }
    }

    // apply the second set of Givens rotations to a
    for (j, &tau) in w.iter().enumerate().take(n - 1) {
        let (cos, sin) = decode(tau);
        let col = j * m;
        for i in 0..m {
            let temp = cos * a[col + i] + sin * a[last + i];
            a[last + i] = -sin * a[col + i] + cos * a[last + i];
            a[col + i] = temp;
        }
    }
}

/// Add a row to an upper triangular matrix.
///
/// Given an `$n\times n$` upper triangular `$\mathbf{R}$`, an `$n$`-vector `$\vec{b}$`
/// and a new row `$\vec{w}^\top$` with right hand side `$\alpha$`, compute
/// an orthogonal `$\mathbf{Q}$` such that
/// ```math
///   \mathbf{Q}^\top\begin{pmatrix}\mathbf{R} & \vec{b}\\ \vec{w}^\top & \alpha\end{pmatrix}
///     = \begin{pmatrix}\mathbf{\tilde{R}} & \vec{\tilde{b}}\\ \vec{0}^\top & \tilde{\alpha}\end{pmatrix}
/// ```
/// with an upper triangular `$\mathbf{\tilde{R}}$`. `$\mathbf{Q}$` is a product of
/// `$n$` Givens rotations. Only the upper triangle of the leading `$n\times n$`
/// block of `r` is accessed.
///
/// `cos` and `sin` (length `$n$`) receive the rotations.
///
/// This resembles `RWUPDT` from `MINPACK`.
pub fn row_update<F: RealField + Float>(
    r: &mut DMatrix<F>,
    w: &[F],
    b: &mut [F],
    alpha: &mut F,
    cos: &mut [F],
    sin: &mut [F],
) {
    for (j, &wj) in w.iter().enumerate() {
        let mut rowj = wj;

        // apply the previous transformations to r(i,j), i=0,1,...,j-1, and to w(j)
        for i in 0..j {
            let temp = cos[i] * r[(i, j)] + sin[i] * rowj;
            rowj = -sin[i] * r[(i, j)] + cos[i] * rowj;
            r[(i, j)] = temp;
        }

        // determine a Givens rotation which eliminates w(j)
        cos[j] = F::one();
        sin[j] = F::zero();
        if rowj.is_zero() {
            continue;
        }
        let (c, s) = givens(r[(j, j)], rowj);
        cos[j] = c;
        sin[j] = s;

        // apply the current transformation to r(j,j), b(j), and alpha
        r[(j, j)] = c * r[(j, j)] + s * rowj;
        let temp = c * b[j] + s * *alpha;
        *alpha = -s * b[j] + c * *alpha;
        b[j] = temp;
    }
}
