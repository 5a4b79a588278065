//! Numerical helpers shared by the solvers.
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

use crate::termination::InputError;

pub mod check;
pub mod finite_difference;

pub use check::check_jacobian;
pub use finite_difference::{forward_difference, forward_difference_banded};

/// Machine epsilon.
#[inline]
pub fn epsmch<F: Float>() -> F {
    <F as Float>::epsilon()
}

/// Smallest positive normalized number.
#[inline]
pub fn dwarf<F: Float>() -> F {
    <F as Float>::min_positive_value()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "minpack-compat")] {
        #[inline]
        fn rdwarf<F: RealField + Float>() -> F {
            convert(3.834e-20)
        }

        #[inline]
        fn rgiant<F: RealField + Float>() -> F {
            convert(1.304e19)
        }

        /// Whether the solvers stop early because the residuals vanished.
        #[inline]
        pub(crate) fn residuals_zero<F: RealField>(_fnorm: F) -> bool {
            false
        }
    } else {
        #[inline]
        fn rdwarf<F: RealField + Float>() -> F {
            let three_halves: F = convert(1.5);
            let ten: F = convert(10.);
            Float::sqrt(dwarf::<F>() * three_halves) * ten
        }

        #[inline]
        fn rgiant<F: RealField + Float>() -> F {
            let tenth: F = convert(0.1);
            Float::sqrt(<F as Float>::max_value()) * tenth
        }

        /// Whether the solvers stop early because the residuals vanished.
        #[inline]
        pub(crate) fn residuals_zero<F: RealField>(fnorm: F) -> bool {
            fnorm.is_zero()
        }
    }
}

/// Scaling of the variables used by both drivers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scaling<F: RealField> {
    /// Scale by the column norms of the Jacobian, never decreasing.
    Jacobian,
    /// No scaling.
    Unit,
    /// Fixed user supplied factors.
    Fixed(DVector<F>),
}

impl<F: RealField + Float> Scaling<F> {
    pub(crate) fn is_adaptive(&self) -> bool {
        matches!(self, Scaling::Jacobian)
    }

    pub(crate) fn validate(&self, n: usize) -> Result<(), InputError> {
        if let Scaling::Fixed(diag) = self {
            if diag.len() != n {
                return Err(InputError::ScaleLength {
                    expected: n,
                    found: diag.len(),
                });
            }
            if let Some(index) = diag.iter().position(|d| !(*d > F::zero())) {
                return Err(InputError::NonPositiveScale { index });
            }
        }
        Ok(())
    }

    /// Factors before the first Jacobian is known.
    pub(crate) fn initial(&self, n: usize) -> DVector<F> {
        match self {
            Scaling::Fixed(diag) if diag.len() == n => diag.clone(),
            _ => DVector::from_element(n, F::one()),
        }
    }
}

/// Reject negative and NaN tolerances.
pub(crate) fn check_tolerance<F: RealField + Float>(
    name: &'static str,
    tol: F,
) -> Result<(), InputError> {
    if tol >= F::zero() {
        Ok(())
    } else {
        Err(InputError::NegativeTolerance(name))
    }
}

/// Euclidean norm of `x` which avoids destructive underflow and overflow.
///
/// The components are split into three groups: small ones (at most `rdwarf`),
/// large ones (at least `rgiant / n`) and the intermediate rest. The sum
/// of squares of the intermediate components is accumulated directly, the
/// small and large components are summed after scaling by their running
/// maximum. The three partial sums are combined at the end.
///
/// This resembles `ENORM` from `MINPACK`.
pub fn enorm<F: RealField + Float>(x: &[F]) -> F {
    if x.is_empty() {
        return F::zero();
    }
    let n: F = convert(x.len() as f64);
    let rdwarf = rdwarf::<F>();
    let agiant = rgiant::<F>() / n;

    let mut s1 = F::zero();
    let mut s2 = F::zero();
    let mut s3 = F::zero();
    let mut x1max = F::zero();
    let mut x3max = F::zero();
    for &xi in x {
        let xabs = Float::abs(xi);
        if xabs >= agiant {
            // large components
            if xabs > x1max {
                s1 = F::one() + s1 * Float::powi(x1max / xabs, 2);
                x1max = xabs;
            } else {
                s1 += Float::powi(xabs / x1max, 2);
            }
        } else if xabs <= rdwarf {
            // small components
            if xabs > x3max {
                s3 = F::one() + s3 * Float::powi(x3max / xabs, 2);
                x3max = xabs;
            } else if !xabs.is_zero() {
                s3 += Float::powi(xabs / x3max, 2);
            }
        } else {
            s2 += xabs * xabs;
        }
    }

    if !s1.is_zero() {
        x1max * Float::sqrt(s1 + (s2 / x1max) / x1max)
    } else if !s2.is_zero() {
        if s2 >= x3max {
            Float::sqrt(s2 * (F::one() + (x3max / s2) * (x3max * s3)))
        } else {
            Float::sqrt(x3max * ((s2 / x3max) + (x3max * s3)))
        }
    } else {
        x3max * Float::sqrt(s3)
    }
}

/// `$\|\mathbf{D}\vec{x}\|$`, using `wa` as workspace.
pub(crate) fn scaled_norm<F: RealField + Float>(
    diag: &DVector<F>,
    x: &DVector<F>,
    wa: &mut DVector<F>,
) -> F {
    wa.copy_from(x);
    wa.component_mul_assign(diag);
    enorm(wa.as_slice())
}

/// Elements `from..` of column `j`.
#[inline]
pub(crate) fn column<F: RealField>(a: &DMatrix<F>, j: usize, from: usize) -> &[F] {
    let m = a.nrows();
    &a.as_slice()[j * m + from..(j + 1) * m]
}

/// Givens rotation `(cos, sin)` which annihilates `b` against `a`.
///
/// Applying `$\begin{pmatrix}c & s\\ -s & c\end{pmatrix}$` to `$(a, b)^\top$`
/// gives `$(\pm\sqrt{a^2+b^2}, 0)^\top$`. The caller ensures `b != 0`.
#[inline]
pub(crate) fn givens<F: RealField + Float>(a: F, b: F) -> (F, F) {
    let p5: F = convert(0.5);
    let p25: F = convert(0.25);
    if Float::abs(a) < Float::abs(b) {
        let cotan = a / b;
        let sin = p5 / Float::sqrt(p25 + p25 * cotan * cotan);
        (sin * cotan, sin)
    } else {
        let tan = b / a;
        let cos = p5 / Float::sqrt(p25 + p25 * tan * tan);
        (cos, cos * tan)
    }
}
