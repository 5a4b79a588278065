//! Tests with example functions.
//!
//! The reference values were produced by the `MINPACK` routines with the
//! same starting points and tolerances.
use alloc::vec::Vec;
use core::f64::consts::PI;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use crate::utils::check_jacobian;
use crate::{
    Abort, Jacobian, JacobianRows, LevenbergMarquardt, MinimizationReport, Problem,
    TerminationReason,
};

/// TOL value used by SciPy
const TOL: f64 = 1.49012e-08;

fn dvec(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}

/// Every residual which depends on `x` must pass the first-order gradient check.
///
/// Constant residuals are skipped, the check cannot rate them.
fn assert_jacobian_correct<P: Jacobian<f64>>(problem: &mut P, x: &[f64]) {
    let x = dvec(x);
    let mut fjac = DMatrix::zeros(problem.residual_count(), x.len());
    problem.jacobian(&x, &mut fjac).unwrap();
    let err = check_jacobian(problem, &x).unwrap();
    for (i, e) in err.iter().enumerate() {
        if fjac.row(i).iter().all(|d| *d == 0.) {
            continue;
        }
        assert!(*e > 0.5, "gradient of residual {} rated {}", i, e);
    }
}

/// Serves the rows of an analytic Jacobian one at a time.
struct Rows<P> {
    inner: P,
    fjac: DMatrix<f64>,
}

impl<P: Jacobian<f64>> Rows<P> {
    fn new(inner: P, n: usize) -> Self {
        let m = inner.residual_count();
        Self {
            inner,
            fjac: DMatrix::zeros(m, n),
        }
    }
}

impl<P: Jacobian<f64>> Problem<f64> for Rows<P> {
    fn residual_count(&self) -> usize {
        self.inner.residual_count()
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        self.inner.evaluate(x, fvec)
    }
}

impl<P: Jacobian<f64>> JacobianRows<f64> for Rows<P> {
    fn jacobian_row(
        &mut self,
        x: &DVector<f64>,
        row: usize,
        fjrow: &mut DVector<f64>,
    ) -> Result<(), Abort> {
        if row == 0 {
            self.inner.jacobian(x, &mut self.fjac)?;
        }
        fjrow.copy_from(&self.fjac.row(row).transpose());
        Ok(())
    }
}

struct LinearFullRank {
    m: usize,
}

impl Problem<f64> for LinearFullRank {
    fn residual_count(&self) -> usize {
        self.m
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        fvec.fill(-2. * x.sum() / self.m as f64 - 1.);
        for (el, p) in fvec.iter_mut().zip(x.iter()) {
            *el += p;
        }
        Ok(())
    }
}

impl Jacobian<f64> for LinearFullRank {
    fn jacobian(&mut self, _x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        fjac.fill(-2. / self.m as f64);
        for i in 0..fjac.ncols() {
            fjac[(i, i)] += 1.;
        }
        Ok(())
    }
}

#[test]
fn test_linear_full_rank() {
    let mut problem = LinearFullRank { m: 10 };
    assert_jacobian_correct(&mut problem, &[0.3, -0.7, 1.1, 0.2, 0.5]);

    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: true
        }
    );
    assert_relative_eq!(report.objective_function, 2.5, max_relative = 1e-12);
    assert_relative_eq!(x, DVector::from_element(5, -1.), epsilon = 1e-10);

    let mut problem = LinearFullRank { m: 50 };
    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(report.objective_function, 22.5, max_relative = 1e-12);
    assert_relative_eq!(x, DVector::from_element(5, -1.), epsilon = 1e-10);
}

#[test]
fn test_linear_full_rank_all_drivers() {
    let config = LevenbergMarquardt::new().with_tol(TOL);

    let mut x = DVector::from_element(5, 1.);
    let report = config.minimize_numerically(&mut LinearFullRank { m: 10 }, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(report.objective_function, 2.5, max_relative = 1e-8);
    assert_relative_eq!(x, DVector::from_element(5, -1.), epsilon = 1e-6);
    assert_eq!(report.fjac.shape(), (10, 5));

    let mut x = DVector::from_element(5, 1.);
    let mut problem = Rows::new(LinearFullRank { m: 10 }, 5);
    let report = config.minimize_rowwise(&mut problem, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(report.objective_function, 2.5, max_relative = 1e-12);
    assert_relative_eq!(x, DVector::from_element(5, -1.), epsilon = 1e-10);
    assert_eq!(report.fjac.shape(), (5, 5));
}

struct LinearRank1 {
    m: usize,
}

impl Problem<f64> for LinearRank1 {
    fn residual_count(&self) -> usize {
        self.m
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        let weighted_sum: f64 = x
            .iter()
            .enumerate()
            .map(|(j, p)| (j + 1) as f64 * p)
            .sum();
        for (i, el) in fvec.iter_mut().enumerate() {
            *el = (i + 1) as f64 * weighted_sum - 1.;
        }
        Ok(())
    }
}

impl Jacobian<f64> for LinearRank1 {
    fn jacobian(&mut self, _x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        for j in 0..5 {
            for i in 0..self.m {
                fjac[(i, j)] = ((i + 1) * (j + 1)) as f64;
            }
        }
        Ok(())
    }
}

#[test]
fn test_linear_rank1() {
    let mut problem = LinearRank1 { m: 10 };
    assert_jacobian_correct(&mut problem, &[0.3, -0.7, 1.1, 0.2, 0.5]);

    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: false
        }
    );
    assert_relative_eq!(
        report.objective_function,
        1.0714285714285714,
        max_relative = 1e-10
    );

    let mut problem = LinearRank1 { m: 50 };
    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(
        report.objective_function,
        6.064356435643563,
        max_relative = 1e-10
    );

    // the covariance of a rank one Jacobian has rank one
    let covariance = report.covariance(1e-10);
    assert_eq!(covariance.rank, 1);
}

struct LinearRank1ZeroColumns {
    m: usize,
}

impl Problem<f64> for LinearRank1ZeroColumns {
    fn residual_count(&self) -> usize {
        self.m
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        let weighted_sum: f64 = x
            .iter()
            .enumerate()
            .map(|(j, p)| if j == 0 || j == 4 { 0. } else { (j + 1) as f64 * p })
            .sum();
        let m = self.m;
        for (i, el) in fvec.iter_mut().enumerate() {
            *el = if i == m - 1 {
                -1.
            } else {
                i as f64 * weighted_sum - 1.
            };
        }
        Ok(())
    }
}

impl Jacobian<f64> for LinearRank1ZeroColumns {
    fn jacobian(&mut self, _x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        let m = self.m;
        for j in 0..5 {
            for i in 0..m {
                fjac[(i, j)] = if i >= 1 && (1..4).contains(&j) && i < m - 1 {
                    ((j + 1) * i) as f64
                } else {
                    0.
                };
            }
        }
        Ok(())
    }
}

#[test]
fn test_linear_rank1_zero() {
    let mut problem = LinearRank1ZeroColumns { m: 10 };
    assert_jacobian_correct(&mut problem, &[0.3, -0.7, 1.1, 0.2, 0.5]);
    // the first and the last residual are constant
    let err = check_jacobian(&mut problem, &dvec(&[0.3, -0.7, 1.1, 0.2, 0.5])).unwrap();
    assert_eq!(err[0], 0.);
    assert_eq!(err[9], 0.);

    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(
        report.objective_function,
        1.8235294117647063,
        max_relative = 1e-10
    );
    // zero columns of the Jacobian are never moved
    assert_eq!(x[0], 1.);
    assert_eq!(x[4], 1.);

    let mut problem = LinearRank1ZeroColumns { m: 50 };
    let mut x = DVector::from_element(5, 1.);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(
        report.objective_function,
        6.814432989690721,
        max_relative = 1e-10
    );
}

struct Rosenbrock;

impl Problem<f64> for Rosenbrock {
    fn residual_count(&self) -> usize {
        2
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        fvec[0] = 10. * (x[1] - x[0] * x[0]);
        fvec[1] = 1. - x[0];
        Ok(())
    }
}

impl Jacobian<f64> for Rosenbrock {
    #[rustfmt::skip]
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        fjac.copy_from_slice(&[
            -20. * x[0], -1.,
                    10.,  0.,
        ]);
        Ok(())
    }
}

#[test]
fn test_rosenbrock() {
    assert_jacobian_correct(&mut Rosenbrock, &[0.3, 0.8]);

    for initial in [[-1.2, 1.], [8.8, 11.], [98.8, 101.]] {
        let mut x = dvec(&initial);
        let report = LevenbergMarquardt::new()
            .with_tol(TOL)
            .minimize(&mut Rosenbrock, &mut x);
        assert!(report.termination.was_successful(), "{:?}", report.termination);
        #[cfg(not(feature = "minpack-compat"))]
        assert_eq!(report.termination, TerminationReason::ResidualsZero);
        assert!(report.objective_function < 1e-20);
        assert_relative_eq!(x, DVector::from_element(2, 1.), epsilon = 1e-9);
    }
}

/// Without the zero residual exit a vanishing residual ends with `gnorm = 0 <= gtol`.
fn assert_converged_or_orthogonal(report: &MinimizationReport<f64>) {
    #[cfg(not(feature = "minpack-compat"))]
    assert!(matches!(report.info(), 1..=3), "{:?}", report.termination);
    #[cfg(feature = "minpack-compat")]
    assert!(matches!(report.info(), 1..=4), "{:?}", report.termination);
}

#[test]
fn test_rosenbrock_other_drivers() {
    let config = LevenbergMarquardt::new().with_tol(TOL);

    let mut x = dvec(&[-1.2, 1.]);
    let report = config.minimize_numerically(&mut Rosenbrock, &mut x);
    assert_converged_or_orthogonal(&report);
    assert!(report.residual_norm < 1e-8);
    assert_relative_eq!(x, DVector::from_element(2, 1.), epsilon = 1e-8);

    let mut x = dvec(&[-1.2, 1.]);
    let report = config.minimize_rowwise(&mut Rows::new(Rosenbrock, 2), &mut x);
    assert_converged_or_orthogonal(&report);
    assert!(report.residual_norm < 1e-8);
    assert_eq!(report.fjac.shape(), (2, 2));
    assert_relative_eq!(x, DVector::from_element(2, 1.), epsilon = 1e-8);
}

struct HelicalValley;

impl Problem<f64> for HelicalValley {
    fn residual_count(&self) -> usize {
        3
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        let tpi = 2. * PI;
        let tmp1 = if x[0] == 0. {
            0.25f64.copysign(x[1])
        } else if x[0] > 0. {
            (x[1] / x[0]).atan() / tpi
        } else {
            (x[1] / x[0]).atan() / tpi + 0.5
        };
        let tmp2 = (x[0] * x[0] + x[1] * x[1]).sqrt();
        fvec[0] = 10. * (x[2] - 10. * tmp1);
        fvec[1] = 10. * (tmp2 - 1.);
        fvec[2] = x[2];
        Ok(())
    }
}

impl Jacobian<f64> for HelicalValley {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        let temp = x[0] * x[0] + x[1] * x[1];
        let tmp1 = 2. * PI * temp;
        let tmp2 = temp.sqrt();
        fjac.fill(0.);
        fjac[(0, 0)] = 100. * x[1] / tmp1;
        fjac[(0, 1)] = -100. * x[0] / tmp1;
        fjac[(0, 2)] = 10.;
        fjac[(1, 0)] = 10. * x[0] / tmp2;
        fjac[(1, 1)] = 10. * x[1] / tmp2;
        fjac[(2, 2)] = 1.;
        Ok(())
    }
}

#[test]
fn test_helical_valley() {
    assert_jacobian_correct(&mut HelicalValley, &[0.6, 0.3, 0.4]);

    let mut x = dvec(&[-1., 0., 0.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut HelicalValley, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: false,
            xtol: true
        }
    );
    assert!(report.objective_function < 1e-25);
    assert_relative_eq!(x, dvec(&[1., 0., 0.]), epsilon = 1e-10);

    let mut x = dvec(&[-1., 0., 0.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize_numerically(&mut HelicalValley, &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(x, dvec(&[1., 0., 0.]), epsilon = 1e-6);
}

struct PowellSingular;

impl Problem<f64> for PowellSingular {
    fn residual_count(&self) -> usize {
        4
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        fvec[0] = x[0] + 10. * x[1];
        fvec[1] = 5f64.sqrt() * (x[2] - x[3]);
        fvec[2] = (x[1] - 2. * x[2]).powi(2);
        fvec[3] = 10f64.sqrt() * (x[0] - x[3]).powi(2);
        Ok(())
    }
}

impl Jacobian<f64> for PowellSingular {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        let f = 5f64.sqrt();
        let t = 10f64.sqrt();
        let tmp1 = x[1] - 2. * x[2];
        let tmp2 = x[0] - x[3];
        #[rustfmt::skip]
        let rows = DMatrix::from_row_slice(4, 4, &[
                       1.,       10.,         0.,             0.,
                       0.,        0.,          f,             -f,
                       0., 2. * tmp1, -4. * tmp1,             0.,
            2. * t * tmp2,        0.,         0., -2. * t * tmp2,
        ]);
        fjac.copy_from(&rows);
        Ok(())
    }
}

#[test]
fn test_powell_singular() {
    assert_jacobian_correct(&mut PowellSingular, &[0.3, -0.2, 0.7, 0.1]);

    let mut x = dvec(&[3., -1., 0., 1.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut PowellSingular, &mut x);
    // the minimum is singular, the iteration runs into roundoff
    assert!(
        matches!(
            report.termination,
            TerminationReason::NoImprovementPossible(_)
                | TerminationReason::Converged { .. }
                | TerminationReason::Orthogonal
                | TerminationReason::ResidualsZero
        ),
        "{:?}",
        report.termination
    );
    assert!(report.objective_function < 1e-30);
    assert!(x.amax() < 1e-6);
}

struct FreudensteinRoth;

impl Problem<f64> for FreudensteinRoth {
    fn residual_count(&self) -> usize {
        2
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        fvec[0] = -13. + x[0] + ((5. - x[1]) * x[1] - 2.) * x[1];
        fvec[1] = -29. + x[0] + ((1. + x[1]) * x[1] - 14.) * x[1];
        Ok(())
    }
}

impl Jacobian<f64> for FreudensteinRoth {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        fjac[(0, 0)] = 1.;
        fjac[(0, 1)] = x[1] * (10. - 3. * x[1]) - 2.;
        fjac[(1, 0)] = 1.;
        fjac[(1, 1)] = x[1] * (2. + 3. * x[1]) - 14.;
        Ok(())
    }
}

#[test]
fn test_freudenstein_roth() {
    assert_jacobian_correct(&mut FreudensteinRoth, &[0.4, 1.3]);

    let mut x = dvec(&[0.5, -2.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut FreudensteinRoth, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: false
        }
    );
    // the local minimum is flat, the parameters are only accurate to a few digits
    assert_relative_eq!(
        report.objective_function,
        24.49212683962172,
        max_relative = 1e-8
    );
    assert_relative_eq!(
        x,
        dvec(&[11.412781785788198, -0.8968051074920677]),
        max_relative = 1e-3
    );
}

const Y1: [f64; 15] = [
    0.14, 0.18, 0.22, 0.25, 0.29, 0.32, 0.35, 0.39, 0.37, 0.58, 0.73, 0.96, 1.34, 2.10, 4.39,
];

struct Bard;

impl Bard {
    fn denominators(i: usize) -> (f64, f64) {
        let tmp2 = (15 - i) as f64;
        let tmp3 = if i > 7 { tmp2 } else { (i + 1) as f64 };
        (tmp2, tmp3)
    }
}

impl Problem<f64> for Bard {
    fn residual_count(&self) -> usize {
        15
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        for (i, el) in fvec.iter_mut().enumerate() {
            let (tmp2, tmp3) = Self::denominators(i);
            *el = Y1[i] - (x[0] + (i + 1) as f64 / (x[1] * tmp2 + x[2] * tmp3));
        }
        Ok(())
    }
}

impl Jacobian<f64> for Bard {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        for i in 0..15 {
            let (tmp2, tmp3) = Self::denominators(i);
            let tmp4 = (x[1] * tmp2 + x[2] * tmp3).powi(2);
            fjac[(i, 0)] = -1.;
            fjac[(i, 1)] = (i + 1) as f64 * tmp2 / tmp4;
            fjac[(i, 2)] = (i + 1) as f64 * tmp3 / tmp4;
        }
        Ok(())
    }
}

#[test]
fn test_bard() {
    assert_jacobian_correct(&mut Bard, &[0.81, 0.47, 0.43]);

    let mut x = dvec(&[1., 1., 1.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut Bard, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: false
        }
    );
    assert_relative_eq!(
        report.objective_function,
        0.00410743865329062,
        max_relative = 1e-8
    );
    assert_relative_eq!(
        x,
        dvec(&[0.0824105765758334, 1.1330366534715044, 2.343694638941154]),
        max_relative = 1e-5
    );

    // the row-wise driver finds the same minimum
    let mut x = dvec(&[1., 1., 1.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize_rowwise(&mut Rows::new(Bard, 3), &mut x);
    assert!(report.termination.was_successful());
    assert_relative_eq!(
        report.objective_function,
        0.00410743865329062,
        max_relative = 1e-8
    );
}

const V: [f64; 11] = [
    4., 2., 1., 0.5, 0.25, 0.167, 0.125, 0.1, 0.0833, 0.0714, 0.0625,
];
const Y2: [f64; 11] = [
    0.1957, 0.1947, 0.1735, 0.16, 0.0844, 0.0627, 0.0456, 0.0342, 0.0323, 0.0235, 0.0246,
];

struct KowalikOsborne;

impl Problem<f64> for KowalikOsborne {
    fn residual_count(&self) -> usize {
        11
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        for (i, el) in fvec.iter_mut().enumerate() {
            let tmp1 = V[i] * (V[i] + x[1]);
            let tmp2 = V[i] * (V[i] + x[2]) + x[3];
            *el = Y2[i] - x[0] * tmp1 / tmp2;
        }
        Ok(())
    }
}

impl Jacobian<f64> for KowalikOsborne {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        for i in 0..11 {
            let tmp1 = V[i] * (V[i] + x[1]);
            let tmp2 = V[i] * (V[i] + x[2]) + x[3];
            fjac[(i, 0)] = -tmp1 / tmp2;
            fjac[(i, 1)] = -V[i] * x[0] / tmp2;
            fjac[(i, 2)] = (tmp1 / tmp2) * (V[i] * x[0] / tmp2);
            fjac[(i, 3)] = (tmp1 / tmp2) * (V[i] * x[0] / tmp2) / V[i];
        }
        Ok(())
    }
}

#[test]
fn test_kowalik_osborne() {
    assert_jacobian_correct(&mut KowalikOsborne, &[0.25, 0.31, 0.19, 0.75]);

    let mut x = dvec(&[0.25, 0.39, 0.415, 0.39]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut KowalikOsborne, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: false
        }
    );
    assert_relative_eq!(
        report.objective_function,
        0.00015375280229088455,
        max_relative = 1e-8
    );
    assert_relative_eq!(
        x,
        dvec(&[
            0.19280781047624931,
            0.1912626533540709,
            0.12305280104693087,
            0.13605322115051674
        ]),
        max_relative = 1e-4
    );

    // the standard errors follow from the scaled covariance
    let covariance = report.scaled_covariance(1e-12).unwrap();
    assert_eq!(covariance.rank, 4);
    for i in 0..4 {
        assert!(covariance.matrix[(i, i)] > 0.);
        for j in 0..4 {
            assert_relative_eq!(covariance.matrix[(i, j)], covariance.matrix[(j, i)]);
        }
    }
}

const Y3: [f64; 16] = [
    3.478e4, 2.861e4, 2.365e4, 1.963e4, 1.637e4, 1.372e4, 1.154e4, 9.744e3, 8.261e3, 7.03e3,
    6.005e3, 5.147e3, 4.427e3, 3.82e3, 3.307e3, 2.872e3,
];

struct Meyer;

impl Problem<f64> for Meyer {
    fn residual_count(&self) -> usize {
        16
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        for (i, el) in fvec.iter_mut().enumerate() {
            let temp = 5. * (i + 1) as f64 + 45. + x[2];
            *el = x[0] * (x[1] / temp).exp() - Y3[i];
        }
        Ok(())
    }
}

impl Jacobian<f64> for Meyer {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        for i in 0..16 {
            let temp = 5. * (i + 1) as f64 + 45. + x[2];
            let tmp1 = x[1] / temp;
            let tmp2 = tmp1.exp();
            fjac[(i, 0)] = tmp2;
            fjac[(i, 1)] = x[0] * tmp2 / temp;
            fjac[(i, 2)] = -(x[0] * tmp2) * tmp1 / temp;
        }
        Ok(())
    }
}

#[test]
fn test_meyer() {
    assert_jacobian_correct(&mut Meyer, &[0.34, 0.62, 0.03]);

    let mut x = dvec(&[0.02, 4000., 250.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut Meyer, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: false,
            xtol: true
        }
    );
    assert_relative_eq!(
        report.objective_function,
        43.972927585339875,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        x,
        dvec(&[
            5.609636471027749e-03,
            6.181346346286417e+03,
            3.452236346241380e+02
        ]),
        max_relative = 1e-5
    );
}

struct Watson {
    n: usize,
}

impl Watson {
    /// `$\sum_j x_j t_i^j$` for `$t_i = (i + 1) / 29$`.
    fn s2(x: &DVector<f64>) -> Vec<f64> {
        (0..29)
            .map(|i| {
                let div = (i + 1) as f64 / 29.;
                let mut dx = 1.;
                let mut sum = 0.;
                for p in x.iter() {
                    sum += dx * p;
                    dx *= div;
                }
                sum
            })
            .collect()
    }
}

impl Problem<f64> for Watson {
    fn residual_count(&self) -> usize {
        31
    }

    fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
        let s2 = Self::s2(x);
        for i in 0..29 {
            let div = (i + 1) as f64 / 29.;
            let mut s1 = 0.;
            let mut dx = 1.;
            for (j, p) in x.iter().enumerate().skip(1) {
                s1 += j as f64 * p * dx;
                dx *= div;
            }
            fvec[i] = s1 - s2[i] * s2[i] - 1.;
        }
        fvec[29] = x[0];
        fvec[30] = x[1] - x[0] * x[0] - 1.;
        Ok(())
    }
}

impl Jacobian<f64> for Watson {
    fn jacobian(&mut self, x: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
        let s2 = Self::s2(x);
        fjac.fill(0.);
        for i in 0..29 {
            let div = (i + 1) as f64 / 29.;
            let temp = 2. * div * s2[i];
            let mut dx = 1. / div;
            for j in 0..self.n {
                fjac[(i, j)] = dx * (j as f64 - temp);
                dx *= div;
            }
        }
        fjac[(29, 0)] = 1.;
        fjac[(30, 0)] = -2. * x[0];
        fjac[(30, 1)] = 1.;
        Ok(())
    }
}

#[test]
fn test_watson() {
    let mut problem = Watson { n: 6 };
    assert_jacobian_correct(&mut problem, &[0.421, 0.606, 0.705, 0.851, 0.669, 0.250]);

    let mut x = DVector::zeros(6);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .minimize(&mut problem, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::Converged {
            ftol: true,
            xtol: false
        }
    );
    assert_relative_eq!(
        report.objective_function,
        0.001143835026786261,
        max_relative = 1e-8
    );
    assert_relative_eq!(
        x,
        dvec(&[
            -0.01572496150837828,
            1.0124348823296545,
            -0.23299172238767143,
            1.260431011028177,
            -1.5137303139441967,
            0.9929972729184159,
        ]),
        max_relative = 1e-4
    );
}

#[test]
fn test_patience() {
    let mut x = dvec(&[0.02, 4000., 250.]);
    let report = LevenbergMarquardt::new()
        .with_tol(TOL)
        .with_patience(1)
        .minimize(&mut Meyer, &mut x);
    assert_eq!(report.termination, TerminationReason::LostPatience);
    assert_eq!(report.info(), 5);
    // patience times n + 1 evaluations
    assert_eq!(report.number_of_evaluations, 4);
}
