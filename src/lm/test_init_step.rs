use alloc::vec;

use nalgebra::{DMatrix, DVector};

use super::test_helpers::{MockCall, MockProblem};
use crate::{Abort, InputError, LevenbergMarquardt, TerminationReason};

#[test]
fn abort_on_first_evaluation() {
    let mut problem = MockProblem::new(3, vec![Err(Abort::new(-5))]);
    let mut x = DVector::from_vec(vec![2., 3.]);
    let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);
    assert_eq!(report.termination, TerminationReason::User(Abort::new(-5)));
    assert_eq!(report.info(), -5);
    assert_eq!(report.number_of_evaluations, 1);
    assert_eq!(report.number_of_jacobian_evaluations, 0);
    assert_eq!(problem.calls(), [MockCall::Residuals].as_ref());
    assert_eq!(x, DVector::from_vec(vec![2., 3.]));
}

#[test]
#[cfg(not(feature = "minpack-compat"))]
fn already_zero() {
    let mut problem = MockProblem::new(3, vec![Ok(DVector::zeros(3))]);
    let mut x = DVector::from_vec(vec![2., 3.]);
    let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);
    assert_eq!(report.termination, TerminationReason::ResidualsZero);
    assert_eq!(report.info(), 1);
    assert_eq!(report.number_of_evaluations, 1);
    assert_eq!(problem.calls(), [MockCall::Residuals].as_ref());
    assert_eq!(report.objective_function, 0.);
}

#[test]
fn no_params() {
    let mut problem = MockProblem::new(3, vec![Ok(DVector::from_element(3, 1.))]);
    let mut x = DVector::<f64>::zeros(0);
    let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::InvalidInput(InputError::NoParameters)
    );
    assert_eq!(report.info(), 0);
    assert_eq!(report.number_of_evaluations, 0);
    assert!(problem.calls().is_empty());
}

#[test]
fn too_few_residuals() {
    let mut problem = MockProblem::new(2, vec![Ok(DVector::from_element(2, 1.))]);
    let mut x = DVector::zeros(3);
    let report = LevenbergMarquardt::new().minimize_numerically(&mut problem, &mut x);
    assert_eq!(
        report.termination,
        TerminationReason::InvalidInput(InputError::NotEnoughResiduals {
            residuals: 2,
            parameters: 3
        })
    );
    assert!(problem.calls().is_empty());
}

#[test]
fn invalid_configuration() {
    let check = |config: LevenbergMarquardt<f64>, expected: InputError| {
        let mut problem = MockProblem::new(3, vec![Ok(DVector::from_element(3, 1.))]);
        let mut x = DVector::zeros(2);
        let report = config.minimize(&mut problem, &mut x);
        assert_eq!(report.termination, TerminationReason::InvalidInput(expected));
        assert!(problem.calls().is_empty());
    };
    check(
        LevenbergMarquardt::new().with_ftol(-1.),
        InputError::NegativeTolerance("ftol"),
    );
    check(
        LevenbergMarquardt::new().with_xtol(f64::NAN),
        InputError::NegativeTolerance("xtol"),
    );
    check(
        LevenbergMarquardt::new().with_gtol(-1e-10),
        InputError::NegativeTolerance("gtol"),
    );
    check(
        LevenbergMarquardt::new().with_patience(0),
        InputError::NoPatience,
    );
    check(
        LevenbergMarquardt::new().with_stepbound(0.),
        InputError::NonPositiveStepBound,
    );
    check(
        LevenbergMarquardt::new().with_diag(DVector::from_element(3, 1.)),
        InputError::ScaleLength {
            expected: 2,
            found: 3,
        },
    );
    check(
        LevenbergMarquardt::new().with_diag(DVector::from_vec(vec![1., 0.])),
        InputError::NonPositiveScale { index: 1 },
    );
}

#[test]
fn report_calls_and_abort_in_trial() {
    let mut problem = MockProblem::new(
        2,
        vec![Ok(DVector::from_element(2, 1.)), Err(Abort::new(-2))],
    )
    .with_jacobians(vec![Ok(DMatrix::identity(2, 2))]);
    let mut x = DVector::from_vec(vec![0.5, -0.5]);
    let report = LevenbergMarquardt::new()
        .with_report_interval(1)
        .minimize(&mut problem, &mut x);
    assert_eq!(report.termination, TerminationReason::User(Abort::new(-2)));
    assert_eq!(report.number_of_evaluations, 2);
    assert_eq!(report.number_of_jacobian_evaluations, 1);
    assert_eq!(
        problem.calls(),
        [
            MockCall::Residuals,
            MockCall::Report(1),
            MockCall::Jacobian,
            MockCall::Residuals,
            MockCall::Report(1),
        ]
        .as_ref()
    );
    // the rejected trial point was evaluated but x is untouched
    assert_eq!(x, DVector::from_vec(vec![0.5, -0.5]));
    assert_ne!(problem.params[1], x);
}

#[test]
fn abort_in_jacobian() {
    let mut problem = MockProblem::new(2, vec![Ok(DVector::from_element(2, 1.))])
        .with_jacobians(vec![Err(Abort::new(-7))]);
    let mut x = DVector::from_vec(vec![1., 1.]);
    let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);
    assert_eq!(report.info(), -7);
    assert_eq!(
        problem.calls(),
        [MockCall::Residuals, MockCall::Jacobian].as_ref()
    );
}
