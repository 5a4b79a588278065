use alloc::{vec, vec::Vec};

use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;
use tracing::{debug, trace};

use crate::problem::{Abort, Jacobian, Problem};
use crate::qr::{apply_qt, form_q, pivoted_qr};
use crate::termination::{InputError, Stall, TerminationReason, Tolerance};
use crate::trust_region::dogleg;
use crate::update::{apply_rotations, rank1_update};
use crate::utils::{
    check_tolerance, enorm, epsmch, forward_difference_banded, residuals_zero, scaled_norm,
    Scaling,
};


/// Information about the solution of an equation system.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridReport<F: RealField> {
    pub termination: TerminationReason,
    /// Number of residual evaluations, including those used for
    /// finite differences.
    pub number_of_evaluations: usize,
    /// Number of times the Jacobian was computed or approximated.
    /// Broyden updates are not counted.
    pub number_of_jacobian_evaluations: usize,
    /// `$\|\vec{f}(\vec{x})\|$` at the final iterate.
    pub residual_norm: F,
    /// The residuals at the final iterate.
    pub fvec: DVector<F>,
    /// The orthogonal matrix `$\mathbf{Q}$` of the factorization
    /// `$\mathbf{Q}\mathbf{R}$` of the final (updated) Jacobian.
    pub fjac: DMatrix<F>,
    /// The upper triangular `$\mathbf{R}$` stored row by row.
    pub r: Vec<F>,
    /// `$\mathbf{Q}^\top\vec{f}$`.
    pub qtf: DVector<F>,
    /// The scaling factors used in the last iteration.
    pub diag: DVector<F>,
}

impl<F: RealField> HybridReport<F> {
    /// The integer `info` code `MINPACK` reports for this termination.
    pub fn info(&self) -> i32 {
        self.termination.hybrid_info()
    }
}

/// Powell's hybrid method for systems of `$n$` nonlinear equations in `$n$` unknowns.
///
/// Every iteration takes a dogleg step within a trust region. The Jacobian is
/// computed at the start and whenever the progress is poor, in between it is
/// kept current with rank-one Broyden updates of its QR factorization.
///
/// ```
/// # use minpack_nalgebra::{Abort, Hybrid, Problem};
/// # use nalgebra::DVector;
/// /// `$x_i^2 = i + 1$`
/// struct Roots;
///
/// impl Problem<f64> for Roots {
///     fn residual_count(&self) -> usize {
///         3
///     }
///
///     fn evaluate(&mut self, x: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
///         for (i, (f, x)) in fvec.iter_mut().zip(x.iter()).enumerate() {
///             *f = x * x - (i + 1) as f64;
///         }
///         Ok(())
///     }
/// }
///
/// let mut x = DVector::from_element(3, 1.);
/// let report = Hybrid::new().solve(&mut Roots, &mut x);
/// assert!(report.termination.was_successful());
/// assert!((x[2] - 3f64.sqrt()).abs() < 1e-8);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Hybrid<F: RealField> {
    xtol: F,
    patience: Option<usize>,
    band: Option<(usize, usize)>,
    epsfcn: F,
    factor: F,
    scaling: Scaling<F>,
    nprint: usize,
}

impl<F: RealField + Float> Default for Hybrid<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: RealField + Float> Hybrid<F> {
    pub fn new() -> Self {
        Self {
            xtol: Float::sqrt(epsmch()),
            patience: None,
            band: None,
            epsfcn: F::zero(),
            factor: convert(100.0),
            scaling: Scaling::Jacobian,
            nprint: 0,
        }
    }

    /// Set the relative error desired between two consecutive iterates.
    ///
    /// Must be `$\geq 0$`, defaults to `$\sqrt{\epsilon}$`.
    pub fn with_xtol(self, xtol: F) -> Self {
        Self { xtol, ..self }
    }

    /// Set the budget of residual evaluations to `$\mathtt{patience}\cdot(n+1)$`.
    ///
    /// Defaults to 200 for [`solve`](Hybrid::solve) and 100 for
    /// [`solve_with_jacobian`](Hybrid::solve_with_jacobian).
    pub fn with_patience(self, patience: usize) -> Self {
        Self {
            patience: Some(patience),
            ..self
        }
    }

    /// Declare the Jacobian banded with `ml` sub- and `mu` superdiagonals.
    ///
    /// The forward differences of [`solve`](Hybrid::solve) then need only
    /// `$\mathtt{ml} + \mathtt{mu} + 1$` evaluations instead of `$n$`.
    pub fn with_band(self, ml: usize, mu: usize) -> Self {
        Self {
            band: Some((ml, mu)),
            ..self
        }
    }

    /// Set the relative error of the residual computation for the forward differences.
    pub fn with_epsfcn(self, epsfcn: F) -> Self {
        Self { epsfcn, ..self }
    }

    /// Set factor for the initial step bound `$\mathtt{factor}\cdot\|\mathbf{D}\vec{x}\|$`.
    pub fn with_stepbound(self, factor: F) -> Self {
        Self { factor, ..self }
    }

    /// Enable or disable the scaling by the column norms of the Jacobian.
    pub fn with_scale_diag(self, scale_diag: bool) -> Self {
        let scaling = if scale_diag {
            Scaling::Jacobian
        } else {
            Scaling::Unit
        };
        Self { scaling, ..self }
    }

    /// Use fixed positive scaling factors for the variables.
    pub fn with_diag(self, diag: DVector<F>) -> Self {
        Self {
            scaling: Scaling::Fixed(diag),
            ..self
        }
    }

    /// Call [`Problem::report`] every `nprint` iterations and after termination.
    pub fn with_report_interval(self, nprint: usize) -> Self {
        Self { nprint, ..self }
    }

    /// Solve `$\vec{f}(\vec{x}) = 0$` with a forward-difference Jacobian.
    ///
    /// This resembles `HYBRD` from `MINPACK`.
    pub fn solve<P>(&self, problem: &mut P, x: &mut DVector<F>) -> HybridReport<F>
    where
        P: Problem<F> + ?Sized,
    {
        let n = x.len();
        let (ml, mu) = self
            .band
            .unwrap_or((n.saturating_sub(1), n.saturating_sub(1)));
        let msum = ml.saturating_add(mu).saturating_add(1);
        let epsfcn = self.epsfcn;
        self.run(problem, x, 200, |h, problem, x| {
            forward_difference_banded(
                problem,
                x,
                &h.fvec,
                &mut h.fjac,
                ml,
                mu,
                epsfcn,
                &mut h.wa1,
                &mut h.wa2,
            )?;
            h.nfev += msum.min(x.len());
            h.njev += 1;
            Ok(())
        })
    }

    /// Solve `$\vec{f}(\vec{x}) = 0$` with an analytic Jacobian.
    ///
    /// This resembles `HYBRJ` from `MINPACK`.
    pub fn solve_with_jacobian<P>(&self, problem: &mut P, x: &mut DVector<F>) -> HybridReport<F>
    where
        P: Jacobian<F> + ?Sized,
    {
        self.run(problem, x, 100, |h, problem, x| {
            problem.jacobian(x, &mut h.fjac)?;
            h.njev += 1;
            Ok(())
        })
    }

    fn validate(&self, m: usize, n: usize) -> Result<(), InputError> {
        if n == 0 {
            return Err(InputError::NoParameters);
        }
        if m != n {
            return Err(InputError::NotSquare {
                residuals: m,
                parameters: n,
            });
        }
        check_tolerance("xtol", self.xtol)?;
        if self.patience == Some(0) {
            return Err(InputError::NoPatience);
        }
        if !(self.factor > F::zero()) {
            return Err(InputError::NonPositiveStepBound);
        }
        self.scaling.validate(n)
    }

    fn run<P, L>(
        &self,
        problem: &mut P,
        x: &mut DVector<F>,
        default_patience: usize,
        mut linearize: L,
    ) -> HybridReport<F>
    where
        P: Problem<F> + ?Sized,
        L: FnMut(&mut Powell<'_, F>, &mut P, &mut DVector<F>) -> Result<(), Abort>,
    {
        let n = x.len();
        let m = problem.residual_count();
        let patience = self.patience.unwrap_or(default_patience);
        let mut h = Powell::new(self, n, patience);

        let termination = 'solve: {
            if let Err(err) = self.validate(m, n) {
                break 'solve TerminationReason::InvalidInput(err);
            }
            if let Err(reason) = h.initialize(problem, x) {
                break 'solve reason;
            }
            loop {
                h.jeval = true;
                if let Err(abort) = linearize(&mut h, problem, x) {
                    break 'solve TerminationReason::User(abort);
                }
                h.factor(x);
                debug!(
                    iteration = h.iter,
                    fnorm = ?h.fnorm,
                    delta = ?h.delta,
                    "jacobian recomputed"
                );
                loop {
                    if self.nprint > 0 && (h.iter - 1) % self.nprint == 0 {
                        if let Err(abort) = problem.report(h.iter, x, &h.fvec) {
                            break 'solve TerminationReason::User(abort);
                        }
                    }
                    match h.step(problem, x) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(reason) => break 'solve reason,
                    }
                }
            }
        };

        debug!(
            ?termination,
            evaluations = h.nfev,
            jacobian_evaluations = h.njev,
            fnorm = ?h.fnorm,
            "hybrid method finished"
        );
        if self.nprint > 0 && !matches!(termination, TerminationReason::InvalidInput(_)) {
            // the status of the final report does not change the outcome
            let _ = problem.report(h.iter, x, &h.fvec);
        }
        h.into_report(termination)
    }
}

/// State of one solve.
struct Powell<'a, F: RealField> {
    config: &'a Hybrid<F>,
    fvec: DVector<F>,
    /// The Jacobian, after [`factor`](Powell::factor) the orthogonal factor.
    fjac: DMatrix<F>,
    /// Upper triangular factor stored row by row.
    r: Vec<F>,
    qtf: DVector<F>,
    diag: DVector<F>,
    wa1: DVector<F>,
    wa2: DVector<F>,
    wa3: DVector<F>,
    wa4: DVector<F>,
    fnorm: F,
    xnorm: F,
    delta: F,
    iter: usize,
    nfev: usize,
    njev: usize,
    maxfev: usize,
    /// Consecutive successful and failed steps.
    ncsuc: usize,
    ncfail: usize,
    /// Steps, respectively Jacobian evaluations, without a good reduction.
    nslow1: usize,
    nslow2: usize,
    /// Whether the Jacobian was recomputed for the current step.
    jeval: bool,
}

impl<'a, F: RealField + Float> Powell<'a, F> {
    fn new(config: &'a Hybrid<F>, n: usize, patience: usize) -> Self {
        Self {
            config,
            fvec: DVector::zeros(n),
            fjac: DMatrix::zeros(n, n),
            r: vec![F::zero(); n * (n + 1) / 2],
            qtf: DVector::zeros(n),
            diag: config.scaling.initial(n),
            wa1: DVector::zeros(n),
            wa2: DVector::zeros(n),
            wa3: DVector::zeros(n),
            wa4: DVector::zeros(n),
            fnorm: <F as Float>::nan(),
            xnorm: F::zero(),
            delta: F::zero(),
            iter: 1,
            nfev: 0,
            njev: 0,
            maxfev: patience.saturating_mul(n + 1),
            ncsuc: 0,
            ncfail: 0,
            nslow1: 0,
            nslow2: 0,
            jeval: true,
        }
    }

    fn initialize<P>(&mut self, problem: &mut P, x: &DVector<F>) -> Result<(), TerminationReason>
    where
        P: Problem<F> + ?Sized,
    {
        self.nfev = 1;
        problem
            .evaluate(x, &mut self.fvec)
            .map_err(TerminationReason::User)?;
        self.fnorm = enorm(self.fvec.as_slice());
        if residuals_zero(self.fnorm) {
            return Err(TerminationReason::ResidualsZero);
        }
        Ok(())
    }

    /// Factorize the Jacobian in `fjac`.
    ///
    /// Leaves `$\mathbf{Q}$` in `fjac`, `$\mathbf{R}$` in `r` and
    /// `$\mathbf{Q}^\top\vec{f}$` in `qtf`. Initializes the scaling and the step
    /// bound on the first iteration.
    fn factor(&mut self, x: &DVector<F>) {
        let n = x.len();
        pivoted_qr(
            &mut self.fjac,
            false,
            &mut [],
            self.wa1.as_mut_slice(),
            self.wa2.as_mut_slice(),
            self.wa3.as_mut_slice(),
        );

        let adaptive = self.config.scaling.is_adaptive();
        if self.iter == 1 {
            if adaptive {
                for (d, &norm) in self.diag.iter_mut().zip(self.wa2.iter()) {
                    *d = if norm.is_zero() { F::one() } else { norm };
                }
            }
            self.xnorm = scaled_norm(&self.diag, x, &mut self.wa3);
            self.delta = self.config.factor * self.xnorm;
            if self.delta.is_zero() {
                self.delta = self.config.factor;
            }
        }

        self.qtf.copy_from(&self.fvec);
        apply_qt(&self.fjac, self.qtf.as_mut_slice());

        // copy the triangular factor into r
        let mut singular = false;
        for j in 0..n {
            let mut l = j;
            for i in 0..j {
                self.r[l] = self.fjac[(i, j)];
                l += n - i - 1;
            }
            self.r[l] = self.wa1[j];
            if self.wa1[j].is_zero() {
                singular = true;
            }
        }
        if singular {
            trace!("singular jacobian");
        }

        form_q(&mut self.fjac, n, self.wa1.as_mut_slice());

        if adaptive {
            for (d, &norm) in self.diag.iter_mut().zip(self.wa2.iter()) {
                *d = Float::max(*d, norm);
            }
        }
    }

    /// Take one dogleg step and update the factorization.
    ///
    /// Returns `Ok(true)` if the Jacobian must be recomputed.
    fn step<P>(&mut self, problem: &mut P, x: &mut DVector<F>) -> Result<bool, TerminationReason>
    where
        P: Problem<F> + ?Sized,
    {
        let p1: F = convert(0.1);
        let p5: F = convert(0.5);
        let p001: F = convert(0.001);
        let p0001: F = convert(0.0001);
        let epsmch = epsmch::<F>();
        let n = x.len();

        // determine the direction p
        dogleg(
            &self.r,
            self.diag.as_slice(),
            self.qtf.as_slice(),
            self.delta,
            self.wa1.as_mut_slice(),
            self.wa2.as_mut_slice(),
            self.wa3.as_mut_slice(),
        );

        // store the direction p and x + p. calculate the norm of p
        for j in 0..n {
            self.wa1[j] = -self.wa1[j];
            self.wa2[j] = x[j] + self.wa1[j];
            self.wa3[j] = self.diag[j] * self.wa1[j];
        }
        let pnorm = enorm(self.wa3.as_slice());

        // on the first iteration, adjust the initial step bound
        if self.iter == 1 {
            self.delta = Float::min(self.delta, pnorm);
        }

        // evaluate the function at x + p and calculate its norm
        self.nfev += 1;
        problem
            .evaluate(&self.wa2, &mut self.wa4)
            .map_err(TerminationReason::User)?;
        let fnorm1 = enorm(self.wa4.as_slice());

        // compute the scaled actual reduction
        let actred = if fnorm1 < self.fnorm {
            F::one() - Float::powi(fnorm1 / self.fnorm, 2)
        } else {
            -F::one()
        };

        // compute the scaled predicted reduction
        let mut l = 0;
        for i in 0..n {
            let mut sum = F::zero();
            for j in i..n {
                sum += self.r[l] * self.wa1[j];
                l += 1;
            }
            self.wa3[i] = self.qtf[i] + sum;
        }
        let temp = enorm(self.wa3.as_slice());
        let prered = if temp < self.fnorm {
            F::one() - Float::powi(temp / self.fnorm, 2)
        } else {
            F::zero()
        };

        // compute the ratio of the actual to the predicted reduction
        let ratio = if prered > F::zero() {
            actred / prered
        } else {
            F::zero()
        };

        // update the step bound
        if ratio < p1 {
            self.ncsuc = 0;
            self.ncfail += 1;
            self.delta = p5 * self.delta;
        } else {
            self.ncfail = 0;
            self.ncsuc += 1;
            if ratio >= p5 || self.ncsuc > 1 {
                self.delta = Float::max(self.delta, pnorm / p5);
            }
            if Float::abs(ratio - F::one()) <= p1 {
                self.delta = pnorm / p5;
            }
        }
        trace!(
            ?pnorm,
            ?fnorm1,
            ?ratio,
            delta = ?self.delta,
            "trial step"
        );

        // test for successful iteration
        let accepted = ratio >= p0001;
        if accepted {
            x.copy_from(&self.wa2);
            self.xnorm = scaled_norm(&self.diag, x, &mut self.wa2);
            self.fvec.copy_from(&self.wa4);
            self.fnorm = fnorm1;
            self.iter += 1;
        }

        // determine the progress of the iteration
        self.nslow1 += 1;
        if actred >= p001 {
            self.nslow1 = 0;
        }
        if self.jeval {
            self.nslow2 += 1;
        }
        if actred >= p1 {
            self.nslow2 = 0;
        }

        // test for convergence
        if accepted && residuals_zero(self.fnorm) {
            return Err(TerminationReason::ResidualsZero);
        }
        if self.delta <= self.config.xtol * self.xnorm || self.fnorm.is_zero() {
            return Err(TerminationReason::Converged {
                ftol: false,
                xtol: true,
            });
        }

        // tests for termination and stringent tolerances,
        // in order of precedence
        if self.nslow1 == 10 {
            return Err(TerminationReason::NoProgress(Stall::Iterations));
        }
        if self.nslow2 == 5 {
            return Err(TerminationReason::NoProgress(Stall::JacobianEvaluations));
        }
        if p1 * Float::max(p1 * self.delta, pnorm) <= epsmch * self.xnorm {
            return Err(TerminationReason::NoImprovementPossible(Tolerance::Xtol));
        }
        if self.nfev >= self.maxfev {
            return Err(TerminationReason::LostPatience);
        }

        // recalculate the jacobian after two failures in a row
        if self.ncfail == 2 {
            return Ok(true);
        }

        // calculate the rank one modification to the jacobian
        // and update qtf if necessary
        for j in 0..n {
            let mut sum = F::zero();
            for i in 0..n {
                sum += self.fjac[(i, j)] * self.wa4[i];
            }
            self.wa2[j] = (sum - self.wa3[j]) / pnorm;
            self.wa1[j] = self.diag[j] * ((self.diag[j] * self.wa1[j]) / pnorm);
            if accepted {
                self.qtf[j] = sum;
            }
        }

        // compute the qr factorization of the updated jacobian
        let singular = rank1_update(
            n,
            &mut self.r,
            self.wa1.as_slice(),
            self.wa2.as_mut_slice(),
            self.wa3.as_mut_slice(),
        );
        if singular {
            trace!("singular broyden update");
        }
        apply_rotations(
            n,
            self.fjac.as_mut_slice(),
            self.wa2.as_slice(),
            self.wa3.as_slice(),
        );
        apply_rotations(
            1,
            self.qtf.as_mut_slice(),
            self.wa2.as_slice(),
            self.wa3.as_slice(),
        );
        self.jeval = false;
        Ok(false)
    }

    fn into_report(self, termination: TerminationReason) -> HybridReport<F> {
        HybridReport {
            termination,
            number_of_evaluations: self.nfev,
            number_of_jacobian_evaluations: self.njev,
            residual_norm: self.fnorm,
            fvec: self.fvec,
            fjac: self.fjac,
            r: self.r,
            qtf: self.qtf,
            diag: self.diag,
        }
    }
}
