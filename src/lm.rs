use alloc::{vec, vec::Vec};

use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;
use tracing::{debug, trace};

use crate::covariance::{covariance, Covariance};
use crate::problem::{Abort, Jacobian, JacobianRows, Problem};
use crate::qr::{apply_qt, pivoted_qr};
use crate::termination::{InputError, TerminationReason, Tolerance};
use crate::trust_region::determine_lambda_and_parameter_update;
use crate::update::row_update;
use crate::utils::{
    check_tolerance, column, enorm, epsmch, forward_difference, residuals_zero, scaled_norm,
    Scaling,
};

#[cfg(test)]
mod test_examples;
#[cfg(test)]
mod test_init_step;

/// Information about the minimization.
///
/// Use this to inspect the minimization process. Most importantly
/// you may want to check [`termination`](MinimizationReport::termination).
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationReport<F: RealField> {
    pub termination: TerminationReason,
    /// Number of residual evaluations, including those used for
    /// finite differences.
    pub number_of_evaluations: usize,
    /// Number of times the Jacobian was computed or approximated.
    pub number_of_jacobian_evaluations: usize,
    /// `$\|\vec{r}(\vec{x})\|$` at the final iterate.
    pub residual_norm: F,
    /// Contains the value of `$f(\vec{x}) = \frac{1}{2}\|\vec{r}(\vec{x})\|^2$`.
    pub objective_function: F,
    /// The residuals at the final iterate.
    pub fvec: DVector<F>,
    /// The upper `$n\times n$` triangle contains `$\mathbf{R}$` of the last
    /// factorization `$\mathbf{J}\mathbf{P} = \mathbf{Q}\mathbf{R}$`.
    pub fjac: DMatrix<F>,
    /// The permutation `$\mathbf{P}$`, column `ipvt[j]` of `$\mathbf{J}$` is column `j` of `$\mathbf{J}\mathbf{P}$`.
    pub ipvt: Vec<usize>,
    /// The first `$n$` elements of `$\mathbf{Q}^\top\vec{r}$`.
    pub qtf: DVector<F>,
    /// The scaling factors used in the last iteration.
    pub diag: DVector<F>,
}

impl<F: RealField + Float> MinimizationReport<F> {
    /// The integer `info` code `MINPACK` reports for this termination.
    pub fn info(&self) -> i32 {
        self.termination.lm_info()
    }

    /// Covariance `$(\mathbf{J}^\top\mathbf{J})^{-1}$` at the final iterate.
    ///
    /// Computed from the last factorization with [`covariance`](crate::covariance::covariance),
    /// `tol` determines the numerical rank. The Jacobian is the one of the
    /// last outer iteration, which might be a step behind the final iterate.
    pub fn covariance(&self, tol: F) -> Covariance<F> {
        let n = self.ipvt.len();
        if self.fjac.nrows() < n {
            return Covariance {
                matrix: DMatrix::zeros(n, n),
                rank: 0,
            };
        }
        let mut matrix = self.fjac.rows(0, n).into_owned();
        let mut wa = vec![F::zero(); n];
        let rank = covariance(&mut matrix, &self.ipvt, tol, &mut wa);
        Covariance { matrix, rank }
    }

    /// [`covariance`](MinimizationReport::covariance) scaled by the residual variance
    /// `$\|\vec{r}\|^2 / (m - l)$` where `$l$` is the numerical rank.
    ///
    /// Returns `None` if there are not more residuals than the rank.
    pub fn scaled_covariance(&self, tol: F) -> Option<Covariance<F>> {
        let mut cov = self.covariance(tol);
        let m = self.fvec.len();
        if m <= cov.rank {
            return None;
        }
        let dof: F = convert((m - cov.rank) as f64);
        cov.matrix *= self.residual_norm * self.residual_norm / dof;
        Some(cov)
    }
}

/// Levenberg-Marquardt optimization algorithm.
///
/// See the [crate documentation](crate) for a usage example.
///
/// The runtime and termination behavior can be controlled by various hyperparameters.
/// Invalid values are not rejected by the builder methods but reported as
/// [`TerminationReason::InvalidInput`] when a minimization starts.
///
/// The Jacobian enters in one of three ways:
///
/// - [`minimize`](LevenbergMarquardt::minimize) uses an analytic Jacobian,
/// - [`minimize_numerically`](LevenbergMarquardt::minimize_numerically)
///   approximates it by forward differences,
/// - [`minimize_rowwise`](LevenbergMarquardt::minimize_rowwise) receives it row
///   by row and only stores an `$n\times n$` triangular factor.
#[derive(Clone, Debug, PartialEq)]
pub struct LevenbergMarquardt<F: RealField> {
    ftol: F,
    xtol: F,
    gtol: F,
    stepbound: F,
    patience: Option<usize>,
    epsfcn: F,
    scaling: Scaling<F>,
    nprint: usize,
}

impl<F: RealField + Float> Default for LevenbergMarquardt<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: RealField + Float> LevenbergMarquardt<F> {
    pub fn new() -> Self {
        let user_tol = F::default_epsilon() * convert(30.0);
        Self {
            ftol: user_tol,
            xtol: user_tol,
            gtol: user_tol,
            stepbound: convert(100.0),
            patience: None,
            epsfcn: F::zero(),
            scaling: Scaling::Jacobian,
            nprint: 0,
        }
    }

    /// Set the relative error desired in the objective function `$f$`.
    ///
    /// Termination occurs when both the actual and
    /// predicted relative reductions for `$f$` are at most `ftol`.
    /// Must be `$\geq 0$`.
    pub fn with_ftol(self, ftol: F) -> Self {
        Self { ftol, ..self }
    }

    /// Set relative error between last two approximations.
    ///
    /// Termination occurs when the relative error between
    /// two consecutive iterates is at most `xtol`.
    /// Must be `$\geq 0$`.
    pub fn with_xtol(self, xtol: F) -> Self {
        Self { xtol, ..self }
    }

    /// Set orthogonality desired between the residual vector and its derivative.
    ///
    /// Termination occurs when the cosine of the angle
    /// between the residual vector `$\vec{r}$` and any column of the Jacobian `$\mathbf{J}$` is at
    /// most `gtol` in absolute value.
    ///
    /// With other words, the algorithm will terminate if
    /// ```math
    ///   \max_{i=1,\ldots,n}\frac{|(\mathbf{J}^\top \vec{r})_i|}{\|\mathbf{J}\vec{e}_i\|\|\vec{r}\|} \leq \texttt{gtol}.
    /// ```
    ///
    /// This tests more or less if a _critical point_ was found, i.e., whether
    /// `$\nabla f(\vec{x}) = \mathbf{J}^\top\vec{r} \approx 0$`.
    pub fn with_gtol(self, gtol: F) -> Self {
        Self { gtol, ..self }
    }

    /// Shortcut to set `tol` as in `MINPACK` `LMDER1` and `LMSTR1`.
    ///
    /// Sets `ftol = xtol = tol` and `gtol = 0`.
    pub fn with_tol(self, tol: F) -> Self {
        Self {
            ftol: tol,
            xtol: tol,
            gtol: F::zero(),
            ..self
        }
    }

    /// Set factor for the initial step bound.
    ///
    /// This bound is set to `$\mathtt{stepbound}\cdot\|\mathbf{D}\vec{x}\|$`
    /// if nonzero, or else to `stepbound` itself. In most cases `stepbound` should lie
    /// in the interval `$[0.1,100]$`.
    pub fn with_stepbound(self, stepbound: F) -> Self {
        Self { stepbound, ..self }
    }

    /// Set the budget of residual evaluations to `$\mathtt{patience}\cdot(n+1)$`.
    ///
    /// Defaults to 100 for [`minimize`](LevenbergMarquardt::minimize) and
    /// [`minimize_rowwise`](LevenbergMarquardt::minimize_rowwise) and to 200 for
    /// [`minimize_numerically`](LevenbergMarquardt::minimize_numerically).
    pub fn with_patience(self, patience: usize) -> Self {
        Self {
            patience: Some(patience),
            ..self
        }
    }

    /// Set the relative error of the residual computation.
    ///
    /// Only used by [`minimize_numerically`](LevenbergMarquardt::minimize_numerically)
    /// to choose the step of the forward differences.
    pub fn with_epsfcn(self, epsfcn: F) -> Self {
        Self { epsfcn, ..self }
    }

    /// Enable or disable whether the variables will be rescaled internally.
    ///
    /// If enabled (the default) the scaling factors are the column norms of the
    /// Jacobian, growing monotonically over the iterations.
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
    ///
    /// Zero (the default) disables the calls.
    pub fn with_report_interval(self, nprint: usize) -> Self {
        Self { nprint, ..self }
    }

    /// Try to solve the given least-squares problem with an analytic Jacobian.
    ///
    /// `x` contains the initial guess on entry and the final iterate on return.
    ///
    /// This resembles `LMDER` from `MINPACK`.
    pub fn minimize<P>(&self, problem: &mut P, x: &mut DVector<F>) -> MinimizationReport<F>
    where
        P: Jacobian<F> + ?Sized,
    {
        let rows = problem.residual_count();
        self.run(problem, x, rows, 100, |lm, problem, x| {
            problem.jacobian(x, &mut lm.fjac)?;
            lm.njev += 1;
            lm.factor_dense();
            Ok(())
        })
    }

    /// Try to solve the given least-squares problem with a forward-difference
    /// approximation of the Jacobian.
    ///
    /// This resembles `LMDIF` from `MINPACK`.
    pub fn minimize_numerically<P>(
        &self,
        problem: &mut P,
        x: &mut DVector<F>,
    ) -> MinimizationReport<F>
    where
        P: Problem<F> + ?Sized,
    {
        let rows = problem.residual_count();
        let epsfcn = self.epsfcn;
        self.run(problem, x, rows, 200, |lm, problem, x| {
            forward_difference(problem, x, &lm.fvec, &mut lm.fjac, epsfcn, &mut lm.wa4)?;
            lm.nfev += x.len();
            lm.njev += 1;
            lm.factor_dense();
            Ok(())
        })
    }

    /// Try to solve the given least-squares problem while never storing the
    /// full Jacobian.
    ///
    /// The rows of the Jacobian are folded one after the other into an
    /// `$n\times n$` triangular matrix with Givens rotations, see
    /// [`row_update`](crate::update::row_update). Use this if `$m$` is so large
    /// that the `$m\times n$` Jacobian does not fit in memory. The reported
    /// [`fjac`](MinimizationReport::fjac) is `$n\times n$`.
    ///
    /// This resembles `LMSTR` from `MINPACK`.
    pub fn minimize_rowwise<P>(&self, problem: &mut P, x: &mut DVector<F>) -> MinimizationReport<F>
    where
        P: JacobianRows<F> + ?Sized,
    {
        let rows = x.len();
        self.run(problem, x, rows, 100, |lm, problem, x| {
            lm.factor_rowwise(problem, x)
        })
    }

    fn validate(&self, m: usize, n: usize) -> Result<(), InputError> {
        if n == 0 {
            return Err(InputError::NoParameters);
        }
        if m < n {
            return Err(InputError::NotEnoughResiduals {
                residuals: m,
                parameters: n,
            });
        }
        check_tolerance("ftol", self.ftol)?;
        check_tolerance("xtol", self.xtol)?;
        check_tolerance("gtol", self.gtol)?;
        if self.patience == Some(0) {
            return Err(InputError::NoPatience);
        }
        if !(self.stepbound > F::zero()) {
            return Err(InputError::NonPositiveStepBound);
        }
        self.scaling.validate(n)
    }

    fn run<P, L>(
        &self,
        problem: &mut P,
        x: &mut DVector<F>,
        rows: usize,
        default_patience: usize,
        mut linearize: L,
    ) -> MinimizationReport<F>
    where
        P: Problem<F> + ?Sized,
        L: FnMut(&mut LM<'_, F>, &mut P, &mut DVector<F>) -> Result<(), Abort>,
    {
        let n = x.len();
        let m = problem.residual_count();
        let patience = self.patience.unwrap_or(default_patience);
        let mut lm = LM::new(self, m, rows, n, patience);

        let termination = 'solve: {
            if let Err(err) = self.validate(m, n) {
                break 'solve TerminationReason::InvalidInput(err);
            }
            if let Err(reason) = lm.initialize(problem, x) {
                break 'solve reason;
            }
            loop {
                if self.nprint > 0 && (lm.iter - 1) % self.nprint == 0 {
                    if let Err(abort) = problem.report(lm.iter, x, &lm.fvec) {
                        break 'solve TerminationReason::User(abort);
                    }
                }
                if let Err(abort) = linearize(&mut lm, problem, x) {
                    break 'solve TerminationReason::User(abort);
                }
                if let Err(reason) = lm.update_diag(x) {
                    break 'solve reason;
                }
                debug!(
                    iteration = lm.iter,
                    fnorm = ?lm.fnorm,
                    gnorm = ?lm.gnorm,
                    delta = ?lm.delta,
                    "outer iteration"
                );
                loop {
                    match lm.step(problem, x) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(reason) => break 'solve reason,
                    }
                }
            }
        };

        debug!(
            ?termination,
            evaluations = lm.nfev,
            jacobian_evaluations = lm.njev,
            fnorm = ?lm.fnorm,
            "levenberg-marquardt finished"
        );
        if self.nprint > 0 && !matches!(termination, TerminationReason::InvalidInput(_)) {
            // the status of the final report does not change the outcome
            let _ = problem.report(lm.iter, x, &lm.fvec);
        }
        lm.into_report(termination)
    }
}

/// State of one minimization.
///
/// Owns the work buffers which are allocated once and reused by every
/// iteration.
struct LM<'a, F: RealField> {
    config: &'a LevenbergMarquardt<F>,
    fvec: DVector<F>,
    /// `$m\times n$` Jacobian, or `$n\times n$` for the row-wise variant.
    fjac: DMatrix<F>,
    ipvt: Vec<usize>,
    qtf: DVector<F>,
    diag: DVector<F>,
    wa1: DVector<F>,
    wa2: DVector<F>,
    wa3: DVector<F>,
    /// Residuals at the trial point, length `$m$`.
    wa4: DVector<F>,
    fnorm: F,
    xnorm: F,
    gnorm: F,
    delta: F,
    par: F,
    iter: usize,
    nfev: usize,
    njev: usize,
    maxfev: usize,
}

impl<'a, F: RealField + Float> LM<'a, F> {
    fn new(
        config: &'a LevenbergMarquardt<F>,
        m: usize,
        rows: usize,
        n: usize,
        patience: usize,
    ) -> Self {
        Self {
            config,
            fvec: DVector::zeros(m),
            fjac: DMatrix::zeros(rows, n),
            ipvt: (0..n).collect(),
            qtf: DVector::zeros(n),
            diag: config.scaling.initial(n),
            wa1: DVector::zeros(n),
            wa2: DVector::zeros(n),
            wa3: DVector::zeros(n),
            wa4: DVector::zeros(m),
            fnorm: <F as Float>::nan(),
            xnorm: F::zero(),
            gnorm: F::zero(),
            delta: F::zero(),
            par: F::zero(),
            iter: 1,
            nfev: 0,
            njev: 0,
            maxfev: patience.saturating_mul(n + 1),
        }
    }

    /// Evaluate the residuals at the initial guess.
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

    /// QR factorize the Jacobian in `fjac` and compute `qtf`.
    ///
    /// Leaves `$\mathbf{R}$` including its diagonal in the upper triangle
    /// of `fjac` and the column norms of the Jacobian in `wa2`.
    fn factor_dense(&mut self) {
        pivoted_qr(
            &mut self.fjac,
            true,
            &mut self.ipvt,
            self.wa1.as_mut_slice(),
            self.wa2.as_mut_slice(),
            self.wa3.as_mut_slice(),
        );

        // form (q transpose)*fvec and store the first n components in qtf
        self.wa4.copy_from(&self.fvec);
        apply_qt(&self.fjac, self.wa4.as_mut_slice());
        for j in 0..self.ipvt.len() {
            self.fjac[(j, j)] = self.wa1[j];
            self.qtf[j] = self.wa4[j];
        }
    }

    /// Accumulate the triangular factor of the Jacobian row by row.
    fn factor_rowwise<P>(&mut self, problem: &mut P, x: &DVector<F>) -> Result<(), Abort>
    where
        P: JacobianRows<F> + ?Sized,
    {
        let n = self.ipvt.len();
        self.qtf.fill(F::zero());
        self.fjac.fill(F::zero());
        for i in 0..self.fvec.len() {
            problem.jacobian_row(x, i, &mut self.wa3)?;
            let mut alpha = self.fvec[i];
            row_update(
                &mut self.fjac,
                self.wa3.as_slice(),
                self.qtf.as_mut_slice(),
                &mut alpha,
                self.wa1.as_mut_slice(),
                self.wa2.as_mut_slice(),
            );
        }
        self.njev += 1;

        // if the jacobian is rank deficient, call pivoted_qr to
        // reorder its columns and update the components of qtf
        let mut singular = false;
        for j in 0..n {
            if self.fjac[(j, j)].is_zero() {
                singular = true;
            }
            self.ipvt[j] = j;
            self.wa2[j] = enorm(&column(&self.fjac, j, 0)[..=j]);
        }
        if singular {
            trace!("rank deficient, pivoting");
            pivoted_qr(
                &mut self.fjac,
                true,
                &mut self.ipvt,
                self.wa1.as_mut_slice(),
                self.wa2.as_mut_slice(),
                self.wa3.as_mut_slice(),
            );
            apply_qt(&self.fjac, self.qtf.as_mut_slice());
            for j in 0..n {
                self.fjac[(j, j)] = self.wa1[j];
            }
        }
        Ok(())
    }

    /// Initialize or update the scaling and test the gradient.
    ///
    /// Expects the column norms of the Jacobian in `wa2`.
    fn update_diag(&mut self, x: &DVector<F>) -> Result<(), TerminationReason> {
        let adaptive = self.config.scaling.is_adaptive();
        if self.iter == 1 {
            // on the first iteration scale according to the norms
            // of the columns of the initial jacobian
            if adaptive {
                for (d, &norm) in self.diag.iter_mut().zip(self.wa2.iter()) {
                    *d = if norm.is_zero() { F::one() } else { norm };
                }
            }
            // and calculate the norm of the scaled x to initialize the step bound delta
            self.xnorm = scaled_norm(&self.diag, x, &mut self.wa3);
            self.delta = self.config.stepbound * self.xnorm;
            if self.delta.is_zero() {
                self.delta = self.config.stepbound;
            }
        }

        // test for convergence of the gradient norm
        self.gnorm = scaled_gradient_norm(&self.fjac, &self.ipvt, &self.qtf, &self.wa2, self.fnorm);
        if self.gnorm <= self.config.gtol {
            return Err(TerminationReason::Orthogonal);
        }

        if adaptive {
            for (d, &norm) in self.diag.iter_mut().zip(self.wa2.iter()) {
                *d = Float::max(*d, norm);
            }
        }
        Ok(())
    }

    /// Compute one trial step and decide whether to accept it.
    ///
    /// Returns whether the step was accepted, `Err` on termination.
    fn step<P>(&mut self, problem: &mut P, x: &mut DVector<F>) -> Result<bool, TerminationReason>
    where
        P: Problem<F> + ?Sized,
    {
        let p1: F = convert(0.1);
        let p5: F = convert(0.5);
        let p25: F = convert(0.25);
        let p75: F = convert(0.75);
        let p0001: F = convert(1.0e-4);
        let epsmch = epsmch::<F>();
        let n = x.len();

        // determine the levenberg-marquardt parameter
        self.par = determine_lambda_and_parameter_update(
            &mut self.fjac,
            &self.ipvt,
            self.diag.as_slice(),
            self.qtf.as_slice(),
            self.delta,
            self.par,
            self.wa1.as_mut_slice(),
            self.wa2.as_mut_slice(),
            self.wa3.as_mut_slice(),
            self.wa4.as_mut_slice(),
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
        let actred = if p1 * fnorm1 < self.fnorm {
            F::one() - Float::powi(fnorm1 / self.fnorm, 2)
        } else {
            -F::one()
        };

        // compute the scaled predicted reduction and
        // the scaled directional derivative
        for j in 0..n {
            self.wa3[j] = F::zero();
            let temp = self.wa1[self.ipvt[j]];
            for i in 0..=j {
                self.wa3[i] += self.fjac[(i, j)] * temp;
            }
        }
        let temp1 = enorm(self.wa3.as_slice()) / self.fnorm;
        let temp2 = (Float::sqrt(self.par) * pnorm) / self.fnorm;
        let prered = temp1 * temp1 + temp2 * temp2 / p5;
        let dirder = -(temp1 * temp1 + temp2 * temp2);

        // compute the ratio of the actual to the predicted reduction
        let ratio = if prered.is_zero() {
            F::zero()
        } else {
            actred / prered
        };

        // update the step bound
        if ratio <= p25 {
            let mut temp = if actred >= F::zero() {
                p5
            } else {
                p5 * dirder / (dirder + p5 * actred)
            };
            if p1 * fnorm1 >= self.fnorm || temp < p1 {
                temp = p1;
            }
            self.delta = temp * Float::min(self.delta, pnorm / p1);
            self.par /= temp;
        } else if self.par.is_zero() || ratio >= p75 {
            self.delta = pnorm / p5;
            self.par *= p5;
        }
        trace!(
            ?pnorm,
            ?fnorm1,
            ?ratio,
            delta = ?self.delta,
            par = ?self.par,
            "trial step"
        );

        // test for successful iteration
        let accepted = ratio >= p0001;
        if accepted {
            // successful iteration. update x, fvec, and their norms
            x.copy_from(&self.wa2);
            self.xnorm = scaled_norm(&self.diag, x, &mut self.wa2);
            self.fvec.copy_from(&self.wa4);
            self.fnorm = fnorm1;
            self.iter += 1;
            if residuals_zero(self.fnorm) {
                return Err(TerminationReason::ResidualsZero);
            }
        }

        // tests for convergence
        let ftol_reached = Float::abs(actred) <= self.config.ftol
            && prered <= self.config.ftol
            && p5 * ratio <= F::one();
        let xtol_reached = self.delta <= self.config.xtol * self.xnorm;
        if ftol_reached || xtol_reached {
            return Err(TerminationReason::Converged {
                ftol: ftol_reached,
                xtol: xtol_reached,
            });
        }

        // tests for termination and stringent tolerances,
        // in order of precedence
        if self.gnorm <= epsmch {
            return Err(TerminationReason::NoImprovementPossible(Tolerance::Gtol));
        }
        if self.delta <= epsmch * self.xnorm {
            return Err(TerminationReason::NoImprovementPossible(Tolerance::Xtol));
        }
        if Float::abs(actred) <= epsmch && prered <= epsmch && p5 * ratio <= F::one() {
            return Err(TerminationReason::NoImprovementPossible(Tolerance::Ftol));
        }
        if self.nfev >= self.maxfev {
            return Err(TerminationReason::LostPatience);
        }
        Ok(accepted)
    }

    fn into_report(self, termination: TerminationReason) -> MinimizationReport<F> {
        MinimizationReport {
            termination,
            number_of_evaluations: self.nfev,
            number_of_jacobian_evaluations: self.njev,
            residual_norm: self.fnorm,
            objective_function: self.fnorm * self.fnorm * convert(0.5),
            fvec: self.fvec,
            fjac: self.fjac,
            ipvt: self.ipvt,
            qtf: self.qtf,
            diag: self.diag,
        }
    }
}

/// Maximal cosine of the angle between the residuals and a column of the Jacobian.
///
/// Computed from the factorization `$\mathbf{J}\mathbf{P} = \mathbf{Q}\mathbf{R}$`
/// as `$\max_j |(\mathbf{R}^\top\mathbf{Q}^\top\vec{r})_j| / (\|\mathbf{J}\vec{e}_{p_j}\|\|\vec{r}\|)$`.
/// Columns with zero norm are skipped.
fn scaled_gradient_norm<F: RealField + Float>(
    r: &DMatrix<F>,
    ipvt: &[usize],
    qtf: &DVector<F>,
    acnorm: &DVector<F>,
    fnorm: F,
) -> F {
    let mut gnorm = F::zero();
    if fnorm.is_zero() {
        return gnorm;
    }
    for (j, &l) in ipvt.iter().enumerate() {
        if acnorm[l].is_zero() {
            continue;
        }
        let mut sum = F::zero();
        for (rij, qi) in column(r, j, 0)[..=j].iter().zip(qtf.iter()) {
            sum += *rij * (*qi / fnorm);
        }
        gnorm = Float::max(gnorm, Float::abs(sum / acnorm[l]));
    }
    gnorm
}
