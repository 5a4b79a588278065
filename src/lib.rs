//! Solvers for systems of nonlinear equations and nonlinear least-squares
//! problems after [MINPACK](https://www.netlib.org/minpack/), using
//! [nalgebra](https://nalgebra.org).
//!
//! Two problem classes are covered:
//!
//! - [`Hybrid`] solves `$\vec{f}(\vec{x}) = 0$` for `$n$` equations in `$n$` unknowns
//!   with Powell's hybrid method.
//! - [`LevenbergMarquardt`] solves the least-squares problem
//!   ```math
//!   \min_{\vec{x}\in\R^n}f(\vec{x})\quad\text{where}\quad\begin{cases}\begin{aligned}
//!     \ f\!:\R^n &\to \R \\
//!    \vec{x} &\mapsto \frac{1}{2}\sum_{i=1}^m \bigl(r_i(\vec{x})\bigr)^2,
//!   \end{aligned}\end{cases}
//!   ```
//!   for `$m\geq n$` differentiable _residual functions_ `$r_i\!:\R^n\to\R$`.
//!
//! # Inputs
//!
//! You must provide an implementation of [`Problem`], the residual vector
//! `$\vec{x} \mapsto (r_1(\vec{x}), \ldots, r_m(\vec{x}))^\top\in\R^m$`.
//! The Jacobian `$\mathbf{J} \in \R^{m\times n}$`, defined as
//! ```math
//! \mathbf{J} \coloneqq
//! \begin{pmatrix}
//! \frac{\partial r_1}{\partial x_1} & \cdots & \frac{\partial r_1}{\partial x_n} \\
//! \vdots & \ddots & \vdots \\
//! \frac{\partial r_m}{\partial x_1} & \cdots & \frac{\partial r_m}{\partial x_n}
//! \end{pmatrix},
//! ```
//! is either approximated by forward differences or supplied by implementing
//! [`Jacobian`] (the full matrix) or [`JacobianRows`] (one row at a time).
//!
//! Finally, you have to provide an initial guess for `$\vec{x}$`. This can
//! be a constant value, but typically the result _crucially_ depends
//! on a good initial value.
//!
//! The solvers have a number of hyperparameters which are documented
//! at [`LevenbergMarquardt`] and [`Hybrid`]. Invalid values are reported as
//! [`TerminationReason::InvalidInput`], the solvers never panic on bad input.
//!
//! # Usage Example
//!
//! We use `$f(x, y) \coloneqq \frac{1}{2}[(x^2 + y - 11)^2 + (x + y^2 - 7)^2]$` as a [test function](https://en.wikipedia.org/wiki/Himmelblau%27s_function)
//! for this example.
//! In this case we have `$n = 2$` and `$m = 2$` with
//!
//! ```math
//!   r_1(\vec{x}) \coloneqq x_1^2 + x_2 - 11\quad\text{and}\quad
//!   r_2(\vec{x}) \coloneqq x_1 + x_2^2 - 7.
//! ```
//!
//! ```
//! # use nalgebra::{DMatrix, DVector};
//! # use minpack_nalgebra::{Abort, Jacobian, LevenbergMarquardt, Problem};
//! struct ExampleProblem;
//!
//! impl Problem<f64> for ExampleProblem {
//!     fn residual_count(&self) -> usize {
//!         2
//!     }
//!
//!     fn evaluate(&mut self, p: &DVector<f64>, fvec: &mut DVector<f64>) -> Result<(), Abort> {
//!         fvec[0] = p[0] * p[0] + p[1] - 11.0;
//!         fvec[1] = p[0] + p[1] * p[1] - 7.0;
//!         Ok(())
//!     }
//! }
//!
//! impl Jacobian<f64> for ExampleProblem {
//!     fn jacobian(&mut self, p: &DVector<f64>, fjac: &mut DMatrix<f64>) -> Result<(), Abort> {
//!         fjac[(0, 0)] = 2.0 * p[0];
//!         fjac[(0, 1)] = 1.0;
//!         fjac[(1, 0)] = 1.0;
//!         fjac[(1, 1)] = 2.0 * p[1];
//!         Ok(())
//!     }
//! }
//!
//! let mut x = DVector::from_vec(vec![1., 1.]);
//! let report = LevenbergMarquardt::new().minimize(&mut ExampleProblem, &mut x);
//! assert!(report.termination.was_successful());
//! assert!(report.objective_function.abs() < 1e-10);
//!
//! // the same system solved as equations, without the Jacobian
//! let mut x = DVector::from_vec(vec![1., 1.]);
//! let report = minpack_nalgebra::Hybrid::new().solve(&mut ExampleProblem, &mut x);
//! assert_eq!(report.info(), 1);
//! ```
//!
//! # Derivative checking
//!
//! [`check_jacobian`](utils::check_jacobian) compares an analytic Jacobian
//! with the residuals at a nearby point and rates every residual.
//!
//! # Building blocks
//!
//! The linear algebra the drivers are assembled from is public: the QR
//! factorization in [`qr`], the trust-region subproblems in [`trust_region`],
//! the Givens updates in [`update`] and the covariance in [`covariance`].
//!
//! # Logging
//!
//! Iterations are traced with [`tracing`](https://docs.rs/tracing) at the
//! `debug` and `trace` levels.
#![no_std]

extern crate alloc;

pub mod covariance;
mod equation;
mod hybrid;
mod lm;
mod problem;
pub mod qr;
mod termination;
pub mod trust_region;
pub mod update;
pub mod utils;

pub use covariance::Covariance;
pub use equation::Equation;
pub use hybrid::{Hybrid, HybridReport};
pub use lm::{LevenbergMarquardt, MinimizationReport};
pub use problem::{Abort, Jacobian, JacobianRows, Problem};
pub use termination::{InputError, Stall, TerminationReason, Tolerance};

pub use utils::enorm;
