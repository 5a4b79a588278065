use crate::{Abort, Jacobian, LevenbergMarquardt, MinimizationReport, Problem};
use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

/// A convenience trait to fit the coefficients of a scalar model to data with
/// [`LevenbergMarquardt::minimize`].
///
/// For example:
///
/// ```
/// # use approx::assert_relative_eq;
/// use minpack_nalgebra::Equation;
///
/// struct Model;
///
/// impl Equation<2, f64> for Model {
///     fn equation(&self, ws: &[f64; 2], x: f64) -> f64 {
///         // This is our equation; we want to find the coefficients `ws`.
///         ws[0] * 2.0 * x + ws[1] * 0.5 * x.powi(2)
///     }
///
///     fn derivatives(&self, ws: &[f64; 2], x: f64) -> [f64; 2] {
///         // These are the partial derivatives of our equation, one for each coefficient.
///         [
///             2.0 * x,
///             0.5 * x.powi(2),
///         ]
///     }
/// }
///
/// // Let's pick some coefficients...
/// let ws = [1.33, 0.66];
///
/// // ...and generate some data...
/// let xs = [1.0, 10.0, 100.0];
/// let ys = xs.map(|x| Model.equation(&ws, x));
///
/// // Now we can run the LM algorithm to calculate the coefficients from the data.
/// let ([w0, w1], report) = Model.least_squares_fit(&xs, &ys, [1.5, 1.0]);
/// assert!(report.termination.was_successful());
///
/// // They're the same as what we've picked!
/// assert_relative_eq!(w0, 1.33, max_relative = 1e-10);
/// assert_relative_eq!(w1, 0.66, max_relative = 1e-10);
/// ```
pub trait Equation<const N_PARAMS: usize, T> {
    /// The equation for which we want to find the coefficients `ws`.
    fn equation(&self, ws: &[T; N_PARAMS], x: T) -> T;

    /// The partial derivatives of the equation for which we want to find the coefficients `ws`.
    fn derivatives(&self, ws: &[T; N_PARAMS], x: T) -> [T; N_PARAMS];

    /// Transforms this equation into a [`Jacobian`] problem with the residuals
    /// `$y_i - \mathrm{equation}(\vec{w}, x_i)$`.
    ///
    /// **This will panic if `xs` and `ys` are not of the same length!**
    fn as_least_squares_problem<'a>(&'a self, xs: &'a [T], ys: &'a [T]) -> impl Jacobian<T> + 'a
    where
        T: RealField + Float,
        Self: 'a,
    {
        struct Data<'a, const N_PARAMS: usize, T, E: ?Sized> {
            itself: &'a E,
            xs: &'a [T],
            ys: &'a [T],
        }

        impl<const N_PARAMS: usize, T, E> Data<'_, N_PARAMS, T, E>
        where
            T: RealField + Float,
            E: ?Sized + Equation<N_PARAMS, T>,
        {
            fn coefficients(x: &DVector<T>) -> [T; N_PARAMS] {
                let mut ws = [T::zero(); N_PARAMS];
                ws.copy_from_slice(x.as_slice());
                ws
            }
        }

        impl<const N_PARAMS: usize, T, E> Problem<T> for Data<'_, N_PARAMS, T, E>
        where
            T: RealField + Float,
            E: ?Sized + Equation<N_PARAMS, T>,
        {
            fn residual_count(&self) -> usize {
                self.xs.len()
            }

            fn evaluate(&mut self, x: &DVector<T>, fvec: &mut DVector<T>) -> Result<(), Abort> {
                let ws = Self::coefficients(x);
                for ((r, &x), &y) in fvec.iter_mut().zip(self.xs).zip(self.ys) {
                    *r = y - self.itself.equation(&ws, x);
                }
                Ok(())
            }
        }

        impl<const N_PARAMS: usize, T, E> Jacobian<T> for Data<'_, N_PARAMS, T, E>
        where
            T: RealField + Float,
            E: ?Sized + Equation<N_PARAMS, T>,
        {
            fn jacobian(&mut self, x: &DVector<T>, fjac: &mut DMatrix<T>) -> Result<(), Abort> {
                let ws = Self::coefficients(x);
                for (i, &x) in self.xs.iter().enumerate() {
                    let derivatives = self.itself.derivatives(&ws, x);
                    for (n, d) in derivatives.into_iter().enumerate() {
                        fjac[(i, n)] = -d;
                    }
                }
                Ok(())
            }
        }

        assert_eq!(xs.len(), ys.len());
        Data::<N_PARAMS, T, Self> {
            itself: self,
            xs,
            ys,
        }
    }

    /// A convenience function to directly run the optimization procedure on the equation and return the calculated coefficients.
    ///
    /// Equivalent to the following code:
    ///
    /// ```
    /// # use minpack_nalgebra::{Equation, LevenbergMarquardt};
    /// # use nalgebra::DVector;
    /// # struct Model;
    /// # impl Equation<2, f64> for Model {
    /// #     fn equation(&self, ws: &[f64; 2], x: f64) -> f64 { unimplemented!() }
    /// #     fn derivatives(&self, ws: &[f64; 2], x: f64) -> [f64; 2] { unimplemented!() }
    /// # }
    /// # fn dummy() {
    /// # let xs: &[f64] = unimplemented!();
    /// # let ys: &[f64] = unimplemented!();
    /// # let initial_guess: [f64; 2] = unimplemented!();
    /// let mut problem = Model.as_least_squares_problem(xs, ys);
    /// let mut x = DVector::from_column_slice(&initial_guess);
    /// let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);
    /// # }
    /// ```
    fn least_squares_fit(
        &self,
        xs: &[T],
        ys: &[T],
        initial_guess: [T; N_PARAMS],
    ) -> ([T; N_PARAMS], MinimizationReport<T>)
    where
        T: RealField + Float,
    {
        let mut problem = self.as_least_squares_problem(xs, ys);
        let mut x = DVector::from_column_slice(&initial_guess);
        let report = LevenbergMarquardt::new().minimize(&mut problem, &mut x);

        let mut result = initial_guess;
        result.copy_from_slice(x.as_slice());
        (result, report)
    }
}
