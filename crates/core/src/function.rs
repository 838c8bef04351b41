use std::{convert::Infallible, fmt};

use crate::Error;

/// Boxed error raised by a user-supplied callable.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Objective values above this magnitude are treated as equally bad.
pub const HUGE_FUN: f64 = 1e30;

/// Constraint values are clamped to `[-HUGE_CON, HUGE_CON]`.
pub const HUGE_CON: f64 = 1e30;

/// A scalar objective `f: ℝⁿ → ℝ` to be minimized.
///
/// Closures of the form `Fn(&[f64]) -> f64` implement this trait with an
/// [`Infallible`] error. Implement it on your own type when evaluation can
/// fail; the error is handed back to the caller unmodified.
pub trait Objective {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the objective cannot be computed.
    fn value(&self, x: &[f64]) -> Result<f64, Self::Error>;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64,
{
    type Error = Infallible;

    fn value(&self, x: &[f64]) -> Result<f64, Self::Error> {
        Ok(self(x))
    }
}

/// A vector-valued constraint function `c: ℝⁿ → ℝᵐ`.
///
/// Closures of the form `Fn(&[f64]) -> Vec<f64>` implement this trait with an
/// [`Infallible`] error.
pub trait ConstraintFunction {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluates every constraint component at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the constraint cannot be computed.
    fn values(&self, x: &[f64]) -> Result<Vec<f64>, Self::Error>;
}

impl<F> ConstraintFunction for F
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    type Error = Infallible;

    fn values(&self, x: &[f64]) -> Result<Vec<f64>, Self::Error> {
        Ok(self(x))
    }
}

/// Binds extra arguments to an objective.
///
/// `WithArgs::new(f, args)` behaves like `|x| f(x, &args)`.
#[derive(Debug, Clone)]
pub struct WithArgs<F, A> {
    fun: F,
    args: A,
}

impl<F, A> WithArgs<F, A> {
    /// Creates an objective that passes `args` on every call.
    pub fn new(fun: F, args: A) -> Self {
        Self { fun, args }
    }

    /// Returns the bound arguments.
    pub fn args(&self) -> &A {
        &self.args
    }
}

impl<F, A> Objective for WithArgs<F, A>
where
    F: Fn(&[f64], &A) -> f64,
{
    type Error = Infallible;

    fn value(&self, x: &[f64]) -> Result<f64, Self::Error> {
        Ok((self.fun)(x, &self.args))
    }
}

type DynObjective = dyn Fn(&[f64]) -> Result<f64, BoxError>;
type DynConstraint = dyn Fn(&[f64]) -> Result<Vec<f64>, BoxError>;

/// A type-erased [`Objective`].
pub struct ObjectiveFn(Box<DynObjective>);

impl ObjectiveFn {
    /// Erases the concrete objective type.
    pub fn new<O>(objective: O) -> Self
    where
        O: Objective + 'static,
    {
        Self(Box::new(move |x: &[f64]| {
            objective.value(x).map_err(|e| Box::new(e) as BoxError)
        }))
    }

    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Objective`] wrapping the user's error.
    pub fn call(&self, x: &[f64]) -> Result<f64, Error> {
        (self.0)(x).map_err(Error::Objective)
    }
}

impl fmt::Debug for ObjectiveFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectiveFn").finish_non_exhaustive()
    }
}

/// A type-erased [`ConstraintFunction`].
pub struct ConstraintFn(Box<DynConstraint>);

impl ConstraintFn {
    /// Erases the concrete constraint type.
    pub fn new<C>(constraint: C) -> Self
    where
        C: ConstraintFunction + 'static,
    {
        Self(Box::new(move |x: &[f64]| {
            constraint.values(x).map_err(|e| Box::new(e) as BoxError)
        }))
    }

    /// Evaluates the constraint at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Constraint`] wrapping the user's error.
    pub fn call(&self, x: &[f64]) -> Result<Vec<f64>, Error> {
        (self.0)(x).map_err(Error::Constraint)
    }
}

impl fmt::Debug for ConstraintFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintFn").finish_non_exhaustive()
    }
}
