use crate::{ConstraintFn, ConstraintFunction};

/// Linear constraints `lb <= A x <= ub`.
///
/// `lb` and `ub` hold one entry per row of `A`, or a single entry that
/// applies to every row. Use infinities for missing sides and `lb == ub`
/// for equalities.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    a: Vec<Vec<f64>>,
    lb: Vec<f64>,
    ub: Vec<f64>,
}

impl LinearConstraint {
    /// Creates linear constraints from the rows of `A`.
    pub fn new(a: Vec<Vec<f64>>, lb: impl Into<Vec<f64>>, ub: impl Into<Vec<f64>>) -> Self {
        Self {
            a,
            lb: lb.into(),
            ub: ub.into(),
        }
    }

    /// Creates a single linear constraint `lb <= a·x <= ub`.
    pub fn row(a: impl Into<Vec<f64>>, lb: f64, ub: f64) -> Self {
        Self {
            a: vec![a.into()],
            lb: vec![lb],
            ub: vec![ub],
        }
    }

    /// Returns the rows of `A`.
    #[must_use]
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.a
    }

    /// Returns the lower sides.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lb
    }

    /// Returns the upper sides.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.ub
    }
}

/// Nonlinear constraints `lb <= c(x) <= ub`.
///
/// The number of components is discovered by evaluating `c` at the starting
/// point. `lb` and `ub` hold one entry per component or a single entry that
/// applies to every component.
#[derive(Debug)]
pub struct NonlinearConstraint {
    fun: ConstraintFn,
    lb: Vec<f64>,
    ub: Vec<f64>,
}

impl NonlinearConstraint {
    /// Creates nonlinear constraints from a vector function and its sides.
    pub fn new<C>(fun: C, lb: impl Into<Vec<f64>>, ub: impl Into<Vec<f64>>) -> Self
    where
        C: ConstraintFunction + 'static,
    {
        Self {
            fun: ConstraintFn::new(fun),
            lb: lb.into(),
            ub: ub.into(),
        }
    }

    /// Returns the constraint function.
    #[must_use]
    pub fn function(&self) -> &ConstraintFn {
        &self.fun
    }

    /// Returns the lower sides.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lb
    }

    /// Returns the upper sides.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.ub
    }
}

/// One constraint input, in any of the accepted forms.
#[derive(Debug)]
pub enum Constraint {
    /// Linear constraints `lb <= A x <= ub`.
    Linear(LinearConstraint),
    /// Nonlinear constraints `lb <= c(x) <= ub`.
    Nonlinear(NonlinearConstraint),
    /// Every component satisfies `c(x) = 0`.
    Equality(ConstraintFn),
    /// Every component satisfies `c(x) >= 0`.
    Inequality(ConstraintFn),
}

impl Constraint {
    /// Creates the equality constraint `c(x) = 0`.
    pub fn equality<C>(fun: C) -> Self
    where
        C: ConstraintFunction + 'static,
    {
        Self::Equality(ConstraintFn::new(fun))
    }

    /// Creates the inequality constraint `c(x) >= 0`.
    pub fn inequality<C>(fun: C) -> Self
    where
        C: ConstraintFunction + 'static,
    {
        Self::Inequality(ConstraintFn::new(fun))
    }
}

impl From<LinearConstraint> for Constraint {
    fn from(constraint: LinearConstraint) -> Self {
        Self::Linear(constraint)
    }
}

impl From<NonlinearConstraint> for Constraint {
    fn from(constraint: NonlinearConstraint) -> Self {
        Self::Nonlinear(constraint)
    }
}
