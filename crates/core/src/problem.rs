use crate::{Bounds, Constraint, Method, Objective, ObjectiveFn, Options};

/// A derivative-free optimization problem.
///
/// ```
/// use pdfo_core::{Bounds, LinearConstraint, Problem};
///
/// let problem = Problem::new(|x: &[f64]| x[0].powi(2) + x[1].powi(2), [0.0, 1.0])
///     .with_bounds(Bounds::new([0.0, 0.5], [2.0, 3.0]))
///     .with_constraint(LinearConstraint::row([1.0, 1.0], 0.0, 1.0));
///
/// assert_eq!(problem.dimension(), 2);
/// ```
#[derive(Debug)]
pub struct Problem {
    objective: Option<ObjectiveFn>,
    x0: Vec<f64>,
    bounds: Option<Bounds>,
    constraints: Vec<Constraint>,
    method: Option<Method>,
    options: Options,
}

impl Problem {
    /// Creates a problem minimizing `objective` from `x0`.
    pub fn new<O>(objective: O, x0: impl Into<Vec<f64>>) -> Self
    where
        O: Objective + 'static,
    {
        Self {
            objective: Some(ObjectiveFn::new(objective)),
            ..Self::feasibility(x0)
        }
    }

    /// Creates a problem with no objective.
    ///
    /// Solving it looks for a point satisfying the constraints.
    pub fn feasibility(x0: impl Into<Vec<f64>>) -> Self {
        Self {
            objective: None,
            x0: x0.into(),
            bounds: None,
            constraints: Vec::new(),
            method: None,
            options: Options::default(),
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Requests a specific solver instead of the automatic choice.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn objective(&self) -> Option<&ObjectiveFn> {
        self.objective.as_ref()
    }

    #[must_use]
    pub fn x0(&self) -> &[f64] {
        &self.x0
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.x0.len()
    }

    #[must_use]
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[must_use]
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }
}
