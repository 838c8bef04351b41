use pdfo_core::{
    Backend, Constraint, ConstraintKind, Error, ExitStatus, Method, Problem, Solution,
};

use crate::{
    compass::CompassSearch,
    dispatch::{Request, dispatch},
    options::resolve,
    preprocess::{Canonical, Groups, ProblemInfo, Shape, canonicalize, classify},
    warnings::Warnings,
};

/// Default maximum of the solvers' integer type.
pub const DEFAULT_INDEX_CEILING: u64 = i32::MAX as u64;

/// How the pipeline was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// Through [`optimize`], which may choose the method.
    Orchestrated,
    /// Through a per-method function, which forces its method.
    Standalone(Method),
}

impl Invocation {
    /// The name used in warnings and fatal errors.
    pub(crate) fn invoker(self) -> &'static str {
        match self {
            Self::Orchestrated => "pdfo",
            Self::Standalone(method) => method.name(),
        }
    }

    /// The method the caller asked for, if any.
    pub(crate) fn method(self, problem: &Problem) -> Option<Method> {
        match self {
            Self::Orchestrated => problem.method(),
            Self::Standalone(method) => Some(method),
        }
    }
}

/// Runs problems through preprocessing and a solver backend.
///
/// # Example
///
/// ```
/// use pdfo_core::{Bounds, Method, Problem};
/// use pdfo_solvers::Optimizer;
///
/// let problem = Problem::new(|x: &[f64]| (x[0] - 1.0).powi(2) + x[1] * x[1], [0.0, 1.0])
///     .with_bounds(Bounds::new([-2.0, -2.0], [2.0, 2.0]));
///
/// let solution = Optimizer::new().optimize(&problem).unwrap();
/// assert_eq!(solution.method, Method::Bobyqa);
/// assert!(solution.success);
/// assert!((solution.x[0] - 1.0).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct Optimizer<B = CompassSearch> {
    backend: B,
    index_ceiling: u64,
}

impl Optimizer {
    /// Creates an optimizer with the reference backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: CompassSearch,
            index_ceiling: DEFAULT_INDEX_CEILING,
        }
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Optimizer<B> {
    /// Replaces the solver backend.
    #[must_use]
    pub fn with_backend<C: Backend>(self, backend: C) -> Optimizer<C> {
        Optimizer {
            backend,
            index_ceiling: self.index_ceiling,
        }
    }

    /// Sets the maximum of the backend's integer type.
    ///
    /// Workspaces and `maxfev` are limited to 99% of this value.
    #[must_use]
    pub fn with_index_ceiling(mut self, index_ceiling: u64) -> Self {
        self.index_ceiling = index_ceiling;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn index_ceiling(&self) -> u64 {
        self.index_ceiling
    }

    /// Solves `problem`, choosing a method unless the problem names one.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed input, if a user function or the
    /// backend fails, if the problem is too large for the chosen solver, or
    /// if a debug check fails.
    pub fn optimize(&self, problem: &Problem) -> Result<Solution, Error> {
        self.run(problem, Invocation::Orchestrated)
    }

    /// Solves `problem` with `method`, ignoring the constraint groups the
    /// method cannot handle.
    ///
    /// # Errors
    ///
    /// See [`Optimizer::optimize`].
    pub fn solve_with(&self, method: Method, problem: &Problem) -> Result<Solution, Error> {
        self.run(problem, Invocation::Standalone(method))
    }

    fn run(&self, problem: &Problem, invocation: Invocation) -> Result<Solution, Error> {
        check_start(problem.x0())?;
        let invoker = invocation.invoker();
        let mut warnings = Warnings::default();

        let groups = match invocation {
            Invocation::Orchestrated => Groups::ALL,
            Invocation::Standalone(method) => strip(problem, method, &mut warnings),
        };
        let canonical = canonicalize(problem, groups)?;

        let (lb, ub): (Vec<f64>, Vec<f64>) = canonical
            .fixed()
            .iter()
            .zip(canonical.lb.iter().zip(&canonical.ub))
            .filter(|(fixed, _)| fixed.is_none())
            .map(|(_, (lo, hi))| (*lo, *hi))
            .unzip();
        let options = resolve(problem.options(), lb.len(), &lb, &ub, invoker, &mut warnings);

        let info = classify(problem, &canonical, &options, invocation, &mut warnings);
        log::debug!(
            "{invoker}: {} problem with {} variables; method {}; \
             infeasible = {}, nofreex = {}, feasibility = {}",
            info.refined_type,
            problem.dimension(),
            info.method,
            info.infeasible(),
            info.nofreex(),
            info.feasibility_problem()
        );

        let mut solution = match &info.shape {
            Shape::Infeasible { x } => infeasible(problem, &canonical, &info, x.clone())?,
            Shape::Fixed { x } => {
                let mut solution = terminal(
                    problem,
                    &canonical,
                    &info,
                    x.clone(),
                    ExitStatus::FixedSuccess,
                    true,
                )?;
                solution.constr_modified = Some(false);
                solution
            }
            Shape::Feasibility { x } => feasibility(problem, &canonical, &info, x.clone())?,
            Shape::Normal(reduced) => {
                let request = Request {
                    problem,
                    canonical: &canonical,
                    reduced,
                    method: info.method,
                    invoker,
                    index_ceiling: self.index_ceiling,
                };
                dispatch(&self.backend, &request, options, &mut warnings)?
            }
        };

        solution.warnings = warnings.into_vec();
        Ok(solution)
    }
}

/// Solves `problem` with the default optimizer.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn optimize(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().optimize(problem)
}

/// Solves `problem` with UOBYQA, ignoring bounds and constraints.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn uobyqa(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().solve_with(Method::Uobyqa, problem)
}

/// Solves `problem` with NEWUOA, ignoring bounds and constraints.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn newuoa(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().solve_with(Method::Newuoa, problem)
}

/// Solves `problem` with BOBYQA, ignoring linear and nonlinear constraints.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn bobyqa(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().solve_with(Method::Bobyqa, problem)
}

/// Solves `problem` with LINCOA, ignoring nonlinear constraints.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn lincoa(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().solve_with(Method::Lincoa, problem)
}

/// Solves `problem` with COBYLA.
///
/// # Errors
///
/// See [`Optimizer::optimize`].
pub fn cobyla(problem: &Problem) -> Result<Solution, Error> {
    Optimizer::new().solve_with(Method::Cobyla, problem)
}

fn check_start(x0: &[f64]) -> Result<(), Error> {
    if x0.is_empty() {
        return Err(Error::EmptyStart);
    }
    match x0.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(Error::NonFinite {
            what: "x0",
            index,
            value: x0[index],
        }),
        None => Ok(()),
    }
}

/// Returns the groups `method` reads, warning about each one it drops.
fn strip(problem: &Problem, method: Method, warnings: &mut Warnings) -> Groups {
    let groups = Groups::for_method(method);
    let name = method.name();

    let has_bounds = problem
        .bounds()
        .is_some_and(|b| b.lower().iter().chain(b.upper()).any(|v| v.is_finite()));
    let has_linear = problem
        .constraints()
        .iter()
        .any(|c| matches!(c, Constraint::Linear(_)));
    let has_nonlinear = problem
        .constraints()
        .iter()
        .any(|c| !matches!(c, Constraint::Linear(_)));

    let dropped = [
        (!groups.bounds && has_bounds, "bound constraints"),
        (!groups.linear && has_linear, "linear constraints"),
        (!groups.nonlinear && has_nonlinear, "nonlinear constraints"),
    ];
    for (_, group) in dropped.iter().filter(|(dropped, _)| *dropped) {
        warnings.push(format!(
            "{name}: {group} are given as parameter; they will be ignored"
        ));
    }
    groups
}

fn infeasible(
    problem: &Problem,
    canonical: &Canonical<'_>,
    info: &ProblemInfo,
    x: Vec<f64>,
) -> Result<Solution, Error> {
    let mut solution = terminal(problem, canonical, info, x, ExitStatus::Infeasible, true)?;
    solution.infeasible_bounds = Some(info.infeasible_bounds.clone());
    solution.infeasible_linear_constraints = Some(info.infeasible_linear.clone());
    solution.infeasible_nonlinear_constraints = Some(info.infeasible_nonlinear.clone());
    solution.constr_modified = Some(false);
    Ok(solution)
}

fn feasibility(
    problem: &Problem,
    canonical: &Canonical<'_>,
    info: &ProblemInfo,
    x: Vec<f64>,
) -> Result<Solution, Error> {
    // The point is computed in floating point, so it counts as feasible when
    // its violation is within rounding of the magnitude of the terms of
    // `A x`, not only when it is below `EPSILON` in absolute terms.
    let tol = 1e2 * f64::EPSILON * canonical.magnitude(&x);
    let mut solution = terminal(
        problem,
        canonical,
        info,
        x,
        ExitStatus::FeasibilitySuccess,
        false,
    )?;
    if solution.maxcv.unwrap_or(0.0) > tol {
        solution = Solution {
            status: ExitStatus::FeasibilityError,
            success: ExitStatus::FeasibilityError.is_success(),
            message: ExitStatus::FeasibilityError.message().to_string(),
            ..solution
        };
    }
    solution.constr_modified = Some(false);
    Ok(solution)
}

/// Builds the solution of a problem answered without a solver.
///
/// With `evaluate`, the objective is evaluated once at `x`. Nonlinear
/// constraints are evaluated again, and counted, only when `x` is not `x0`.
fn terminal(
    problem: &Problem,
    canonical: &Canonical<'_>,
    info: &ProblemInfo,
    x: Vec<f64>,
    status: ExitStatus,
    evaluate: bool,
) -> Result<Solution, Error> {
    let (fun, fun_history) = match problem.objective().filter(|_| evaluate) {
        Some(objective) => {
            let f = objective.call(&x)?;
            (f, vec![f])
        }
        None => (0.0, Vec::new()),
    };

    let mut recomputed = 0;
    let nonlinear = match canonical.nonlinear.as_ref().filter(|_| !info.nonlinear_dropped) {
        Some(_) if x.as_slice() == problem.x0() => Some(canonical.nonlinear_x0.clone()),
        Some(system) => {
            recomputed += 1;
            Some(system.values(&x)?)
        }
        None => None,
    };

    let mut solution = Solution::new(x, fun, status, info.method);
    solution.nfev = fun_history.len() + recomputed;
    if canonical.kind() != ConstraintKind::Unconstrained {
        let maxcv = canonical.violation(&solution.x, nonlinear.as_deref());
        solution.maxcv = Some(maxcv);
        solution.maxcv_history = Some(vec![maxcv; fun_history.len()]);
    }
    solution.constraint_values = canonical.constraint_values(&solution.x, nonlinear.as_deref());
    solution.fun_history = fun_history;
    Ok(solution)
}
