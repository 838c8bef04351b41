use pdfo_core::{ConstraintKind, Method, OptionSet, Problem};

use crate::{optimizer::Invocation, warnings::Warnings};

use super::{
    AffineMap, Canonical, Elimination, LinearRows, Origin, Scaling, canonical::side_violation,
    eliminate, feasible,
};

/// The problem handed to a solver, in reduced variables `y`.
///
/// `map` takes `y` back to the caller's variables. Nonlinear constraints,
/// when used, are always evaluated on the mapped point.
#[derive(Debug)]
pub(crate) struct Reduced {
    pub(crate) map: AffineMap,
    pub(crate) y0: Vec<f64>,
    pub(crate) lb: Vec<f64>,
    pub(crate) ub: Vec<f64>,
    pub(crate) linear: Option<LinearRows>,
    pub(crate) nonlinear: bool,
}

impl Reduced {
    pub(crate) fn dimension(&self) -> usize {
        self.y0.len()
    }
}

/// How a problem is answered.
#[derive(Debug)]
pub(crate) enum Shape {
    /// Some constraints can never hold; `x` is the best available point.
    Infeasible { x: Vec<f64> },
    /// The bounds or equalities leave no freedom.
    Fixed { x: Vec<f64> },
    /// No objective and only linear constraints; `x` is the projected start.
    Feasibility { x: Vec<f64> },
    Normal(Reduced),
}

/// The outcome of classification.
#[derive(Debug)]
pub(crate) struct ProblemInfo {
    pub(crate) shape: Shape,
    pub(crate) method: Method,
    pub(crate) refined_type: ConstraintKind,
    pub(crate) infeasible_bounds: Vec<usize>,
    pub(crate) infeasible_linear: Vec<usize>,
    pub(crate) infeasible_nonlinear: Vec<usize>,
    /// The nonlinear constraints were dropped for a method that cannot use
    /// them.
    pub(crate) nonlinear_dropped: bool,
}

impl ProblemInfo {
    pub(crate) fn infeasible(&self) -> bool {
        matches!(self.shape, Shape::Infeasible { .. })
    }

    pub(crate) fn nofreex(&self) -> bool {
        matches!(self.shape, Shape::Fixed { .. })
    }

    pub(crate) fn feasibility_problem(&self) -> bool {
        matches!(self.shape, Shape::Feasibility { .. })
    }
}

/// Classifies a canonicalized problem and reduces it for the solver.
///
/// Checks run in order: inconsistent constraints, fully fixed variables,
/// then reduction by fixing, scaling and equality elimination. Whatever
/// remains is either a feasibility problem or a normal one.
pub(crate) fn classify(
    problem: &Problem,
    canonical: &Canonical<'_>,
    options: &OptionSet,
    invocation: Invocation,
    warnings: &mut Warnings,
) -> ProblemInfo {
    let n = problem.dimension();
    let x0 = problem.x0();
    let requested = invocation.method(problem);

    let mut info = ProblemInfo {
        shape: Shape::Infeasible {
            x: canonical.with_fixed(x0),
        },
        method: requested.unwrap_or_else(|| Method::default_for(canonical.kind(), n)),
        refined_type: canonical.kind(),
        infeasible_bounds: canonical.infeasible_bounds.clone(),
        infeasible_linear: canonical.infeasible_linear.clone(),
        infeasible_nonlinear: canonical.infeasible_nonlinear.clone(),
        nonlinear_dropped: false,
    };
    if canonical.is_infeasible() {
        return info;
    }

    let fixed = canonical.fixed();
    let free: Vec<usize> = (0..n).filter(|&i| fixed[i].is_none()).collect();
    if free.is_empty() {
        info.shape = Shape::Fixed {
            x: canonical.lb.clone(),
        };
        return info;
    }

    let mut map = AffineMap::fixing(&fixed);
    let mut y0: Vec<f64> = free.iter().map(|&i| x0[i]).collect();
    let mut lb: Vec<f64> = free.iter().map(|&i| canonical.lb[i]).collect();
    let mut ub: Vec<f64> = free.iter().map(|&i| canonical.ub[i]).collect();

    let mut linear = match canonical.linear.as_ref() {
        Some(rows) => match active_rows(&rows.pull_back(&map)) {
            Ok(rows) => rows,
            Err(origins) => {
                info.record(&origins);
                return info;
            }
        },
        None => None,
    };

    if options.scale {
        if let Some(scaling) = Scaling::new(&lb, &ub) {
            let inner = scaling.as_map();
            y0 = scaling.scale(&y0);
            lb = scaling.scale(&lb);
            ub = scaling.scale(&ub);
            linear = linear.map(|rows| rows.pull_back(&inner));
            map = map.compose(&inner);
        }
    }

    let has_equalities = linear
        .as_ref()
        .is_some_and(|rows| (0..rows.len()).any(|i| rows.is_equality(i)));
    if options.eliminate_lin_eq && has_equalities {
        let rows = linear.take().unwrap_or_else(|| LinearRows::empty(y0.len()));
        match eliminate(&rows, &y0, &lb, &ub, &free) {
            Elimination::Skipped => {
                warnings.push(format!(
                    "{}: the linear equality constraints are ill-conditioned; \
                     they are not eliminated",
                    invocation.invoker()
                ));
                linear = Some(rows);
            }
            Elimination::Inconsistent(origins) => {
                info.record(&origins);
                return info;
            }
            Elimination::Unique(z) => {
                let violated = violated_at(&rows, &lb, &ub, &free, &z);
                if violated.is_empty() {
                    info.shape = Shape::Fixed { x: map.apply(&z) };
                } else {
                    info.record(&violated);
                }
                return info;
            }
            Elimination::Reduced {
                map: inner,
                w0,
                rows: reduced,
            } => {
                map = map.compose(&inner);
                lb = vec![f64::NEG_INFINITY; w0.len()];
                ub = vec![f64::INFINITY; w0.len()];
                y0 = w0;
                linear = match active_rows(&reduced) {
                    Ok(rows) => rows,
                    Err(origins) => {
                        info.record(&origins);
                        return info;
                    }
                };
            }
        }
    }

    let dimension = y0.len();
    let mut nonlinear = canonical.nonlinear.is_some();
    let mut kind = refined_type(&lb, &ub, linear.as_ref(), nonlinear);

    let method = match requested {
        None => Method::default_for(kind, dimension),
        Some(method) if method.accepts(kind) => method,
        Some(Method::Lincoa) if kind == ConstraintKind::Nonlinear => {
            warnings.push(format!(
                "{}: lincoa cannot handle nonlinear constraints; they are ignored",
                invocation.invoker()
            ));
            nonlinear = false;
            info.nonlinear_dropped = true;
            kind = refined_type(&lb, &ub, linear.as_ref(), nonlinear);
            Method::Lincoa
        }
        Some(method) => {
            let fallback = Method::default_for(kind, dimension);
            warnings.push(format!(
                "{}: {method} cannot solve a {kind} problem; {fallback} is used instead",
                invocation.invoker()
            ));
            fallback
        }
    };
    log::debug!("{kind} problem in {dimension} reduced variables; method {method}");

    info.method = method;
    info.refined_type = kind;

    info.shape = if problem.objective().is_none() && !nonlinear {
        let y = feasible::project(&y0, &lb, &ub, linear.as_ref());
        Shape::Feasibility { x: map.apply(&y) }
    } else {
        Shape::Normal(Reduced {
            map,
            y0,
            lb,
            ub,
            linear,
            nonlinear,
        })
    };
    info
}

impl ProblemInfo {
    fn record(&mut self, origins: &[Origin]) {
        for origin in origins {
            match *origin {
                Origin::Bound(i) => self.infeasible_bounds.push(i),
                Origin::Linear(i) => self.infeasible_linear.push(i),
            }
        }
        self.infeasible_bounds.sort_unstable();
        self.infeasible_bounds.dedup();
        self.infeasible_linear.sort_unstable();
        self.infeasible_linear.dedup();
    }
}

/// Drops trivial rows, or returns the origins of unsatisfiable ones.
fn active_rows(rows: &LinearRows) -> Result<Option<LinearRows>, Vec<Origin>> {
    let (active, infeasible) = rows.split_trivial();
    if !infeasible.is_empty() {
        return Err(infeasible);
    }
    Ok((!active.is_empty()).then_some(active))
}

/// Returns the origins of rows and bounds violated at `z`.
fn violated_at(
    rows: &LinearRows,
    lb: &[f64],
    ub: &[f64],
    bound_index: &[usize],
    z: &[f64],
) -> Vec<Origin> {
    let tol = 1e-10 * z.iter().fold(1.0, |m: f64, v| m.max(v.abs()));
    let bounds = (0..z.len())
        .filter(|&j| side_violation(z[j], lb[j], ub[j]) > tol)
        .map(|j| Origin::Bound(bound_index[j]));
    let values = rows.values(z);
    let linear = (0..rows.len())
        .filter(|&i| side_violation(values[i], rows.lb[i], rows.ub[i]) > tol)
        .map(|i| rows.origin[i]);
    bounds.chain(linear).collect()
}

fn refined_type(
    lb: &[f64],
    ub: &[f64],
    linear: Option<&LinearRows>,
    nonlinear: bool,
) -> ConstraintKind {
    if nonlinear {
        ConstraintKind::Nonlinear
    } else if linear.is_some_and(|rows| !rows.is_empty()) {
        ConstraintKind::Linear
    } else if lb.iter().chain(ub).any(|v| v.is_finite()) {
        ConstraintKind::Bound
    } else {
        ConstraintKind::Unconstrained
    }
}
