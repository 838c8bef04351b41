//! Solver invocation for normal problems.

mod evaluator;
mod workspace;

pub(crate) use evaluator::Evaluator;

use pdfo_core::{Backend, Error, Method, OptionSet, Problem, Solution, SolverCall, TrustRegion};

use crate::{
    normalize::normalize,
    options::{adapt, rebase},
    preprocess::{AugmentedLinearSystem, Canonical, Reduced, project},
    warnings::Warnings,
};

use workspace::{Limits, guard};

/// Everything known about a problem once it has been reduced.
#[derive(Debug)]
pub(crate) struct Request<'a, 'p> {
    pub(crate) problem: &'a Problem,
    pub(crate) canonical: &'a Canonical<'p>,
    pub(crate) reduced: &'a Reduced,
    pub(crate) method: Method,
    pub(crate) invoker: &'static str,
    pub(crate) index_ceiling: u64,
}

/// Runs `request.method` on `backend` and normalizes its outcome.
///
/// # Errors
///
/// Returns an error if the problem is too large for the solver, if a user
/// function or the backend fails, or if a debug check fails.
pub(crate) fn dispatch<B>(
    backend: &B,
    request: &Request<'_, '_>,
    mut options: OptionSet,
    warnings: &mut Warnings,
) -> Result<Solution, Error>
where
    B: Backend + ?Sized,
{
    let Request {
        problem,
        canonical,
        reduced,
        method,
        invoker,
        index_ceiling,
    } = *request;
    let n = reduced.dimension();
    let name = method.name();

    rebase(problem.options(), n, &mut options);
    adapt(method, n, &mut options, warnings);

    let nonlinear = canonical.nonlinear.as_ref().filter(|_| reduced.nonlinear);
    let augmented = AugmentedLinearSystem::build(&reduced.lb, &reduced.ub, reduced.linear.as_ref());
    let m = match method {
        Method::Lincoa => augmented.len(),
        Method::Cobyla => augmented.len() + nonlinear.map_or(0, |system| system.finite_sides()),
        Method::Uobyqa | Method::Newuoa | Method::Bobyqa => 0,
    };

    let requested = Limits {
        npt: options.npt,
        maxfev: options.maxfev,
    };
    let limits = guard(method, n, m, requested, index_ceiling, invoker, warnings)?;

    let mut region = TrustRegion {
        rhobeg: options.radius_init,
        rhoend: options.radius_final,
        maxfev: limits.maxfev,
        ftarget: options.ftarget,
    };
    let mut x0 = reduced.y0.clone();
    let mut constr_modified = None;

    match method {
        Method::Bobyqa => {
            let projected = project(&x0, &reduced.lb, &reduced.ub, None);
            if projected != x0 {
                warnings.push(format!(
                    "{name}: x0 is revised to satisfy the bound constraints"
                ));
                x0 = projected;
            }

            let min_width = reduced
                .lb
                .iter()
                .zip(&reduced.ub)
                .map(|(lo, hi)| hi - lo)
                .filter(|width| width.is_finite())
                .fold(f64::INFINITY, f64::min);
            if region.rhobeg > min_width / 2.0 {
                region.rhobeg = min_width / 4.0;
                region.rhoend = region.rhoend.min(region.rhobeg);
                warnings.push(format!(
                    "{name}: rhobeg is so large that the bounds are too close; \
                     rhobeg is set to {}",
                    region.rhobeg
                ));
            }
        }
        Method::Lincoa => {
            if !augmented.is_empty() && augmented.violation(&x0) > 0.0 {
                x0 = project(&x0, &reduced.lb, &reduced.ub, reduced.linear.as_ref());
                log::debug!("{name}: x0 is replaced by the nearest feasible point found");
            }

            let tol = options.repair_tol * augmented.b.iter().fold(1.0, |m: f64, b| m.max(*b));
            let modified = augmented.slacks(&x0).iter().any(|slack| -slack > tol);
            if modified {
                warnings.push(format!(
                    "{name}: preprocessing did not find a feasible x0; the problem is likely \
                     infeasible; {name} will modify the right-hand side of the constraints \
                     to make x0 feasible"
                ));
            }
            constr_modified = Some(modified);
        }
        Method::Uobyqa | Method::Newuoa | Method::Cobyla => {}
    }

    let classical = options.classical;
    let npt = limits.npt;
    let call = match method {
        Method::Uobyqa => SolverCall::Uobyqa {
            x0: &x0,
            region,
            classical,
        },
        Method::Newuoa => SolverCall::Newuoa {
            x0: &x0,
            npt,
            region,
            classical,
        },
        Method::Bobyqa => SolverCall::Bobyqa {
            x0: &x0,
            lb: &reduced.lb,
            ub: &reduced.ub,
            npt,
            honour_x0: options.honour_x0,
            region,
            classical,
        },
        Method::Lincoa => SolverCall::Lincoa {
            x0: &x0,
            a: &augmented.a,
            b: &augmented.b,
            npt,
            region,
            classical,
        },
        Method::Cobyla => SolverCall::Cobyla {
            x0: &x0,
            m,
            region,
            classical,
        },
    };

    let mut evaluator = Evaluator::new(problem.objective(), &reduced.map, classical);
    if method == Method::Cobyla {
        evaluator = evaluator.with_constraints(Some(&augmented), nonlinear);
    }

    log::debug!(
        "{invoker}: calling {name} with n = {n}, m = {m}, npt = {npt}, maxfev = {}",
        region.maxfev
    );
    let outcome = backend.solve(&call, &mut evaluator)?;

    let mut solution = normalize(outcome, &mut evaluator, request, &options)?;
    solution.constr_modified = constr_modified;
    Ok(solution)
}
