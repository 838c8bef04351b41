//! Postprocessing of raw solver outcomes.

use pdfo_core::{ConstraintKind, Error, ExitStatus, HUGE_FUN, OptionSet, Solution, SolverOutcome};

use crate::dispatch::{Evaluator, Request};

/// Relative tolerance of the debug value checks.
const CHECK_TOL: f64 = 1e-10;

/// Maps a raw outcome back to the caller's variables and checks it.
///
/// # Errors
///
/// Returns an error for an unknown exit code, a malformed outcome, a failed
/// debug check, or a failing user function.
pub(crate) fn normalize(
    outcome: SolverOutcome,
    evaluator: &mut Evaluator<'_>,
    request: &Request<'_, '_>,
    options: &OptionSet,
) -> Result<Solution, Error> {
    let Request {
        problem,
        canonical,
        reduced,
        method,
        ..
    } = *request;

    let status = ExitStatus::try_from(outcome.exit_code)?;
    if outcome.x.len() != reduced.map.input_dim() {
        return Err(Error::DimensionMismatch {
            what: "solver point",
            expected: reduced.map.input_dim(),
            found: outcome.x.len(),
        });
    }

    if options.debug {
        check_counts(&outcome, evaluator)?;
    }

    let x = reduced.map.apply(&outcome.x);
    // `None` when the solver was not given the nonlinear constraints.
    let nonlinear = evaluator.nonlinear_at(&outcome.x)?;

    let fun = if problem.objective().is_some() {
        outcome.fun
    } else {
        0.0
    };

    if options.chkfunval {
        if let Some(objective) = problem.objective() {
            let mut recomputed = objective.call(&x)?;
            if !options.classical && !(recomputed <= HUGE_FUN) {
                recomputed = HUGE_FUN;
            }
            check_value("objective value", fun, recomputed)?;
        }
        if let (Some(system), Some(values)) = (canonical.nonlinear.as_ref(), nonlinear.as_ref()) {
            for (reported, recomputed) in values.iter().zip(system.values(&x)?) {
                check_value("constraint value", *reported, recomputed)?;
            }
        }
    }

    let constrained = canonical.kind() != ConstraintKind::Unconstrained;
    let mut solution = Solution::new(x, fun, status, method);
    solution.nfev = evaluator.nfev();
    solution.fun_history = outcome.fun_history;
    if constrained {
        solution.maxcv = Some(canonical.violation(&solution.x, nonlinear.as_deref()));
        solution.maxcv_history = outcome.maxcv_history;
    }
    solution.constraint_values = canonical.constraint_values(&solution.x, nonlinear.as_deref());

    if !options.quiet {
        log::info!(
            "{}: {} (exit {}); f = {}, nfev = {}",
            method,
            solution.message,
            status.code(),
            solution.fun,
            solution.nfev
        );
    }

    Ok(solution)
}

#[allow(clippy::cast_precision_loss)]
fn check_counts(outcome: &SolverOutcome, evaluator: &Evaluator<'_>) -> Result<(), Error> {
    let counted = evaluator.fun_history().len();
    let checks = [
        ("number of function evaluations", outcome.nfev, counted),
        ("length of the objective history", outcome.fun_history.len(), counted),
    ];
    for (what, reported, recomputed) in checks {
        if reported != recomputed {
            return Err(Error::Consistency {
                what,
                reported: reported as f64,
                recomputed: recomputed as f64,
            });
        }
    }

    if let Some(history) = &outcome.maxcv_history {
        if history.len() != outcome.nfev {
            return Err(Error::Consistency {
                what: "length of the constraint violation history",
                reported: history.len() as f64,
                recomputed: outcome.nfev as f64,
            });
        }
    }
    Ok(())
}

fn check_value(what: &'static str, reported: f64, recomputed: f64) -> Result<(), Error> {
    if reported.is_nan() && recomputed.is_nan() {
        return Ok(());
    }
    let tol = CHECK_TOL * recomputed.abs().max(1.0);
    if (reported - recomputed).abs() <= tol {
        Ok(())
    } else {
        Err(Error::Consistency {
            what,
            reported,
            recomputed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_within_tolerance_pass() {
        assert!(check_value("objective value", 1.0, 1.0 + 1e-12).is_ok());
        assert!(check_value("objective value", 1e6, 1e6 + 1e-5).is_ok());
        assert!(check_value("objective value", f64::NAN, f64::NAN).is_ok());
    }

    #[test]
    fn values_beyond_tolerance_fail() {
        assert!(matches!(
            check_value("objective value", 1.0, 1.1),
            Err(Error::Consistency { what: "objective value", .. })
        ));
        assert!(check_value("constraint value", 0.0, f64::NAN).is_err());
    }
}
