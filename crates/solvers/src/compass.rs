//! A coordinate-search backend.
//!
//! [`CompassSearch`] polls `x ± step·e_i` around the best point, moves to the
//! first improvement, and halves the step after a failed poll. It stands in
//! for the Powell solvers so the pipeline can run end to end; it honors each
//! family's constraint handling but not its model-based efficiency.

use nalgebra::{DMatrix, DVector};
use pdfo_core::{Backend, Error, Evaluate, SolverCall, SolverOutcome};

const RADIUS_REACHED: i32 = 0;
const TARGET_REACHED: i32 = 1;
const MAXFEV_REACHED: i32 = 3;
const NAN_EVALUATION: i32 = -2;

/// Reference backend for every solver family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompassSearch;

impl Backend for CompassSearch {
    fn solve(&self, call: &SolverCall<'_>, eval: &mut dyn Evaluate) -> Result<SolverOutcome, Error> {
        let region = call.region();
        let rule = Rule::of(call);
        let mut search = Search {
            eval,
            rule: &rule,
            fun_history: Vec::new(),
            maxcv_history: Vec::new(),
        };

        let mut best = search.evaluate(rule.admit(call.x0()))?;
        let mut step = region.rhobeg;

        let exit_code = loop {
            if best.f.is_nan() {
                break NAN_EVALUATION;
            }
            if best.f <= region.ftarget && best.cv <= 0.0 {
                break TARGET_REACHED;
            }
            if search.nfev() >= region.maxfev {
                break MAXFEV_REACHED;
            }

            match search.poll(&best, step, region.maxfev)? {
                Poll::Improved(point) => best = point,
                Poll::Nan(point) => {
                    log::debug!("compass: NaN objective at {:?}", point.x);
                    break NAN_EVALUATION;
                }
                Poll::Failed if search.nfev() >= region.maxfev => break MAXFEV_REACHED,
                Poll::Failed if step <= region.rhoend => break RADIUS_REACHED,
                Poll::Failed => step = (0.5 * step).max(region.rhoend),
            }
        };

        let constrained = !matches!(rule, Rule::Free);
        Ok(SolverOutcome {
            nfev: search.nfev(),
            fun_history: search.fun_history,
            maxcv: constrained.then_some(best.cv),
            maxcv_history: constrained.then_some(search.maxcv_history),
            constraint_values: best.c,
            x: best.x,
            fun: best.f,
            exit_code,
        })
    }
}

/// How a family treats constraints.
enum Rule<'a> {
    Free,
    /// Trial points are projected onto the box.
    Box { lb: &'a [f64], ub: &'a [f64] },
    /// Trial points with `a x > relaxed` are never evaluated.
    Linear {
        a: &'a DMatrix<f64>,
        b: &'a [f64],
        relaxed: Vec<f64>,
    },
    /// Points are ranked by violation of `c(x) >= 0`, then by value.
    Nonlinear { m: usize },
}

impl<'a> Rule<'a> {
    fn of(call: &SolverCall<'a>) -> Self {
        match *call {
            SolverCall::Uobyqa { .. } | SolverCall::Newuoa { .. } => Self::Free,
            SolverCall::Bobyqa { lb, ub, .. } => Self::Box { lb, ub },
            SolverCall::Lincoa { x0, a, b, .. } => {
                // An infeasible start relaxes its violated right-hand sides.
                let relaxed = product(a, x0)
                    .iter()
                    .zip(b)
                    .map(|(ax, b)| ax.max(*b))
                    .collect();
                Self::Linear { a, b, relaxed }
            }
            SolverCall::Cobyla { m, .. } => Self::Nonlinear { m },
        }
    }

    /// Maps a trial point to the one to evaluate.
    fn admit(&self, x: &[f64]) -> Vec<f64> {
        match self {
            Self::Box { lb, ub } => x
                .iter()
                .zip(lb.iter().zip(*ub))
                .map(|(v, (lo, hi))| v.max(*lo).min(*hi))
                .collect(),
            _ => x.to_vec(),
        }
    }

    fn allows(&self, x: &[f64]) -> bool {
        let Self::Linear { a, relaxed, .. } = self else {
            return true;
        };
        product(a, x).iter().zip(relaxed).all(|(ax, limit)| {
            let tol = 1e-12 * limit.abs().max(1.0);
            *ax <= limit + tol
        })
    }
}

fn product(a: &DMatrix<f64>, x: &[f64]) -> Vec<f64> {
    (a * DVector::from_column_slice(x)).iter().copied().collect()
}

struct Point {
    x: Vec<f64>,
    f: f64,
    cv: f64,
    c: Option<Vec<f64>>,
}

impl Point {
    fn improves_on(&self, other: &Self) -> bool {
        if self.cv < other.cv {
            return true;
        }
        self.cv == other.cv && self.f < other.f
    }
}

enum Poll {
    Improved(Point),
    Nan(Point),
    Failed,
}

struct Search<'e, 'r> {
    eval: &'e mut dyn Evaluate,
    rule: &'r Rule<'r>,
    fun_history: Vec<f64>,
    maxcv_history: Vec<f64>,
}

impl Search<'_, '_> {
    fn nfev(&self) -> usize {
        self.fun_history.len()
    }

    fn evaluate(&mut self, x: Vec<f64>) -> Result<Point, Error> {
        let f = self.eval.objective(&x)?;
        let (cv, c) = match self.rule {
            Rule::Free => (0.0, None),
            Rule::Box { lb, ub } => {
                let cv = x
                    .iter()
                    .zip(lb.iter().zip(*ub))
                    .map(|(v, (lo, hi))| (lo - v).max(v - hi))
                    .fold(0.0, f64::max);
                (cv, None)
            }
            Rule::Linear { a, b, .. } => {
                let cv = product(a, &x)
                    .iter()
                    .zip(*b)
                    .map(|(ax, b)| ax - b)
                    .fold(0.0, f64::max);
                (cv, None)
            }
            Rule::Nonlinear { m } => {
                let c = self.eval.constraints(&x)?;
                if c.len() != *m {
                    return Err(Error::DimensionMismatch {
                        what: "constraint values",
                        expected: *m,
                        found: c.len(),
                    });
                }
                let cv = c
                    .iter()
                    .map(|ci| if ci.is_nan() { f64::INFINITY } else { -ci })
                    .fold(0.0, f64::max);
                (cv, Some(c))
            }
        };

        self.fun_history.push(f);
        self.maxcv_history.push(cv);
        Ok(Point { x, f, cv, c })
    }

    /// Polls the coordinate directions around `best` until one improves.
    fn poll(&mut self, best: &Point, step: f64, maxfev: usize) -> Result<Poll, Error> {
        for i in 0..best.x.len() {
            for sign in [1.0, -1.0] {
                let mut trial = best.x.clone();
                trial[i] += sign * step;
                let trial = self.rule.admit(&trial);
                if trial == best.x || !self.rule.allows(&trial) {
                    continue;
                }
                if self.nfev() >= maxfev {
                    return Ok(Poll::Failed);
                }

                let point = self.evaluate(trial)?;
                if point.f.is_nan() {
                    return Ok(Poll::Nan(point));
                }
                if point.improves_on(best) {
                    return Ok(Poll::Improved(point));
                }
            }
        }
        Ok(Poll::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use pdfo_core::TrustRegion;

    /// Counts calls to a plain objective and an optional constraint.
    struct Plain<F, C> {
        f: F,
        c: C,
        calls: usize,
    }

    impl<F, C> Evaluate for Plain<F, C>
    where
        F: Fn(&[f64]) -> f64,
        C: Fn(&[f64]) -> Vec<f64>,
    {
        fn objective(&mut self, x: &[f64]) -> Result<f64, Error> {
            self.calls += 1;
            Ok((self.f)(x))
        }

        fn constraints(&mut self, x: &[f64]) -> Result<Vec<f64>, Error> {
            Ok((self.c)(x))
        }
    }

    fn plain<F: Fn(&[f64]) -> f64>(f: F) -> Plain<F, fn(&[f64]) -> Vec<f64>> {
        Plain {
            f,
            c: |_| Vec::new(),
            calls: 0,
        }
    }

    fn region(maxfev: usize) -> TrustRegion {
        TrustRegion {
            rhobeg: 1.0,
            rhoend: 1e-6,
            maxfev,
            ftarget: f64::NEG_INFINITY,
        }
    }

    fn shifted_sphere(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2)
    }

    #[test]
    fn unconstrained_search_reaches_the_radius() {
        let mut eval = plain(shifted_sphere);
        let call = SolverCall::Newuoa {
            x0: &[0.0, 0.0],
            npt: 5,
            region: region(1000),
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();

        assert_eq!(outcome.exit_code, RADIUS_REACHED);
        assert_relative_eq!(outcome.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.x[1], -2.0, epsilon = 1e-6);
        assert_eq!(outcome.nfev, eval.calls);
        assert_eq!(outcome.fun_history.len(), outcome.nfev);
        assert!(outcome.maxcv.is_none());
    }

    #[test]
    fn stops_at_the_target() {
        let mut eval = plain(shifted_sphere);
        let call = SolverCall::Uobyqa {
            x0: &[0.0, 0.0],
            region: TrustRegion {
                ftarget: 2.0,
                ..region(1000)
            },
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();
        assert_eq!(outcome.exit_code, TARGET_REACHED);
        assert!(outcome.fun <= 2.0);
    }

    #[test]
    fn stops_at_the_evaluation_budget() {
        let mut eval = plain(shifted_sphere);
        let call = SolverCall::Uobyqa {
            x0: &[0.0, 0.0],
            region: region(7),
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();
        assert_eq!(outcome.exit_code, MAXFEV_REACHED);
        assert_eq!(outcome.nfev, 7);
    }

    #[test]
    fn bounds_are_never_left() {
        let mut eval = plain(shifted_sphere);
        let call = SolverCall::Bobyqa {
            x0: &[0.0, 0.0],
            lb: &[-1.0, -1.0],
            ub: &[0.5, 1.0],
            npt: 5,
            honour_x0: false,
            region: TrustRegion {
                rhobeg: 0.25,
                ..region(1000)
            },
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();

        assert_eq!(outcome.exit_code, RADIUS_REACHED);
        assert_relative_eq!(outcome.x[0], 0.5);
        assert_relative_eq!(outcome.x[1], -1.0);
        assert_eq!(outcome.maxcv, Some(0.0));
        assert!(outcome.maxcv_history.unwrap().iter().all(|cv| *cv == 0.0));
    }

    #[test]
    fn linear_rows_reject_infeasible_trials() {
        // x <= 0 keeps the minimizer (1, 1) out of reach.
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let mut eval = plain(|x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] - 1.0).powi(2));
        let call = SolverCall::Lincoa {
            x0: &[-1.0, -1.0],
            a: &a,
            b: &[0.0],
            npt: 5,
            region: region(2000),
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();

        assert_eq!(outcome.exit_code, RADIUS_REACHED);
        assert_relative_eq!(outcome.x[0], 0.0);
        assert_relative_eq!(outcome.x[1], 1.0);
        assert_eq!(outcome.maxcv, Some(0.0));
    }

    #[test]
    fn infeasible_starts_relax_the_rows() {
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let mut eval = plain(|x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] - 1.0).powi(2));
        let call = SolverCall::Lincoa {
            x0: &[2.0, 1.0],
            a: &a,
            b: &[0.0],
            npt: 5,
            region: region(2000),
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();

        assert_relative_eq!(outcome.x[0], 1.0);
        assert_relative_eq!(outcome.maxcv.unwrap(), 1.0);
    }

    #[test]
    fn nonlinear_search_prefers_feasibility() {
        // Minimize x^2 + y^2 subject to x >= 1.
        let mut eval = Plain {
            f: |x: &[f64]| x[0] * x[0] + x[1] * x[1],
            c: |x: &[f64]| vec![x[0] - 1.0],
            calls: 0,
        };
        let call = SolverCall::Cobyla {
            x0: &[3.0, 1.0],
            m: 1,
            region: region(2000),
            classical: false,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();

        assert_eq!(outcome.exit_code, RADIUS_REACHED);
        assert_relative_eq!(outcome.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.x[1], 0.0, epsilon = 1e-6);
        assert_eq!(outcome.maxcv, Some(0.0));
        assert_eq!(outcome.constraint_values.unwrap().len(), 1);
    }

    #[test]
    fn wrong_constraint_count_is_an_error() {
        let mut eval = Plain {
            f: |_: &[f64]| 0.0,
            c: |_: &[f64]| vec![1.0, 1.0],
            calls: 0,
        };
        let call = SolverCall::Cobyla {
            x0: &[0.0],
            m: 1,
            region: region(10),
            classical: false,
        };
        assert!(matches!(
            CompassSearch.solve(&call, &mut eval),
            Err(Error::DimensionMismatch { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn nan_values_end_the_search() {
        let mut eval = plain(|x: &[f64]| if x[0] > 0.5 { f64::NAN } else { -x[0] });
        let call = SolverCall::Newuoa {
            x0: &[0.0],
            npt: 3,
            region: region(100),
            classical: true,
        };
        let outcome = CompassSearch.solve(&call, &mut eval).unwrap();
        assert_eq!(outcome.exit_code, NAN_EVALUATION);
        assert_relative_eq!(outcome.x[0], 0.0);
    }
}
