use nalgebra::{DMatrix, DVector};
use pdfo_core::{Constraint, ConstraintFn, ConstraintKind, Error, Method, Problem};

use super::AffineMap;

/// Where a linear row came from, for reporting infeasibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// The bound on the caller's variable with this index.
    Bound(usize),
    /// The caller's stacked linear row with this index.
    Linear(usize),
}

/// Linear rows `lb <= a x <= ub`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinearRows {
    pub(crate) a: DMatrix<f64>,
    pub(crate) lb: Vec<f64>,
    pub(crate) ub: Vec<f64>,
    pub(crate) origin: Vec<Origin>,
}

impl LinearRows {
    pub(crate) fn empty(n: usize) -> Self {
        Self {
            a: DMatrix::zeros(0, n),
            lb: Vec::new(),
            ub: Vec::new(),
            origin: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lb.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lb.is_empty()
    }

    /// Returns `a x`.
    pub(crate) fn values(&self, x: &[f64]) -> Vec<f64> {
        (&self.a * DVector::from_column_slice(x))
            .iter()
            .copied()
            .collect()
    }

    pub(crate) fn violation(&self, x: &[f64]) -> f64 {
        self.values(x)
            .iter()
            .zip(self.lb.iter().zip(&self.ub))
            .map(|(v, (lo, hi))| side_violation(*v, *lo, *hi))
            .fold(0.0, f64::max)
    }

    pub(crate) fn is_equality(&self, row: usize) -> bool {
        self.lb[row].is_finite() && self.lb[row] == self.ub[row]
    }

    /// Keeps the rows listed in `rows`, in that order.
    pub(crate) fn select(&self, rows: &[usize]) -> Self {
        Self {
            a: self.a.select_rows(rows),
            lb: rows.iter().map(|&i| self.lb[i]).collect(),
            ub: rows.iter().map(|&i| self.ub[i]).collect(),
            origin: rows.iter().map(|&i| self.origin[i]).collect(),
        }
    }

    /// Appends the rows of `other`.
    pub(crate) fn stack(self, other: Self) -> Self {
        let n = self.a.ncols();
        let rows = self.len() + other.len();
        let mut a = DMatrix::zeros(rows, n);
        a.rows_mut(0, self.len()).copy_from(&self.a);
        a.rows_mut(self.len(), other.len()).copy_from(&other.a);

        let mut lb = self.lb;
        lb.extend(other.lb);
        let mut ub = self.ub;
        ub.extend(other.ub);
        let mut origin = self.origin;
        origin.extend(other.origin);

        Self { a, lb, ub, origin }
    }

    /// Re-expresses the rows in the input variables of `map`.
    pub(crate) fn pull_back(&self, map: &AffineMap) -> Self {
        let shift = &self.a * map.offset();
        Self {
            a: &self.a * map.matrix(),
            lb: self.lb.iter().zip(shift.iter()).map(|(lo, s)| lo - s).collect(),
            ub: self.ub.iter().zip(shift.iter()).map(|(hi, s)| hi - s).collect(),
            origin: self.origin.clone(),
        }
    }

    /// Drops rows that constrain nothing.
    ///
    /// A row is dropped when both sides are infinite or its coefficients are
    /// all zero. Returns the remaining rows and the origins of rows that can
    /// never be satisfied.
    pub(crate) fn split_trivial(&self) -> (Self, Vec<Origin>) {
        let mut keep = Vec::new();
        let mut infeasible = Vec::new();

        for i in 0..self.len() {
            let (lo, hi) = (self.lb[i], self.ub[i]);
            if inconsistent_sides(lo, hi) {
                infeasible.push(self.origin[i]);
            } else if self.a.row(i).iter().all(|v| *v == 0.0) {
                let tol = 1e-10 * [1.0, lo.abs(), hi.abs()]
                    .into_iter()
                    .filter(|v| v.is_finite())
                    .fold(1.0, f64::max);
                if lo > tol || hi < -tol {
                    infeasible.push(self.origin[i]);
                }
            } else if lo.is_finite() || hi.is_finite() {
                keep.push(i);
            }
        }

        (self.select(&keep), infeasible)
    }
}

/// Returns how far `v` lies outside `[lo, hi]`.
pub(crate) fn side_violation(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        return f64::INFINITY;
    }
    (lo - v).max(v - hi).max(0.0)
}

fn inconsistent_sides(lo: f64, hi: f64) -> bool {
    lo > hi || (lo == hi && lo.is_infinite())
}

/// The nonlinear constraints `lb <= c(x) <= ub` as one vector function.
///
/// The caller's functions are called in input order and their outputs
/// concatenated.
#[derive(Debug)]
pub(crate) struct NonlinearSystem<'p> {
    parts: Vec<(&'p ConstraintFn, usize)>,
    pub(crate) lb: Vec<f64>,
    pub(crate) ub: Vec<f64>,
}

impl NonlinearSystem<'_> {
    pub(crate) fn len(&self) -> usize {
        self.lb.len()
    }

    /// Evaluates every component at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if a user function fails or changes its output
    /// length.
    pub(crate) fn values(&self, x: &[f64]) -> Result<Vec<f64>, Error> {
        let mut values = Vec::with_capacity(self.len());
        for (fun, len) in &self.parts {
            let part = fun.call(x)?;
            if part.len() != *len {
                return Err(Error::DimensionMismatch {
                    what: "nonlinear constraint values",
                    expected: *len,
                    found: part.len(),
                });
            }
            values.extend(part);
        }
        Ok(values)
    }

    pub(crate) fn violation(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .zip(self.lb.iter().zip(&self.ub))
            .map(|(v, (lo, hi))| side_violation(*v, *lo, *hi))
            .fold(0.0, f64::max)
    }

    /// Number of finite sides, which is the number of `c >= 0` constraints.
    pub(crate) fn finite_sides(&self) -> usize {
        self.lb.iter().chain(&self.ub).filter(|v| v.is_finite()).count()
    }
}

/// Which constraint groups are read from the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Groups {
    pub(crate) bounds: bool,
    pub(crate) linear: bool,
    pub(crate) nonlinear: bool,
}

impl Groups {
    pub(crate) const ALL: Self = Self {
        bounds: true,
        linear: true,
        nonlinear: true,
    };

    /// The groups `method` can honor.
    pub(crate) fn for_method(method: Method) -> Self {
        let kind = method.capability();
        Self {
            bounds: kind >= ConstraintKind::Bound,
            linear: kind >= ConstraintKind::Linear,
            nonlinear: kind >= ConstraintKind::Nonlinear,
        }
    }
}

/// Bounds and constraints in canonical form, in the caller's variables.
#[derive(Debug)]
pub(crate) struct Canonical<'p> {
    pub(crate) lb: Vec<f64>,
    pub(crate) ub: Vec<f64>,
    /// Every stacked linear row, in input order.
    pub(crate) linear_all: Option<LinearRows>,
    /// The rows left after dropping trivial ones.
    pub(crate) linear: Option<LinearRows>,
    pub(crate) nonlinear: Option<NonlinearSystem<'p>>,
    /// Nonlinear values at `x0`.
    pub(crate) nonlinear_x0: Vec<f64>,
    pub(crate) infeasible_bounds: Vec<usize>,
    pub(crate) infeasible_linear: Vec<usize>,
    pub(crate) infeasible_nonlinear: Vec<usize>,
}

impl Canonical<'_> {
    pub(crate) fn is_infeasible(&self) -> bool {
        !self.infeasible_bounds.is_empty()
            || !self.infeasible_linear.is_empty()
            || !self.infeasible_nonlinear.is_empty()
    }

    /// The most general constraint group present.
    pub(crate) fn kind(&self) -> ConstraintKind {
        if self.nonlinear.is_some() {
            ConstraintKind::Nonlinear
        } else if self.linear_all.is_some() {
            ConstraintKind::Linear
        } else if self.lb.iter().chain(&self.ub).any(|v| v.is_finite()) {
            ConstraintKind::Bound
        } else {
            ConstraintKind::Unconstrained
        }
    }

    /// Values fixed by equal bounds.
    pub(crate) fn fixed(&self) -> Vec<Option<f64>> {
        self.lb
            .iter()
            .zip(&self.ub)
            .map(|(lo, hi)| (lo == hi && lo.is_finite()).then_some(*lo))
            .collect()
    }

    /// Returns `x0` with every fixed variable set to its value.
    pub(crate) fn with_fixed(&self, x0: &[f64]) -> Vec<f64> {
        x0.iter()
            .zip(self.fixed())
            .map(|(x, fixed)| fixed.unwrap_or(*x))
            .collect()
    }

    /// Linear values `A x` followed by the nonlinear values, if any
    /// constraint exists.
    pub(crate) fn constraint_values(&self, x: &[f64], nonlinear: Option<&[f64]>) -> Option<Vec<f64>> {
        if self.linear_all.is_none() && self.nonlinear.is_none() {
            return None;
        }
        let mut values = self
            .linear_all
            .as_ref()
            .map(|rows| rows.values(x))
            .unwrap_or_default();
        values.extend(nonlinear.unwrap_or_default());
        Some(values)
    }

    /// Maximum violation of every constraint at `x`.
    pub(crate) fn violation(&self, x: &[f64], nonlinear: Option<&[f64]>) -> f64 {
        let bounds = x
            .iter()
            .zip(self.lb.iter().zip(&self.ub))
            .map(|(v, (lo, hi))| side_violation(*v, *lo, *hi))
            .fold(0.0, f64::max);
        let linear = self
            .linear_all
            .as_ref()
            .map_or(0.0, |rows| rows.violation(x));
        let nonlinear = match (&self.nonlinear, nonlinear) {
            (Some(system), Some(values)) => system.violation(values),
            _ => 0.0,
        };
        bounds.max(linear).max(nonlinear)
    }

    /// Largest of one, `|x|`, and the sums `Σ |a_ij x_j|` of the linear rows.
    pub(crate) fn magnitude(&self, x: &[f64]) -> f64 {
        let rows = self.linear_all.as_ref().map_or(0.0, |rows| {
            rows.a
                .row_iter()
                .map(|row| row.iter().zip(x).map(|(a, x)| (a * x).abs()).sum::<f64>())
                .fold(0.0, f64::max)
        });
        x.iter().fold(1.0, |m: f64, v| m.max(v.abs())).max(rows)
    }
}

/// Canonicalizes the bounds and constraints of `problem`.
///
/// Groups switched off in `groups` are treated as absent. Nonlinear
/// constraints are evaluated once at `x0` to learn their sizes.
///
/// # Errors
///
/// Returns an error on malformed inputs or if a constraint function fails.
pub(crate) fn canonicalize<'p>(problem: &'p Problem, groups: Groups) -> Result<Canonical<'p>, Error> {
    let n = problem.dimension();
    let x0 = problem.x0();

    let (lb, ub) = bounds(problem, n, groups.bounds)?;
    let infeasible_bounds = (0..n)
        .filter(|&i| inconsistent_sides(lb[i], ub[i]))
        .collect();

    let linear_all = if groups.linear {
        stack_linear(problem.constraints(), n)?
    } else {
        None
    };
    let (linear, infeasible_linear) = match &linear_all {
        Some(rows) => {
            let (active, infeasible) = rows.split_trivial();
            let infeasible = infeasible
                .into_iter()
                .filter_map(|origin| match origin {
                    Origin::Linear(i) => Some(i),
                    Origin::Bound(_) => None,
                })
                .collect();
            ((!active.is_empty()).then_some(active), infeasible)
        }
        None => (None, Vec::new()),
    };

    let (nonlinear, nonlinear_x0) = if groups.nonlinear {
        match collect_nonlinear(problem.constraints(), x0)? {
            Some((system, values)) => (Some(system), values),
            None => (None, Vec::new()),
        }
    } else {
        (None, Vec::new())
    };
    let infeasible_nonlinear = nonlinear.as_ref().map_or_else(Vec::new, |system| {
        (0..system.len())
            .filter(|&i| inconsistent_sides(system.lb[i], system.ub[i]))
            .collect()
    });

    Ok(Canonical {
        lb,
        ub,
        linear_all,
        linear,
        nonlinear,
        nonlinear_x0,
        infeasible_bounds,
        infeasible_linear,
        infeasible_nonlinear,
    })
}

fn bounds(problem: &Problem, n: usize, used: bool) -> Result<(Vec<f64>, Vec<f64>), Error> {
    let infinite = || (vec![f64::NEG_INFINITY; n], vec![f64::INFINITY; n]);
    let Some(bounds) = problem.bounds().filter(|_| used) else {
        return Ok(infinite());
    };

    check_len("lower bounds", n, bounds.lower().len())?;
    check_len("upper bounds", n, bounds.upper().len())?;

    let lb = bounds
        .lower()
        .iter()
        .map(|v| if v.is_nan() { f64::NEG_INFINITY } else { *v })
        .collect();
    let ub = bounds
        .upper()
        .iter()
        .map(|v| if v.is_nan() { f64::INFINITY } else { *v })
        .collect();
    Ok((lb, ub))
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Broadcasts a length-one side to `m` entries.
fn broadcast(what: &'static str, side: &[f64], m: usize, nan: f64) -> Result<Vec<f64>, Error> {
    let side: Vec<f64> = match side.len() {
        1 => vec![side[0]; m],
        len if len == m => side.to_vec(),
        len => {
            return Err(Error::DimensionMismatch {
                what,
                expected: m,
                found: len,
            });
        }
    };
    Ok(side
        .into_iter()
        .map(|v| if v.is_nan() { nan } else { v })
        .collect())
}

fn stack_linear(constraints: &[Constraint], n: usize) -> Result<Option<LinearRows>, Error> {
    let mut data = Vec::new();
    let mut lb = Vec::new();
    let mut ub = Vec::new();

    for constraint in constraints {
        let Constraint::Linear(linear) = constraint else {
            continue;
        };
        let m = linear.matrix().len();
        if m == 0 {
            continue;
        }
        for (i, row) in linear.matrix().iter().enumerate() {
            check_len("linear constraint row", n, row.len())?;
            if let Some(column) = row.iter().position(|v| !v.is_finite()) {
                return Err(Error::NonFiniteEntry {
                    what: "linear constraint matrix",
                    row: lb.len() + i,
                    column,
                    value: row[column],
                });
            }
            data.extend_from_slice(row);
        }
        lb.extend(broadcast("linear constraint lower side", linear.lower(), m, f64::NEG_INFINITY)?);
        ub.extend(broadcast("linear constraint upper side", linear.upper(), m, f64::INFINITY)?);
    }

    if lb.is_empty() {
        return Ok(None);
    }
    let m = lb.len();
    Ok(Some(LinearRows {
        a: DMatrix::from_row_slice(m, n, &data),
        lb,
        ub,
        origin: (0..m).map(Origin::Linear).collect(),
    }))
}

type NonlinearParts<'p> = Option<(NonlinearSystem<'p>, Vec<f64>)>;

fn collect_nonlinear<'p>(constraints: &'p [Constraint], x0: &[f64]) -> Result<NonlinearParts<'p>, Error> {
    let mut parts = Vec::new();
    let mut values = Vec::new();
    let mut lb = Vec::new();
    let mut ub = Vec::new();

    for constraint in constraints {
        let (fun, lower, upper) = match constraint {
            Constraint::Linear(_) => continue,
            Constraint::Nonlinear(nonlinear) => (
                nonlinear.function(),
                Some(nonlinear.lower()),
                Some(nonlinear.upper()),
            ),
            Constraint::Equality(fun) => (fun, Some(&[0.0][..]), Some(&[0.0][..])),
            Constraint::Inequality(fun) => (fun, Some(&[0.0][..]), None),
        };

        let part = fun.call(x0)?;
        let m = part.len();
        if m == 0 {
            continue;
        }
        lb.extend(broadcast(
            "nonlinear constraint lower side",
            lower.unwrap_or(&[f64::NEG_INFINITY]),
            m,
            f64::NEG_INFINITY,
        )?);
        ub.extend(broadcast(
            "nonlinear constraint upper side",
            upper.unwrap_or(&[f64::INFINITY]),
            m,
            f64::INFINITY,
        )?);
        parts.push((fun, m));
        values.extend(part);
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some((NonlinearSystem { parts, lb, ub }, values)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pdfo_core::{Bounds, LinearConstraint, NonlinearConstraint};

    const INF: f64 = f64::INFINITY;

    fn objective(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn missing_and_nan_bounds_become_infinite() {
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_bounds(Bounds::new([f64::NAN, 1.0], [2.0, f64::NAN]));
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();
        assert_eq!(canonical.lb, vec![-INF, 1.0]);
        assert_eq!(canonical.ub, vec![2.0, INF]);
        assert_eq!(canonical.kind(), ConstraintKind::Bound);

        let problem = Problem::new(objective, [0.0]);
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();
        assert_eq!(canonical.kind(), ConstraintKind::Unconstrained);
    }

    #[test]
    fn bound_length_mismatch_is_fatal() {
        let problem = Problem::new(objective, [0.0, 0.0]).with_bounds(Bounds::new([0.0], [1.0]));
        assert!(matches!(
            canonicalize(&problem, Groups::ALL),
            Err(Error::DimensionMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn inconsistent_bounds_are_recorded() {
        let problem = Problem::new(objective, [0.0, 0.0, 0.0])
            .with_bounds(Bounds::new([1.0, INF, 0.0], [0.0, INF, 0.0]));
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();
        assert_eq!(canonical.infeasible_bounds, vec![0, 1]);
        assert!(canonical.is_infeasible());
    }

    #[test]
    fn linear_inputs_are_stacked_and_broadcast() {
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_constraint(LinearConstraint::new(
                vec![vec![1.0, 1.0], vec![1.0, -1.0]],
                [0.0],
                [1.0, 2.0],
            ))
            .with_constraint(LinearConstraint::row([0.0, 1.0], -INF, 3.0));
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();

        let rows = canonical.linear_all.as_ref().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.lb, vec![0.0, 0.0, -INF]);
        assert_eq!(rows.ub, vec![1.0, 2.0, 3.0]);
        assert_eq!(rows.values(&[1.0, 2.0]), vec![3.0, -1.0, 2.0]);
    }

    #[test]
    fn zero_rows_are_dropped_or_infeasible() {
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_constraint(LinearConstraint::row([0.0, 0.0], -1.0, 1.0))
            .with_constraint(LinearConstraint::row([1.0, 0.0], 0.0, 1.0))
            .with_constraint(LinearConstraint::row([0.0, 0.0], 1.0, 2.0));
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();

        assert_eq!(canonical.linear.as_ref().unwrap().origin, vec![Origin::Linear(1)]);
        assert_eq!(canonical.infeasible_linear, vec![2]);
    }

    #[test]
    fn non_finite_matrix_is_fatal() {
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_constraint(LinearConstraint::row([1.0, f64::NAN], 0.0, 1.0));
        assert!(matches!(
            canonicalize(&problem, Groups::ALL),
            Err(Error::NonFiniteEntry { row: 0, column: 1, .. })
        ));

        // Rows are numbered across every linear constraint, in input order.
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_constraint(LinearConstraint::new(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                [0.0],
                [1.0],
            ))
            .with_constraint(LinearConstraint::row([f64::INFINITY, 1.0], 0.0, 1.0));
        let error = canonicalize(&problem, Groups::ALL).unwrap_err();
        assert!(matches!(
            error,
            Error::NonFiniteEntry { row: 2, column: 0, .. }
        ));
        assert_eq!(
            error.to_string(),
            "linear constraint matrix contains non-finite value inf at row 2, column 0"
        );
    }

    #[test]
    fn nonlinear_forms_share_one_system() {
        let problem = Problem::new(objective, [1.0, 2.0])
            .with_constraint(NonlinearConstraint::new(
                |x: &[f64]| vec![x[0] * x[0] - x[1]],
                [-INF],
                [0.0],
            ))
            .with_constraint(Constraint::equality(|x: &[f64]| vec![x[0] - 1.0]))
            .with_constraint(Constraint::inequality(|x: &[f64]| vec![x[1], x[0]]));
        let canonical = canonicalize(&problem, Groups::ALL).unwrap();

        let system = canonical.nonlinear.as_ref().unwrap();
        assert_eq!(system.len(), 4);
        assert_eq!(system.lb, vec![-INF, 0.0, 0.0, 0.0]);
        assert_eq!(system.ub, vec![0.0, 0.0, INF, INF]);
        assert_eq!(system.finite_sides(), 5);
        assert_eq!(canonical.nonlinear_x0, vec![-1.0, 0.0, 2.0, 1.0]);
        assert_eq!(system.values(&[0.0, 0.0]).unwrap(), vec![0.0, -1.0, 0.0, 0.0]);
        assert_eq!(canonical.kind(), ConstraintKind::Nonlinear);
    }

    #[test]
    fn switched_off_groups_are_ignored() {
        let problem = Problem::new(objective, [0.0, 0.0])
            .with_bounds(Bounds::new([0.0, 0.0], [1.0, 1.0]))
            .with_constraint(LinearConstraint::row([1.0, 1.0], 0.0, 1.0));
        let canonical = canonicalize(&problem, Groups::for_method(Method::Bobyqa)).unwrap();
        assert!(canonical.linear_all.is_none());
        assert_eq!(canonical.kind(), ConstraintKind::Bound);

        let canonical = canonicalize(&problem, Groups::for_method(Method::Newuoa)).unwrap();
        assert_eq!(canonical.kind(), ConstraintKind::Unconstrained);
    }
}
