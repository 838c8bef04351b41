use nalgebra::{DMatrix, DVector};

use super::{AffineMap, LinearRows, Origin};

/// Equality systems with a larger condition number are left alone.
const MAX_CONDITION: f64 = 1e12;

/// The result of eliminating linear equalities.
#[derive(Debug)]
pub(crate) enum Elimination {
    /// The equalities are too ill-conditioned to eliminate.
    Skipped,
    /// The equalities have no common solution.
    Inconsistent(Vec<Origin>),
    /// The equalities determine a single point.
    Unique(Vec<f64>),
    /// `z = zp + N w` with `N` an orthonormal null-space basis.
    Reduced {
        map: AffineMap,
        w0: Vec<f64>,
        rows: LinearRows,
    },
}

/// Eliminates the equality rows of `rows` by a singular value decomposition.
///
/// The remaining rows and the finite bounds `lb <= z <= ub` are
/// re-expressed as linear rows in the null-space coordinates `w`.
/// `bound_index[j]` is the caller's index of variable `j`.
pub(crate) fn eliminate(
    rows: &LinearRows,
    z0: &[f64],
    lb: &[f64],
    ub: &[f64],
    bound_index: &[usize],
) -> Elimination {
    let k = rows.a.ncols();
    let equalities: Vec<usize> = (0..rows.len()).filter(|&i| rows.is_equality(i)).collect();
    let m = equalities.len();
    let padded = m.max(k);

    let a_eq = rows.a.select_rows(&equalities);
    let b_eq = DVector::from_iterator(m, equalities.iter().map(|&i| rows.lb[i]));

    let mut a = DMatrix::zeros(padded, k);
    a.rows_mut(0, m).copy_from(&a_eq);
    let mut b = DVector::zeros(padded);
    b.rows_mut(0, m).copy_from(&b_eq);

    let Some(svd) = a.try_svd(true, true, f64::EPSILON, 0) else {
        return Elimination::Skipped;
    };
    let (Some(u), Some(v_t)) = (&svd.u, &svd.v_t) else {
        return Elimination::Skipped;
    };
    let sigma = &svd.singular_values;

    #[allow(clippy::cast_precision_loss)]
    let tol = f64::EPSILON * padded as f64 * sigma.max();
    let rank: Vec<usize> = (0..sigma.len()).filter(|&i| sigma[i] > tol).collect();

    let smallest = rank.iter().map(|&i| sigma[i]).fold(f64::INFINITY, f64::min);
    if !rank.is_empty() && sigma.max() / smallest > MAX_CONDITION {
        return Elimination::Skipped;
    }

    let mut zp = DVector::zeros(k);
    for &i in &rank {
        let coefficient = u.column(i).dot(&b) / sigma[i];
        zp += v_t.row(i).transpose() * coefficient;
    }

    let residual = (&a_eq * &zp - &b_eq).norm();
    if residual > 1e-10 * b_eq.norm().max(1.0) {
        let origins = equalities.iter().map(|&i| rows.origin[i]).collect();
        return Elimination::Inconsistent(origins);
    }

    let null: Vec<usize> = (0..k).filter(|i| !rank.contains(i)).collect();
    if null.is_empty() {
        return Elimination::Unique(zp.iter().copied().collect());
    }

    let basis = v_t.select_rows(&null).transpose();
    let w0 = (basis.transpose() * (DVector::from_column_slice(z0) - &zp))
        .iter()
        .copied()
        .collect();
    let map = AffineMap::new(zp, basis);

    let inequalities: Vec<usize> = (0..rows.len()).filter(|&i| !rows.is_equality(i)).collect();
    let remaining = rows
        .select(&inequalities)
        .stack(bound_rows(lb, ub, bound_index));
    let rows = clean(&remaining, remaining.pull_back(&map));

    Elimination::Reduced { map, w0, rows }
}

/// Writes the finite bounds as unit rows.
fn bound_rows(lb: &[f64], ub: &[f64], bound_index: &[usize]) -> LinearRows {
    let k = lb.len();
    let bounded: Vec<usize> = (0..k)
        .filter(|&j| lb[j].is_finite() || ub[j].is_finite())
        .collect();

    let mut a = DMatrix::zeros(bounded.len(), k);
    for (row, &j) in bounded.iter().enumerate() {
        a[(row, j)] = 1.0;
    }
    LinearRows {
        a,
        lb: bounded.iter().map(|&j| lb[j]).collect(),
        ub: bounded.iter().map(|&j| ub[j]).collect(),
        origin: bounded.iter().map(|&j| Origin::Bound(bound_index[j])).collect(),
    }
}

/// Zeroes coefficients that are rounding noise relative to the source row.
fn clean(source: &LinearRows, mut rows: LinearRows) -> LinearRows {
    for i in 0..rows.len() {
        let threshold = 10.0 * f64::EPSILON * source.a.row(i).norm();
        for value in rows.a.row_mut(i).iter_mut() {
            if value.abs() <= threshold {
                *value = 0.0;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const INF: f64 = f64::INFINITY;

    fn rows(a: &[[f64; 2]], lb: &[f64], ub: &[f64]) -> LinearRows {
        let data: Vec<f64> = a.iter().flatten().copied().collect();
        LinearRows {
            a: DMatrix::from_row_slice(a.len(), 2, &data),
            lb: lb.to_vec(),
            ub: ub.to_vec(),
            origin: (0..a.len()).map(Origin::Linear).collect(),
        }
    }

    #[test]
    fn reduces_to_the_null_space() {
        // x + y = 1, x - y <= 0.5, x >= 0
        let system = rows(&[[1.0, 1.0], [1.0, -1.0]], &[1.0, -INF], &[1.0, 0.5]);
        let result = eliminate(&system, &[1.0, 1.0], &[0.0, -INF], &[INF, INF], &[0, 1]);

        let Elimination::Reduced { map, w0, rows } = result else {
            panic!("expected a reduced problem");
        };
        assert_eq!(map.input_dim(), 1);
        assert_eq!(w0.len(), 1);
        for w in [-2.0, 0.0, 3.0] {
            let x = map.apply(&[w]);
            assert_relative_eq!(x[0] + x[1], 1.0, epsilon = 1e-12);
        }

        // The start projects onto the closest point of the line.
        let x = map.apply(&w0);
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-12);

        assert_eq!(rows.origin, vec![Origin::Linear(1), Origin::Bound(0)]);
        assert_eq!(rows.a.ncols(), 1);
    }

    #[test]
    fn inconsistent_equalities_are_reported() {
        let system = rows(&[[1.0, 1.0], [2.0, 2.0]], &[1.0, 3.0], &[1.0, 3.0]);
        let result = eliminate(&system, &[0.0, 0.0], &[-INF; 2], &[INF; 2], &[0, 1]);
        let Elimination::Inconsistent(origins) = result else {
            panic!("expected inconsistent equalities");
        };
        assert_eq!(origins, vec![Origin::Linear(0), Origin::Linear(1)]);
    }

    #[test]
    fn full_rank_equalities_fix_the_point() {
        let system = rows(&[[1.0, 1.0], [1.0, -1.0]], &[1.0, 0.0], &[1.0, 0.0]);
        let result = eliminate(&system, &[0.0, 0.0], &[-INF; 2], &[INF; 2], &[0, 1]);
        let Elimination::Unique(z) = result else {
            panic!("expected a unique point");
        };
        assert_relative_eq!(z[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(z[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn redundant_equalities_are_consistent() {
        let system = rows(&[[1.0, 1.0], [2.0, 2.0]], &[1.0, 2.0], &[1.0, 2.0]);
        let result = eliminate(&system, &[0.0, 0.0], &[-INF; 2], &[INF; 2], &[0, 1]);
        assert!(matches!(result, Elimination::Reduced { .. }));
    }
}
