use nalgebra::{DMatrix, DVector};

use super::{AugmentedLinearSystem, LinearRows};

/// Sweeps of the fallback projection used when the set is empty.
const MAX_SWEEPS: usize = 200;

/// Correction passes applied to the nearest point to remove rounding.
const MAX_REFINEMENTS: usize = 3;

/// Returns the point of `lb <= x <= ub`, `rows.lb <= rows.a x <= rows.ub`
/// nearest to `x0`.
///
/// The nearest point solves a least-distance program whose dual is a
/// nonnegative least-squares problem, solved with the active-set method of
/// Lawson and Hanson. When the set is empty, cyclic projections reduce the
/// violation instead and the result stays infeasible.
pub(crate) fn project(x0: &[f64], lb: &[f64], ub: &[f64], rows: Option<&LinearRows>) -> Vec<f64> {
    let clipped = clip(x0, lb, ub);
    let Some(rows) = rows.filter(|rows| !rows.is_empty()) else {
        return clipped;
    };

    let system = AugmentedLinearSystem::build(lb, ub, Some(rows));
    if system.violation(&clipped) <= 0.0 {
        return clipped;
    }

    if let Some(mut x) = nearest(&system, x0) {
        for _ in 0..MAX_REFINEMENTS {
            if system.violation(&x) <= 0.0 {
                break;
            }
            match nearest(&system, &x) {
                Some(y) => x = y,
                None => break,
            }
        }
        let x = clip(&x, lb, ub);
        if system.violation(&x) <= rounding(&system, &x) {
            return x;
        }
    }

    log::debug!("no feasible point found; reducing the violation by projections");
    sweep(clipped, lb, ub, rows)
}

/// The violation `a x <= b` can show from rounding alone at `x`.
fn rounding(system: &AugmentedLinearSystem, x: &[f64]) -> f64 {
    let magnitude = system
        .a
        .row_iter()
        .zip(&system.b)
        .map(|(row, b)| {
            let ax: f64 = row.iter().zip(x).map(|(a, x)| (a * x).abs()).sum();
            ax.max(b.abs())
        })
        .fold(1.0, f64::max);
    1e2 * f64::EPSILON * magnitude
}

/// Solves `min ||x - x0||` subject to `a x <= b`.
///
/// Writing `x = x0 + sigma w` gives the least-distance program
/// `min ||w||` subject to `g w >= h`, with `g` the negated rows scaled to unit
/// norm. Its solution is read off the residual `r = e u - f` of the
/// nonnegative least-squares problem with `e = [g'; h']` and `f = e_(n+1)`.
/// A vanishing residual means the constraints are inconsistent.
fn nearest(system: &AugmentedLinearSystem, x0: &[f64]) -> Option<Vec<f64>> {
    let n = x0.len();
    let slacks = system.slacks(x0);

    let mut columns = Vec::new();
    for (i, slack) in slacks.iter().enumerate() {
        let row = system.a.row(i);
        let norm = row.norm();
        if norm == 0.0 {
            continue;
        }
        columns.push((row.transpose() / -norm, -slack / norm));
    }
    if columns.is_empty() {
        return Some(x0.to_vec());
    }

    let sigma = columns.iter().fold(1.0, |m: f64, (_, h)| m.max(*h));
    let mut e = DMatrix::zeros(n + 1, columns.len());
    for (j, (g, h)) in columns.iter().enumerate() {
        e.column_mut(j).rows_mut(0, n).copy_from(g);
        e[(n, j)] = h / sigma;
    }
    let mut f = DVector::zeros(n + 1);
    f[n] = 1.0;

    let u = nnls(&e, &f)?;
    let r = &e * u - f;
    let s = -r[n];
    if !(s > f64::EPSILON) {
        return None;
    }

    Some(
        x0.iter()
            .zip(r.iter())
            .map(|(x, r)| x + sigma * r / s)
            .collect(),
    )
}

/// Solves `min ||e u - f||` subject to `u >= 0`.
///
/// The active-set method of Lawson and Hanson. Both loops are capped, so a
/// stalled run returns its last iterate, which is still nonnegative.
fn nnls(e: &DMatrix<f64>, f: &DVector<f64>) -> Option<DVector<f64>> {
    let m = e.ncols();
    #[allow(clippy::cast_precision_loss)]
    let tol = 10.0 * f64::EPSILON * e.amax().max(1.0) * e.nrows().max(m) as f64;
    let cap = 3 * m + 1;

    let mut u = DVector::zeros(m);
    let mut passive = vec![false; m];

    for _ in 0..cap {
        let w = e.tr_mul(&(f - e * &u));
        let Some(t) = (0..m)
            .filter(|&j| !passive[j] && w[j] > tol)
            .max_by(|&a, &b| w[a].total_cmp(&w[b]))
        else {
            break;
        };
        passive[t] = true;

        for _ in 0..cap {
            let active: Vec<usize> = (0..m).filter(|&j| passive[j]).collect();
            if active.is_empty() {
                break;
            }
            let z = least_squares(e.select_columns(&active), f)?;
            if z.iter().all(|v| *v > 0.0) {
                for (k, &j) in active.iter().enumerate() {
                    u[j] = z[k];
                }
                break;
            }

            // Step toward z until the first passive entry reaches zero.
            let alpha = active
                .iter()
                .enumerate()
                .filter(|&(k, _)| z[k] <= 0.0)
                .map(|(k, &j)| {
                    let step = u[j] - z[k];
                    if step > 0.0 { u[j] / step } else { 0.0 }
                })
                .fold(1.0, f64::min);
            for (k, &j) in active.iter().enumerate() {
                u[j] += alpha * (z[k] - u[j]);
                if u[j] <= tol {
                    u[j] = 0.0;
                    passive[j] = false;
                }
            }
        }
    }
    Some(u)
}

/// Minimum-norm least-squares solution of `a z = b`.
fn least_squares(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let (rows, cols) = a.shape();
    let padded = rows.max(cols);
    let mut square = DMatrix::zeros(padded, cols);
    square.rows_mut(0, rows).copy_from(&a);
    let mut rhs = DVector::zeros(padded);
    rhs.rows_mut(0, rows).copy_from(b);

    let svd = square.try_svd(true, true, f64::EPSILON, 0)?;
    let (Some(u), Some(v_t)) = (&svd.u, &svd.v_t) else {
        return None;
    };
    let sigma = &svd.singular_values;
    #[allow(clippy::cast_precision_loss)]
    let tol = f64::EPSILON * padded as f64 * sigma.max();

    let mut z = DVector::zeros(cols);
    for i in (0..sigma.len()).filter(|&i| sigma[i] > tol) {
        z += v_t.row(i).transpose() * (u.column(i).dot(&rhs) / sigma[i]);
    }
    Some(z)
}

/// Projects onto every violated row in turn, then onto the box.
fn sweep(mut x: Vec<f64>, lb: &[f64], ub: &[f64], rows: &LinearRows) -> Vec<f64> {
    let mut best = (rows.violation(&x), x.clone());
    for _ in 0..MAX_SWEEPS {
        for i in 0..rows.len() {
            let a = rows.a.row(i);
            let norm2 = a.norm_squared();
            if norm2 == 0.0 {
                continue;
            }
            let value: f64 = a.iter().zip(&x).map(|(a, x)| a * x).sum();
            let shift = if value < rows.lb[i] {
                rows.lb[i] - value
            } else if value > rows.ub[i] {
                rows.ub[i] - value
            } else {
                continue;
            };
            for (xj, aj) in x.iter_mut().zip(a.iter()) {
                *xj += shift * aj / norm2;
            }
        }
        x = clip(&x, lb, ub);

        let violation = rows.violation(&x);
        if violation < best.0 {
            best = (violation, x.clone());
        }
    }
    best.1
}

fn clip(x: &[f64], lb: &[f64], ub: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(lb.iter().zip(ub))
        .map(|(x, (lo, hi))| x.max(*lo).min(*hi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::preprocess::Origin;

    const INF: f64 = f64::INFINITY;

    fn rows(a: &[f64], n: usize, lb: &[f64], ub: &[f64]) -> LinearRows {
        LinearRows {
            a: DMatrix::from_row_slice(lb.len(), n, a),
            lb: lb.to_vec(),
            ub: ub.to_vec(),
            origin: (0..lb.len()).map(Origin::Linear).collect(),
        }
    }

    #[test]
    fn reaches_the_intersection() {
        // x + y >= 2 within the unit box has the single point (1, 1).
        let rows = rows(&[1.0, 1.0], 2, &[2.0], &[INF]);
        let x = project(&[0.0, 0.0], &[0.0, 0.0], &[1.0, 1.0], Some(&rows));
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn finds_the_apex_of_a_narrow_wedge() {
        // x - y >= 1 and x - 1.01 y <= 0 meet at (101, 100), the nearest
        // feasible point to the origin.
        let rows = rows(&[1.0, -1.0, 1.0, -1.01], 2, &[1.0, -INF], &[INF, 0.0]);
        let x = project(&[0.0, 0.0], &[-INF, -INF], &[INF, INF], Some(&rows));

        assert_relative_eq!(x[0], 101.0, epsilon = 1e-6);
        assert_relative_eq!(x[1], 100.0, epsilon = 1e-6);
        let system = AugmentedLinearSystem::build(&[-INF, -INF], &[INF, INF], Some(&rows));
        assert!(system.violation(&x) <= rounding(&system, &x));
    }

    #[test]
    fn projects_onto_a_single_half_space() {
        // The nearest point of x + y <= -2 to the origin is (-1, -1).
        let rows = rows(&[1.0, 1.0], 2, &[-INF], &[-2.0]);
        let x = project(&[0.0, 0.0], &[-INF, -INF], &[INF, INF], Some(&rows));
        assert_relative_eq!(x[0], -1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], -1.0, epsilon = 1e-9);
    }

    #[test]
    fn satisfies_equalities_and_bounds_together() {
        // x + y + z = 1 with x >= 0.8 and z <= 0.
        let rows = rows(&[1.0, 1.0, 1.0], 3, &[1.0], &[1.0]);
        let x = project(
            &[0.0, 0.0, 0.5],
            &[0.8, -INF, -INF],
            &[INF, INF, 0.0],
            Some(&rows),
        );
        assert_relative_eq!(x.iter().sum::<f64>(), 1.0, epsilon = 1e-10);
        assert!(x[0] >= 0.8 - 1e-12);
        assert!(x[2] <= 1e-12);
    }

    #[test]
    fn feasible_points_stay_put() {
        let rows = rows(&[1.0, -1.0], 2, &[-1.0], &[1.0]);
        let x = project(&[0.3, 0.1], &[-INF, -INF], &[INF, INF], Some(&rows));
        assert_eq!(x, vec![0.3, 0.1]);
    }

    #[test]
    fn empty_sets_reduce_the_violation() {
        // x + y >= 3 cannot hold in the unit box; (1, 1) is the closest.
        let rows = rows(&[1.0, 1.0], 2, &[3.0], &[INF]);
        let x = project(&[0.0, 0.0], &[0.0, 0.0], &[1.0, 1.0], Some(&rows));
        assert_relative_eq!(rows.violation(&x), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn clips_to_the_box_without_rows() {
        let x = project(&[-1.0, 5.0], &[0.0, 0.0], &[1.0, 1.0], None);
        assert_eq!(x, vec![0.0, 1.0]);
    }

    #[test]
    fn nnls_keeps_the_solution_nonnegative() {
        // Unconstrained least squares gives (1, -1); the constrained
        // minimizer of ||u - (1, -1)|| is (1, 0).
        let e = DMatrix::identity(2, 2);
        let f = DVector::from_column_slice(&[1.0, -1.0]);
        let u = nnls(&e, &f).unwrap();
        assert_relative_eq!(u[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(u[1], 0.0);
    }
}
