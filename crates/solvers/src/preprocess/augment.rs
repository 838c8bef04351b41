use nalgebra::{DMatrix, DVector};

use super::LinearRows;

/// Bounds and linear rows merged into one system `a x <= b`.
///
/// Rows appear in the order: finite lower bounds, finite upper bounds, finite
/// linear lower sides, finite linear upper sides. A lower side `lo <= r x`
/// becomes `-r x <= -lo`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AugmentedLinearSystem {
    pub(crate) a: DMatrix<f64>,
    pub(crate) b: Vec<f64>,
}

impl AugmentedLinearSystem {
    pub(crate) fn build(lb: &[f64], ub: &[f64], linear: Option<&LinearRows>) -> Self {
        let n = lb.len();
        let mut data: Vec<f64> = Vec::new();
        let mut b = Vec::new();

        let mut unit = |i: usize, sign: f64, side: f64, data: &mut Vec<f64>| {
            data.extend((0..n).map(|j| if i == j { sign } else { 0.0 }));
            b.push(sign * side);
        };
        for (i, lo) in lb.iter().enumerate().filter(|(_, v)| v.is_finite()) {
            unit(i, -1.0, *lo, &mut data);
        }
        for (i, hi) in ub.iter().enumerate().filter(|(_, v)| v.is_finite()) {
            unit(i, 1.0, *hi, &mut data);
        }

        if let Some(rows) = linear {
            for (i, lo) in rows.lb.iter().enumerate().filter(|(_, v)| v.is_finite()) {
                data.extend(rows.a.row(i).iter().map(|v| -v));
                b.push(-lo);
            }
            for (i, hi) in rows.ub.iter().enumerate().filter(|(_, v)| v.is_finite()) {
                data.extend(rows.a.row(i).iter().copied());
                b.push(*hi);
            }
        }

        let a = DMatrix::from_row_slice(b.len(), n, &data);
        Self { a, b }
    }

    pub(crate) fn len(&self) -> usize {
        self.b.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Returns the slacks `b - a x`, nonnegative where satisfied.
    pub(crate) fn slacks(&self, x: &[f64]) -> Vec<f64> {
        let ax = &self.a * DVector::from_column_slice(x);
        self.b.iter().zip(ax.iter()).map(|(b, v)| b - v).collect()
    }

    pub(crate) fn violation(&self, x: &[f64]) -> f64 {
        self.slacks(x).iter().fold(0.0_f64, |worst, s| worst.max(-s))
    }
}
