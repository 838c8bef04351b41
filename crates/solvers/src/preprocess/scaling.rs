use nalgebra::{DMatrix, DVector};

use super::AffineMap;

/// Maps every variable with two finite bounds onto `[0, 1]`.
///
/// A scaled variable satisfies `y = shift + factor * u`; other variables
/// have `shift = 0` and `factor = 1`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scaling {
    shift: Vec<f64>,
    factor: Vec<f64>,
}

impl Scaling {
    /// Returns `None` if no variable has two finite bounds.
    pub(crate) fn new(lb: &[f64], ub: &[f64]) -> Option<Self> {
        let scaled = |lo: f64, hi: f64| lo.is_finite() && hi.is_finite() && hi > lo;
        if !lb.iter().zip(ub).any(|(lo, hi)| scaled(*lo, *hi)) {
            return None;
        }

        let (shift, factor) = lb
            .iter()
            .zip(ub)
            .map(|(&lo, &hi)| if scaled(lo, hi) { (lo, hi - lo) } else { (0.0, 1.0) })
            .unzip();
        Some(Self { shift, factor })
    }

    /// Returns `u` for the point `y`.
    pub(crate) fn scale(&self, y: &[f64]) -> Vec<f64> {
        y.iter()
            .zip(self.shift.iter().zip(&self.factor))
            .map(|(y, (s, f))| (y - s) / f)
            .collect()
    }

    /// Returns `y` for the point `u`.
    pub(crate) fn unscale(&self, u: &[f64]) -> Vec<f64> {
        u.iter()
            .zip(self.shift.iter().zip(&self.factor))
            .map(|(u, (s, f))| s + f * u)
            .collect()
    }

    pub(crate) fn as_map(&self) -> AffineMap {
        AffineMap::new(
            DVector::from_column_slice(&self.shift),
            DMatrix::from_diagonal(&DVector::from_column_slice(&self.factor)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const INF: f64 = f64::INFINITY;

    #[test]
    fn round_trip_recovers_the_point() {
        let lb = [-2.0, 0.0, 1.0];
        let ub = [6.0, INF, 3.0];
        let scaling = Scaling::new(&lb, &ub).unwrap();

        let y = [2.0, 5.0, 1.5];
        let u = scaling.scale(&y);
        assert_relative_eq!(u[0], 0.5);
        assert_relative_eq!(u[1], 5.0);
        assert_relative_eq!(u[2], 0.25);

        let back = scaling.unscale(&u);
        for (a, b) in back.iter().zip(&y) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_eq!(scaling.as_map().apply(&u), back);

        assert_eq!(scaling.scale(&lb), vec![0.0, 0.0, 0.0]);
        assert_eq!(scaling.scale(&ub)[2], 1.0);
    }

    #[test]
    fn nothing_to_scale_without_finite_boxes() {
        assert!(Scaling::new(&[0.0, -INF], &[INF, 1.0]).is_none());
    }
}
