/// Bound constraints `lb[i] <= x[i] <= ub[i]`.
///
/// Use `f64::NEG_INFINITY`/`f64::INFINITY` for a missing side. Lengths are
/// checked against the problem dimension when the problem is solved.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lb: Vec<f64>,
    ub: Vec<f64>,
}

impl Bounds {
    /// Creates bounds from lower and upper arrays.
    pub fn new(lb: impl Into<Vec<f64>>, ub: impl Into<Vec<f64>>) -> Self {
        Self {
            lb: lb.into(),
            ub: ub.into(),
        }
    }

    /// Creates bounds from one `(lower, upper)` pair per variable.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (lb, ub) = pairs.into_iter().unzip();
        Self { lb, ub }
    }

    /// Creates bounds with only lower sides.
    pub fn lower_only(lb: impl Into<Vec<f64>>) -> Self {
        let lb = lb.into();
        let ub = vec![f64::INFINITY; lb.len()];
        Self { lb, ub }
    }

    /// Creates bounds with only upper sides.
    pub fn upper_only(ub: impl Into<Vec<f64>>) -> Self {
        let ub = ub.into();
        let lb = vec![f64::NEG_INFINITY; ub.len()];
        Self { lb, ub }
    }

    /// Returns the lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lb
    }

    /// Returns the upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.ub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_into_sides() {
        let bounds = Bounds::from_pairs([(0.0, 2.0), (0.5, 3.0)]);
        assert_eq!(bounds.lower(), &[0.0, 0.5]);
        assert_eq!(bounds.upper(), &[2.0, 3.0]);
    }

    #[test]
    fn one_sided_constructors_fill_infinities() {
        let bounds = Bounds::lower_only([1.0, 2.0]);
        assert_eq!(bounds.upper(), &[f64::INFINITY, f64::INFINITY]);

        let bounds = Bounds::upper_only(vec![1.0]);
        assert_eq!(bounds.lower(), &[f64::NEG_INFINITY]);
    }
}
