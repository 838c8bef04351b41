use nalgebra::{DMatrix, DVector};

/// An affine map `x = offset + matrix * y` from solver variables to the
/// caller's variables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AffineMap {
    offset: DVector<f64>,
    matrix: DMatrix<f64>,
}

impl AffineMap {
    pub(crate) fn new(offset: DVector<f64>, matrix: DMatrix<f64>) -> Self {
        debug_assert_eq!(offset.len(), matrix.nrows());
        Self { offset, matrix }
    }

    /// Embeds the free variables into the full vector.
    ///
    /// `fixed[i]` holds the value of variable `i` when it is fixed.
    pub(crate) fn fixing(fixed: &[Option<f64>]) -> Self {
        let n = fixed.len();
        let free: Vec<usize> = (0..n).filter(|&i| fixed[i].is_none()).collect();

        let offset = DVector::from_iterator(n, fixed.iter().map(|v| v.unwrap_or(0.0)));
        let mut matrix = DMatrix::zeros(n, free.len());
        for (column, &row) in free.iter().enumerate() {
            matrix[(row, column)] = 1.0;
        }
        Self::new(offset, matrix)
    }

    /// Returns the map `y -> self(inner(y))`.
    pub(crate) fn compose(&self, inner: &AffineMap) -> Self {
        Self::new(
            &self.offset + &self.matrix * &inner.offset,
            &self.matrix * &inner.matrix,
        )
    }

    pub(crate) fn apply(&self, y: &[f64]) -> Vec<f64> {
        let y = DVector::from_column_slice(y);
        (&self.offset + &self.matrix * y).iter().copied().collect()
    }

    /// Number of solver variables.
    pub(crate) fn input_dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub(crate) fn offset(&self) -> &DVector<f64> {
        &self.offset
    }

    pub(crate) fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}
