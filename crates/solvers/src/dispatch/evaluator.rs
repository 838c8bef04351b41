use pdfo_core::{Error, Evaluate, HUGE_CON, HUGE_FUN, ObjectiveFn};

use crate::preprocess::{AffineMap, AugmentedLinearSystem, NonlinearSystem};

/// Evaluates the caller's functions on reduced points.
///
/// Counts objective evaluations and, unless `classical` is set, moderates
/// values so the solver never sees NaN or huge numbers. A missing objective
/// evaluates to zero.
pub(crate) struct Evaluator<'a> {
    objective: Option<&'a ObjectiveFn>,
    map: &'a AffineMap,
    linear: Option<&'a AugmentedLinearSystem>,
    nonlinear: Option<&'a NonlinearSystem<'a>>,
    classical: bool,
    nfev: usize,
    fun_history: Vec<f64>,
    last_nonlinear: Option<(Vec<f64>, Vec<f64>)>,
    recomputed: usize,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(objective: Option<&'a ObjectiveFn>, map: &'a AffineMap, classical: bool) -> Self {
        Self {
            objective,
            map,
            linear: None,
            nonlinear: None,
            classical,
            nfev: 0,
            fun_history: Vec::new(),
            last_nonlinear: None,
            recomputed: 0,
        }
    }

    /// Adds the constraints reported by [`Evaluate::constraints`].
    pub(crate) fn with_constraints(
        mut self,
        linear: Option<&'a AugmentedLinearSystem>,
        nonlinear: Option<&'a NonlinearSystem<'a>>,
    ) -> Self {
        self.linear = linear;
        self.nonlinear = nonlinear;
        self
    }

    /// Number of objective evaluations plus final constraint recomputations.
    pub(crate) fn nfev(&self) -> usize {
        self.nfev + self.recomputed
    }

    pub(crate) fn fun_history(&self) -> &[f64] {
        &self.fun_history
    }

    /// Nonlinear values at the reduced point `y`.
    ///
    /// Reuses the last evaluation when it was at `y`; otherwise evaluates
    /// again and counts the evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if a user constraint function fails.
    pub(crate) fn nonlinear_at(&mut self, y: &[f64]) -> Result<Option<Vec<f64>>, Error> {
        let Some(system) = self.nonlinear else {
            return Ok(None);
        };
        if let Some((last_y, values)) = &self.last_nonlinear {
            if last_y.as_slice() == y {
                return Ok(Some(values.clone()));
            }
        }
        self.recomputed += 1;
        let values = system.values(&self.map.apply(y))?;
        self.last_nonlinear = Some((y.to_vec(), values.clone()));
        Ok(Some(values))
    }

    fn moderate_fun(&self, f: f64) -> f64 {
        if self.classical || f <= HUGE_FUN {
            f
        } else {
            HUGE_FUN
        }
    }

    fn moderate_con(&self, c: f64) -> f64 {
        if self.classical {
            c
        } else if c.is_nan() {
            -HUGE_CON
        } else {
            c.clamp(-HUGE_CON, HUGE_CON)
        }
    }
}

impl Evaluate for Evaluator<'_> {
    fn objective(&mut self, y: &[f64]) -> Result<f64, Error> {
        let f = match self.objective {
            Some(objective) => objective.call(&self.map.apply(y))?,
            None => 0.0,
        };
        // NaN fails `f <= HUGE_FUN` and is moderated too.
        let f = self.moderate_fun(f);
        self.nfev += 1;
        self.fun_history.push(f);
        Ok(f)
    }

    fn constraints(&mut self, y: &[f64]) -> Result<Vec<f64>, Error> {
        let mut values = self.linear.map(|system| system.slacks(y)).unwrap_or_default();

        if let Some(system) = self.nonlinear {
            let g = system.values(&self.map.apply(y))?;
            for (gi, (lo, hi)) in g.iter().zip(system.lb.iter().zip(&system.ub)) {
                if lo.is_finite() {
                    values.push(gi - lo);
                }
                if hi.is_finite() {
                    values.push(hi - gi);
                }
            }
            self.last_nonlinear = Some((y.to_vec(), g));
        }

        Ok(values.into_iter().map(|c| self.moderate_con(c)).collect())
    }
}
