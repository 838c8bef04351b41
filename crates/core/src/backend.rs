use nalgebra::DMatrix;

use crate::{Error, Method};

/// Trust-region controls shared by every solver family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustRegion {
    pub rhobeg: f64,
    pub rhoend: f64,
    pub maxfev: usize,
    pub ftarget: f64,
}

/// The inputs of one solver run, one variant per family.
///
/// Points are expressed in the reduced variables the evaluator expects.
#[derive(Debug, Clone)]
pub enum SolverCall<'a> {
    Uobyqa {
        x0: &'a [f64],
        region: TrustRegion,
        classical: bool,
    },
    Newuoa {
        x0: &'a [f64],
        npt: usize,
        region: TrustRegion,
        classical: bool,
    },
    Bobyqa {
        x0: &'a [f64],
        lb: &'a [f64],
        ub: &'a [f64],
        npt: usize,
        honour_x0: bool,
        region: TrustRegion,
        classical: bool,
    },
    /// Linear constraints in the augmented form `a x <= b`.
    Lincoa {
        x0: &'a [f64],
        a: &'a DMatrix<f64>,
        b: &'a [f64],
        npt: usize,
        region: TrustRegion,
        classical: bool,
    },
    /// `m` constraints `c(x) >= 0` supplied by [`Evaluate::constraints`].
    Cobyla {
        x0: &'a [f64],
        m: usize,
        region: TrustRegion,
        classical: bool,
    },
}

impl SolverCall<'_> {
    /// Returns the solver family of this call.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Uobyqa { .. } => Method::Uobyqa,
            Self::Newuoa { .. } => Method::Newuoa,
            Self::Bobyqa { .. } => Method::Bobyqa,
            Self::Lincoa { .. } => Method::Lincoa,
            Self::Cobyla { .. } => Method::Cobyla,
        }
    }

    /// Returns the starting point.
    #[must_use]
    pub fn x0(&self) -> &[f64] {
        match self {
            Self::Uobyqa { x0, .. }
            | Self::Newuoa { x0, .. }
            | Self::Bobyqa { x0, .. }
            | Self::Lincoa { x0, .. }
            | Self::Cobyla { x0, .. } => x0,
        }
    }

    /// Returns the trust-region controls.
    #[must_use]
    pub fn region(&self) -> TrustRegion {
        match self {
            Self::Uobyqa { region, .. }
            | Self::Newuoa { region, .. }
            | Self::Bobyqa { region, .. }
            | Self::Lincoa { region, .. }
            | Self::Cobyla { region, .. } => *region,
        }
    }

    /// Returns true if the backend should see unmoderated function values.
    #[must_use]
    pub fn classical(&self) -> bool {
        match self {
            Self::Uobyqa { classical, .. }
            | Self::Newuoa { classical, .. }
            | Self::Bobyqa { classical, .. }
            | Self::Lincoa { classical, .. }
            | Self::Cobyla { classical, .. } => *classical,
        }
    }
}

/// Function evaluations exposed to a backend.
///
/// Implementations count every evaluation and propagate user errors.
pub trait Evaluate {
    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's objective fails.
    fn objective(&mut self, x: &[f64]) -> Result<f64, Error>;

    /// Evaluates the constraints at `x` in the form `c(x) >= 0`.
    ///
    /// Only meaningful for [`SolverCall::Cobyla`]; other families return an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's constraint function fails.
    fn constraints(&mut self, x: &[f64]) -> Result<Vec<f64>, Error>;
}

/// The raw result of one solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub x: Vec<f64>,
    pub fun: f64,
    pub exit_code: i32,
    pub nfev: usize,
    pub fun_history: Vec<f64>,
    pub maxcv: Option<f64>,
    pub maxcv_history: Option<Vec<f64>>,
    /// Final `c(x) >= 0` values, for [`SolverCall::Cobyla`].
    pub constraint_values: Option<Vec<f64>>,
}

/// A derivative-free solver implementation.
///
/// The pipeline prepares a [`SolverCall`] and hands every function
/// evaluation through `eval`.
pub trait Backend {
    /// Runs the solver described by `call`.
    ///
    /// # Errors
    ///
    /// Returns any error raised by `eval`, or [`Error::Backend`] if the
    /// solver itself fails.
    fn solve(&self, call: &SolverCall<'_>, eval: &mut dyn Evaluate)
    -> Result<SolverOutcome, Error>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn solve(
        &self,
        call: &SolverCall<'_>,
        eval: &mut dyn Evaluate,
    ) -> Result<SolverOutcome, Error> {
        (**self).solve(call, eval)
    }
}
