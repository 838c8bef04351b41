#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::{ExitStatus, Method};

/// The result of an optimization call.
///
/// Optional fields are present only when they are meaningful for the
/// problem that was solved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct Solution {
    /// The final point, in the caller's coordinates.
    pub x: Vec<f64>,
    /// The objective value at `x`, or zero for a feasibility problem.
    pub fun: f64,
    pub status: ExitStatus,
    pub success: bool,
    pub message: String,
    /// Number of objective evaluations.
    pub nfev: usize,
    /// Every objective value in evaluation order.
    pub fun_history: Vec<f64>,
    /// The solver that ran, or would have run for terminal outcomes.
    pub method: Method,

    /// Maximum constraint violation at `x`, for constrained problems.
    pub maxcv: Option<f64>,
    pub maxcv_history: Option<Vec<f64>>,
    /// Linear values `A x` followed by nonlinear values `c(x)`.
    pub constraint_values: Option<Vec<f64>>,

    /// Indices of inconsistent bounds, when the problem is infeasible.
    pub infeasible_bounds: Option<Vec<usize>>,
    /// Indices of inconsistent linear rows, when the problem is infeasible.
    pub infeasible_linear_constraints: Option<Vec<usize>>,
    /// Indices of inconsistent nonlinear components, when the problem is
    /// infeasible.
    pub infeasible_nonlinear_constraints: Option<Vec<usize>>,

    /// Whether the linear constraints handed to the solver may have been
    /// relaxed to accommodate an infeasible start.
    pub constr_modified: Option<bool>,

    /// Adjustments made while preparing or solving the problem.
    pub warnings: Vec<String>,
}

impl Solution {
    /// Creates a solution with every optional field absent.
    #[must_use]
    pub fn new(x: Vec<f64>, fun: f64, status: ExitStatus, method: Method) -> Self {
        Self {
            x,
            fun,
            status,
            success: status.is_success(),
            message: status.message().to_string(),
            nfev: 0,
            fun_history: Vec::new(),
            method,
            maxcv: None,
            maxcv_history: None,
            constraint_values: None,
            infeasible_bounds: None,
            infeasible_linear_constraints: None,
            infeasible_nonlinear_constraints: None,
            constr_modified: None,
            warnings: Vec::new(),
        }
    }
}
