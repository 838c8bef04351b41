use thiserror::Error;

use crate::{BoxError, Method};

/// Fatal failures that abort an optimization call.
///
/// Recoverable adjustments are reported as warnings on the
/// [`Solution`](crate::Solution) instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("x0 must contain at least one variable")]
    EmptyStart,

    #[error("{what} contains non-finite value {value} at index {index}")]
    NonFinite {
        what: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{what} contains non-finite value {value} at row {row}, column {column}")]
    NonFiniteEntry {
        what: &'static str,
        row: usize,
        column: usize,
        value: f64,
    },

    #[error("{what} has length {found}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("option `{key}` expects {expected}")]
    OptionType {
        key: String,
        expected: &'static str,
    },

    #[error("unknown method `{name}`")]
    UnknownMethod { name: String },

    #[error("unknown exit code {code}")]
    UnknownExitCode { code: i32 },

    #[error("{invoker}: problem too large for {method}; try other solvers")]
    WorkspaceOverflow { invoker: &'static str, method: Method },

    #[error("{what} at the solution is inconsistent: reported {reported}, recomputed {recomputed}")]
    Consistency {
        what: &'static str,
        reported: f64,
        recomputed: f64,
    },

    #[error("objective function failed")]
    Objective(#[source] BoxError),

    #[error("constraint function failed")]
    Constraint(#[source] BoxError),

    #[error("solver backend failed")]
    Backend(#[source] BoxError),
}
