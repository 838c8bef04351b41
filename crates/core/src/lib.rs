//! Core types for orchestrating Powell's derivative-free solvers.
//!
//! This crate defines the shared vocabulary that the pipeline in
//! `pdfo-solvers` and any solver backend build on:
//!
//! - [`Problem`]: an objective and a starting point, plus optional bounds,
//!   constraints, a requested [`Method`] and [`Options`] overrides
//! - [`Objective`], [`ConstraintFunction`]: callables supplied by the user
//! - [`Bounds`], [`LinearConstraint`], [`NonlinearConstraint`], [`Constraint`]:
//!   the accepted constraint inputs
//! - [`Backend`], [`SolverCall`], [`Evaluate`], [`SolverOutcome`]: the call
//!   contract with the trust-region solvers
//! - [`Solution`], [`ExitStatus`]: the uniform result record
//! - [`Error`]: fatal failures

mod backend;
mod bounds;
mod constraint;
mod error;
mod function;
mod method;
mod options;
mod problem;
mod solution;
mod status;

pub use backend::{Backend, Evaluate, SolverCall, SolverOutcome, TrustRegion};
pub use bounds::Bounds;
pub use constraint::{Constraint, LinearConstraint, NonlinearConstraint};
pub use error::Error;
pub use function::{
    BoxError, ConstraintFn, ConstraintFunction, HUGE_CON, HUGE_FUN, Objective, ObjectiveFn,
    WithArgs,
};
pub use method::{ConstraintKind, Method};
pub use options::{OptionSet, OptionValue, Options};
pub use problem::Problem;
pub use solution::Solution;
pub use status::ExitStatus;
