//! The preprocessing and dispatch pipeline around Powell's derivative-free
//! solvers.
//!
//! A [`Problem`](pdfo_core::Problem) passes through five stages:
//!
//! 1. Options are resolved against their defaults, with a warning for every
//!    value that had to be corrected.
//! 2. Bounds and constraints are canonicalized into one linear system and
//!    one nonlinear system, and inconsistent inputs are recorded.
//! 3. The problem is classified. Infeasible, fully fixed and pure
//!    feasibility problems are answered directly. Other problems are reduced
//!    by fixing variables, scaling, and eliminating linear equalities, and a
//!    solver is selected.
//! 4. The selected solver runs on a [`Backend`](pdfo_core::Backend) within
//!    its workspace limits.
//! 5. The raw outcome is mapped back to the caller's variables and checked.
//!
//! [`optimize`] selects the solver automatically. The per-method functions
//! such as [`bobyqa`] force a solver and ignore the constraints it cannot
//! handle.

mod compass;
mod dispatch;
mod normalize;
mod optimizer;
mod options;
mod preprocess;
mod warnings;

pub use compass::CompassSearch;
pub use optimizer::{
    DEFAULT_INDEX_CEILING, Optimizer, bobyqa, cobyla, lincoa, newuoa, optimize, uobyqa,
};
