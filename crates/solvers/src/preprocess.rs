//! Canonicalization, classification, and reduction of problems.

mod augment;
mod canonical;
mod classify;
mod eliminate;
mod feasible;
mod scaling;
mod transform;

pub(crate) use augment::AugmentedLinearSystem;
pub(crate) use canonical::{Canonical, Groups, LinearRows, NonlinearSystem, Origin, canonicalize};
pub(crate) use classify::{ProblemInfo, Reduced, Shape, classify};
pub(crate) use eliminate::{Elimination, eliminate};
pub(crate) use feasible::project;
pub(crate) use scaling::Scaling;
pub(crate) use transform::AffineMap;
