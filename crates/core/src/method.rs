use std::{fmt, str::FromStr};

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::Error;

/// The most general constraint group present in a problem.
///
/// Variants are ordered from least to most general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde-derive",
    derive(Serialize, Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ConstraintKind {
    Unconstrained,
    Bound,
    Linear,
    Nonlinear,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconstrained => "unconstrained",
            Self::Bound => "bound-constrained",
            Self::Linear => "linearly constrained",
            Self::Nonlinear => "nonlinearly constrained",
        };
        f.write_str(name)
    }
}

/// One of Powell's derivative-free solver families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-derive",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Method {
    /// Unconstrained optimization by quadratic approximation, for small `n`.
    Uobyqa,
    /// Unconstrained optimization with underdetermined quadratic models.
    Newuoa,
    /// Bound-constrained optimization by quadratic approximation.
    Bobyqa,
    /// Linearly constrained optimization.
    Lincoa,
    /// Constrained optimization by linear approximation.
    Cobyla,
}

impl Method {
    /// Every solver family.
    pub const ALL: [Method; 5] = [
        Method::Uobyqa,
        Method::Newuoa,
        Method::Bobyqa,
        Method::Lincoa,
        Method::Cobyla,
    ];

    /// Returns the lowercase solver name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uobyqa => "uobyqa",
            Self::Newuoa => "newuoa",
            Self::Bobyqa => "bobyqa",
            Self::Lincoa => "lincoa",
            Self::Cobyla => "cobyla",
        }
    }

    /// Returns true if the solver takes a number of interpolation points.
    #[must_use]
    pub fn uses_npt(self) -> bool {
        matches!(self, Self::Newuoa | Self::Bobyqa | Self::Lincoa)
    }

    /// Returns the most general constraint group the solver honors.
    #[must_use]
    pub fn capability(self) -> ConstraintKind {
        match self {
            Self::Uobyqa | Self::Newuoa => ConstraintKind::Unconstrained,
            Self::Bobyqa => ConstraintKind::Bound,
            Self::Lincoa => ConstraintKind::Linear,
            Self::Cobyla => ConstraintKind::Nonlinear,
        }
    }

    /// Returns true if the solver honors every constraint of `kind`.
    #[must_use]
    pub fn accepts(self, kind: ConstraintKind) -> bool {
        kind <= self.capability()
    }

    /// Selects the default solver for a problem of `kind` in `n` variables.
    #[must_use]
    pub fn default_for(kind: ConstraintKind, n: usize) -> Self {
        match kind {
            ConstraintKind::Unconstrained if (2..=8).contains(&n) => Self::Uobyqa,
            ConstraintKind::Unconstrained => Self::Newuoa,
            ConstraintKind::Bound => Self::Bobyqa,
            ConstraintKind::Linear => Self::Lincoa,
            ConstraintKind::Nonlinear => Self::Cobyla,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownMethod {
                name: s.to_string(),
            })
    }
}
