use std::fmt;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::Error;

/// Why an optimization call terminated.
///
/// Codes 0 to 12 and -1 to -3 come from the solver backends. Codes 13 to 15
/// and -4 are produced by preprocessing without running a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-derive",
    derive(Serialize, Deserialize),
    serde(into = "i32", try_from = "i32")
)]
pub enum ExitStatus {
    RadiusSuccess,
    TargetSuccess,
    StepReductionError,
    MaxEvalWarning,
    SmallDenominatorWarning,
    NptError,
    BoundError,
    DamageRoundingError,
    XRoundingError,
    ZeroDenominatorError,
    NError,
    MaxfevError,
    TrivialConstraintError,
    FixedSuccess,
    FeasibilitySuccess,
    FeasibilityError,
    NanX,
    NanEval,
    NanModel,
    Infeasible,
}

impl ExitStatus {
    /// Returns the integer exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::RadiusSuccess => 0,
            Self::TargetSuccess => 1,
            Self::StepReductionError => 2,
            Self::MaxEvalWarning => 3,
            Self::SmallDenominatorWarning => 4,
            Self::NptError => 5,
            Self::BoundError => 6,
            Self::DamageRoundingError => 7,
            Self::XRoundingError => 8,
            Self::ZeroDenominatorError => 9,
            Self::NError => 10,
            Self::MaxfevError => 11,
            Self::TrivialConstraintError => 12,
            Self::FixedSuccess => 13,
            Self::FeasibilitySuccess => 14,
            Self::FeasibilityError => 15,
            Self::NanX => -1,
            Self::NanEval => -2,
            Self::NanModel => -3,
            Self::Infeasible => -4,
        }
    }

    /// Returns true for codes 0, 1, 13 and 14.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::RadiusSuccess | Self::TargetSuccess | Self::FixedSuccess | Self::FeasibilitySuccess
        )
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::RadiusSuccess => "The lower bound on the trust-region radius is reached.",
            Self::TargetSuccess => "The target value of the objective function is reached.",
            Self::StepReductionError => {
                "A trust-region step has failed to reduce the quadratic model."
            }
            Self::MaxEvalWarning => "The maximum number of function evaluations is reached.",
            Self::SmallDenominatorWarning => "Much cancellation occurred in a denominator.",
            Self::NptError => "The number of interpolation points is invalid.",
            Self::BoundError => "The bounds are too close to each other for the initial radius.",
            Self::DamageRoundingError => "Rounding errors are becoming damaging.",
            Self::XRoundingError => "Rounding errors are damaging the solution point.",
            Self::ZeroDenominatorError => "A denominator has become zero.",
            Self::NError => "The number of variables is invalid.",
            Self::MaxfevError => "The maximum number of function evaluations is invalid.",
            Self::TrivialConstraintError => "A constraint gradient is zero.",
            Self::FixedSuccess => "All variables are fixed by the bounds.",
            Self::FeasibilitySuccess => {
                "A linear feasibility problem has been received and solved."
            }
            Self::FeasibilityError => {
                "A linear feasibility problem has been received but failed."
            }
            Self::NanX => "NaN is encountered in the solution point.",
            Self::NanEval => "NaN is encountered in the objective/constraint function value.",
            Self::NanModel => "NaN is encountered in the model parameter.",
            Self::Infeasible => "The problem is infeasible.",
        }
    }
}

impl TryFrom<i32> for ExitStatus {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        let status = match code {
            0 => Self::RadiusSuccess,
            1 => Self::TargetSuccess,
            2 => Self::StepReductionError,
            3 => Self::MaxEvalWarning,
            4 => Self::SmallDenominatorWarning,
            5 => Self::NptError,
            6 => Self::BoundError,
            7 => Self::DamageRoundingError,
            8 => Self::XRoundingError,
            9 => Self::ZeroDenominatorError,
            10 => Self::NError,
            11 => Self::MaxfevError,
            12 => Self::TrivialConstraintError,
            13 => Self::FixedSuccess,
            14 => Self::FeasibilitySuccess,
            15 => Self::FeasibilityError,
            -1 => Self::NanX,
            -2 => Self::NanEval,
            -3 => Self::NanModel,
            -4 => Self::Infeasible,
            _ => return Err(Error::UnknownExitCode { code }),
        };
        Ok(status)
    }
}

impl From<ExitStatus> for i32 {
    fn from(status: ExitStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_back_to_statuses() {
        for code in -4..=15 {
            let status = ExitStatus::try_from(code).unwrap();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(matches!(
            ExitStatus::try_from(16),
            Err(Error::UnknownExitCode { code: 16 })
        ));
        assert!(ExitStatus::try_from(-5).is_err());
    }

    #[test]
    fn success_set() {
        let successes: Vec<i32> = (-4..=15)
            .filter_map(|code| ExitStatus::try_from(code).ok())
            .filter(|status| status.is_success())
            .map(ExitStatus::code)
            .collect();
        assert_eq!(successes, vec![0, 1, 13, 14]);
    }
}
