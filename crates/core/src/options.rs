#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::Error;

/// Caller-supplied option overrides.
///
/// Every field is optional; absent fields take their defaults when the
/// problem is solved. Invalid values are corrected with a warning on the
/// [`Solution`](crate::Solution), never raised.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(Serialize, Deserialize),
    serde(default)
)]
pub struct Options {
    #[cfg_attr(feature = "serde-derive", serde(alias = "rhobeg"))]
    pub radius_init: Option<f64>,
    #[cfg_attr(feature = "serde-derive", serde(alias = "rhoend"))]
    pub radius_final: Option<f64>,
    pub maxfev: Option<usize>,
    pub npt: Option<usize>,
    pub ftarget: Option<f64>,
    pub quiet: Option<bool>,
    pub scale: Option<bool>,
    pub honour_x0: Option<bool>,
    pub classical: Option<bool>,
    pub eliminate_lin_eq: Option<bool>,
    pub debug: Option<bool>,
    pub chkfunval: Option<bool>,
    pub repair_tol: Option<f64>,

    /// Keys passed to [`Options::set`] that no option recognizes.
    #[cfg_attr(feature = "serde-derive", serde(skip))]
    pub unknown: Vec<String>,
}

/// A dynamically typed option value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Options {
    /// Sets an option by name.
    ///
    /// Integers are accepted for real-valued options, and integral reals for
    /// integer options. Negative integers are stored as zero and rejected
    /// later with a warning. Unrecognized keys are remembered and reported
    /// as warnings when the problem is solved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionType`] if `value` has the wrong type for `key`.
    pub fn set(&mut self, key: &str, value: impl Into<OptionValue>) -> Result<(), Error> {
        let value = value.into();
        match key {
            "radius_init" | "rhobeg" => self.radius_init = Some(as_float(key, value)?),
            "radius_final" | "rhoend" => self.radius_final = Some(as_float(key, value)?),
            "ftarget" => self.ftarget = Some(as_float(key, value)?),
            "repair_tol" => self.repair_tol = Some(as_float(key, value)?),
            "maxfev" => self.maxfev = Some(as_count(key, value)?),
            "npt" => self.npt = Some(as_count(key, value)?),
            "quiet" => self.quiet = Some(as_bool(key, value)?),
            "scale" => self.scale = Some(as_bool(key, value)?),
            "honour_x0" => self.honour_x0 = Some(as_bool(key, value)?),
            "classical" => self.classical = Some(as_bool(key, value)?),
            "eliminate_lin_eq" => self.eliminate_lin_eq = Some(as_bool(key, value)?),
            "debug" => self.debug = Some(as_bool(key, value)?),
            "chkfunval" => self.chkfunval = Some(as_bool(key, value)?),
            _ => self.unknown.push(key.to_string()),
        }
        Ok(())
    }

    /// Sets an option by name, consuming and returning `self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionType`] if `value` has the wrong type for `key`.
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Result<Self, Error> {
        self.set(key, value)?;
        Ok(self)
    }
}

fn type_error(key: &str, expected: &'static str) -> Error {
    Error::OptionType {
        key: key.to_string(),
        expected,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_float(key: &str, value: OptionValue) -> Result<f64, Error> {
    match value {
        OptionValue::Float(v) => Ok(v),
        OptionValue::Int(v) => Ok(v as f64),
        OptionValue::Bool(_) => Err(type_error(key, "a real number")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_count(key: &str, value: OptionValue) -> Result<usize, Error> {
    match value {
        OptionValue::Int(v) => Ok(usize::try_from(v).unwrap_or(0)),
        OptionValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Ok(v.max(0.0) as usize),
        OptionValue::Float(_) | OptionValue::Bool(_) => Err(type_error(key, "an integer")),
    }
}

fn as_bool(key: &str, value: OptionValue) -> Result<bool, Error> {
    match value {
        OptionValue::Bool(v) => Ok(v),
        OptionValue::Float(_) | OptionValue::Int(_) => Err(type_error(key, "a boolean")),
    }
}

/// Fully resolved options for one optimization call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct OptionSet {
    pub radius_init: f64,
    pub radius_final: f64,
    pub maxfev: usize,
    pub npt: usize,
    pub ftarget: f64,
    pub quiet: bool,
    pub scale: bool,
    pub honour_x0: bool,
    pub classical: bool,
    pub eliminate_lin_eq: bool,
    pub debug: bool,
    pub chkfunval: bool,
    pub repair_tol: f64,
}

impl OptionSet {
    /// Default final trust-region radius.
    pub const RADIUS_FINAL: f64 = 1e-6;

    /// Default feasibility repair threshold.
    pub const REPAIR_TOL: f64 = 1e-10;

    /// Returns the defaults for a problem in `n` variables with bounds
    /// `lb <= x <= ub`.
    ///
    /// The initial radius is a quarter of the narrowest finite bound width,
    /// capped at one, and halved when `scale` is set.
    #[must_use]
    pub fn defaults(n: usize, lb: &[f64], ub: &[f64], scale: bool) -> Self {
        let min_width = lb
            .iter()
            .zip(ub)
            .map(|(l, u)| u - l)
            .filter(|width| width.is_finite() && *width > 0.0)
            .fold(f64::INFINITY, f64::min);

        let mut radius_init = if min_width.is_finite() {
            (min_width / 4.0).min(1.0)
        } else {
            1.0
        };
        if scale {
            radius_init /= 2.0;
        }

        Self {
            radius_init,
            radius_final: Self::RADIUS_FINAL,
            maxfev: 500 * n,
            npt: 2 * n + 1,
            ftarget: f64::NEG_INFINITY,
            quiet: true,
            scale,
            honour_x0: false,
            classical: false,
            eliminate_lin_eq: true,
            debug: false,
            chkfunval: false,
            repair_tol: Self::REPAIR_TOL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn defaults_use_narrowest_finite_width() {
        let inf = f64::INFINITY;
        let defaults = OptionSet::defaults(3, &[0.0, -inf, 1.0], &[2.0, inf, 1.4], false);
        assert_relative_eq!(defaults.radius_init, 0.1, epsilon = 1e-12);
        assert_relative_eq!(defaults.radius_final, 1e-6);
        assert_eq!(defaults.maxfev, 1500);
        assert_eq!(defaults.npt, 7);
        assert!(defaults.quiet);
        assert!(defaults.eliminate_lin_eq);
        assert!(defaults.ftarget.is_infinite() && defaults.ftarget < 0.0);
    }

    #[test]
    fn defaults_without_finite_widths() {
        let inf = f64::INFINITY;
        let defaults = OptionSet::defaults(2, &[-inf, 0.0], &[inf, inf], false);
        assert_relative_eq!(defaults.radius_init, 1.0);

        let scaled = OptionSet::defaults(2, &[0.0, 0.0], &[10.0, 10.0], true);
        assert_relative_eq!(scaled.radius_init, 0.5);
    }

    #[test]
    fn set_accepts_compatible_types() {
        let mut options = Options::default();
        options.set("rhobeg", 2).unwrap();
        options.set("maxfev", 200.0).unwrap();
        options.set("npt", -3).unwrap();
        options.set("quiet", false).unwrap();
        options.set("colour", true).unwrap();

        assert_eq!(options.radius_init, Some(2.0));
        assert_eq!(options.maxfev, Some(200));
        assert_eq!(options.npt, Some(0));
        assert_eq!(options.quiet, Some(false));
        assert_eq!(options.unknown, vec!["colour".to_string()]);
    }

    #[test]
    fn set_rejects_wrong_types() {
        let mut options = Options::default();
        assert!(matches!(
            options.set("maxfev", 10.5),
            Err(Error::OptionType { expected: "an integer", .. })
        ));
        assert!(matches!(
            options.set("scale", 1),
            Err(Error::OptionType { expected: "a boolean", .. })
        ));
        assert!(matches!(
            options.set("ftarget", true),
            Err(Error::OptionType { expected: "a real number", .. })
        ));
        assert_eq!(options, Options::default());
    }

    #[cfg(feature = "serde-derive")]
    #[test]
    fn deserializes_from_json() {
        let options: Options = serde_json::from_str(
            r#"{ "rhobeg": 0.5, "rhoend": 1e-8, "maxfev": 300, "honour_x0": true }"#,
        )
        .unwrap();

        assert_eq!(options.radius_init, Some(0.5));
        assert_eq!(options.radius_final, Some(1e-8));
        assert_eq!(options.maxfev, Some(300));
        assert_eq!(options.honour_x0, Some(true));
        assert_eq!(options.npt, None);
    }
}
