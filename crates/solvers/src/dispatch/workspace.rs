//! Workspace limits of the solver implementations.
//!
//! Each solver allocates one real workspace whose length must be indexable
//! by the solver's integer type. The smallest workspace is the one at the
//! smallest admissible `npt`; if even that overflows, the problem is too
//! large.

use pdfo_core::{Error, Method};

use crate::warnings::Warnings;

/// Limits for one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    pub(crate) npt: usize,
    pub(crate) maxfev: usize,
}

/// Returns the largest usable index for an integer type with `ceiling` as
/// its maximum value.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn max_int(ceiling: u64) -> f64 {
    (0.99 * ceiling as f64).floor()
}

/// Checks that `method` fits in the workspace and clamps `npt` and `maxfev`.
///
/// `m` is the number of linear rows for LINCOA and the number of
/// constraints for COBYLA.
///
/// # Errors
///
/// Returns [`Error::WorkspaceOverflow`] if the smallest workspace is too
/// large.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn guard(
    method: Method,
    n: usize,
    m: usize,
    limits: Limits,
    ceiling: u64,
    invoker: &'static str,
    warnings: &mut Warnings,
) -> Result<Limits, Error> {
    let max_int = max_int(ceiling);
    let (nf, mf) = (n as f64, m as f64);
    let overflow = || Error::WorkspaceOverflow { invoker, method };

    let max_npt = match method {
        Method::Uobyqa => {
            let min_nw = (nf * (42.0 + nf * (23.0 + nf * (8.0 + nf)))
                + (2.0 * nf * nf).max(18.0 * nf))
                / 4.0;
            if min_nw + 1.0 >= max_int {
                return Err(overflow());
            }
            None
        }
        Method::Newuoa => {
            let fixed = 3.0 * nf * (nf + 3.0) / 2.0;
            let min_nw = (nf + 15.0) * (2.0 * nf + 2.0) + fixed;
            if min_nw + 1.0 >= max_int {
                return Err(overflow());
            }
            let root = ((nf - 13.0).powi(2) + 4.0 * (max_int - fixed - 1.0)).sqrt();
            Some((0.5 * (-nf - 13.0 + root)).floor())
        }
        Method::Bobyqa => {
            let fixed = 3.0 * nf * (nf + 5.0) / 2.0;
            let min_nw = (nf + 7.0) * (2.0 * nf + 2.0) + fixed;
            if min_nw + 1.0 >= max_int {
                return Err(overflow());
            }
            let root = ((nf - 5.0).powi(2) + 4.0 * (max_int - fixed - 1.0)).sqrt();
            Some((0.5 * (-(nf + 5.0) + root)).floor())
        }
        Method::Lincoa => {
            let min_nw = mf * (2.0 + nf)
                + (nf + 2.0) * (2.0 * nf + 6.0)
                + nf * (9.0 + 3.0 * nf)
                + (mf + 3.0 * nf).max(2.0 * mf + nf).max(2.0 * nf + 4.0);
            if min_nw >= max_int {
                return Err(overflow());
            }
            let alpha = nf + 7.0;
            let beta = 2.0 * mf + mf * (2.0 + nf) + nf * (9.0 + 3.0 * nf) - max_int;
            Some((0.5 * (-alpha + (alpha * alpha - 4.0 * beta).sqrt())).floor())
        }
        Method::Cobyla => {
            let min_nw = nf * (3.0 * nf + 2.0 * mf + 11.0) + 4.0 * mf + 6.0;
            if min_nw >= max_int {
                return Err(overflow());
            }
            None
        }
    };

    let name = method.name();
    let mut limits = limits;
    if let Some(max_npt) = max_npt {
        let max_npt = max_npt.max(nf + 2.0) as usize;
        if limits.npt > max_npt {
            limits.npt = max_npt;
            warnings.push(format!(
                "{name}: npt is so large that it is unable to allocate the workspace; \
                 it is set to {max_npt}"
            ));
        }
    }

    let max_maxfev = max_int as usize;
    if limits.maxfev > max_maxfev {
        limits.maxfev = max_maxfev;
        warnings.push(format!(
            "{name}: maxfev exceeds the upper limit of the solver's integer type; \
             it is set to {max_maxfev}"
        ));
    }

    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: u64 = i32::MAX as u64;

    fn limits(npt: usize, maxfev: usize) -> Limits {
        Limits { npt, maxfev }
    }

    #[test]
    fn max_int_keeps_a_buffer() {
        assert!((max_int(10_000) - 9_900.0).abs() < f64::EPSILON);
        assert!((max_int(152) - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn small_problems_pass_unchanged() {
        let mut warnings = Warnings::default();
        for method in Method::ALL {
            let result = guard(method, 5, 3, limits(11, 2500), CEILING, "pdfo", &mut warnings);
            assert_eq!(result.unwrap(), limits(11, 2500));
        }
        assert!(warnings.messages().is_empty());
    }

    #[test]
    fn npt_and_maxfev_are_clamped() {
        let mut warnings = Warnings::default();
        let result = guard(Method::Newuoa, 2, 0, limits(6, 1000), 152, "pdfo", &mut warnings);
        assert_eq!(result.unwrap(), limits(5, 150));
        assert_eq!(warnings.messages().len(), 2);
    }

    #[test]
    fn oversized_problems_are_fatal() {
        let mut warnings = Warnings::default();
        for method in Method::ALL {
            let result = guard(method, 3, 4, limits(5, 100), 100, "bobyqa", &mut warnings);
            assert!(matches!(
                result,
                Err(Error::WorkspaceOverflow { invoker: "bobyqa", .. })
            ));
        }
    }
}
