//! Option resolution and per-method adaptation.

use pdfo_core::{Method, OptionSet, Options};

use crate::warnings::Warnings;

/// Resolves caller overrides against the defaults for `n` free variables.
///
/// `lb` and `ub` are the bounds of the free variables. Invalid values fall
/// back to their defaults with a warning.
pub(crate) fn resolve(
    raw: &Options,
    n: usize,
    lb: &[f64],
    ub: &[f64],
    invoker: &str,
    warnings: &mut Warnings,
) -> OptionSet {
    for key in &raw.unknown {
        warnings.push(format!("{invoker}: unknown option `{key}`; it is ignored"));
    }

    let honour_x0 = raw.honour_x0.unwrap_or(false);
    let mut scale = raw.scale.unwrap_or(false);
    if scale && honour_x0 {
        warnings.push(format!(
            "{invoker}: honour_x0 is set; the variables are not scaled"
        ));
        scale = false;
    }

    let defaults = OptionSet::defaults(n, lb, ub, scale);
    let mut options = OptionSet {
        scale,
        honour_x0,
        ..defaults.clone()
    };

    if let Some(radius_init) = raw.radius_init {
        if radius_init.is_finite() && radius_init > 0.0 {
            options.radius_init = radius_init;
        } else {
            warnings.push(format!(
                "{invoker}: invalid rhobeg; it should be a positive number; it is set to {}",
                defaults.radius_init
            ));
        }
    }

    if let Some(radius_final) = raw.radius_final {
        if radius_final.is_finite() && radius_final > 0.0 {
            options.radius_final = radius_final;
        } else {
            warnings.push(format!(
                "{invoker}: invalid rhoend; it should be a positive number; it is set to {}",
                defaults.radius_final
            ));
        }
    }

    if options.radius_final > options.radius_init {
        warnings.push(format!(
            "{invoker}: rhoend > rhobeg; rhoend is set to {}",
            options.radius_init
        ));
        options.radius_final = options.radius_init;
    }

    if let Some(maxfev) = raw.maxfev {
        if maxfev > 0 {
            options.maxfev = maxfev;
        } else {
            warnings.push(format!(
                "{invoker}: invalid maxfev; it should be a positive integer; \
                 it is set to 500 times the number of variables"
            ));
        }
    }

    if let Some(npt) = raw.npt {
        options.npt = npt;
    }

    if let Some(ftarget) = raw.ftarget {
        if ftarget.is_nan() {
            warnings.push(format!(
                "{invoker}: invalid ftarget; it should be a real number; it is set to -inf"
            ));
        } else {
            options.ftarget = ftarget;
        }
    }

    if let Some(repair_tol) = raw.repair_tol {
        if repair_tol.is_finite() && repair_tol >= 0.0 {
            options.repair_tol = repair_tol;
        } else {
            warnings.push(format!(
                "{invoker}: invalid repair_tol; it should be a nonnegative number; it is set to {}",
                defaults.repair_tol
            ));
        }
    }

    options.quiet = raw.quiet.unwrap_or(defaults.quiet);
    options.classical = raw.classical.unwrap_or(defaults.classical);
    options.eliminate_lin_eq = raw.eliminate_lin_eq.unwrap_or(defaults.eliminate_lin_eq);
    options.debug = raw.debug.unwrap_or(defaults.debug);

    let chkfunval = raw.chkfunval.unwrap_or(false);
    if chkfunval && !options.debug {
        warnings.push(format!(
            "{invoker}: chkfunval = true but debug = false; chkfunval is set to false"
        ));
    }
    options.chkfunval = chkfunval && options.debug;

    options
}

/// Recomputes the defaults that depend on the dimension for the `n` reduced
/// variables, keeping every valid value the caller supplied.
pub(crate) fn rebase(raw: &Options, n: usize, options: &mut OptionSet) {
    if raw.npt.is_none() {
        options.npt = 2 * n + 1;
    }
    if !raw.maxfev.is_some_and(|maxfev| maxfev > 0) {
        options.maxfev = 500 * n;
    }
}

/// Adjusts resolved options to what `method` accepts in `n` variables.
pub(crate) fn adapt(method: Method, n: usize, options: &mut OptionSet, warnings: &mut Warnings) {
    let name = method.name();

    if method.uses_npt() {
        let lowest = n + 2;
        let highest = (n + 1) * (n + 2) / 2;
        if options.npt < lowest || options.npt > highest {
            let npt = (2 * n + 1).clamp(lowest, highest);
            warnings.push(format!(
                "{name}: npt is not in [n+2, (n+1)(n+2)/2]; it is set to {npt}"
            ));
            options.npt = npt;
        }
        if options.maxfev <= options.npt {
            let maxfev = options.npt + 1;
            warnings.push(format!(
                "{name}: maxfev is too small for npt; it is set to {maxfev}"
            ));
            options.maxfev = maxfev;
        }
    }

    match method {
        Method::Uobyqa => {
            if n == 1 {
                warnings.push(format!(
                    "{name}: a univariate problem is received; {name} may fail; \
                     try newuoa instead"
                ));
            }
            raise_maxfev(name, (n + 1) * (n + 2) / 2 + 1, options, warnings);
        }
        Method::Cobyla => raise_maxfev(name, n + 2, options, warnings),
        Method::Newuoa | Method::Bobyqa | Method::Lincoa => {}
    }

    if options.honour_x0 && method != Method::Bobyqa {
        warnings.push(format!("{name}: honour_x0 is only used by bobyqa; it is ignored"));
        options.honour_x0 = false;
    }
}

fn raise_maxfev(name: &str, lowest: usize, options: &mut OptionSet, warnings: &mut Warnings) {
    if options.maxfev < lowest {
        warnings.push(format!(
            "{name}: maxfev is too small; it is set to {lowest}"
        ));
        options.maxfev = lowest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const INF: f64 = f64::INFINITY;

    fn resolved(raw: &Options) -> (OptionSet, Warnings) {
        let mut warnings = Warnings::default();
        let options = resolve(raw, 2, &[0.0, -INF], &[2.0, INF], "pdfo", &mut warnings);
        (options, warnings)
    }

    #[test]
    fn defaults_pass_through_without_warnings() {
        let (options, warnings) = resolved(&Options::default());
        assert_relative_eq!(options.radius_init, 0.5);
        assert_relative_eq!(options.radius_final, 1e-6);
        assert_eq!(options.maxfev, 1000);
        assert!(warnings.messages().is_empty());
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let raw = Options {
            radius_init: Some(-1.0),
            radius_final: Some(f64::NAN),
            maxfev: Some(0),
            ftarget: Some(f64::NAN),
            ..Options::default()
        };
        let (options, warnings) = resolved(&raw);

        assert_relative_eq!(options.radius_init, 0.5);
        assert_relative_eq!(options.radius_final, 1e-6);
        assert_eq!(options.maxfev, 1000);
        assert!(options.ftarget == f64::NEG_INFINITY);
        assert_eq!(warnings.messages().len(), 4);
    }

    #[test]
    fn radius_final_is_clamped_only_when_too_large() {
        let raw = Options {
            radius_init: Some(0.1),
            radius_final: Some(0.2),
            ..Options::default()
        };
        let (options, warnings) = resolved(&raw);
        assert_relative_eq!(options.radius_final, 0.1);
        assert_eq!(warnings.messages().len(), 1);

        let raw = Options {
            radius_init: Some(0.1),
            radius_final: Some(0.1),
            ..Options::default()
        };
        let (options, warnings) = resolved(&raw);
        assert_relative_eq!(options.radius_final, 0.1);
        assert!(warnings.messages().is_empty());
    }

    #[test]
    fn chkfunval_requires_debug() {
        let raw = Options {
            chkfunval: Some(true),
            ..Options::default()
        };
        let (options, warnings) = resolved(&raw);
        assert!(!options.chkfunval);
        assert_eq!(warnings.messages().len(), 1);

        let raw = Options {
            chkfunval: Some(true),
            debug: Some(true),
            ..Options::default()
        };
        let (options, _) = resolved(&raw);
        assert!(options.chkfunval);
    }

    #[test]
    fn honour_x0_disables_scaling() {
        let raw = Options {
            scale: Some(true),
            honour_x0: Some(true),
            ..Options::default()
        };
        let (options, warnings) = resolved(&raw);
        assert!(!options.scale);
        assert!(options.honour_x0);
        assert_eq!(warnings.messages().len(), 1);
    }

    #[test]
    fn npt_out_of_range_is_reset() {
        let mut warnings = Warnings::default();
        let mut options = OptionSet::defaults(3, &[], &[], false);
        options.npt = 20;

        adapt(Method::Newuoa, 3, &mut options, &mut warnings);
        assert_eq!(options.npt, 7);
        assert_eq!(warnings.messages().len(), 1);
    }

    #[test]
    fn maxfev_is_raised_above_npt_and_minimums() {
        let mut warnings = Warnings::default();
        let mut options = OptionSet::defaults(3, &[], &[], false);
        options.maxfev = 5;
        adapt(Method::Bobyqa, 3, &mut options, &mut warnings);
        assert_eq!(options.maxfev, 8);

        let mut options = OptionSet::defaults(3, &[], &[], false);
        options.maxfev = 5;
        adapt(Method::Uobyqa, 3, &mut options, &mut warnings);
        assert_eq!(options.maxfev, 11);

        let mut options = OptionSet::defaults(3, &[], &[], false);
        options.maxfev = 2;
        adapt(Method::Cobyla, 3, &mut options, &mut warnings);
        assert_eq!(options.maxfev, 5);
    }

    #[test]
    fn honour_x0_is_dropped_outside_bobyqa() {
        let mut warnings = Warnings::default();
        let mut options = OptionSet::defaults(2, &[], &[], false);
        options.honour_x0 = true;

        adapt(Method::Bobyqa, 2, &mut options, &mut warnings);
        assert!(options.honour_x0);
        assert!(warnings.messages().is_empty());

        adapt(Method::Lincoa, 2, &mut options, &mut warnings);
        assert!(!options.honour_x0);
        assert_eq!(warnings.messages().len(), 1);
    }

    #[test]
    fn rebase_follows_the_reduced_dimension() {
        let mut options = OptionSet::defaults(3, &[], &[], false);
        rebase(&Options::default(), 2, &mut options);
        assert_eq!(options.npt, 5);
        assert_eq!(options.maxfev, 1000);

        let mut warnings = Warnings::default();
        adapt(Method::Lincoa, 2, &mut options, &mut warnings);
        assert!(warnings.messages().is_empty());

        let raw = Options {
            npt: Some(4),
            maxfev: Some(300),
            ..Options::default()
        };
        let mut options = OptionSet::defaults(3, &[], &[], false);
        rebase(&raw, 2, &mut options);
        assert_eq!(options.npt, 4);
        assert_eq!(options.maxfev, 300);

        let raw = Options {
            maxfev: Some(0),
            ..Options::default()
        };
        rebase(&raw, 2, &mut options);
        assert_eq!(options.maxfev, 1000);
    }
}
