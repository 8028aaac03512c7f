//! Pass-name -> constructor map, the generalized form of spec.md §9's
//! "keep a small registry mapping a pass name to a constructor" redesign
//! note. Replaces whatever plug-in ABI the host pass manager would
//! otherwise require this crate to implement: callers look a pass up by
//! its stable lowercase name (spec.md §6) and get back a function they can
//! run against a module, uniformly, regardless of whether that pass
//! actually needs randomness.

use crate::ir::Module;
use crate::pass::{annotation, bogus_switch, flatten, function_merge, mba, PreservedAnalyses, TransformError};
use crate::rng::Prng;

/// Every pass's entry point normalized to one shape, so a caller can drive
/// an arbitrary sequence of registered passes without matching on which
/// ones happen to consume the shared PRNG.
pub type PassFn = fn(&mut Module, &mut Prng) -> Result<PreservedAnalyses, TransformError>;

/// Looks up a pass by the name it would register under with a host pass
/// manager (spec.md §6: `"annotation" | "flatten" | "bogus-switch" |
/// "function-merge" | "mba"`). Unknown names return `None` rather than
/// erroring — selecting a pass by name is the host's job, not this crate's.
#[must_use]
pub fn lookup(name: &str) -> Option<PassFn> {
    match name {
        annotation::PASS_NAME => Some(|module, _rng| Ok(annotation::run(module))),
        flatten::PASS_NAME => Some(|module, _rng| flatten::run(module)),
        function_merge::PASS_NAME => Some(|module, _rng| function_merge::run(module)),
        bogus_switch::PASS_NAME => Some(bogus_switch::run),
        mba::PASS_NAME => Some(mba::run),
        _ => None,
    }
}

/// The names `lookup` recognizes, in the reasonable default pipeline order
/// spec.md §2 describes: harvesting first, then any combination of the
/// function-level passes, then the module-level merge.
pub const DEFAULT_ORDER: &[&str] = &[
    annotation::PASS_NAME,
    mba::PASS_NAME,
    bogus_switch::PASS_NAME,
    flatten::PASS_NAME,
    function_merge::PASS_NAME,
];

/// Runs every name in `pipeline`, in order, against `module`, threading the
/// same PRNG through each. Stops at the first pass that isn't registered.
pub fn run_pipeline(pipeline: &[&str], module: &mut Module, rng: &mut Prng) -> Result<(), TransformError> {
    for &name in pipeline {
        match lookup(name) {
            Some(pass) => {
                pass(module, rng)?;
            }
            None => log::warn!("[registry] no pass registered under `{name}`, skipping"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_every_documented_pass_name() {
        for &name in DEFAULT_ORDER {
            assert!(lookup(name).is_some(), "`{name}` should be registered");
        }
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(lookup("not-a-real-pass").is_none());
    }
}
