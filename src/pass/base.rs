use crate::ir::{Function, Module};
use crate::pass::error::TransformError;

/// What a pass run invalidates, read by the host pass manager to decide
/// whether to drop cached analyses. Mirrors LLVM's `PreservedAnalyses`
/// return convention, reduced to the two states this system's passes ever
/// produce: nothing changed, or assume everything is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedAnalyses {
    All,
    None,
}

/// How `run_annotated` reacts to a function-level `TransformError`. Spec'd
/// in §7: a precondition violation is always logged, and then either
/// swallowed (move on to the next function — the default, since one
/// function's failure must never corrupt another) or re-raised to the
/// caller, per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    Swallow,
    Reraise,
}

/// The reusable function-level pass skeleton (C3), replacing the original's
/// "inherit a template base class specialized by annotation name" pattern
/// with a higher-order function over a closure, per spec.md §9's redesign
/// note. Runs `transform` on every function in `module` that carries the
/// annotation `A`, leaving every other function untouched.
pub fn run_annotated<F>(
    pass_name: &'static str,
    annotation: &str,
    module: &mut Module,
    on_error: OnError,
    mut transform: F,
) -> Result<PreservedAnalyses, TransformError>
where
    F: FnMut(&mut Function) -> Result<(), TransformError>,
{
    let mut changed = false;

    for func in &mut module.functions {
        let Some(meta) = func.metadata.get("annotation") else {
            continue;
        };
        if !meta.contains(annotation) {
            continue;
        }

        match transform(func) {
            Ok(()) => {
                changed = true;
                log::info!("[{pass_name}] transformed `{}`", func.name);
            }
            Err(err) => {
                log::warn!("[{pass_name}] {err}");
                if on_error == OnError::Reraise {
                    return Err(err);
                }
            }
        }
    }

    Ok(if changed {
        PreservedAnalyses::None
    } else {
        PreservedAnalyses::All
    })
}
