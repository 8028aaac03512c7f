use crate::ir::{AnnotationTarget, MetadataNode, Module};
use crate::pass::base::PreservedAnalyses;

pub const PASS_NAME: &str = "annotation";

/// Reads `Module::annotations` — the stand-in for `llvm.global.annotations`
/// (see `ir::module` doc comment) — and attaches a `"annotation"` metadata
/// node to every function it names, listing (order-preserving, duplicates
/// allowed) every annotation string targeting it.
///
/// Grounded on `AnnotationHarvester.cpp`'s scan of the annotation global's
/// initializer, minus the pointer-cast bookkeeping the real constant-array
/// representation requires (spec.md §4.1 steps 2-3 collapse away once the
/// annotated value is already a function name and the string already a
/// plain `String`). A target that isn't a function — spec.md §4.1 step 4,
/// `Annotation.cpp`'s `dyn_cast<Function>` failure branch — is distinct
/// from a function name this module simply doesn't contain: it produces
/// neither metadata nor an error, only the original's own `"No
/// annotation: <name>"` diagnostic.
pub fn run(module: &mut Module) -> PreservedAnalyses {
    let mut changed = false;

    for (target, annotation) in module.annotations.clone() {
        let function_name = match target {
            AnnotationTarget::Function(name) => name,
            AnnotationTarget::Other(name) => {
                log::info!("[{PASS_NAME}] No annotation: {name}");
                continue;
            }
        };
        let Some(func) = module.function_mut(&function_name) else {
            log::warn!("[{PASS_NAME}] annotation targets unknown function `{function_name}`, skipping");
            continue;
        };
        func.metadata
            .entry("annotation")
            .or_insert_with(MetadataNode::new)
            .push(annotation);
        changed = true;
    }

    if changed {
        PreservedAnalyses::None
    } else {
        PreservedAnalyses::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Linkage, Signature, Type};

    #[test]
    fn harvests_multiple_annotations_in_encounter_order() {
        let mut module = Module::new();
        module.add_function(Function::new("f", Signature::new(vec![], Type::Void), Linkage::Internal));
        module.annotate("f", "flatten");
        module.annotate("f", "mba");

        run(&mut module);

        let meta = module.function("f").unwrap().metadata.get("annotation").unwrap();
        assert_eq!(meta.0, vec!["flatten".to_string(), "mba".to_string()]);
    }

    #[test]
    fn unknown_target_is_skipped_without_panicking() {
        let mut module = Module::new();
        module.annotate("ghost", "mba");
        let result = run(&mut module);
        assert_eq!(result, PreservedAnalyses::All);
    }

    #[test]
    fn non_function_target_produces_no_metadata_and_no_error() {
        let mut module = Module::new();
        module.add_function(Function::new("f", Signature::new(vec![], Type::Void), Linkage::Internal));
        module.annotate_other("some_global", "mba");

        let result = run(&mut module);

        assert_eq!(result, PreservedAnalyses::All);
        assert!(!module.function("f").unwrap().metadata.contains_key("annotation"));
    }
}
