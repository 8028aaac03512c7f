use crate::ir::function::Function;

/// What an `llvm.global.annotations` entry points at, before the harvester
/// has tried to resolve it. LLVM's own pass does the same test
/// (`dyn_cast<Function>(value)`) since the annotated value can just as
/// well be a global variable or local — spec.md §4.1 step 4 requires that
/// case to be recognized and skipped, not conflated with "function not
/// found in this module".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationTarget {
    Function(String),
    Other(String),
}

/// An ordered set of functions plus the global annotation table.
///
/// `annotations` stands in for LLVM's `llvm.global.annotations` constant
/// array of `(value, string, file, line)` structs: spec.md §4.1 only ever
/// reads the first two fields (annotated value, annotation string), so
/// this crate models exactly that projection rather than the full constant
/// expression machinery needed to serialize the real global. Each entry is
/// `(AnnotationTarget, annotation_string)`, order-preserving, duplicates
/// allowed — the harvester (C2) consumes this list and function-merge (C7)
/// deletes entries from it as functions are erased.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub annotations: Vec<(AnnotationTarget, String)>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, f: Function) -> usize {
        self.functions.push(f);
        self.functions.len() - 1
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Annotates `function` with `annotation` in the global table (helper
    /// for building test/demo modules; a real front end would emit this as
    /// part of lowering the source-level annotation attribute).
    pub fn annotate(&mut self, function: impl Into<String>, annotation: impl Into<String>) {
        self.annotations.push((AnnotationTarget::Function(function.into()), annotation.into()));
    }

    /// Annotates a non-function global or local identifier — the spec.md
    /// §4.1 step 4 case the harvester must recognize and skip without
    /// attaching metadata or raising an error (helper for building
    /// test/demo modules, mirroring `annotate`).
    pub fn annotate_other(&mut self, target: impl Into<String>, annotation: impl Into<String>) {
        self.annotations.push((AnnotationTarget::Other(target.into()), annotation.into()));
    }

    /// Removes every annotation-table entry for `function`, used by
    /// function-merge when it erases a fully-inlined original (spec.md
    /// §4.6 step 6).
    pub fn remove_annotations_for(&mut self, function: &str) {
        self.annotations
            .retain(|(target, _)| !matches!(target, AnnotationTarget::Function(f) if f == function));
    }

    pub fn remove_function(&mut self, name: &str) {
        self.functions.retain(|f| f.name != name);
    }
}
