//! The function- and module-level transformations: annotation harvesting,
//! the annotation-dispatching skeleton they're built on, and the four
//! obfuscating rewrites (MBA, bogus switch, flatten, function merge).

pub mod annotation;
pub mod base;
pub mod bogus_switch;
pub mod error;
pub mod flatten;
pub mod function_merge;
pub mod mba;

pub use base::{run_annotated, OnError, PreservedAnalyses};
pub use error::TransformError;
