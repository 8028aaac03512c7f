//! SSA IR control-flow and arithmetic obfuscation passes.
//!
//! Consumes a small, self-contained model of a typed SSA intermediate
//! representation (`ir`) and exposes the annotation harvester plus the four
//! obfuscating transformations (`pass`) that rewrite it in place: control-flow
//! flattening, bogus switch inflation, function merging, and mixed
//! boolean-arithmetic substitution. A host front end/back end and pass
//! manager are assumed external; this crate only does the IR-rewriting.

/// The IR every pass operates over: functions, basic blocks, instructions,
/// types, constants, plus the builder and clone/remap helpers passes share.
pub mod ir;
/// The annotation harvester, the annotation-dispatching skeleton it's built
/// on, and the four function/module-level obfuscating transformations.
pub mod pass;
/// Maps a pass name to a constructor, standing in for the host's plug-in
/// registration ABI.
pub mod registry;
/// Seeded pseudo-random source threaded through the passes that pick a
/// substitution or fraction at random.
pub mod rng;

/// A tiny tree-walking evaluator over the IR, used only by tests and the
/// `run_pipeline` demo to check that a transformation preserved a function's
/// observable behavior. Never linked into the passes themselves.
#[cfg(feature = "interp")]
pub mod interp;

pub use ir::Module;
pub use pass::TransformError;
