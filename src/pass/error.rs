/// Errors a pass can raise while transforming a function. Sum-typed via
/// `thiserror`, the way sibling crates in this pack (`cranelift-codegen`'s
/// `CodegenError`, `wasmtime`'s `Trap`) model fallible compiler-internal
/// operations, replacing the original passes' C++ exceptions thrown out of
/// `report_fatal_error`.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{pass}: exception edges not supported in `{function}`")]
    UnsupportedExceptionEdges { pass: &'static str, function: String },

    #[error("{pass}: unknown terminator kind in `{function}`")]
    UnknownTerminator { pass: &'static str, function: String },

    #[error("{pass}: unsupported integer width in `{function}`")]
    UnsupportedIntWidth { pass: &'static str, function: String },
}
