//! The SSA intermediate representation every pass in this crate operates
//! over: a small, arena-owned model of LLVM IR (functions, basic blocks,
//! instructions, types, constants) plus the builder and clone/remap helpers
//! the passes share.

pub mod block;
pub mod builder;
pub mod clone;
pub mod constant;
pub mod function;
pub mod inst;
pub mod metadata;
pub mod module;
pub mod ty;
pub mod value;

pub use block::BasicBlock;
pub use builder::IrBuilder;
pub use constant::Constant;
pub use function::{Function, FunctionAttrs, Linkage};
pub use inst::{BinOp, ExtKind, ICmpPred, InstKind, Instruction, Opcode, SwitchCase};
pub use metadata::MetadataNode;
pub use module::{AnnotationTarget, Module};
pub use ty::{Signature, Type};
pub use value::{BlockId, Value, ValueId};
