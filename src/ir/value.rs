use std::fmt;

use crate::ir::constant::Constant;

/// Identifies a basic block within a function, stable across cloning within
/// the same clone operation (remapped through a `ValueMap`, never reused
/// across functions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Identifies an instruction's SSA result within a function's value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Anything an instruction operand can refer to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A function parameter, by index.
    Param(u32),
    /// The result of a previously-defined instruction.
    Inst(ValueId),
    /// A compile-time constant.
    Const(Constant),
    /// A reference to another global (function or data) by name.
    GlobalRef(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Param(i) => write!(f, "arg{i}"),
            Value::Inst(id) => write!(f, "{id}"),
            Value::Const(c) => write!(f, "{c}"),
            Value::GlobalRef(name) => write!(f, "@{name}"),
        }
    }
}
