use num_enum::TryFromPrimitive;

use crate::ir::ty::Type;
use crate::ir::value::{BlockId, Value, ValueId};

/// Opcode discriminant, readable back from a `u8` the way the teacher's
/// `BlockId`/`AttrKind` enums are (`num_enum::TryFromPrimitive`). Not load
/// bearing for any encoding here — kept because every instruction kind in
/// this system is drawn from this fixed, numbered set, and pattern-matching
/// against a stable discriminant (rather than the full `InstKind` shape) is
/// how the MBA/flatten passes classify instructions cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Load = 0,
    Store = 1,
    Alloca = 2,
    BinOp = 3,
    ICmp = 4,
    Select = 5,
    Ext = 6,
    Br = 7,
    CondBr = 8,
    Switch = 9,
    Ret = 10,
    Unreachable = 11,
    Call = 12,
    Invoke = 13,
    Phi = 14,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ICmpPred {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
    Ugt,
    Uge,
    Ult,
    Ule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtKind {
    Zext,
    Sext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: i128,
    pub target: BlockId,
}

/// An instruction's behavior. Every block's last instruction must be one of
/// the terminator variants (`Br`, `CondBr`, `Switch`, `Ret`, `Unreachable`);
/// `Instruction::is_terminator` is the single source of truth for that.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    Load {
        ptr: Value,
    },
    Store {
        ptr: Value,
        value: Value,
    },
    Alloca {
        allocated_ty: Type,
    },
    BinOp {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: ICmpPred,
        lhs: Value,
        rhs: Value,
    },
    Select {
        cond: Value,
        if_true: Value,
        if_false: Value,
    },
    Ext {
        kind: ExtKind,
        value: Value,
        to: Type,
    },
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Value,
        then_blk: BlockId,
        else_blk: BlockId,
    },
    Switch {
        cond: Value,
        default: BlockId,
        cases: Vec<SwitchCase>,
    },
    Ret {
        value: Option<Value>,
    },
    Unreachable,
    Call {
        callee: String,
        args: Vec<Value>,
    },
    /// Exception-carrying call. Never interpreted; exists so flatten and
    /// function-merge can detect and refuse/special-case it per spec.
    Invoke {
        callee: String,
        args: Vec<Value>,
        normal: BlockId,
        unwind: BlockId,
    },
    Phi {
        incoming: Vec<(BlockId, Value)>,
    },
}

impl InstKind {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            InstKind::Load { .. } => Opcode::Load,
            InstKind::Store { .. } => Opcode::Store,
            InstKind::Alloca { .. } => Opcode::Alloca,
            InstKind::BinOp { .. } => Opcode::BinOp,
            InstKind::ICmp { .. } => Opcode::ICmp,
            InstKind::Select { .. } => Opcode::Select,
            InstKind::Ext { .. } => Opcode::Ext,
            InstKind::Br { .. } => Opcode::Br,
            InstKind::CondBr { .. } => Opcode::CondBr,
            InstKind::Switch { .. } => Opcode::Switch,
            InstKind::Ret { .. } => Opcode::Ret,
            InstKind::Unreachable => Opcode::Unreachable,
            InstKind::Call { .. } => Opcode::Call,
            InstKind::Invoke { .. } => Opcode::Invoke,
            InstKind::Phi { .. } => Opcode::Phi,
        }
    }

    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Switch { .. }
                | InstKind::Ret { .. }
                | InstKind::Unreachable
                | InstKind::Invoke { .. }
        )
    }

    /// Successor blocks of a terminator, in textual order. Empty for `Ret`
    /// and `Unreachable`.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Br { target } => vec![*target],
            InstKind::CondBr {
                then_blk, else_blk, ..
            } => vec![*then_blk, *else_blk],
            InstKind::Switch {
                default, cases, ..
            } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|c| c.target));
                out
            }
            InstKind::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            _ => Vec::new(),
        }
    }

    /// All `Value` operands this instruction reads, in textual order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { ptr, value } => vec![ptr, value],
            InstKind::Alloca { .. } => vec![],
            InstKind::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            InstKind::Ext { value, .. } => vec![value],
            InstKind::Br { .. } => vec![],
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Switch { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter().collect(),
            InstKind::Unreachable => vec![],
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Invoke { args, .. } => args.iter().collect(),
            InstKind::Phi { incoming } => incoming.iter().map(|(_, v)| v).collect(),
        }
    }

    /// Mutable access to operands, for in-place rewrites (MBA's
    /// replace-and-delete, bogus-switch's store-value rewrite).
    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Load { ptr } => vec![ptr],
            InstKind::Store { ptr, value } => vec![ptr, value],
            InstKind::Alloca { .. } => vec![],
            InstKind::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::ICmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => vec![cond, if_true, if_false],
            InstKind::Ext { value, .. } => vec![value],
            InstKind::Br { .. } => vec![],
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Switch { cond, .. } => vec![cond],
            InstKind::Ret { value } => value.iter_mut().collect(),
            InstKind::Unreachable => vec![],
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Invoke { args, .. } => args.iter_mut().collect(),
            InstKind::Phi { incoming } => incoming.iter_mut().map(|(_, v)| v).collect(),
        }
    }
}

/// A single instruction: its SSA identity, result type, and behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub id: ValueId,
    pub ty: Type,
    pub kind: InstKind,
}

impl Instruction {
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.kind.is_terminator()
    }
}
