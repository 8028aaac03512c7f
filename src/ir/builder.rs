use crate::ir::function::Function;
use crate::ir::inst::{BinOp, ExtKind, ICmpPred, InstKind, SwitchCase};
use crate::ir::ty::Type;
use crate::ir::value::{BlockId, Value, ValueId};

/// Insertion-point scoped instruction emission, the Rust analogue of the
/// original passes' `IRBuilder<>` (every one of `insertXsgtZeroMBA`,
/// `generateSwitchLoop`, `addCase`, … in `examples/original_source` uses
/// one). Instructions are always appended at the end of the current block;
/// passes that need to insert before an existing terminator remove and
/// re-append it, matching the `builder.SetInsertPoint(terminator)` +
/// `CreateX` pattern where the original first erases the terminator.
pub struct IrBuilder<'f> {
    func: &'f mut Function,
    block: BlockId,
}

impl<'f> IrBuilder<'f> {
    pub fn new(func: &'f mut Function, block: BlockId) -> Self {
        Self { func, block }
    }

    pub fn move_to(&mut self, block: BlockId) {
        self.block = block;
    }

    fn push(&mut self, ty: Type, kind: InstKind) -> Value {
        let id = self.func.push_inst(self.block, ty, kind);
        Value::Inst(id)
    }

    pub fn const_i32(&self, v: i32) -> Value {
        Value::Const(crate::ir::constant::Constant::Int(Type::I32, v as i128))
    }

    pub fn const_int(&self, ty: Type, v: i128) -> Value {
        Value::Const(crate::ir::constant::Constant::Int(ty, v))
    }

    pub fn alloca(&mut self, allocated_ty: Type) -> Value {
        self.push(Type::Ptr, InstKind::Alloca { allocated_ty })
    }

    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.push(ty, InstKind::Load { ptr })
    }

    pub fn store(&mut self, ptr: Value, value: Value) -> ValueId {
        let v = self.push(Type::Void, InstKind::Store { ptr, value });
        match v {
            Value::Inst(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn binop(&mut self, op: BinOp, ty: Type, lhs: Value, rhs: Value) -> Value {
        self.push(ty, InstKind::BinOp { op, lhs, rhs })
    }

    pub fn icmp(&mut self, pred: ICmpPred, lhs: Value, rhs: Value) -> Value {
        self.push(Type::I1, InstKind::ICmp { pred, lhs, rhs })
    }

    pub fn select(&mut self, ty: Type, cond: Value, if_true: Value, if_false: Value) -> Value {
        self.push(
            ty,
            InstKind::Select {
                cond,
                if_true,
                if_false,
            },
        )
    }

    pub fn ext(&mut self, kind: ExtKind, value: Value, to: Type) -> Value {
        self.push(to.clone(), InstKind::Ext { kind, value, to })
    }

    pub fn br(&mut self, target: BlockId) -> ValueId {
        match self.push(Type::Void, InstKind::Br { target }) {
            Value::Inst(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn cond_br(&mut self, cond: Value, then_blk: BlockId, else_blk: BlockId) -> ValueId {
        match self.push(
            Type::Void,
            InstKind::CondBr {
                cond,
                then_blk,
                else_blk,
            },
        ) {
            Value::Inst(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn switch(&mut self, cond: Value, default: BlockId, cases: Vec<SwitchCase>) -> ValueId {
        match self.push(
            Type::Void,
            InstKind::Switch {
                cond,
                default,
                cases,
            },
        ) {
            Value::Inst(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn ret(&mut self, value: Option<Value>) -> ValueId {
        match self.push(Type::Void, InstKind::Ret { value }) {
            Value::Inst(id) => id,
            _ => unreachable!(),
        }
    }

    pub fn ret_void(&mut self) -> ValueId {
        self.ret(None)
    }

    pub fn call(&mut self, ty: Type, callee: impl Into<String>, args: Vec<Value>) -> Value {
        self.push(
            ty,
            InstKind::Call {
                callee: callee.into(),
                args,
            },
        )
    }
}
