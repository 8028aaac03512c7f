//! Tiny tree-walking evaluator over [`crate::ir`], gated behind the
//! `interp` feature. Exists solely to let tests and `demos/run_pipeline.rs`
//! state spec.md §8's behavioral-equivalence properties ("the transformed
//! function produces the same observable trace as the original") as
//! executable assertions — it is never linked into the passes themselves,
//! mirroring how `cranelift-codegen`'s `testing_hooks` feature gates its own
//! reference tooling.
//!
//! Deliberately minimal: integer arithmetic and single-function-frame
//! pointers only, no floating point, no aggregates beyond what `Constant`
//! already models. `invoke` is refused rather than interpreted, per
//! spec.md §3's note that exception edges are out of scope.

use std::collections::HashMap;

use crate::ir::{BinOp, BlockId, Constant, ExtKind, Function, ICmpPred, InstKind, Module, Type, Value, ValueId};

/// A runtime value: either a plain integer (sign-extended to `i128` and
/// re-truncated to its declared width on every operation) or a pointer into
/// [`Memory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IVal {
    Int(i128),
    Ptr(usize),
}

impl IVal {
    fn as_int(self) -> i128 {
        match self {
            IVal::Int(v) => v,
            IVal::Ptr(p) => p as i128,
        }
    }

    fn as_ptr(self) -> usize {
        match self {
            IVal::Ptr(p) => p,
            IVal::Int(_) => panic!("interp: expected a pointer value"),
        }
    }
}

/// Flat store backing every `alloca`, shared across the call stack so a
/// pointer passed as an argument (function-merge's out-pointer, say) still
/// refers to the caller's slot.
#[derive(Debug, Default)]
pub struct Memory {
    slots: Vec<IVal>,
}

impl Memory {
    fn alloc(&mut self) -> usize {
        self.slots.push(IVal::Int(0));
        self.slots.len() - 1
    }
}

/// Truncates (and sign-extends) `v` to `width` bits, the interpreter's stand
/// in for LLVM's fixed-width integer semantics. `i1` is left unsigned: its
/// raw bit is the canonical boolean representation (matching `icmp`, which
/// never routes through here), and only an explicit `sext` turns that bit
/// into an all-ones value.
fn wrap(v: i128, width: u32) -> i128 {
    if width >= 128 {
        return v;
    }
    let mask = (1i128 << width) - 1;
    let masked = v & mask;
    if width > 1 && masked & (1i128 << (width - 1)) != 0 {
        masked - (1i128 << width)
    } else {
        masked
    }
}

fn unsigned(v: i128, width: u32) -> i128 {
    if width >= 128 {
        return v;
    }
    v & ((1i128 << width) - 1)
}

/// A single function activation: its instruction results and which block it
/// arrived at the current one from (needed to resolve `phi` incoming
/// values).
#[derive(Default)]
struct Frame {
    env: HashMap<ValueId, IVal>,
}

impl Frame {
    fn eval(&self, v: &Value, args: &[IVal]) -> IVal {
        match v {
            Value::Param(i) => args[*i as usize],
            Value::Inst(id) => *self.env.get(id).unwrap_or_else(|| panic!("interp: {id} used before defined")),
            Value::Const(Constant::Int(_, n)) => IVal::Int(*n),
            Value::Const(Constant::Null(_)) => IVal::Ptr(usize::MAX),
            Value::Const(Constant::Undef(_)) => IVal::Int(0),
            Value::Const(Constant::DataArray(_)) => panic!("interp: data arrays are not evaluable"),
            Value::GlobalRef(name) => panic!("interp: unresolved global reference `{name}`"),
        }
    }
}

/// Calls `name` in `module` with `args`, returning its result (`None` for a
/// void function). Panics on `invoke`, `unreachable`, or any terminator the
/// interpreter doesn't recognize — those are precondition violations the
/// passes themselves refuse to produce (spec.md §3).
pub fn call(module: &Module, name: &str, args: &[IVal], memory: &mut Memory) -> Option<IVal> {
    let func = module.function(name).unwrap_or_else(|| panic!("interp: unknown function `{name}`"));
    run(module, func, args, memory)
}

fn run(module: &Module, func: &Function, args: &[IVal], memory: &mut Memory) -> Option<IVal> {
    let mut frame = Frame::default();
    let mut block = func.entry_block().expect("interp: function has no entry block");
    let mut prev_block: Option<BlockId> = None;

    loop {
        let insts = func.block(block).insts.clone();
        let (body, term_id) = insts.split_at(insts.len() - 1);
        let term_id = term_id[0];

        for &id in body {
            let inst = func.inst(id);
            let result = eval_non_terminator(module, &frame, &inst.kind, &inst.ty, args, prev_block, memory);
            if let Some(v) = result {
                frame.env.insert(id, v);
            }
        }

        let term = func.inst(term_id);
        match &term.kind {
            InstKind::Ret { value } => {
                return value.as_ref().map(|v| frame.eval(v, args));
            }
            InstKind::Br { target } => {
                prev_block = Some(block);
                block = *target;
            }
            InstKind::CondBr { cond, then_blk, else_blk } => {
                let taken = frame.eval(cond, args).as_int() != 0;
                prev_block = Some(block);
                block = if taken { *then_blk } else { *else_blk };
            }
            InstKind::Switch { cond, default, cases } => {
                let v = frame.eval(cond, args).as_int();
                let target = cases.iter().find(|c| c.value == v).map(|c| c.target).unwrap_or(*default);
                prev_block = Some(block);
                block = target;
            }
            InstKind::Unreachable => panic!("interp: reached an `unreachable` instruction"),
            InstKind::Invoke { .. } => panic!("interp: `invoke` is not supported"),
            other => panic!("interp: unsupported terminator {:?}", other.opcode()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_non_terminator(
    module: &Module,
    frame: &Frame,
    kind: &InstKind,
    ty: &Type,
    args: &[IVal],
    prev_block: Option<BlockId>,
    memory: &mut Memory,
) -> Option<IVal> {
    let width = ty.int_width().unwrap_or(32);
    match kind {
        InstKind::Alloca { .. } => Some(IVal::Ptr(memory.alloc())),
        InstKind::Load { ptr } => {
            let addr = frame.eval(ptr, args).as_ptr();
            Some(memory.slots[addr])
        }
        InstKind::Store { ptr, value } => {
            let addr = frame.eval(ptr, args).as_ptr();
            let v = frame.eval(value, args);
            memory.slots[addr] = v;
            None
        }
        InstKind::BinOp { op, lhs, rhs } => {
            let a = frame.eval(lhs, args).as_int();
            let b = frame.eval(rhs, args).as_int();
            let r = match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Sub => a.wrapping_sub(b),
                BinOp::And => a & b,
                BinOp::Or => a | b,
                BinOp::Xor => a ^ b,
                BinOp::Shl => a.wrapping_shl(b as u32),
                BinOp::Lshr => unsigned(a, width) >> (b as u32).min(width.saturating_sub(1)),
                BinOp::Ashr => a >> (b as u32).min(width.saturating_sub(1)),
            };
            Some(IVal::Int(wrap(r, width)))
        }
        InstKind::ICmp { pred, lhs, rhs } => {
            let a = frame.eval(lhs, args).as_int();
            let b = frame.eval(rhs, args).as_int();
            let op_width = 32;
            let (ua, ub) = (unsigned(a, op_width), unsigned(b, op_width));
            let result = match pred {
                ICmpPred::Eq => a == b,
                ICmpPred::Ne => a != b,
                ICmpPred::Sgt => a > b,
                ICmpPred::Sge => a >= b,
                ICmpPred::Slt => a < b,
                ICmpPred::Sle => a <= b,
                ICmpPred::Ugt => ua > ub,
                ICmpPred::Uge => ua >= ub,
                ICmpPred::Ult => ua < ub,
                ICmpPred::Ule => ua <= ub,
            };
            Some(IVal::Int(result as i128))
        }
        InstKind::Select { cond, if_true, if_false } => {
            let c = frame.eval(cond, args).as_int() != 0;
            Some(if c { frame.eval(if_true, args) } else { frame.eval(if_false, args) })
        }
        InstKind::Ext { kind, value, to } => {
            let v = frame.eval(value, args).as_int();
            let to_width = to.int_width().unwrap_or(32);
            Some(IVal::Int(match kind {
                ExtKind::Zext => unsigned(v, to_width),
                ExtKind::Sext => wrap(v, to_width),
            }))
        }
        InstKind::Call { callee, args: call_args } => {
            let evaluated: Vec<IVal> = call_args.iter().map(|a| frame.eval(a, args)).collect();
            call(module, callee, &evaluated, memory)
        }
        InstKind::Phi { incoming } => {
            let pred = prev_block.expect("interp: phi reached with no predecessor recorded");
            let (_, v) = incoming
                .iter()
                .find(|(b, _)| *b == pred)
                .unwrap_or_else(|| panic!("interp: phi has no incoming value for {pred}"));
            Some(frame.eval(v, args))
        }
        other => panic!("interp: unsupported instruction {:?}", other.opcode()),
    }
}
