use std::collections::HashMap;

use crate::ir::function::Function;
use crate::ir::inst::{InstKind, SwitchCase};
use crate::ir::value::{BlockId, Value, ValueId};

/// Maps old `ValueId`s to their replacement `Value` in a clone. Mirrors the
/// original passes' `ValueToValueMapTy` argument to `CloneBasicBlock`/
/// `RemapInstruction`. A lookup miss leaves the operand unchanged, the
/// `RF_IgnoreMissingLocals` behavior: an operand the map doesn't mention is
/// assumed to be shared with the original (an entry-block alloca, a global),
/// not something that needs remapping.
pub type ValueMap = HashMap<ValueId, Value>;
pub type BlockMap = HashMap<BlockId, BlockId>;

fn remap_value(v: &Value, vmap: &ValueMap) -> Value {
    match v {
        Value::Inst(id) => vmap.get(id).cloned().unwrap_or_else(|| v.clone()),
        _ => v.clone(),
    }
}

fn remap_block(b: BlockId, bmap: &BlockMap) -> BlockId {
    bmap.get(&b).copied().unwrap_or(b)
}

/// Rebuilds an `InstKind` with every `Value`/`BlockId` operand passed
/// through `vmap`/`bmap`. The one remapping primitive both `clone_block` and
/// `clone_function_body` build on.
pub fn remap_kind(kind: &InstKind, vmap: &ValueMap, bmap: &BlockMap) -> InstKind {
    match kind {
        InstKind::Load { ptr } => InstKind::Load {
            ptr: remap_value(ptr, vmap),
        },
        InstKind::Store { ptr, value } => InstKind::Store {
            ptr: remap_value(ptr, vmap),
            value: remap_value(value, vmap),
        },
        InstKind::Alloca { allocated_ty } => InstKind::Alloca {
            allocated_ty: allocated_ty.clone(),
        },
        InstKind::BinOp { op, lhs, rhs } => InstKind::BinOp {
            op: *op,
            lhs: remap_value(lhs, vmap),
            rhs: remap_value(rhs, vmap),
        },
        InstKind::ICmp { pred, lhs, rhs } => InstKind::ICmp {
            pred: *pred,
            lhs: remap_value(lhs, vmap),
            rhs: remap_value(rhs, vmap),
        },
        InstKind::Select {
            cond,
            if_true,
            if_false,
        } => InstKind::Select {
            cond: remap_value(cond, vmap),
            if_true: remap_value(if_true, vmap),
            if_false: remap_value(if_false, vmap),
        },
        InstKind::Ext { kind, value, to } => InstKind::Ext {
            kind: *kind,
            value: remap_value(value, vmap),
            to: to.clone(),
        },
        InstKind::Br { target } => InstKind::Br {
            target: remap_block(*target, bmap),
        },
        InstKind::CondBr {
            cond,
            then_blk,
            else_blk,
        } => InstKind::CondBr {
            cond: remap_value(cond, vmap),
            then_blk: remap_block(*then_blk, bmap),
            else_blk: remap_block(*else_blk, bmap),
        },
        InstKind::Switch {
            cond,
            default,
            cases,
        } => InstKind::Switch {
            cond: remap_value(cond, vmap),
            default: remap_block(*default, bmap),
            cases: cases
                .iter()
                .map(|c| SwitchCase {
                    value: c.value,
                    target: remap_block(c.target, bmap),
                })
                .collect(),
        },
        InstKind::Ret { value } => InstKind::Ret {
            value: value.as_ref().map(|v| remap_value(v, vmap)),
        },
        InstKind::Unreachable => InstKind::Unreachable,
        InstKind::Call { callee, args } => InstKind::Call {
            callee: callee.clone(),
            args: args.iter().map(|a| remap_value(a, vmap)).collect(),
        },
        InstKind::Invoke {
            callee,
            args,
            normal,
            unwind,
        } => InstKind::Invoke {
            callee: callee.clone(),
            args: args.iter().map(|a| remap_value(a, vmap)).collect(),
            normal: remap_block(*normal, bmap),
            unwind: remap_block(*unwind, bmap),
        },
        InstKind::Phi { incoming } => InstKind::Phi {
            incoming: incoming
                .iter()
                .map(|(b, v)| (remap_block(*b, bmap), remap_value(v, vmap)))
                .collect(),
        },
    }
}

/// Clones a single block's instructions into a fresh sibling block of the
/// *same* function, remapping only references among the cloned
/// instructions themselves (the block's own successors and any reference to
/// a value defined elsewhere in the function are left untouched). This is
/// the shape bogus-switch (C5) needs: duplicate one switch-case target as a
/// twin that still falls through to the same successors.
///
/// Grounded on `CloneBasicBlock` + `RemapInstruction(..., RF_IgnoreMissingLocals)`
/// as used by `BogusSwitch.cpp` to materialize a cloned case block.
pub fn clone_block(func: &mut Function, src: BlockId, name_suffix: &str) -> (BlockId, ValueMap) {
    let src_insts: Vec<ValueId> = func.block(src).insts.clone();
    let src_name = func.block(src).name.clone();
    let new_name = src_name.map(|n| format!("{n}{name_suffix}"));
    let new_block = func.append_block(new_name);

    let bmap = BlockMap::new();
    let mut vmap = ValueMap::new();
    for &old_id in &src_insts {
        let inst = func.inst(old_id).clone();
        let new_kind = remap_kind(&inst.kind, &vmap, &bmap);
        let new_id = func.push_inst(new_block, inst.ty, new_kind);
        vmap.insert(old_id, Value::Inst(new_id));
    }
    (new_block, vmap)
}

/// Clones every block of `src` into `dst`, in layout order, remapping
/// operands with `vmap` (pre-seeded with the caller's parameter mapping) and
/// a freshly built block map. Two passes: first reserve every cloned
/// instruction's id so the second pass's remapping sees a complete map, so a
/// `phi` incoming from a not-yet-visited block (a loop back-edge) still
/// resolves. Returns the cloned entry block.
///
/// Grounded on `CloneFunctionInto`'s two-phase clone-then-remap shape, used
/// by `FunctionMerge.cpp` to fold an annotated function's body into the
/// shared dispatch function.
pub fn clone_function_body(dst: &mut Function, src: &Function, mut vmap: ValueMap) -> BlockId {
    let mut bmap = BlockMap::new();
    for &src_block in &src.block_order {
        let new_block = dst.append_block(src.block(src_block).name.clone());
        bmap.insert(src_block, new_block);
    }

    let mut id_map: HashMap<ValueId, ValueId> = HashMap::new();
    for &src_block in &src.block_order {
        for &src_id in &src.block(src_block).insts {
            let new_id = dst.reserve_value();
            id_map.insert(src_id, new_id);
            vmap.insert(src_id, Value::Inst(new_id));
        }
    }

    for &src_block in &src.block_order {
        let new_block = bmap[&src_block];
        for &src_id in &src.block(src_block).insts {
            let inst = src.inst(src_id);
            let new_kind = remap_kind(&inst.kind, &vmap, &bmap);
            let new_id = id_map[&src_id];
            dst.define_reserved(new_id, new_block, inst.ty.clone(), new_kind);
        }
    }

    bmap[&src
        .entry_block()
        .expect("function being cloned must have a body")]
}

/// Demotes a value with uses outside its defining block to a stack slot: an
/// `alloca` is created in the entry block, every def becomes a `store` right
/// after the original instruction, and every use becomes a fresh `load`
/// immediately before the using instruction. Returns the new alloca.
///
/// Grounded on `DemoteRegToStack`, which flatten (C6) and bogus-switch (C5)
/// both call on every value crossing their newly introduced block
/// boundaries (spec.md §4.5 step 10, §4.4's case-variable store rewrite
/// builds on the same stack-slot shape).
pub fn demote_to_stack(func: &mut Function, value: ValueId) -> ValueId {
    let entry = func.entry_block().expect("function must have an entry block");
    let ty = func.inst(value).ty.clone();
    let slot = func.insert_inst_at(entry, 0, crate::ir::ty::Type::Ptr, InstKind::Alloca { allocated_ty: ty.clone() });

    let def_block = func.block_of(value).expect("value must be defined somewhere");
    let def_index = func
        .block(def_block)
        .insts
        .iter()
        .position(|&id| id == value)
        .expect("value must be in its own defining block");
    func.insert_inst_at(
        def_block,
        def_index + 1,
        crate::ir::ty::Type::Void,
        InstKind::Store {
            ptr: Value::Inst(slot),
            value: Value::Inst(value),
        },
    );

    for &use_block in func.block_order.clone().iter() {
        if use_block == def_block {
            continue;
        }
        loop {
            let insts = func.block(use_block).insts.clone();
            let Some(use_index) = insts.iter().position(|&id| {
                func.inst(id)
                    .kind
                    .operands()
                    .iter()
                    .any(|op| **op == Value::Inst(value))
            }) else {
                break;
            };
            let load_id = func.insert_inst_at(use_block, use_index, ty.clone(), InstKind::Load { ptr: Value::Inst(slot) });
            for operand in func.inst_mut(insts[use_index]).kind.operands_mut() {
                if *operand == Value::Inst(value) {
                    *operand = Value::Inst(load_id);
                }
            }
        }
    }

    slot
}

/// Demotes a `phi` node to a stack slot per `DemotePHIToStack`: the slot is
/// stored to at the end of each incoming predecessor (before its
/// terminator) rather than right after the phi's own definition, and every
/// use of the phi's result is replaced with a load exactly as in
/// `demote_to_stack`.
pub fn demote_phi_to_stack(func: &mut Function, phi: ValueId) -> ValueId {
    let entry = func.entry_block().expect("function must have an entry block");
    let ty = func.inst(phi).ty.clone();
    let slot = func.insert_inst_at(entry, 0, crate::ir::ty::Type::Ptr, InstKind::Alloca { allocated_ty: ty.clone() });

    let InstKind::Phi { incoming } = func.inst(phi).kind.clone() else {
        panic!("demote_phi_to_stack called on a non-phi instruction");
    };
    for (pred, incoming_value) in incoming {
        let term_index = func.block(pred).insts.len() - 1;
        func.insert_inst_at(
            pred,
            term_index,
            crate::ir::ty::Type::Void,
            InstKind::Store {
                ptr: Value::Inst(slot),
                value: incoming_value,
            },
        );
    }

    let phi_block = func.block_of(phi).expect("phi must be defined somewhere");
    for &use_block in func.block_order.clone().iter() {
        loop {
            let insts = func.block(use_block).insts.clone();
            let Some(use_index) = insts.iter().position(|&id| {
                id != phi
                    && func
                        .inst(id)
                        .kind
                        .operands()
                        .iter()
                        .any(|op| **op == Value::Inst(phi))
            }) else {
                break;
            };
            let load_id = func.insert_inst_at(use_block, use_index, ty.clone(), InstKind::Load { ptr: Value::Inst(slot) });
            for operand in func.inst_mut(insts[use_index]).kind.operands_mut() {
                if *operand == Value::Inst(phi) {
                    *operand = Value::Inst(load_id);
                }
            }
        }
    }
    func.remove_inst(phi);
    let _ = phi_block;

    slot
}
