use std::collections::HashMap;

use crate::ir::clone::{demote_phi_to_stack, demote_to_stack};
use crate::ir::{BlockId, Constant, Function, ICmpPred, InstKind, Module, SwitchCase, Type, Value, ValueId};
use crate::pass::base::{run_annotated, OnError, PreservedAnalyses};
use crate::pass::error::TransformError;

pub const PASS_NAME: &str = "flatten";
const ANNOTATION: &str = "flatten";

/// Serializes a function's control-flow graph into a single dispatch loop:
/// one `caseVar` stack slot selects, on each iteration, which original
/// block runs next. Grounded on `FlattenCFG.cpp`'s `loopStart`/`loopEnd`/
/// `defaultSwitchBlock` construction (spec.md §4.5); the historical dead
/// code paths that re-split the entry block a second time and hardcode
/// block names like `"if-else_1"` are debug scaffolding the original left
/// behind and are not reproduced here (spec.md §9).
pub fn run(module: &mut Module) -> Result<PreservedAnalyses, TransformError> {
    run_annotated(PASS_NAME, ANNOTATION, module, OnError::Swallow, rewrite_function)
}

fn const_i32(v: i64) -> Value {
    Value::Const(Constant::Int(Type::I32, v as i128))
}

fn insert_before_term(func: &mut Function, block: BlockId, ty: Type, kind: InstKind) -> ValueId {
    let pos = func.block(block).insts.len() - 1;
    func.insert_inst_at(block, pos, ty, kind)
}

fn has_invoke(func: &Function) -> bool {
    func.block_order
        .iter()
        .any(|&b| matches!(func.inst(func.block(b).terminator_id().expect("well-formed block")).kind, InstKind::Invoke { .. }))
}

/// Step 3: if `entry` ends in a conditional branch or switch, move its
/// terminator (and the single instruction feeding its condition, if any)
/// into a fresh successor block, leaving `entry` ending in an unconditional
/// branch. Returns `entry`'s resulting sole successor, `S0`.
fn split_entry_if_needed(func: &mut Function, entry: BlockId) -> Result<BlockId, TransformError> {
    let term_id = func.block(entry).terminator_id().expect("well-formed block");
    match func.inst(term_id).kind.clone() {
        InstKind::Br { target } => Ok(target),
        InstKind::CondBr { .. } | InstKind::Switch { .. } => {
            let insts = func.block(entry).insts.clone();
            let term_index = insts.len() - 1;
            let split_at = term_index.saturating_sub(1);
            let moved: Vec<ValueId> = insts[split_at..].to_vec();

            let split_name = func.block(entry).name.clone().map(|n| format!("{n}.split"));
            let new_block = func.append_block(split_name);
            func.block_mut(entry).insts.retain(|id| !moved.contains(id));
            for &id in &moved {
                func.block_mut(new_block).push(id);
            }
            func.push_inst(entry, Type::Void, InstKind::Br { target: new_block });
            Ok(new_block)
        }
        _ => Err(TransformError::UnknownTerminator {
            pass: PASS_NAME,
            function: func.name.clone(),
        }),
    }
}

fn rewrite_function(func: &mut Function) -> Result<(), TransformError> {
    if func.block_order.len() < 2 {
        return Ok(());
    }
    if has_invoke(func) {
        return Err(TransformError::UnsupportedExceptionEdges {
            pass: PASS_NAME,
            function: func.name.clone(),
        });
    }

    let entry = func.entry_block().expect("checked len >= 2 above");
    let s0 = split_entry_if_needed(func, entry)?;

    let loop_start = func.append_block(Some("loopStart".to_string()));
    let default_switch_block = func.append_block(Some("defaultSwitchBlock".to_string()));
    let loop_end = func.append_block(Some("loopEnd".to_string()));

    let case_var = func.insert_inst_at(entry, 0, Type::Ptr, InstKind::Alloca { allocated_ty: Type::I32 });
    let case_var = Value::Inst(case_var);

    let remaining: Vec<BlockId> = func
        .block_order
        .iter()
        .copied()
        .filter(|&b| b != entry && b != loop_start && b != default_switch_block && b != loop_end)
        .collect();
    let case_index: HashMap<BlockId, i64> = remaining.iter().enumerate().map(|(i, &b)| (b, i as i64)).collect();

    // Step 7: initialize caseVar to S0's index before entry's (still br-S0) terminator.
    insert_before_term(
        func,
        entry,
        Type::Void,
        InstKind::Store {
            ptr: case_var.clone(),
            value: const_i32(case_index[&s0]),
        },
    );
    let entry_term = func.block(entry).terminator_id().expect("well-formed block");
    func.inst_mut(entry_term).kind = InstKind::Br { target: loop_start };

    // Steps 5-6: the dispatch loop itself.
    let loaded = func.push_inst(loop_start, Type::I32, InstKind::Load { ptr: case_var.clone() });
    let cases: Vec<SwitchCase> = {
        let mut entries: Vec<(BlockId, i64)> = case_index.iter().map(|(&b, &i)| (b, i)).collect();
        entries.sort_by_key(|(_, i)| *i);
        entries
            .into_iter()
            .map(|(b, i)| SwitchCase { value: i as i128, target: b })
            .collect()
    };
    func.push_inst(
        loop_start,
        Type::Void,
        InstKind::Switch {
            cond: Value::Inst(loaded),
            default: default_switch_block,
            cases,
        },
    );
    func.push_inst(default_switch_block, Type::Void, InstKind::Br { target: loop_end });
    func.push_inst(loop_end, Type::Void, InstKind::Br { target: loop_start });

    // Step 8-9: rewrite each original block's terminator effect on caseVar.
    for &b in &remaining {
        rewrite_block_terminator(func, b, &case_var, &case_index, loop_end)?;
    }

    // Step 11: phi nodes must go before the generic cross-block demotion,
    // since their incoming-block references are only valid while those
    // blocks' identities are untouched (their terminators were mutated in
    // place above, never replaced).
    for phi in func.phi_nodes() {
        demote_phi_to_stack(func, phi);
    }

    // Step 10: any remaining value used outside its defining block.
    for value in func.values_used_outside_their_block() {
        demote_to_stack(func, value);
    }

    Ok(())
}

fn rewrite_block_terminator(
    func: &mut Function,
    block: BlockId,
    case_var: &Value,
    case_index: &HashMap<BlockId, i64>,
    loop_end: BlockId,
) -> Result<(), TransformError> {
    let term_id = func.block(block).terminator_id().expect("well-formed block");
    let kind = func.inst(term_id).kind.clone();

    match kind {
        InstKind::Ret { .. } => {
            // Exits the loop and the function; caseVar and the terminator
            // itself are both left untouched.
        }
        InstKind::Br { target } => {
            insert_before_term(
                func,
                block,
                Type::Void,
                InstKind::Store {
                    ptr: case_var.clone(),
                    value: const_i32(case_index[&target]),
                },
            );
            func.inst_mut(term_id).kind = InstKind::Br { target: loop_end };
        }
        InstKind::CondBr { cond, then_blk, else_blk } => {
            let sel = insert_before_term(
                func,
                block,
                Type::I32,
                InstKind::Select {
                    cond,
                    if_true: const_i32(case_index[&then_blk]),
                    if_false: const_i32(case_index[&else_blk]),
                },
            );
            insert_before_term(
                func,
                block,
                Type::Void,
                InstKind::Store {
                    ptr: case_var.clone(),
                    value: Value::Inst(sel),
                },
            );
            func.inst_mut(term_id).kind = InstKind::Br { target: loop_end };
        }
        InstKind::Switch { cond, default, cases } => {
            insert_before_term(
                func,
                block,
                Type::Void,
                InstKind::Store {
                    ptr: case_var.clone(),
                    value: const_i32(case_index[&default]),
                },
            );
            // Case values in a well-formed switch are distinct, so later
            // matches can never override an earlier true match; textual
            // order is otherwise unobservable.
            for case in &cases {
                let loaded = insert_before_term(func, block, Type::I32, InstKind::Load { ptr: case_var.clone() });
                let eq = insert_before_term(
                    func,
                    block,
                    Type::I1,
                    InstKind::ICmp {
                        pred: ICmpPred::Eq,
                        lhs: cond.clone(),
                        rhs: Value::Const(Constant::Int(Type::I32, case.value)),
                    },
                );
                let sel = insert_before_term(
                    func,
                    block,
                    Type::I32,
                    InstKind::Select {
                        cond: Value::Inst(eq),
                        if_true: const_i32(case_index[&case.target]),
                        if_false: Value::Inst(loaded),
                    },
                );
                insert_before_term(
                    func,
                    block,
                    Type::Void,
                    InstKind::Store {
                        ptr: case_var.clone(),
                        value: Value::Inst(sel),
                    },
                );
            }
            func.inst_mut(term_id).kind = InstKind::Br { target: loop_end };
        }
        _ => {
            return Err(TransformError::UnknownTerminator {
                pass: PASS_NAME,
                function: func.name.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, IrBuilder, Linkage, Signature};

    /// `case 11 -> n%11; case 22 -> n%202; case 33 -> 999; default -> 888`,
    /// matching spec.md §8 scenario 2. The IR has no remainder opcode, but
    /// a switch only ever enters `c11`/`c22` when `n` equals that exact
    /// case value, so `n%11` collapses to the constant `n - 11` there and
    /// `n%202` (22 < 202) collapses to plain `n` — `Sub`, not a stand-in
    /// op, reproduces the scenario's literal outputs for every input that
    /// can actually reach these blocks.
    fn build_switch_fn() -> Function {
        let mut f = Function::new("f", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
        let entry = f.append_block(Some("entry".to_string()));
        let c11 = f.append_block(Some("c11".to_string()));
        let c22 = f.append_block(Some("c22".to_string()));
        let c33 = f.append_block(Some("c33".to_string()));
        let default = f.append_block(Some("default".to_string()));

        {
            let mut b = IrBuilder::new(&mut f, entry);
            b.switch(
                Value::Param(0),
                default,
                vec![
                    SwitchCase { value: 11, target: c11 },
                    SwitchCase { value: 22, target: c22 },
                    SwitchCase { value: 33, target: c33 },
                ],
            );
        }
        {
            let mut b = IrBuilder::new(&mut f, c11);
            let rem = b.binop(BinOp::Sub, Type::I32, Value::Param(0), const_i32(11));
            b.ret(Some(rem));
        }
        {
            let mut b = IrBuilder::new(&mut f, c22);
            b.ret(Some(Value::Param(0)));
        }
        {
            let mut b = IrBuilder::new(&mut f, c33);
            b.ret(Some(const_i32(999)));
        }
        {
            let mut b = IrBuilder::new(&mut f, default);
            b.ret(Some(const_i32(888)));
        }
        f
    }

    #[test]
    fn flattens_into_a_single_backward_edge() {
        let mut f = build_switch_fn();
        rewrite_function(&mut f).unwrap();

        assert!(f.verify().is_ok());
        assert!(f.phi_nodes().is_empty());

        // Exactly one block (loopEnd) branches back to an earlier block
        // (loopStart), closing the dispatch loop.
        let loop_start = f.blocks_in_order().find(|b| b.name.as_deref() == Some("loopStart")).unwrap().id;
        let entry = f.entry_block().unwrap();
        // Among every block but the function's entry point (whose edge into
        // loopStart is the loop's forward entry, not a backward edge), only
        // loopEnd closes the cycle back to loopStart.
        let backward_edges = f
            .block_order
            .iter()
            .filter(|&&b| b != entry)
            .filter(|&&b| {
                let term = f.block(b).terminator_id().unwrap();
                matches!(&f.inst(term).kind, InstKind::Br { target } if *target == loop_start)
            })
            .count();
        assert_eq!(backward_edges, 1);

        // Check against spec.md §8 scenario 2's literal stated outputs, not
        // just before/after self-consistency.
        let mut module = Module::new();
        module.add_function(f);
        let mut memory = crate::interp::Memory::default();
        for (n, expected) in [(11, 0), (22, 22), (33, 999), (7, 888)] {
            let result = crate::interp::call(&module, "f", &[crate::interp::IVal::Int(n)], &mut memory);
            assert_eq!(result, Some(crate::interp::IVal::Int(expected)), "mismatch for n={n}");
        }
    }

    #[test]
    fn leaves_single_block_functions_untouched() {
        let mut f = Function::new("g", Signature::new(vec![], Type::Void), Linkage::Internal);
        let entry = f.append_block(Some("entry".to_string()));
        IrBuilder::new(&mut f, entry).ret_void();
        let before = f.clone();

        rewrite_function(&mut f).unwrap();

        assert_eq!(f.block_order, before.block_order);
    }

    #[test]
    fn refuses_functions_with_invoke() {
        let mut f = Function::new("h", Signature::new(vec![], Type::Void), Linkage::Internal);
        let entry = f.append_block(Some("entry".to_string()));
        let normal = f.append_block(Some("normal".to_string()));
        let unwind = f.append_block(Some("unwind".to_string()));
        f.push_inst(
            entry,
            Type::Void,
            InstKind::Invoke {
                callee: "might_throw".to_string(),
                args: vec![],
                normal,
                unwind,
            },
        );
        IrBuilder::new(&mut f, normal).ret_void();
        IrBuilder::new(&mut f, unwind).ret_void();

        let err = rewrite_function(&mut f).unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedExceptionEdges { .. }));
    }
}
