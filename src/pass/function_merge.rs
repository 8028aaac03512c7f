use crate::ir::clone::clone_function_body;
use crate::ir::clone::ValueMap;
use crate::ir::{
    BlockId, Constant, Function, InstKind, IrBuilder, Linkage, Module, Signature, SwitchCase, Type, Value, ValueId,
};
use crate::pass::base::PreservedAnalyses;
use crate::pass::error::TransformError;

pub const PASS_NAME: &str = "function-merge";
const ANNOTATION: &str = "function-merge";

struct Descriptor {
    name: String,
    case_idx: i64,
    arg_offset: usize,
    arg_num: usize,
    return_ty: Type,
}

fn is_intrinsic(name: &str) -> bool {
    name.starts_with("llvm.")
}

fn qualifies(f: &Function) -> bool {
    f.is_internal()
        && !f.sig.var_arg
        && f.is_definition()
        && !is_intrinsic(&f.name)
        && f.metadata
            .get("annotation")
            .map(|m| m.contains(ANNOTATION))
            .unwrap_or(false)
}

/// Fuses every internal, non-variadic, annotated-`function-merge` function
/// into a single void dispatch function selected by an integer first
/// argument, rewrites ordinary call sites to target it, and erases each
/// original that has no remaining non-`invoke` uses. Grounded on
/// `FunctionMerge.cpp`'s descriptor/clone/rewrite loop (spec.md §4.6).
pub fn run(module: &mut Module) -> Result<PreservedAnalyses, TransformError> {
    let candidate_names: Vec<String> = module
        .functions
        .iter()
        .filter(|f| qualifies(f))
        .map(|f| f.name.clone())
        .collect();

    if candidate_names.len() < 2 {
        return Ok(PreservedAnalyses::All);
    }

    let candidates: Vec<Function> = candidate_names
        .iter()
        .map(|name| module.function(name).expect("just collected").clone())
        .collect();

    let mut merged_params = vec![Type::I32];
    let mut descriptors = Vec::new();
    for (i, f) in candidates.iter().enumerate() {
        let arg_offset = merged_params.len();
        merged_params.push(Type::Ptr);
        let arity = f.sig.params.len();
        merged_params.extend(f.sig.params.iter().cloned());
        descriptors.push(Descriptor {
            name: f.name.clone(),
            case_idx: i as i64,
            arg_offset,
            arg_num: 1 + arity,
            return_ty: f.sig.ret.clone(),
        });
    }

    let merged_sig = Signature::new(merged_params.clone(), Type::Void);
    let mut merged = Function::new("merged", merged_sig, Linkage::Internal);

    let merged_entry = merged.append_block(Some("entry".to_string()));
    let default_block = merged.append_block(Some("default".to_string()));
    IrBuilder::new(&mut merged, default_block).ret_void();
    {
        let mut b = IrBuilder::new(&mut merged, merged_entry);
        b.switch(Value::Param(0), default_block, vec![]);
    }
    let dispatch_switch = merged.block(merged_entry).terminator_id().expect("just created");

    for (f, descriptor) in candidates.iter().zip(&descriptors) {
        let before_block_count = merged.block_order.len();
        let cloned_entry = clone_function_body(&mut merged, f, ValueMap::new());
        let new_blocks: Vec<BlockId> = merged.block_order[before_block_count..].to_vec();

        // Remap references to f's own parameters onto the merged function's
        // corresponding slot; `clone_function_body`'s value map only covers
        // instruction results, not `Value::Param`, since nothing else that
        // calls it needs cross-function parameter remapping.
        for &block in &new_blocks {
            for &id in &merged.block(block).insts.clone() {
                for operand in merged.inst_mut(id).kind.operands_mut() {
                    if let Value::Param(p) = operand {
                        *operand = Value::Param((descriptor.arg_offset + 1 + *p as usize) as u32);
                    }
                }
            }
        }

        // Materialize non-void returns through the out-pointer parameter.
        for &block in &new_blocks {
            let term_id = merged.block(block).terminator_id().expect("well-formed block");
            if let InstKind::Ret { value: Some(v) } = merged.inst(term_id).kind.clone() {
                let pos = merged.block(block).insts.len() - 1;
                merged.insert_inst_at(
                    block,
                    pos,
                    Type::Void,
                    InstKind::Store {
                        ptr: Value::Param(descriptor.arg_offset as u32),
                        value: v,
                    },
                );
                merged.inst_mut(term_id).kind = InstKind::Ret { value: None };
            }
        }

        if let InstKind::Switch { cases, .. } = &mut merged.inst_mut(dispatch_switch).kind {
            cases.push(SwitchCase {
                value: descriptor.case_idx as i128,
                target: cloned_entry,
            });
        }
    }

    module.add_function(merged);

    let mut erase: Vec<bool> = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        let mut has_invoke_user = false;
        for g in &mut module.functions {
            if g.name == "merged" {
                continue;
            }
            has_invoke_user |= rewrite_call_sites(g, descriptor, &merged_params);
        }
        if has_invoke_user {
            log::info!(
                "[{PASS_NAME}] `{}` has a remaining invoke user, keeping original alive",
                descriptor.name
            );
        }
        erase.push(!has_invoke_user);
    }

    for (descriptor, should_erase) in descriptors.iter().zip(erase) {
        if should_erase {
            module.remove_annotations_for(&descriptor.name);
            module.remove_function(&descriptor.name);
        }
    }

    Ok(PreservedAnalyses::None)
}

/// Rewrites every plain (non-`invoke`) call to `descriptor.name` within `g`
/// into a call to `merged`, building the full merged argument list and
/// materializing any non-void result through a fresh stack slot. Returns
/// `true` if `g` still has an `invoke` referencing the original.
fn rewrite_call_sites(g: &mut Function, descriptor: &Descriptor, merged_params: &[Type]) -> bool {
    let mut has_invoke_user = false;
    let mut calls: Vec<(ValueId, BlockId, Vec<Value>)> = Vec::new();

    for &block_id in g.block_order.clone().iter() {
        for &id in g.block(block_id).insts.clone().iter() {
            match g.inst(id).kind.clone() {
                InstKind::Invoke { callee, .. } if callee == descriptor.name => {
                    has_invoke_user = true;
                }
                InstKind::Call { callee, args } if callee == descriptor.name => {
                    debug_assert_eq!(args.len() + 1, descriptor.arg_num);
                    calls.push((id, block_id, args));
                }
                _ => {}
            }
        }
    }

    for (old_call, block, args) in calls {
        // Insert the replacement instructions at the old call's own
        // position rather than appending at the block's end: a plain
        // `IrBuilder` always appends, which would land the rewritten call
        // *after* the block's terminator.
        let mut insert_at = g
            .block(block)
            .insts
            .iter()
            .position(|&id| id == old_call)
            .expect("old call site must still be in its block");

        let result_slot: Option<ValueId> = if descriptor.return_ty != Type::Void {
            let id = g.insert_inst_at(block, insert_at, Type::Ptr, InstKind::Alloca {
                allocated_ty: descriptor.return_ty.clone(),
            });
            insert_at += 1;
            Some(id)
        } else {
            None
        };

        let mut merged_args: Vec<Value> = merged_params
            .iter()
            .map(|ty| Value::Const(Constant::Null(ty.clone())))
            .collect();
        merged_args[0] = Value::Const(Constant::Int(Type::I32, descriptor.case_idx as i128));
        merged_args[descriptor.arg_offset] = match result_slot {
            Some(id) => Value::Inst(id),
            None => Value::Const(Constant::Null(Type::Ptr)),
        };
        for (i, arg) in args.into_iter().enumerate() {
            merged_args[descriptor.arg_offset + 1 + i] = arg;
        }

        g.insert_inst_at(block, insert_at, Type::Void, InstKind::Call {
            callee: "merged".to_string(),
            args: merged_args,
        });
        insert_at += 1;

        let load_id = result_slot.map(|slot| {
            g.insert_inst_at(block, insert_at, descriptor.return_ty.clone(), InstKind::Load { ptr: Value::Inst(slot) })
        });

        if let Some(load_id) = load_id {
            g.replace_all_uses(old_call, &Value::Inst(load_id));
        }
        g.remove_inst(old_call);
    }

    has_invoke_user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, ICmpPred};

    fn annotate(f: &mut Function) {
        f.metadata.entry("annotation").or_default().push(ANNOTATION);
    }

    #[test]
    fn merges_a_void_and_non_void_function_and_rewrites_callers() {
        let mut module = Module::new();

        let mut foo = Function::new("foo", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
        let foo_entry = foo.append_block(Some("entry".to_string()));
        {
            let mut b = IrBuilder::new(&mut foo, foo_entry);
            let doubled = b.binop(BinOp::Add, Type::I32, Value::Param(0), Value::Param(0));
            b.ret(Some(doubled));
        }
        annotate(&mut foo);

        let mut bar = Function::new("bar", Signature::new(vec![Type::I32], Type::Void), Linkage::Internal);
        let bar_entry = bar.append_block(Some("entry".to_string()));
        IrBuilder::new(&mut bar, bar_entry).ret_void();
        annotate(&mut bar);

        let mut caller = Function::new("caller", Signature::new(vec![], Type::Void), Linkage::Internal);
        let caller_entry = caller.append_block(Some("entry".to_string()));
        {
            let mut b = IrBuilder::new(&mut caller, caller_entry);
            let r = b.call(Type::I32, "foo", vec![Value::Const(Constant::Int(Type::I32, 10))]);
            let _ = b.icmp(ICmpPred::Eq, r, Value::Const(Constant::Int(Type::I32, 20)));
            b.call(Type::Void, "bar", vec![Value::Const(Constant::Int(Type::I32, 1))]);
            b.ret_void();
        }

        module.add_function(foo);
        module.add_function(bar);
        module.add_function(caller);
        module.annotate("foo", ANNOTATION);
        module.annotate("bar", ANNOTATION);

        run(&mut module).unwrap();

        assert!(module.function("foo").is_none());
        assert!(module.function("bar").is_none());
        let merged = module.function("merged").expect("merged function exists");
        assert_eq!(merged.sig.params.len(), 1 + 2 + 1 + 1); // selector + (ptr+arg)*2
        assert!(merged.verify().is_ok());

        let caller = module.function("caller").unwrap();
        assert!(caller.verify().is_ok(), "{:?}", caller.verify());
        let calls_merged = caller.block_order.iter().any(|&b| {
            caller.block(b).insts.iter().any(|&id| matches!(&caller.inst(id).kind, InstKind::Call{callee, ..} if callee == "merged"))
        });
        assert!(calls_merged);
    }
}
