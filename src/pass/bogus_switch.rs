use crate::ir::clone::clone_block;
use crate::ir::{BlockId, Constant, Function, InstKind, Module, SwitchCase, Value, ValueId};
use crate::pass::base::{run_annotated, OnError, PreservedAnalyses};
use crate::pass::error::TransformError;
use crate::rng::Prng;

pub const PASS_NAME: &str = "bogus-switch";
const ANNOTATION: &str = "bogus-switch";

const P_DUP: f64 = 0.7;
const P_REMAP: f64 = 0.5;

/// Duplicates a fraction of each switch's case blocks and rewrites some of
/// the upstream stores to the switch's case variable so the duplicates
/// become genuinely reachable. Grounded on `BogusSwitch.cpp`'s per-switch
/// clone-and-remap loop; per spec.md §9's Open Question resolution, this
/// restricts to functions carrying the `bogus-switch` annotation (the
/// original's restriction check was commented out — not followed here).
pub fn run(module: &mut Module, rng: &mut Prng) -> Result<PreservedAnalyses, TransformError> {
    run_annotated(PASS_NAME, ANNOTATION, module, OnError::Swallow, |func| {
        rewrite_function(func, rng)
    })
}

fn rewrite_function(func: &mut Function, rng: &mut Prng) -> Result<(), TransformError> {
    let switch_blocks: Vec<BlockId> = func
        .block_order
        .iter()
        .copied()
        .filter(|&b| {
            let term = func.block(b).terminator_id().expect("well-formed block");
            matches!(func.inst(term).kind, InstKind::Switch { .. })
        })
        .collect();

    for block in switch_blocks {
        rewrite_switch(func, block, rng);
    }

    Ok(())
}

/// Finds the pointer operand of the load that immediately precedes
/// `switch_block`'s terminator and whose result feeds the switch's
/// condition. `None` if the terminator isn't preceded by such a load.
fn case_variable(func: &Function, switch_block: BlockId, switch_id: ValueId) -> Option<Value> {
    let InstKind::Switch { cond, .. } = &func.inst(switch_id).kind else {
        return None;
    };
    let Value::Inst(cond_id) = cond else {
        return None;
    };
    let insts = &func.block(switch_block).insts;
    let term_index = insts.iter().position(|&id| id == switch_id)?;
    if term_index == 0 {
        return None;
    }
    let prev_id = insts[term_index - 1];
    if prev_id != *cond_id {
        return None;
    }
    match &func.inst(prev_id).kind {
        InstKind::Load { ptr } => Some(ptr.clone()),
        _ => None,
    }
}

fn fresh_case_value(existing: &[i128], rng: &mut Prng) -> i128 {
    let k = existing.len() as i128;
    if !existing.contains(&k) {
        return k;
    }
    loop {
        let candidate = rng.range_i128(0, 1 << 30);
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
}

fn rewrite_switch(func: &mut Function, switch_block: BlockId, rng: &mut Prng) {
    let switch_id = func
        .block(switch_block)
        .terminator_id()
        .expect("well-formed block");

    let Some(case_var) = case_variable(func, switch_block, switch_id) else {
        log::info!("[{PASS_NAME}] no case variable found for switch in `{}`, skipping", func.name);
        return;
    };

    let cases = match &func.inst(switch_id).kind {
        InstKind::Switch { cases, .. } => cases.clone(),
        _ => unreachable!("filtered to switch terminators above"),
    };
    if cases.is_empty() {
        return;
    }

    let n = (cases.len() as f64 * P_DUP).ceil() as usize;

    for original_case in cases.iter().take(n).cloned() {
        let (dup_block, _vmap) = clone_block(func, original_case.target, "_bogus");

        let existing_values: Vec<i128> = match &func.inst(switch_id).kind {
            InstKind::Switch { cases, .. } => cases.iter().map(|c| c.value).collect(),
            _ => unreachable!(),
        };
        let fresh = fresh_case_value(&existing_values, rng);

        if let InstKind::Switch { cases, .. } = &mut func.inst_mut(switch_id).kind {
            cases.push(SwitchCase {
                value: fresh,
                target: dup_block,
            });
        }

        remap_some_stores(func, &case_var, original_case.value, fresh);
    }
}

/// Rewrites `floor(count * P_REMAP)` of the stores in the function that
/// write `old_value` through `case_var`, in encounter order, to instead
/// write `new_value` — the step that makes a freshly cloned case block
/// actually reachable.
fn remap_some_stores(func: &mut Function, case_var: &Value, old_value: i128, new_value: i128) {
    let mut matching: Vec<ValueId> = Vec::new();
    for &block_id in &func.block_order.clone() {
        for &id in &func.block(block_id).insts.clone() {
            if let InstKind::Store { ptr, value } = &func.inst(id).kind
                && ptr == case_var
                && let Value::Const(Constant::Int(_, v)) = value
                && *v == old_value
            {
                matching.push(id);
            }
        }
    }

    let take = (matching.len() as f64 * P_REMAP).floor() as usize;
    for &id in matching.iter().take(take) {
        if let InstKind::Store { value, .. } = &mut func.inst_mut(id).kind
            && let Value::Const(Constant::Int(ty, _)) = value
        {
            *value = Value::Const(Constant::Int(ty.clone(), new_value));
        }
    }
}
