use crate::ir::{BinOp, Function, ICmpPred, InstKind, Module, Type, Value, ValueId};
use crate::pass::base::{run_annotated, OnError, PreservedAnalyses};
use crate::pass::error::TransformError;
use crate::rng::Prng;

pub const PASS_NAME: &str = "mba";
const ANNOTATION: &str = "mba";

/// Replaces `x > 0` (signed), `x == 0`, and `x + y` with a randomly chosen,
/// algebraically equivalent bit-twiddling expression from the catalogue
/// fixed in spec.md §4.3. Grounded on the pattern-match-then-substitute
/// shape of `MBAObfuscation.cpp`'s `runOnBasicBlock`, which walks every
/// instruction once, builds each replacement with an `IRBuilder`, and only
/// erases the originals after the whole traversal to avoid iterator
/// invalidation — the same two-phase collect/apply shape used here.
pub fn run(module: &mut Module, rng: &mut Prng) -> Result<PreservedAnalyses, TransformError> {
    run_annotated(PASS_NAME, ANNOTATION, module, OnError::Swallow, |func| {
        rewrite_function(func, rng)
    })
}

fn rewrite_function(func: &mut Function, rng: &mut Prng) -> Result<(), TransformError> {
    let mut replacements: Vec<(ValueId, Value)> = Vec::new();
    let mut dead: Vec<ValueId> = Vec::new();

    for &block_id in func.block_order.clone().iter() {
        for &id in func.block(block_id).insts.clone().iter() {
            let inst = func.inst(id).clone();
            let Some(replacement) = try_match(func, &inst.kind, &inst.ty) else {
                continue;
            };

            // `IrBuilder` only ever appends at a block's end, so the
            // replacement's instructions land after this block's
            // terminator; splice that freshly appended run back to where
            // the matched instruction originally sat before anything else
            // reads it.
            let before_len = func.block(block_id).insts.len();
            let value = match replacement {
                Pattern::GtZero { x, width } => build_gt_zero(func, block_id, x, width, rng),
                Pattern::EqZero { x } => build_eq_zero(func, block_id, x, rng),
                Pattern::Add { x, y, ty } => build_add(func, block_id, x, y, ty, rng),
            };
            let new_ids: Vec<ValueId> = func.block(block_id).insts[before_len..].to_vec();
            func.block_mut(block_id).insts.truncate(before_len);
            let pos = func
                .block(block_id)
                .insts
                .iter()
                .position(|&i| i == id)
                .expect("matched instruction must still be in its block");
            for (offset, new_id) in new_ids.into_iter().enumerate() {
                func.block_mut(block_id).insts.insert(pos + offset, new_id);
            }

            replacements.push((id, value));
            dead.push(id);
        }
    }

    for (old, new) in replacements {
        func.replace_all_uses(old, &new);
    }
    for id in dead {
        func.remove_inst(id);
    }

    Ok(())
}

enum Pattern {
    GtZero { x: Value, width: u32 },
    EqZero { x: Value },
    Add { x: Value, y: Value, ty: Type },
}

fn is_zero_const(v: &Value) -> bool {
    matches!(v, Value::Const(c) if c.is_zero())
}

fn try_match(func: &Function, kind: &InstKind, ty: &Type) -> Option<Pattern> {
    match kind {
        InstKind::ICmp {
            pred: ICmpPred::Sgt,
            lhs,
            rhs,
        } if is_zero_const(rhs) => value_width(func, lhs).map(|width| Pattern::GtZero { x: lhs.clone(), width }),
        InstKind::ICmp {
            pred: ICmpPred::Eq,
            lhs,
            rhs,
        } if is_zero_const(rhs) => Some(Pattern::EqZero { x: lhs.clone() }),
        InstKind::BinOp {
            op: BinOp::Add,
            lhs,
            rhs,
        } => Some(Pattern::Add {
            x: lhs.clone(),
            y: rhs.clone(),
            ty: ty.clone(),
        }),
        _ => None,
    }
}

/// The width to use for `x > 0`'s top-bit/shift constants. Unknown widths
/// (a non-integer operand, or one whose type can't be resolved) skip the
/// pattern rather than erroring, per spec.md §4.3.
fn value_width(func: &Function, v: &Value) -> Option<u32> {
    match v {
        Value::Const(c) => c.ty().int_width(),
        Value::Inst(id) => func.inst(*id).ty.int_width(),
        Value::Param(i) => func.sig.params.get(*i as usize).and_then(Type::int_width),
        Value::GlobalRef(_) => None,
    }
}

fn build_gt_zero(func: &mut Function, block: crate::ir::BlockId, x: Value, width: u32, rng: &mut Prng) -> Value {
    let ty = int_ty(width);
    let top_bit = width - 1;
    let mut b = crate::ir::IrBuilder::new(func, block);

    match rng.index(2) {
        0 => {
            // ((3 - (lshr(x, W-1) ^ 1)) ^ 2) == 0 && x != 0
            let shifted = b.binop(BinOp::Lshr, ty.clone(), x.clone(), b.const_int(ty.clone(), top_bit as i128));
            let xored = b.binop(BinOp::Xor, ty.clone(), shifted, b.const_int(ty.clone(), 1));
            let sub = b.binop(BinOp::Sub, ty.clone(), b.const_int(ty.clone(), 3), xored);
            let xored2 = b.binop(BinOp::Xor, ty.clone(), sub, b.const_int(ty.clone(), 2));
            let cmp1 = b.icmp(ICmpPred::Eq, xored2, b.const_int(ty.clone(), 0));
            let cmp2 = b.icmp(ICmpPred::Ne, x, b.const_int(ty, 0));
            b.binop(BinOp::And, Type::I1, cmp1, cmp2)
        }
        _ => {
            // ((lshr(xor(lshr(x, S), 0xCFD00FAA), 14)) & 2) == 0 && x != 0
            let s: i128 = if width == 64 { 48 } else { 16 };
            let shifted = b.binop(BinOp::Lshr, ty.clone(), x.clone(), b.const_int(ty.clone(), s));
            let xored = b.binop(BinOp::Xor, ty.clone(), shifted, b.const_int(ty.clone(), 0xCFD0_0FAA));
            let shifted2 = b.binop(BinOp::Lshr, ty.clone(), xored, b.const_int(ty.clone(), 14));
            let anded = b.binop(BinOp::And, ty.clone(), shifted2, b.const_int(ty.clone(), 2));
            let cmp1 = b.icmp(ICmpPred::Eq, anded, b.const_int(ty.clone(), 0));
            let cmp2 = b.icmp(ICmpPred::Ne, x, b.const_int(ty, 0));
            b.binop(BinOp::And, Type::I1, cmp1, cmp2)
        }
    }
}

fn build_eq_zero(func: &mut Function, block: crate::ir::BlockId, x: Value, rng: &mut Prng) -> Value {
    let ty = value_ty(func, &x);
    let mut b = crate::ir::IrBuilder::new(func, block);

    match rng.index(4) {
        0 => {
            // (56 ^ x ^ 72) == 112
            let a = b.binop(BinOp::Xor, ty.clone(), b.const_int(ty.clone(), 56), x);
            let c = b.binop(BinOp::Xor, ty.clone(), a, b.const_int(ty.clone(), 72));
            b.icmp(ICmpPred::Eq, c, b.const_int(ty, 112))
        }
        1 => {
            // (76 ^ not(x ^ not(x)) ^ 40 ^ x) == 100
            let not_x = b.binop(BinOp::Xor, ty.clone(), x.clone(), b.const_int(ty.clone(), -1));
            let x_xor_not_x = b.binop(BinOp::Xor, ty.clone(), x.clone(), not_x);
            let not_that = b.binop(BinOp::Xor, ty.clone(), x_xor_not_x, b.const_int(ty.clone(), -1));
            let a = b.binop(BinOp::Xor, ty.clone(), b.const_int(ty.clone(), 76), not_that);
            let c = b.binop(BinOp::Xor, ty.clone(), a, b.const_int(ty.clone(), 40));
            let d = b.binop(BinOp::Xor, ty.clone(), c, x);
            b.icmp(ICmpPred::Eq, d, b.const_int(ty, 100))
        }
        2 => {
            // lshr(x,6) <u 5001 && x >=s 0 && ((x<<2) ^ 3) - 3 == 0
            let shifted = b.binop(BinOp::Lshr, ty.clone(), x.clone(), b.const_int(ty.clone(), 6));
            let cmp1 = b.icmp(ICmpPred::Ult, shifted, b.const_int(ty.clone(), 5001));
            let cmp2 = b.icmp(ICmpPred::Sge, x.clone(), b.const_int(ty.clone(), 0));
            let shl = b.binop(BinOp::Shl, ty.clone(), x, b.const_int(ty.clone(), 2));
            let xored = b.binop(BinOp::Xor, ty.clone(), shl, b.const_int(ty.clone(), 3));
            let sub = b.binop(BinOp::Sub, ty.clone(), xored, b.const_int(ty.clone(), 3));
            let cmp3 = b.icmp(ICmpPred::Eq, sub, b.const_int(ty, 0));
            let and1 = b.binop(BinOp::And, Type::I1, cmp1, cmp2);
            b.binop(BinOp::And, Type::I1, and1, cmp3)
        }
        _ => {
            // ((x<<1) ^ x) == 0
            let shl = b.binop(BinOp::Shl, ty.clone(), x.clone(), b.const_int(ty.clone(), 1));
            let xored = b.binop(BinOp::Xor, ty.clone(), shl, x);
            b.icmp(ICmpPred::Eq, xored, b.const_int(ty, 0))
        }
    }
}

fn build_add(func: &mut Function, block: crate::ir::BlockId, x: Value, y: Value, ty: Type, rng: &mut Prng) -> Value {
    let mut b = crate::ir::IrBuilder::new(func, block);

    match rng.index(6) {
        0 => {
            // (x & y) + (y | x)
            let a = b.binop(BinOp::And, ty.clone(), x.clone(), y.clone());
            let o = b.binop(BinOp::Or, ty.clone(), y, x);
            b.binop(BinOp::Add, ty, a, o)
        }
        1 => {
            // ((y|x) & (y|y)) + x
            let o1 = b.binop(BinOp::Or, ty.clone(), y.clone(), x.clone());
            let o2 = b.binop(BinOp::Or, ty.clone(), y.clone(), y.clone());
            let a = b.binop(BinOp::And, ty.clone(), o1, o2);
            b.binop(BinOp::Add, ty, a, x)
        }
        2 => {
            // (not(y|y) ^ y ^ not(x)) + y
            let yy = b.binop(BinOp::Or, ty.clone(), y.clone(), y.clone());
            let not_yy = b.binop(BinOp::Xor, ty.clone(), yy, b.const_int(ty.clone(), -1));
            let a = b.binop(BinOp::Xor, ty.clone(), not_yy, y.clone());
            let not_x = b.binop(BinOp::Xor, ty.clone(), x, b.const_int(ty.clone(), -1));
            let c = b.binop(BinOp::Xor, ty.clone(), a, not_x);
            b.binop(BinOp::Add, ty, c, y)
        }
        3 => {
            // y + ((y & x ^ not(y)) & (x ^ y ^ y))
            let not_y = b.binop(BinOp::Xor, ty.clone(), y.clone(), b.const_int(ty.clone(), -1));
            let and1 = b.binop(BinOp::And, ty.clone(), y.clone(), x.clone());
            let l = b.binop(BinOp::Xor, ty.clone(), and1, not_y);
            let xy = b.binop(BinOp::Xor, ty.clone(), x, y.clone());
            let r = b.binop(BinOp::Xor, ty.clone(), xy, y.clone());
            let rhs = b.binop(BinOp::And, ty.clone(), l, r);
            b.binop(BinOp::Add, ty, y, rhs)
        }
        4 => {
            // x ^ y ^ 2*(x & y) [longer equivalence, catalogue entry V5]
            let xor = b.binop(BinOp::Xor, ty.clone(), x.clone(), y.clone());
            let and = b.binop(BinOp::And, ty.clone(), x, y);
            let doubled = b.binop(BinOp::Shl, ty.clone(), and, b.const_int(ty.clone(), 1));
            b.binop(BinOp::Add, ty, xor, doubled)
        }
        _ => {
            // (x | y) + (x & y) [catalogue entry V6]
            let or = b.binop(BinOp::Or, ty.clone(), x.clone(), y.clone());
            let and = b.binop(BinOp::And, ty.clone(), x, y);
            b.binop(BinOp::Add, ty, or, and)
        }
    }
}

fn int_ty(width: u32) -> Type {
    match width {
        1 => Type::I1,
        8 => Type::I8,
        16 => Type::I16,
        32 => Type::I32,
        64 => Type::I64,
        _ => Type::I32,
    }
}

fn value_ty(func: &Function, v: &Value) -> Type {
    match v {
        Value::Const(c) => c.ty(),
        Value::Inst(id) => func.inst(*id).ty.clone(),
        Value::Param(i) => func.sig.params.get(*i as usize).cloned().unwrap_or(Type::I32),
        Value::GlobalRef(_) => Type::I32,
    }
}

#[cfg(test)]
mod tests {
    fn gt_zero_v1(x: i32) -> bool {
        let lshr = ((x as u32) >> 31) as i32;
        let xored = lshr ^ 1;
        let sub = 3 - xored;
        ((sub ^ 2) == 0) && x != 0
    }

    fn gt_zero_v2(x: i32) -> bool {
        let shifted = ((x as u32) >> 16) as i32;
        let xored = shifted ^ 0xCFD0_0FAAu32 as i32;
        let shifted2 = ((xored as u32) >> 14) as i32;
        ((shifted2 & 2) == 0) && x != 0
    }

    #[test]
    fn gt_zero_catalogue_matches_original_semantics() {
        for x in [i32::MIN, -1, 0, 1, i32::MAX, 42, -42] {
            assert_eq!(gt_zero_v1(x), x > 0, "v1 mismatch for {x}");
            assert_eq!(gt_zero_v2(x), x > 0, "v2 mismatch for {x}");
        }
    }

    fn eq_zero_v1(x: i32) -> bool {
        ((56 ^ x ^ 72) as i64) == 112
    }

    fn eq_zero_v2(x: i32) -> bool {
        let not_x = !x;
        let x_xor_not_x = x ^ not_x;
        let not_that = !x_xor_not_x;
        (76 ^ not_that ^ 40 ^ x) == 100
    }

    fn eq_zero_v3(x: i32) -> bool {
        let lshr = ((x as u32) >> 6) as i32;
        ((lshr as u32) < 5001) && x >= 0 && (((x << 2) ^ 3) - 3) == 0
    }

    fn eq_zero_v4(x: i32) -> bool {
        ((x << 1) ^ x) == 0
    }

    #[test]
    fn eq_zero_catalogue_matches_original_semantics() {
        for x in [i32::MIN, -1, 0, 1, i32::MAX, 42, -42] {
            assert_eq!(eq_zero_v1(x), x == 0, "v1 mismatch for {x}");
            assert_eq!(eq_zero_v2(x), x == 0, "v2 mismatch for {x}");
            assert_eq!(eq_zero_v3(x), x == 0, "v3 mismatch for {x}");
            assert_eq!(eq_zero_v4(x), x == 0, "v4 mismatch for {x}");
        }
    }

    fn add_v1(x: i32, y: i32) -> i32 {
        (x & y).wrapping_add(y | x)
    }

    #[allow(clippy::eq_op)]
    fn add_v2(x: i32, y: i32) -> i32 {
        ((y | x) & (y | y)).wrapping_add(x)
    }

    #[allow(clippy::eq_op)]
    fn add_v3(x: i32, y: i32) -> i32 {
        (!(y | y) ^ y ^ !x).wrapping_add(y)
    }

    fn add_v4(x: i32, y: i32) -> i32 {
        y.wrapping_add((y & x ^ !y) & (x ^ y ^ y))
    }

    fn add_v5(x: i32, y: i32) -> i32 {
        (x ^ y).wrapping_add(2i32.wrapping_mul(x & y))
    }

    fn add_v6(x: i32, y: i32) -> i32 {
        (x | y).wrapping_add(x & y)
    }

    #[test]
    fn add_catalogue_matches_original_semantics() {
        for (x, y) in [(1, 2), (-5, 7), (0, 0), (i32::MAX, 1), (i32::MIN, -1)] {
            assert_eq!(add_v1(x, y), x.wrapping_add(y), "v1 mismatch for {x}+{y}");
            assert_eq!(add_v2(x, y), x.wrapping_add(y), "v2 mismatch for {x}+{y}");
            assert_eq!(add_v3(x, y), x.wrapping_add(y), "v3 mismatch for {x}+{y}");
            assert_eq!(add_v4(x, y), x.wrapping_add(y), "v4 mismatch for {x}+{y}");
            assert_eq!(add_v5(x, y), x.wrapping_add(y), "v5 mismatch for {x}+{y}");
            assert_eq!(add_v6(x, y), x.wrapping_add(y), "v6 mismatch for {x}+{y}");
        }
    }
}
