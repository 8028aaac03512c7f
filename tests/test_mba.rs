//! End-to-end MBA scenario (spec.md §8 scenario 1): `int f(int x){ return
//! x>0; }` annotated `mba`, checked against concrete sample inputs through
//! the reference interpreter rather than just the catalogue's closed-form
//! equivalence (that's covered by `pass::mba`'s own unit tests).

use ir_obfuscate::interp::{self, IVal, Memory};
use ir_obfuscate::ir::{ICmpPred, IrBuilder, Function, Linkage, Module, Signature, Type, Value};
use ir_obfuscate::pass::{annotation, mba};
use ir_obfuscate::rng::Prng;

fn build_gt_zero() -> Function {
    let mut f = Function::new("f", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
    let entry = f.append_block(Some("entry".to_string()));
    let mut b = IrBuilder::new(&mut f, entry);
    let cmp = b.icmp(ICmpPred::Sgt, Value::Param(0), b.const_i32(0));
    let widened = b.ext(ir_obfuscate::ir::ExtKind::Zext, cmp, Type::I32);
    b.ret(Some(widened));
    f
}

#[test]
fn mba_preserves_gt_zero_semantics() {
    let mut module = Module::new();
    module.add_function(build_gt_zero());
    module.annotate("f", "mba");

    let mut memory = Memory::default();
    for x in [-1, 0, 1, i32::MAX, i32::MIN] {
        let before = interp::call(&module, "f", &[IVal::Int(x as i128)], &mut memory);
        assert_eq!(before, Some(IVal::Int((x > 0) as i128)), "baseline wrong for x={x}");
    }

    let instructions_before = module.function("f").unwrap().blocks_in_order().map(|b| b.insts.len()).sum::<usize>();

    annotation::run(&mut module);
    let mut rng = Prng::from_seed(42);
    mba::run(&mut module, &mut rng).unwrap();

    let instructions_after = module.function("f").unwrap().blocks_in_order().map(|b| b.insts.len()).sum::<usize>();
    assert!(instructions_after > instructions_before, "mba should have substituted the comparison with a larger expression");

    let mut memory = Memory::default();
    for x in [-1, 0, 1, i32::MAX, i32::MIN, 7, -7] {
        let after = interp::call(&module, "f", &[IVal::Int(x as i128)], &mut memory);
        assert_eq!(after, Some(IVal::Int((x > 0) as i128)), "rewritten mismatch for x={x}");
    }
}
