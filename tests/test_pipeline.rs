//! Scenario 6 (spec.md §8): a function with an `invoke` site annotated
//! `flatten` must be refused and logged, not panic, and every other
//! annotated function in the same module must still be processed; plus a
//! general multi-pass run through `registry::run_pipeline`.

use ir_obfuscate::interp::{self, IVal, Memory};
use ir_obfuscate::ir::{BinOp, Function, InstKind, IrBuilder, Linkage, Module, Signature, SwitchCase, Type, Value};
use ir_obfuscate::registry::{self, DEFAULT_ORDER};
use ir_obfuscate::rng::Prng;

fn invoke_fn() -> Function {
    let mut f = Function::new("risky", Signature::new(vec![], Type::Void), Linkage::Internal);
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
    f
}

fn add_fn() -> Function {
    let mut f = Function::new("adder", Signature::new(vec![Type::I32, Type::I32], Type::I32), Linkage::Internal);
    let entry = f.append_block(Some("entry".to_string()));
    let mut b = IrBuilder::new(&mut f, entry);
    let sum = b.binop(BinOp::Add, Type::I32, Value::Param(0), Value::Param(1));
    b.ret(Some(sum));
    f
}

#[test]
fn a_refused_function_does_not_block_the_rest_of_the_module() {
    let mut module = Module::new();
    module.add_function(invoke_fn());
    module.add_function(add_fn());
    module.annotate("risky", "flatten");
    module.annotate("adder", "mba");

    let mut rng = Prng::from_seed(1);
    registry::run_pipeline(DEFAULT_ORDER, &mut module, &mut rng).unwrap();

    // `risky` is untouched: flatten refused it, no panic, no partial edit.
    let risky = module.function("risky").unwrap();
    assert!(risky.verify().is_ok());
    let term = risky.block(risky.entry_block().unwrap()).terminator_id().unwrap();
    assert!(matches!(risky.inst(term).kind, InstKind::Invoke { .. }));

    // `adder` still got mba's treatment and still computes a correct sum.
    let mut memory = Memory::default();
    for (a, b) in [(1, 2), (-3, 7), (0, 0)] {
        let result = interp::call(&module, "adder", &[IVal::Int(a), IVal::Int(b)], &mut memory);
        assert_eq!(result, Some(IVal::Int(a + b)));
    }
}

fn build_switch_fn() -> Function {
    let mut f = Function::new("dispatch", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
    let entry = f.append_block(Some("entry".to_string()));
    let c11 = f.append_block(Some("c11".to_string()));
    let c22 = f.append_block(Some("c22".to_string()));
    let default = f.append_block(Some("default".to_string()));
    {
        let mut b = IrBuilder::new(&mut f, entry);
        let slot = b.alloca(Type::I32);
        b.store(slot.clone(), Value::Param(0));
        let loaded = b.load(Type::I32, slot);
        b.switch(
            loaded,
            default,
            vec![SwitchCase { value: 11, target: c11 }, SwitchCase { value: 22, target: c22 }],
        );
    }
    IrBuilder::new(&mut f, c11).ret(Some(Value::Const(ir_obfuscate::ir::Constant::Int(Type::I32, 100))));
    IrBuilder::new(&mut f, c22).ret(Some(Value::Const(ir_obfuscate::ir::Constant::Int(Type::I32, 200))));
    IrBuilder::new(&mut f, default).ret(Some(Value::Const(ir_obfuscate::ir::Constant::Int(Type::I32, 888))));
    f
}

#[test]
fn full_default_pipeline_preserves_observable_behavior() {
    let mut module = Module::new();
    module.add_function(build_switch_fn());
    module.annotate("dispatch", "bogus-switch");
    module.annotate("dispatch", "flatten");

    let mut memory = Memory::default();
    let before: Vec<_> = [11, 22, 7]
        .iter()
        .map(|&n| interp::call(&module, "dispatch", &[IVal::Int(n)], &mut memory))
        .collect();

    let mut rng = Prng::from_seed(99);
    registry::run_pipeline(DEFAULT_ORDER, &mut module, &mut rng).unwrap();

    assert!(module.function("dispatch").unwrap().verify().is_ok());

    let mut memory = Memory::default();
    let after: Vec<_> = [11, 22, 7]
        .iter()
        .map(|&n| interp::call(&module, "dispatch", &[IVal::Int(n)], &mut memory))
        .collect();

    assert_eq!(before, after);
}
