//! End-to-end bogus-switch scenario: duplicating case blocks and adding
//! fresh dispatch values must not change what a legitimate input produces
//! (spec.md §4.5's duplicates are reached only through remapped internal
//! stores, never through the function's real parameter values).

use ir_obfuscate::interp::{self, IVal, Memory};
use ir_obfuscate::ir::{Function, InstKind, IrBuilder, Linkage, Module, Signature, SwitchCase, Type, Value};
use ir_obfuscate::pass::{annotation, bogus_switch};
use ir_obfuscate::rng::Prng;

fn build_switch_fn() -> Function {
    let mut f = Function::new("f", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
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
fn bogus_switch_preserves_outputs_and_adds_cases() {
    let mut module = Module::new();
    module.add_function(build_switch_fn());
    module.annotate("f", "bogus-switch");

    let mut memory = Memory::default();
    let before: Vec<_> = [11, 22, 7]
        .iter()
        .map(|&n| interp::call(&module, "f", &[IVal::Int(n)], &mut memory))
        .collect();

    annotation::run(&mut module);
    let mut rng = Prng::from_seed(3);
    bogus_switch::run(&mut module, &mut rng).unwrap();

    let f = module.function("f").unwrap();
    assert!(f.verify().is_ok());
    let entry = f.entry_block().unwrap();
    let switch_id = f.block(entry).terminator_id().unwrap();
    let InstKind::Switch { cases, .. } = &f.inst(switch_id).kind else {
        panic!("expected switch");
    };
    assert_eq!(cases.len(), 4, "ceil(2*0.7)=2 duplicates on top of the original 2 cases");

    let mut memory = Memory::default();
    let after: Vec<_> = [11, 22, 7]
        .iter()
        .map(|&n| interp::call(&module, "f", &[IVal::Int(n)], &mut memory))
        .collect();

    assert_eq!(before, after, "duplicating case blocks must not change real-input outputs");
}
