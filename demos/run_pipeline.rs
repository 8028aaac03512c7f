//! Builds a small annotated module, runs the default pass pipeline over it,
//! and prints each function's block layout before and after — plus, via the
//! `interp` reference interpreter, the return value for a handful of inputs,
//! to show the transformation didn't change what the program computes.
//!
//! `cargo run --example run_pipeline --features interp`

use ir_obfuscate::interp::{self, IVal, Memory};
use ir_obfuscate::ir::{BinOp, Function, IrBuilder, Linkage, Module, Signature, SwitchCase, Type, Value};
use ir_obfuscate::registry::{self, DEFAULT_ORDER};
use ir_obfuscate::rng::Prng;

/// `case 11 -> n%11; case 22 -> n%202; case 33 -> 999; default -> 888`,
/// matching spec.md §8 scenario 2 — annotated for both `flatten` and `mba`.
fn build_dispatch() -> Function {
    let mut f = Function::new("dispatch", Signature::new(vec![Type::I32], Type::I32), Linkage::Internal);
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
        // Reached only when n == 11, so n%11 collapses to the constant n - 11.
        let mut b = IrBuilder::new(&mut f, c11);
        let rem = b.binop(BinOp::Sub, Type::I32, Value::Param(0), b.const_i32(11));
        b.ret(Some(rem));
    }
    {
        // Reached only when n == 22, and 22 < 202, so n%202 collapses to n.
        let mut b = IrBuilder::new(&mut f, c22);
        b.ret(Some(Value::Param(0)));
    }
    {
        let mut b = IrBuilder::new(&mut f, c33);
        b.ret(Some(b.const_i32(999)));
    }
    {
        let mut b = IrBuilder::new(&mut f, default);
        b.ret(Some(b.const_i32(888)));
    }
    f
}

fn print_module(label: &str, module: &Module) {
    println!("-- {label} --");
    for func in &module.functions {
        println!("function {}({:?}) -> {}", func.name, func.sig.params, func.sig.ret);
        for block in func.blocks_in_order() {
            println!("  {}:", block.id);
            for &id in &block.insts {
                println!("    {} = {:?}", id, func.inst(id).kind);
            }
        }
    }
    println!();
}

fn main() {
    env_logger::init();

    let mut module = Module::new();
    module.add_function(build_dispatch());
    module.annotate("dispatch", "flatten");
    module.annotate("dispatch", "mba");

    print_module("before", &module);

    let mut memory = Memory::default();
    let before_outputs: Vec<_> = [11, 22, 33, 7]
        .iter()
        .map(|&n| interp::call(&module, "dispatch", &[IVal::Int(n)], &mut memory))
        .collect();

    let mut rng = Prng::from_seed(7);
    registry::run_pipeline(DEFAULT_ORDER, &mut module, &mut rng).expect("pipeline should not fail on well-formed input");

    print_module("after", &module);

    let mut memory = Memory::default();
    let after_outputs: Vec<_> = [11, 22, 33, 7]
        .iter()
        .map(|&n| interp::call(&module, "dispatch", &[IVal::Int(n)], &mut memory))
        .collect();

    println!("before: {before_outputs:?}");
    println!("after:  {after_outputs:?}");
    assert_eq!(before_outputs, after_outputs, "flattening + MBA must preserve behavior");
    assert_eq!(after_outputs, vec![Some(IVal::Int(0)), Some(IVal::Int(22)), Some(IVal::Int(999)), Some(IVal::Int(888))]);
    println!("pipeline preserved observable behavior across all sampled inputs");
}
