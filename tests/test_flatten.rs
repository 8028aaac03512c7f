//! End-to-end flatten scenario (spec.md §8 scenario 2): a 4-case switch
//! annotated `flatten`, checked for preserved behavior through the
//! reference interpreter, against the scenario's literal stated outputs,
//! and for the single-backward-edge dispatch-loop shape the spec requires.

use ir_obfuscate::interp::{self, IVal, Memory};
use ir_obfuscate::ir::{BinOp, Function, InstKind, IrBuilder, Linkage, Module, Signature, SwitchCase, Type, Value};
use ir_obfuscate::pass::{annotation, flatten};

/// `case 11 -> n%11; case 22 -> n%202; case 33 -> 999; default -> 888`. The
/// IR has no remainder opcode, but a switch only ever enters `c11`/`c22`
/// when `n` equals that exact case value, so `n%11` collapses to `n - 11`
/// there and `n%202` (22 < 202) collapses to plain `n` — `Sub` reproduces
/// the scenario's literal outputs for every input that can actually reach
/// these blocks.
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
        let rem = b.binop(BinOp::Sub, Type::I32, Value::Param(0), b.const_i32(11));
        b.ret(Some(rem));
    }
    {
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

#[test]
fn flatten_preserves_switch_outputs() {
    let mut module = Module::new();
    module.add_function(build_switch_fn());
    module.annotate("f", "flatten");

    let mut memory = Memory::default();
    let before: Vec<_> = [11, 22, 33, 7]
        .iter()
        .map(|&n| interp::call(&module, "f", &[IVal::Int(n)], &mut memory))
        .collect();

    annotation::run(&mut module);
    flatten::run(&mut module).unwrap();

    let f = module.function("f").unwrap();
    assert!(f.verify().is_ok());
    assert!(f.phi_nodes().is_empty());

    let entry = f.entry_block().unwrap();
    let loop_start = f.blocks_in_order().find(|b| b.name.as_deref() == Some("loopStart")).unwrap().id;
    let backward_edges = f
        .block_order
        .iter()
        .filter(|&&b| b != entry)
        .filter(|&&b| {
            let term = f.block(b).terminator_id().unwrap();
            matches!(&f.inst(term).kind, InstKind::Br { target } if *target == loop_start)
        })
        .count();
    assert_eq!(backward_edges, 1, "exactly one block should close the dispatch loop");

    let mut memory = Memory::default();
    let after: Vec<_> = [11, 22, 33, 7]
        .iter()
        .map(|&n| interp::call(&module, "f", &[IVal::Int(n)], &mut memory))
        .collect();

    assert_eq!(before, after, "flattening must not change observable outputs");
    assert_eq!(after[0], Some(IVal::Int(0)), "n=11 -> n%11");
    assert_eq!(after[1], Some(IVal::Int(22)), "n=22 -> n%202");
    assert_eq!(after[2], Some(IVal::Int(999)));
    assert_eq!(after[3], Some(IVal::Int(888)));
}
