#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_ir::{DataLayout, Instr, MemTy, Module, RuntimeFn, Terminator};

use super::*;

#[test]
fn counted_loop_shape() {
    let mut module = Module::new("m", DataLayout::host64());
    let mut b = IrBuilder::new(&mut module, "f", vec![MemTy::I64, MemTy::Ptr], None);
    let count = b.param(0);
    let base = b.param(1);
    counted_loop(&mut b, count, |b, i| {
        let slot = b.elem_ptr(&MemTy::I32, base, i);
        let v = b.const_int(MemTy::I32, 7);
        b.store(v, slot);
    });
    b.ret(None);
    let id = b.finish().unwrap();
    let f = module.function(id);

    let names: Vec<_> = f.blocks.iter().map(|bb| bb.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "fill.test", "fill.body", "fill.done"]);

    let test = f.block_named("fill.test").unwrap();
    assert!(matches!(test.terminator, Terminator::CondBr { .. }));
    let body = f.block_named("fill.body").unwrap();
    assert!(body
        .body
        .iter()
        .any(|i| matches!(i, Instr::ElemPtr { .. })));
    assert!(matches!(f.block_named("fill.done").unwrap().terminator, Terminator::Ret(None)));
}

#[test]
fn trap_guard_fail_block_is_unreachable() {
    let mut module = Module::new("m", DataLayout::host64());
    let mut b = IrBuilder::new(&mut module, "f", vec![MemTy::I1], None);
    let ok = b.param(0);
    trap_guard(&mut b, ok, "bounds.ok", "bounds.fail", |b| {
        let record = b.layout().slice_record();
        let file = b.const_zero(record);
        let line = b.const_i32(3);
        b.call_runtime(RuntimeFn::BoundsFail, vec![file, line]);
    });
    b.ret(None);
    let id = b.finish().unwrap();
    let f = module.function(id);

    let fail = f.block_named("bounds.fail").unwrap();
    assert_eq!(fail.terminator, Terminator::Unreachable);
    assert_eq!(f.count_calls(RuntimeFn::BoundsFail), 1);
    assert!(matches!(f.block_named("bounds.ok").unwrap().terminator, Terminator::Ret(None)));
}
