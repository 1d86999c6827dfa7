#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_ir::{Callee, FieldDef, Instr, LocalId, StructDef};

use super::*;
use crate::test_helpers::{finish, Fixture};
use crate::value::ValueKind;

#[test]
fn two_operand_cat_is_binary() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let a = fx.exprs.local(slice, LocalId::new(0));
    let b = fx.exprs.local(slice, LocalId::new(1));
    let cat = fx.exprs.cat(slice, a, b);

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), slice);
    cx.declare_local(LocalId::new(1), slice);
    let v = cx.cat(cat).unwrap();
    assert!(matches!(v.kind, ValueKind::Pair { .. }));
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::CatBinary), 1);
    assert_eq!(f.count_calls(RuntimeFn::CatNary), 0);
}

#[test]
fn chained_cat_is_one_nary_call() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let locals: Vec<_> = (0..4)
        .map(|i| fx.exprs.local(slice, LocalId::new(i)))
        .collect();
    let ab = fx.exprs.cat(slice, locals[0], locals[1]);
    let abc = fx.exprs.cat(slice, ab, locals[2]);
    let abcd = fx.exprs.cat(slice, abc, locals[3]);

    let mut cx = fx.cx(vec![]);
    for i in 0..4 {
        cx.declare_local(LocalId::new(i), slice);
    }
    cx.cat(abcd).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::CatNary), 1);
    assert_eq!(f.count_calls(RuntimeFn::CatBinary), 0);
    let operands = f
        .instrs()
        .find_map(|i| match i {
            Instr::Alloca {
                ty: MemTy::Array(_, n),
                ..
            } => Some(*n),
            _ => None,
        })
        .unwrap();
    assert_eq!(operands, 4);
}

#[test]
fn flatten_is_leftmost_first() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let a = fx.exprs.local(slice, LocalId::new(0));
    let b = fx.exprs.local(slice, LocalId::new(1));
    let c = fx.exprs.local(slice, LocalId::new(2));
    let ab = fx.exprs.cat(slice, a, b);
    let abc = fx.exprs.cat(slice, ab, c);

    let cx = fx.cx(vec![]);
    assert_eq!(cx.flatten_cat(abc).as_slice(), &[a, b, c]);
}

#[test]
fn single_element_operand_is_wrapped() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let a = fx.exprs.local(slice, LocalId::new(0));
    let x = fx.exprs.int(TypeId::I32, 5);
    let cat = fx.exprs.cat(slice, a, x);

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), slice);
    cx.cat(cat).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::CatBinary), 1);
    assert!(f
        .instrs()
        .any(|i| matches!(i, Instr::Alloca { ty: MemTy::I32, .. })));
}

#[test]
fn append_element_grows_then_stores() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I64);
    let x = fx.exprs.int(TypeId::I64, 9);

    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let array = RuntimeValue::address(slice, cx.param(0));
    cx.append_element(array, x).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    let body = &f.blocks[0].body;
    let grow = body
        .iter()
        .position(|i| matches!(i, Instr::Call { .. }))
        .unwrap();
    let store = body
        .iter()
        .rposition(|i| matches!(i, Instr::Store { .. }))
        .unwrap();
    assert!(grow < store);
    assert_eq!(f.count_calls(RuntimeFn::AppendCapacity), 1);
}

#[test]
fn append_from_an_lvalue_runs_the_postblit() {
    let mut fx = Fixture::new();
    let s = fx
        .pool
        .add_struct(StructDef::new("S", vec![FieldDef::new("x", TypeId::I32)]).with_postblit());
    let slice = fx.pool.slice(s);
    let elem = fx.exprs.local(s, LocalId::new(0));

    let mut cx = fx.cx(vec![MemTy::Ptr]);
    cx.declare_local(LocalId::new(0), s);
    let array = RuntimeValue::address(slice, cx.param(0));
    cx.append_element(array, elem).unwrap();
    let id = finish(cx);

    let postblits = fx
        .function(id)
        .instrs()
        .filter(|i| {
            matches!(
                i,
                Instr::Call {
                    callee: Callee::Postblit(_),
                    ..
                }
            )
        })
        .count();
    assert_eq!(postblits, 1);
}

#[test]
fn append_to_a_value_is_an_internal_error() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let x = fx.exprs.int(TypeId::I32, 1);

    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let array = RuntimeValue::pair(slice, cx.param(0), cx.param(1));
    assert!(cx.append_element(array, x).is_err());
}

#[test]
fn append_array_passes_the_location() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::U8);
    let other = fx.exprs.local(slice, LocalId::new(0));

    let mut cx = fx.cx(vec![MemTy::Ptr]);
    cx.declare_local(LocalId::new(0), slice);
    let slot = cx.param(0);
    cx.append_array(RuntimeValue::address(slice, slot), other)
        .unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    let args = f
        .instrs()
        .find_map(|i| match i {
            Instr::Call { args, .. } => Some(args.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(args[1], slot);
    assert_eq!(f.count_calls(RuntimeFn::AppendArray), 1);
}

#[test]
fn code_points_pick_the_encoding() {
    let mut fx = Fixture::new();
    let utf8 = fx.pool.slice(TypeId::CHAR);
    let utf16 = fx.pool.slice(TypeId::WCHAR);
    let cp = fx.exprs.lit(TypeId::DCHAR, keel_ir::LitValue::Char(0x1F600));

    let mut cx = fx.cx(vec![MemTy::Ptr, MemTy::Ptr]);
    let a = RuntimeValue::address(utf8, cx.param(0));
    let b = RuntimeValue::address(utf16, cx.param(1));
    cx.append_code_point(a, cp).unwrap();
    cx.append_code_point(b, cp).unwrap();
    let id = finish(cx);

    let calls: Vec<_> = fx.function(id).runtime_calls().collect();
    assert_eq!(
        calls,
        vec![RuntimeFn::AppendCodePointUtf8, RuntimeFn::AppendCodePointUtf16]
    );
}
