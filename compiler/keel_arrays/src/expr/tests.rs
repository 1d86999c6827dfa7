#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_diagnostic::ErrorCode;
use keel_ir::{Expr, FieldDef, Instr, LocalId, MemTy, RuntimeFn, StructDef};

use super::*;
use crate::test_helpers::{finish, Fixture};
use crate::value::ValueKind;

#[test]
fn constant_index_into_fixed_array_is_unchecked() {
    let mut fx = Fixture::new();
    let arr = fx.pool.fixed_array(TypeId::I32, 4);
    let base = fx.exprs.local(arr, LocalId::new(0));
    let index = fx.exprs.int(TypeId::I32, 3);
    let elem = fx.exprs.index(TypeId::I32, base, index);

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), arr);
    let v = cx.lower_expr(elem).unwrap();
    assert!(v.is_lvalue());
    assert_eq!(v.ty, TypeId::I32);
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.blocks.len(), 1);
    assert_eq!(f.count_calls(RuntimeFn::BoundsFail), 0);
    // Constant indices are widened at compile time.
    assert!(!f.instrs().any(|i| matches!(i, Instr::Cast { .. })));
}

#[test]
fn constant_index_past_the_end_is_checked() {
    let mut fx = Fixture::new();
    let arr = fx.pool.fixed_array(TypeId::I32, 4);
    let base = fx.exprs.local(arr, LocalId::new(0));
    let index = fx.exprs.int(TypeId::U64, 4);
    let elem = fx.exprs.index(TypeId::I32, base, index);

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), arr);
    cx.lower_expr(elem).unwrap();
    let id = finish(cx);

    assert_eq!(fx.function(id).count_calls(RuntimeFn::BoundsFail), 1);
}

#[test]
fn dynamic_index_is_checked() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I64);
    let base = fx.exprs.local(slice, LocalId::new(0));
    let i = fx.exprs.local(TypeId::U32, LocalId::new(1));
    let elem = fx.exprs.index(TypeId::I64, base, i);

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), slice);
    cx.declare_local(LocalId::new(1), TypeId::U32);
    cx.lower_expr(elem).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::BoundsFail), 1);
    assert!(f
        .instrs()
        .any(|i| matches!(i, Instr::Cast { op: CastOp::ZExt, .. })));
}

#[test]
fn negative_constant_index_is_sign_extended() {
    assert_eq!(word_value(0xFFFF_FFFF, 32, 64, true), u64::MAX);
    assert_eq!(word_value(0xFFFF_FFFF, 32, 64, false), 0xFFFF_FFFF);
    assert_eq!(word_value(0x1_0000_0002, 64, 32, false), 2);
}

#[test]
fn length_of_a_fixed_array_is_constant() {
    let mut fx = Fixture::new();
    let arr = fx.pool.fixed_array(TypeId::U8, 9);
    let base = fx.exprs.local(arr, LocalId::new(0));
    let len = fx
        .exprs
        .alloc(Expr::new(TypeId::USIZE, ExprKind::Length(base)));

    let mut cx = fx.cx(vec![]);
    cx.declare_local(LocalId::new(0), arr);
    let v = cx.lower_expr(len).unwrap();
    let ValueKind::Immediate(value) = v.kind else {
        panic!("length is not an immediate");
    };
    assert_eq!(cx.builder().as_const_int(value), Some(9));
}

#[test]
fn dynamic_array_literal_is_allocated_uninitialized() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let elems = (0..3).map(|i| fx.exprs.int(TypeId::I32, i)).collect();
    let lit = fx.exprs.array_lit(slice, elems);

    let mut cx = fx.cx(vec![]);
    let v = cx.lower_expr(lit).unwrap();
    assert!(matches!(v.kind, ValueKind::Pair { .. }));
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::NewArrayUninit), 1);
    assert_eq!(f.instrs().filter(|i| matches!(i, Instr::Store { .. })).count(), 3);
}

#[test]
fn empty_dynamic_array_literal_is_null() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let lit = fx.exprs.array_lit(slice, vec![]);

    let mut cx = fx.cx(vec![]);
    let v = cx.lower_expr(lit).unwrap();
    assert!(v.is_null());
}

#[test]
fn fixed_array_literal_gets_a_stack_slot() {
    let mut fx = Fixture::new();
    let arr = fx.pool.fixed_array(TypeId::I16, 2);
    let a = fx.exprs.int(TypeId::I16, 1);
    let b = fx.exprs.int(TypeId::I16, 2);
    let lit = fx.exprs.array_lit(arr, vec![a, b]);

    let mut cx = fx.cx(vec![]);
    let v = cx.lower_expr(lit).unwrap();
    assert!(v.is_lvalue());
    let id = finish(cx);

    let f = fx.function(id);
    assert!(f.instrs().any(|i| matches!(
        i,
        Instr::Alloca {
            ty: MemTy::Array(..),
            ..
        }
    )));
}

#[test]
fn struct_literal_fills_missing_fields_with_defaults() {
    let mut fx = Fixture::new();
    let pair = fx.pool.add_struct(StructDef::new(
        "Pair",
        vec![FieldDef::new("a", TypeId::I32), FieldDef::new("b", TypeId::F32)],
    ));
    let a = fx.exprs.int(TypeId::I32, 5);
    let lit = fx
        .exprs
        .alloc(Expr::new(pair, ExprKind::StructLit(vec![Some(a), None])));

    let mut cx = fx.cx(vec![]);
    cx.lower_expr(lit).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(
        f.instrs()
            .filter(|i| matches!(i, Instr::FieldPtr { .. }))
            .count(),
        2
    );
    assert_eq!(f.instrs().filter(|i| matches!(i, Instr::Store { .. })).count(), 2);
}

#[test]
fn unbound_local_is_an_internal_error() {
    let mut fx = Fixture::new();
    let local = fx.exprs.local(TypeId::I32, LocalId::new(7));

    let mut cx = fx.cx(vec![]);
    assert!(cx.lower_expr(local).is_err());
    let codes: Vec<_> = cx.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E9001]);
}
