#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_ir::{Instr, MemTy, TypeId, TypePool};

use super::*;
use crate::test_helpers::{finish, Fixture};

#[test]
fn shapes() {
    let mut pool = TypePool::new();
    let fixed = pool.fixed_array(TypeId::I32, 4);
    let vector = pool.vector(TypeId::F32, 4);
    let slice = pool.slice(TypeId::U8);
    let ptr = pool.pointer(TypeId::U8);

    assert_eq!(
        ArrayShape::of(&pool, fixed),
        Some(ArrayShape::Fixed {
            elem: TypeId::I32,
            len: 4
        })
    );
    assert!(ArrayShape::of(&pool, vector).unwrap().is_fixed());
    assert!(ArrayShape::of(&pool, slice).unwrap().is_slice());
    assert!(!ArrayShape::of(&pool, ptr).unwrap().is_array());
    assert_eq!(ArrayShape::of(&pool, ptr).unwrap().elem(), TypeId::U8);
    assert_eq!(ArrayShape::of(&pool, TypeId::I32), None);
}

#[test]
fn fixed_length_is_a_constant() {
    let mut fx = Fixture::new();
    let fixed = fx.pool.fixed_array(TypeId::I64, 7);
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let v = RuntimeValue::address(fixed, cx.param(0));
    let len = cx.array_len(&v);
    assert_eq!(cx.builder().as_const_int(len), Some(7));
    // The element pointer of a fixed array is its address.
    assert_eq!(cx.array_ptr(&v), cx.param(0));
}

#[test]
fn slice_location_is_read_field_by_field() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let v = RuntimeValue::address(slice, cx.param(0));
    let _ = cx.array_parts(&v);
    let id = finish(cx);

    let f = fx.function(id);
    let fields: Vec<u32> = f
        .instrs()
        .filter_map(|i| match i {
            Instr::FieldPtr { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert_eq!(fields, vec![0, 1]);
    let loads = f
        .instrs()
        .filter(|i| matches!(i, Instr::Load { .. }))
        .count();
    assert_eq!(loads, 2);
}

#[test]
fn null_array_is_empty() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![]);
    let v = RuntimeValue::null(slice);
    let (len, ptr) = cx.array_parts(&v);
    assert_eq!(cx.builder().as_const_int(len), Some(0));
    let ptr_const = cx.builder().as_const(ptr).unwrap();
    assert!(cx.builder().module().consts.is_zero(ptr_const));
}

#[test]
fn single_element_operand_is_spilled() {
    let mut fx = Fixture::new();
    let mut cx = fx.cx(vec![MemTy::I32]);
    let v = RuntimeValue::immediate(TypeId::I32, cx.param(0));
    let _ = cx.slice_operand(&v, TypeId::I32);
    let id = finish(cx);

    let f = fx.function(id);
    assert!(f
        .instrs()
        .any(|i| matches!(i, Instr::Alloca { ty: MemTy::I32, .. })));
    let agg = f
        .instrs()
        .find_map(|i| match i {
            Instr::MakeAggregate { fields, .. } => Some(fields.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(agg.len(), 2);
    assert_eq!(f.value(agg[0]).ty, MemTy::I64);
}

#[test]
fn array_operand_is_not_spilled() {
    let mut fx = Fixture::new();
    let slice = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(slice, cx.param(0), cx.param(1));
    let _ = cx.slice_operand(&v, TypeId::I32);
    let id = finish(cx);

    let f = fx.function(id);
    assert!(!f.instrs().any(|i| matches!(i, Instr::Alloca { .. })));
}

#[test]
fn set_array_null_stores_the_zero_record() {
    let mut fx = Fixture::new();
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let slot = cx.param(0);
    cx.set_array_null(slot);
    let id = finish(cx);

    let f = fx.function(id);
    let stores: Vec<_> = f
        .instrs()
        .filter_map(|i| match i {
            Instr::Store { value, ptr } => Some((*value, *ptr)),
            _ => None,
        })
        .collect();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].1, slot);
    assert_eq!(f.value(stores[0].0).ty, fx.module.layout.slice_record());
}
