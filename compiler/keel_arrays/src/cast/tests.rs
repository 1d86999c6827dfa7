#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_ir::{Instr, Terminator};

use super::*;
use crate::config::LowerConfig;
use crate::test_helpers::{finish, Fixture};
use crate::value::ValueKind;

#[test]
fn fixed_to_dynamic_rescales_statically() {
    let mut fx = Fixture::new();
    let fixed = fx.pool.fixed_array(TypeId::I32, 4);
    let bytes = fx.pool.slice(TypeId::U8);
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let v = RuntimeValue::address(fixed, cx.param(0));
    let out = cx.cast_array(&v, bytes, SourceLoc::synthetic()).unwrap();
    let ValueKind::Pair { len, ptr } = out.kind else {
        panic!("expected a pair, got {out:?}");
    };
    assert_eq!(cx.builder().as_const_int(len), Some(16));
    assert_eq!(ptr, cx.param(0));
}

#[test]
fn inexact_fixed_to_dynamic_is_rejected() {
    let mut fx = Fixture::new();
    let fixed = fx.pool.fixed_array(TypeId::U8, 3);
    let shorts = fx.pool.slice(TypeId::U16);
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let v = RuntimeValue::address(fixed, cx.param(0));
    assert!(cx.cast_array(&v, shorts, SourceLoc::synthetic()).is_err());
    let codes: Vec<_> = cx.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5006]);
}

#[test]
fn widening_dynamic_cast_multiplies_the_length() {
    let mut fx = Fixture::new();
    let ints = fx.pool.slice(TypeId::I32);
    let shorts = fx.pool.slice(TypeId::I16);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(ints, cx.param(0), cx.param(1));
    cx.cast_array(&v, shorts, SourceLoc::synthetic()).unwrap();
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::CastLength), 0);
    assert!(f
        .instrs()
        .any(|i| matches!(i, Instr::Binary { op: BinOp::Mul, .. })));
}

#[test]
fn narrowing_dynamic_cast_calls_the_runtime() {
    let mut fx = Fixture::new();
    let shorts = fx.pool.slice(TypeId::I16);
    let ints = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(shorts, cx.param(0), cx.param(1));
    cx.cast_array(&v, ints, SourceLoc::synthetic()).unwrap();
    let id = finish(cx);

    assert_eq!(fx.function(id).count_calls(RuntimeFn::CastLength), 1);
}

#[test]
fn runtime_rescaled_length_is_the_call_result() {
    let mut fx = Fixture::new();
    let mut cx = fx.cx(vec![MemTy::I64]);
    let len = cx.param(0);
    let scaled = cx.cast_length(len, 2, 4).unwrap();
    assert_ne!(scaled, len);
    assert!(!cx.has_errors());
    let id = finish(cx);

    let defined_by_call = fx.function(id).instrs().any(|i| {
        matches!(
            i,
            Instr::Call {
                dst: Some(dst),
                callee: keel_ir::Callee::Runtime(RuntimeFn::CastLength),
                ..
            } if *dst == scaled
        )
    });
    assert!(defined_by_call);
}

#[test]
fn constant_lengths_rescale_without_code() {
    let mut fx = Fixture::new();
    let mut cx = fx.cx(vec![]);
    let three = cx.builder().const_word(3);
    let scaled = cx.cast_length(three, 8, 2).unwrap();
    assert_eq!(cx.builder().as_const_int(scaled), Some(12));
    assert_eq!(cx.cast_length(three, 4, 4).unwrap(), three);
}

#[test]
fn same_size_cast_keeps_the_length() {
    let mut fx = Fixture::new();
    let ints = fx.pool.slice(TypeId::I32);
    let uints = fx.pool.slice(TypeId::U32);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(ints, cx.param(0), cx.param(1));
    let out = cx.cast_array(&v, uints, SourceLoc::synthetic()).unwrap();
    assert_eq!(
        out.kind,
        ValueKind::Pair {
            len: cx.param(0),
            ptr: cx.param(1)
        }
    );
}

#[test]
fn dynamic_to_fixed_is_bounds_checked_even_in_release() {
    let mut fx = Fixture::with_config(LowerConfig::release());
    let ints = fx.pool.slice(TypeId::I32);
    let fixed = fx.pool.fixed_array(TypeId::I32, 4);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(ints, cx.param(0), cx.param(1));
    let out = cx.cast_array(&v, fixed, SourceLoc::synthetic()).unwrap();
    assert_eq!(out, RuntimeValue::address(fixed, cx.param(1)));
    let id = finish(cx);

    let f = fx.function(id);
    assert_eq!(f.count_calls(RuntimeFn::BoundsFail), 1);
    assert_eq!(f.block_named("cast.fail").unwrap().terminator, Terminator::Unreachable);
    assert!(f.block_named("cast.ok").is_some());
}

#[test]
fn array_to_pointer_and_bool() {
    let mut fx = Fixture::new();
    let ints = fx.pool.slice(TypeId::I32);
    let ptr = fx.pool.pointer(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::I64, MemTy::Ptr]);
    let v = RuntimeValue::pair(ints, cx.param(0), cx.param(1));
    let p = cx.cast_array(&v, ptr, SourceLoc::synthetic()).unwrap();
    assert_eq!(p, RuntimeValue::immediate(ptr, cx.param(1)));

    let b = cx.cast_array(&v, TypeId::BOOL, SourceLoc::synthetic()).unwrap();
    assert_eq!(b.ty, TypeId::BOOL);
    let id = finish(cx);

    let f = fx.function(id);
    assert!(f
        .instrs()
        .any(|i| matches!(i, Instr::ICmp { pred: ICmpPred::Ne, .. })));
}

#[test]
fn pointer_to_dynamic_array_is_rejected() {
    let mut fx = Fixture::new();
    let ptr = fx.pool.pointer(TypeId::I32);
    let ints = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::Ptr]);
    let v = RuntimeValue::immediate(ptr, cx.param(0));
    assert!(cx.cast_array(&v, ints, SourceLoc::synthetic()).is_err());
    let codes: Vec<_> = cx.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5007]);
}

#[test]
fn non_array_source_is_rejected() {
    let mut fx = Fixture::new();
    let ints = fx.pool.slice(TypeId::I32);
    let mut cx = fx.cx(vec![MemTy::I32]);
    let v = RuntimeValue::immediate(TypeId::I32, cx.param(0));
    assert!(cx.cast_array(&v, ints, SourceLoc::synthetic()).is_err());
    let codes: Vec<_> = cx.diagnostics().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5007]);
}
