#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use keel_ir::{DataLayout, MemTy, Module, TypeId};

use super::*;

const S: TypeId = TypeId::from_raw(TypeId::PRIMITIVE_COUNT);
const INT_SLICE: TypeId = TypeId::from_raw(TypeId::PRIMITIVE_COUNT + 1);
const S_SLICE: TypeId = TypeId::from_raw(TypeId::PRIMITIVE_COUNT + 2);
const INT_2D: TypeId = TypeId::from_raw(TypeId::PRIMITIVE_COUNT + 3);
const FLOAT_SLICE: TypeId = TypeId::from_raw(TypeId::PRIMITIVE_COUNT + 4);

fn scalar(ty: TypeId, size: u64, scalar: ScalarClass) -> TypeInfo {
    TypeInfo {
        ty,
        size,
        align: size,
        elem: None,
        flags: ElementFlags::ZERO_DEFAULT,
        scalar,
        init: None,
    }
}

fn array(ty: TypeId, elem: TypeId) -> TypeInfo {
    TypeInfo {
        ty,
        size: 16,
        align: 8,
        elem: Some(elem),
        flags: ElementFlags::ZERO_DEFAULT,
        scalar: ScalarClass::Aggregate,
        init: None,
    }
}

/// `int`, `int[]`, `int[][]`, `float[]` and a hooked 4-byte struct `S`
/// (default 7) with `S[]`.
fn module() -> Module {
    let mut m = Module::new("rt", DataLayout::host64());
    let seven = m.consts.int(MemTy::I32, 7);
    m.type_infos
        .insert(scalar(TypeId::I32, 4, ScalarClass::Signed));
    m.type_infos
        .insert(scalar(TypeId::F32, 4, ScalarClass::Float));
    m.type_infos.insert(TypeInfo {
        flags: ElementFlags::NEEDS_COPY_CONSTRUCT | ElementFlags::NEEDS_DESTRUCTION,
        init: Some(seven),
        ..scalar(S, 4, ScalarClass::Aggregate)
    });
    m.type_infos.insert(array(INT_SLICE, TypeId::I32));
    m.type_infos.insert(array(S_SLICE, S));
    m.type_infos.insert(array(INT_2D, INT_SLICE));
    m.type_infos.insert(array(FLOAT_SLICE, TypeId::F32));
    m
}

fn ti(vm: &mut Machine<'_>, ty: TypeId) -> Val {
    Val::Ptr(vm.type_info_addr(ty).unwrap())
}

fn ints(vm: &mut Machine<'_>, values: &[u64]) -> Val {
    let elems: Vec<_> = values.iter().map(|v| Val::Int(*v)).collect();
    vm.alloc_slice(&MemTy::I32, &elems).unwrap()
}

fn read_ints(vm: &Machine<'_>, slice: &Val) -> Vec<u64> {
    vm.read_slice(&MemTy::I32, slice)
        .unwrap()
        .iter()
        .map(|v| v.bits().unwrap())
        .collect()
}

fn call(vm: &mut Machine<'_>, f: RuntimeFn, args: &[Val]) -> EvalResult<Val> {
    vm.call_runtime(f, args).map(|v| v.unwrap_or(Val::Agg(vec![])))
}

fn slot_of(vm: &mut Machine<'_>, slice: &Val) -> u64 {
    let record = vm.layout.slice_record();
    vm.alloc_value(&record, slice).unwrap()
}

#[test]
fn new_array_variants_initialize_differently() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let s_ti = ti(&mut vm, S_SLICE);

    let zeroed = call(&mut vm, RuntimeFn::NewArrayZeroed, &[ints_ti.clone(), Val::Int(3)]).unwrap();
    assert_eq!(read_ints(&vm, &zeroed), vec![0, 0, 0]);

    let init = call(&mut vm, RuntimeFn::NewArrayInit, &[s_ti, Val::Int(2)]).unwrap();
    assert_eq!(read_ints(&vm, &init), vec![7, 7]);

    let uninit = call(&mut vm, RuntimeFn::NewArrayUninit, &[ints_ti.clone(), Val::Int(1)]).unwrap();
    assert_eq!(read_ints(&vm, &uninit), vec![0xAAAA_AAAA]);

    let empty = call(&mut vm, RuntimeFn::NewArrayZeroed, &[ints_ti, Val::Int(0)]).unwrap();
    assert_eq!(empty, Val::slice(0, 0));
}

#[test]
fn multi_dimensional_arrays_nest() {
    let m = module();
    let mut vm = Machine::new(&m);
    let outer_ti = ti(&mut vm, INT_2D);
    let dims = vm
        .alloc_slice(&MemTy::I64, &[Val::Int(2), Val::Int(3)])
        .unwrap();

    let outer = call(&mut vm, RuntimeFn::NewMultiArrayZeroed, &[outer_ti, dims]).unwrap();
    let rows = vm.read_slice(&vm.layout.slice_record(), &outer).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(read_ints(&vm, row), vec![0, 0, 0]);
    }
    assert_ne!(rows[0].as_slice().unwrap().1, rows[1].as_slice().unwrap().1);
}

#[test]
fn set_length_keeps_the_prefix() {
    let m = module();
    let mut vm = Machine::new(&m);
    let s_ti = ti(&mut vm, S_SLICE);
    let start = ints(&mut vm, &[1, 2]);
    let slot = slot_of(&mut vm, &start);

    let grown = call(
        &mut vm,
        RuntimeFn::SetLengthInit,
        &[s_ti.clone(), Val::Int(4), Val::Ptr(slot)],
    )
    .unwrap();
    assert_eq!(read_ints(&vm, &grown), vec![1, 2, 7, 7]);
    assert_eq!(vm.load_record(slot).unwrap(), grown.as_slice().unwrap());

    let shrunk = call(
        &mut vm,
        RuntimeFn::SetLengthInit,
        &[s_ti, Val::Int(1), Val::Ptr(slot)],
    )
    .unwrap();
    assert_eq!(shrunk.as_slice().unwrap(), (1, grown.as_slice().unwrap().1));
}

#[test]
fn appends_grow_in_place_after_the_first_move() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let start = ints(&mut vm, &[1, 2]);
    let slot = slot_of(&mut vm, &start);

    let first = call(
        &mut vm,
        RuntimeFn::AppendCapacity,
        &[ints_ti.clone(), Val::Ptr(slot), Val::Int(1)],
    )
    .unwrap();
    let (len, moved) = first.as_slice().unwrap();
    assert_eq!(len, 3);
    assert_ne!(moved, start.as_slice().unwrap().1);

    let second = call(
        &mut vm,
        RuntimeFn::AppendCapacity,
        &[ints_ti, Val::Ptr(slot), Val::Int(1)],
    )
    .unwrap();
    assert_eq!(second.as_slice().unwrap(), (4, moved));
    assert_eq!(read_ints(&vm, &Val::slice(2, moved)), vec![1, 2]);
}

#[test]
fn appending_to_a_stale_alias_reallocates() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let start = ints(&mut vm, &[1, 2]);
    let a = slot_of(&mut vm, &start);
    let grown = call(
        &mut vm,
        RuntimeFn::AppendCapacity,
        &[ints_ti.clone(), Val::Ptr(a), Val::Int(1)],
    )
    .unwrap();
    let b = slot_of(&mut vm, &grown);

    call(&mut vm, RuntimeFn::AppendCapacity, &[ints_ti.clone(), Val::Ptr(a), Val::Int(1)]).unwrap();
    let from_b = call(
        &mut vm,
        RuntimeFn::AppendCapacity,
        &[ints_ti, Val::Ptr(b), Val::Int(1)],
    )
    .unwrap();
    assert_ne!(from_b.as_slice().unwrap().1, grown.as_slice().unwrap().1);
}

#[test]
fn append_array_copies_from_itself() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let start = ints(&mut vm, &[1, 2, 3]);
    let slot = slot_of(&mut vm, &start);

    let out = call(&mut vm, RuntimeFn::AppendArray, &[ints_ti, Val::Ptr(slot), start]).unwrap();
    assert_eq!(read_ints(&vm, &out), vec![1, 2, 3, 1, 2, 3]);
}

#[test]
fn code_points_are_encoded() {
    let m = module();
    let mut vm = Machine::new(&m);
    let empty = Val::slice(0, 0);
    let utf8 = slot_of(&mut vm, &empty);
    let utf16 = slot_of(&mut vm, &empty);

    let s = call(
        &mut vm,
        RuntimeFn::AppendCodePointUtf8,
        &[Val::Ptr(utf8), Val::Int(0x1F600)],
    )
    .unwrap();
    let (len, ptr) = s.as_slice().unwrap();
    assert_eq!(vm.memory().read(ptr, len).unwrap(), &[0xF0, 0x9F, 0x98, 0x80]);

    let w = call(
        &mut vm,
        RuntimeFn::AppendCodePointUtf16,
        &[Val::Ptr(utf16), Val::Int(0x1F600)],
    )
    .unwrap();
    let units = vm.read_slice(&MemTy::I16, &w).unwrap();
    assert_eq!(units, vec![Val::Int(0xD83D), Val::Int(0xDE00)]);

    assert_eq!(
        call(&mut vm, RuntimeFn::AppendCodePointUtf8, &[Val::Ptr(utf8), Val::Int(0xD800)]),
        Err(Trap::InvalidCodePoint(0xD800))
    );
}

#[test]
fn ctor_checks_lengths_and_runs_postblits() {
    let m = module();
    let mut vm = Machine::new(&m);
    let s_ti = ti(&mut vm, S);
    let src = ints(&mut vm, &[1, 2]);
    let dst = ints(&mut vm, &[0, 0]);
    let short = ints(&mut vm, &[0]);

    assert_eq!(
        call(&mut vm, RuntimeFn::ArrayCtor, &[s_ti.clone(), src.clone(), short]),
        Err(Trap::LengthMismatch { dst: 1, src: 2 })
    );
    call(&mut vm, RuntimeFn::ArrayCtor, &[s_ti, src, dst.clone()]).unwrap();
    assert_eq!(read_ints(&vm, &dst), vec![1, 2]);
    let postblits = vm
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Postblit { .. }))
        .count();
    assert_eq!(postblits, 2);
}

#[test]
fn aliasing_assign_handles_overlap_and_raw_traps() {
    let m = module();
    let mut vm = Machine::new(&m);
    let s_ti = ti(&mut vm, S);
    let all = ints(&mut vm, &[1, 2, 3, 4]);
    let (_, ptr) = all.as_slice().unwrap();
    let src = Val::slice(3, ptr);
    let dst = Val::slice(3, ptr + 4);
    let scratch = Val::Ptr(vm.alloc_value(&MemTy::I32, &Val::Int(0)).unwrap());

    assert!(matches!(
        call(
            &mut vm,
            RuntimeFn::ArrayAssignRaw,
            &[s_ti.clone(), src.clone(), dst.clone(), scratch.clone()],
        ),
        Err(Trap::OverlappingCopy { .. })
    ));
    call(&mut vm, RuntimeFn::ArrayAssignAliasing, &[s_ti, src, dst, scratch]).unwrap();
    assert_eq!(read_ints(&vm, &all), vec![1, 1, 2, 3]);
}

#[test]
fn broadcast_set_destroys_before_assigning() {
    let m = module();
    let mut vm = Machine::new(&m);
    let s_ti = ti(&mut vm, S);
    let value = vm.alloc_value(&MemTy::I32, &Val::Int(5)).unwrap();
    let dst = ints(&mut vm, &[0, 0]);
    let (_, ptr) = dst.as_slice().unwrap();

    call(
        &mut vm,
        RuntimeFn::ArraySetAssign,
        &[s_ti, Val::Ptr(value), Val::Ptr(ptr), Val::Int(2)],
    )
    .unwrap();
    assert_eq!(read_ints(&vm, &dst), vec![5, 5]);
    assert_eq!(
        vm.events(),
        &[
            Event::Destroy { ty: S, addr: ptr },
            Event::Postblit { ty: S, addr: ptr },
            Event::Destroy { ty: S, addr: ptr + 4 },
            Event::Postblit { ty: S, addr: ptr + 4 },
        ]
    );
}

#[test]
fn nary_cat_keeps_operand_order() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let parts = [
        ints(&mut vm, &[1]),
        Val::slice(0, 0),
        ints(&mut vm, &[2, 3]),
        ints(&mut vm, &[4]),
    ];
    let list = vm.alloc_slice(&vm.layout.slice_record(), &parts).unwrap();

    let out = call(&mut vm, RuntimeFn::CatNary, &[ints_ti.clone(), list]).unwrap();
    assert_eq!(read_ints(&vm, &out), vec![1, 2, 3, 4]);

    let none = call(
        &mut vm,
        RuntimeFn::CatBinary,
        &[ints_ti, Val::slice(0, 0), Val::slice(0, 0)],
    )
    .unwrap();
    assert_eq!(none, Val::slice(0, 0));
}

#[test]
fn float_equality_follows_ieee() {
    let m = module();
    let mut vm = Machine::new(&m);
    let floats_ti = ti(&mut vm, FLOAT_SLICE);
    let nan = vm.alloc_slice(&MemTy::F32, &[Val::Float(f64::NAN)]).unwrap();
    let zero = vm.alloc_slice(&MemTy::F32, &[Val::Float(0.0)]).unwrap();
    let neg_zero = vm.alloc_slice(&MemTy::F32, &[Val::Float(-0.0)]).unwrap();

    let eq = |vm: &mut Machine<'_>, a: &Val, b: &Val| {
        call(vm, RuntimeFn::ArrayEquals, &[a.clone(), b.clone(), floats_ti.clone()]).unwrap()
    };
    assert_eq!(eq(&mut vm, &nan, &nan), Val::Int(0));
    assert_eq!(eq(&mut vm, &zero, &neg_zero), Val::Int(1));
}

#[test]
fn ordering_is_signed_and_then_by_length() {
    let m = module();
    let mut vm = Machine::new(&m);
    let ints_ti = ti(&mut vm, INT_SLICE);
    let minus_one = ints(&mut vm, &[0xFFFF_FFFF]);
    let one = ints(&mut vm, &[1]);
    let one_two = ints(&mut vm, &[1, 2]);

    let cmp = |vm: &mut Machine<'_>, a: &Val, b: &Val| {
        call(vm, RuntimeFn::ArrayCompare, &[a.clone(), b.clone(), ints_ti.clone()]).unwrap()
    };
    assert_eq!(cmp(&mut vm, &minus_one, &one), Val::Int(0xFFFF_FFFF));
    assert_eq!(cmp(&mut vm, &one_two, &one), Val::Int(1));
    assert_eq!(cmp(&mut vm, &one, &one), Val::Int(0));
}

#[test]
fn char_ordering_is_unsigned() {
    let m = module();
    let mut vm = Machine::new(&m);
    let high = vm.alloc_slice(&MemTy::I8, &[Val::Int(0xC3)]).unwrap();
    let low = vm.alloc_slice(&MemTy::I8, &[Val::Int(0x41)]).unwrap();
    assert_eq!(
        call(&mut vm, RuntimeFn::ArrayCompareChar, &[high, low]).unwrap(),
        Val::Int(1)
    );
}

#[test]
fn cast_length_must_be_exact() {
    let m = module();
    let mut vm = Machine::new(&m);
    let args = |len| [Val::Int(len), Val::Int(2), Val::Int(4)];
    assert_eq!(call(&mut vm, RuntimeFn::CastLength, &args(6)).unwrap(), Val::Int(3));
    assert_eq!(
        call(&mut vm, RuntimeFn::CastLength, &args(3)),
        Err(Trap::InexactCast { bytes: 6, elem: 4 })
    );
}

#[test]
fn checked_copy_rejects_mismatch_and_overlap() {
    let m = module();
    let mut vm = Machine::new(&m);
    let buf = ints(&mut vm, &[1, 2, 3]);
    let (_, p) = buf.as_slice().unwrap();
    assert_eq!(
        call(
            &mut vm,
            RuntimeFn::SliceCopyChecked,
            &[Val::Ptr(p), Val::Int(4), Val::Ptr(p + 4), Val::Int(8)],
        ),
        Err(Trap::LengthMismatch { dst: 4, src: 8 })
    );
    assert!(matches!(
        call(
            &mut vm,
            RuntimeFn::SliceCopyChecked,
            &[Val::Ptr(p), Val::Int(8), Val::Ptr(p + 4), Val::Int(8)],
        ),
        Err(Trap::OverlappingCopy { .. })
    ));
    call(
        &mut vm,
        RuntimeFn::SliceCopyChecked,
        &[Val::Ptr(p), Val::Int(4), Val::Ptr(p + 8), Val::Int(4)],
    )
    .unwrap();
    assert_eq!(read_ints(&vm, &buf), vec![3, 2, 3]);
}

#[test]
fn bounds_failure_reports_the_location() {
    let m = module();
    let mut vm = Machine::new(&m);
    let file = vm
        .alloc_slice(
            &MemTy::I8,
            &b"main.kl".iter().map(|c| Val::Int(u64::from(*c))).collect::<Vec<_>>(),
        )
        .unwrap();
    assert_eq!(
        call(&mut vm, RuntimeFn::BoundsFail, &[file, Val::Int(42)]),
        Err(Trap::BoundsFail {
            file: "main.kl".to_owned(),
            line: 42
        })
    );
}

#[test]
fn unknown_descriptors_are_rejected() {
    let m = module();
    let mut vm = Machine::new(&m);
    assert_eq!(
        call(&mut vm, RuntimeFn::NewArrayZeroed, &[Val::Ptr(0x1234), Val::Int(1)]),
        Err(Trap::UnknownTypeInfo(0x1234))
    );
    assert!(matches!(
        call(&mut vm, RuntimeFn::NewArrayZeroed, &[Val::Int(1)]),
        Err(Trap::BadRuntimeCall(RuntimeFn::NewArrayZeroed, _))
    ));
}
