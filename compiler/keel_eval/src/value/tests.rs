#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;

fn bytes_of(layout: &DataLayout, ty: &MemTy, value: &Val) -> Vec<u8> {
    let mut out = vec![0u8; usize::try_from(layout.size_of(ty)).unwrap()];
    encode(layout, ty, value, &mut out).unwrap();
    out
}

#[test]
fn integers_are_little_endian_and_truncated() {
    let layout = DataLayout::host64();
    assert_eq!(bytes_of(&layout, &MemTy::I16, &Val::Int(0x1_0203)), vec![3, 2]);
    assert_eq!(
        decode(&layout, &MemTy::I32, &[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
        Val::Int(0xFFFF_FFFF)
    );
}

#[test]
fn floats_round_when_narrowed() {
    let layout = DataLayout::host64();
    let bytes = bytes_of(&layout, &MemTy::F32, &Val::Float(0.1));
    assert_eq!(bytes, 0.1f32.to_le_bytes().to_vec());
    assert_eq!(
        decode(&layout, &MemTy::F32, &bytes).unwrap(),
        Val::Float(f64::from(0.1f32))
    );
}

#[test]
fn slice_record_follows_the_pointer_width() {
    let narrow = DataLayout::new(4);
    let record = narrow.slice_record();
    let bytes = bytes_of(&narrow, &record, &Val::slice(3, 0x40));
    assert_eq!(bytes, vec![3, 0, 0, 0, 0x40, 0, 0, 0]);
    assert_eq!(
        decode(&narrow, &record, &bytes).unwrap().as_slice().unwrap(),
        (3, 0x40)
    );
}

#[test]
fn struct_fields_are_padded() {
    let layout = DataLayout::host64();
    let ty = MemTy::record(vec![MemTy::I8, MemTy::I32]);
    let value = Val::Agg(vec![Val::Int(1), Val::Int(2)]);
    assert_eq!(bytes_of(&layout, &ty, &value), vec![1, 0, 0, 0, 2, 0, 0, 0]);

    let packed = MemTy::Struct {
        fields: vec![MemTy::I8, MemTy::I32],
        packed: true,
    };
    assert_eq!(bytes_of(&layout, &packed, &value), vec![1, 2, 0, 0, 0]);
}

#[test]
fn arrays_are_contiguous() {
    let layout = DataLayout::host64();
    let ty = MemTy::Array(Box::new(MemTy::I16), 3);
    let value = Val::Agg(vec![Val::Int(1), Val::Int(2), Val::Int(3)]);
    let bytes = bytes_of(&layout, &ty, &value);
    assert_eq!(bytes, vec![1, 0, 2, 0, 3, 0]);
    assert_eq!(decode(&layout, &ty, &bytes).unwrap(), value);
}

#[test]
fn sign_extension_and_masking() {
    assert_eq!(sign_extend(0xFF, 8), -1);
    assert_eq!(sign_extend(0x7F, 8), 127);
    assert_eq!(mask(u64::MAX, 16), 0xFFFF);
    assert_eq!(mask(5, 64), 5);
}

#[test]
fn zero_values_mirror_the_type() {
    let ty = MemTy::record(vec![MemTy::F64, MemTy::Ptr]);
    assert_eq!(
        Val::zero(&ty),
        Val::Agg(vec![Val::Float(0.0), Val::Ptr(0)])
    );
}

#[test]
fn aggregates_are_not_scalars() {
    assert!(Val::slice(0, 0).bits().is_err());
    assert!(Val::Int(1).as_slice().is_err());
}
