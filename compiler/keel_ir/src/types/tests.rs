use pretty_assertions::assert_eq;

use super::*;

#[test]
fn primitives_have_fixed_indices() {
    let pool = TypePool::new();
    assert_eq!(pool.len(), TypeId::PRIMITIVE_COUNT as usize);
    assert_eq!(pool.kind(TypeId::BOOL), &TypeKind::Bool);
    assert_eq!(
        pool.kind(TypeId::U32),
        &TypeKind::Int {
            bits: 32,
            signed: false
        }
    );
    assert_eq!(pool.kind(TypeId::WCHAR), &TypeKind::Char { bits: 16 });
    assert_eq!(pool.kind(TypeId::USIZE), &TypeKind::Size);
    assert!(TypeId::DCHAR.is_primitive());
}

#[test]
fn structural_types_are_interned() {
    let mut pool = TypePool::new();
    let a = pool.fixed_array(TypeId::I32, 4);
    let b = pool.fixed_array(TypeId::I32, 4);
    let c = pool.fixed_array(TypeId::I32, 5);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(pool.slice(TypeId::U8), pool.slice(TypeId::U8));
}

#[test]
fn structs_are_nominal() {
    let mut pool = TypePool::new();
    let fields = vec![FieldDef::new("x", TypeId::I32)];
    let a = pool.add_struct(StructDef::new("S", fields.clone()));
    let b = pool.add_struct(StructDef::new("S", fields));
    assert_ne!(a, b);
}

#[test]
fn next_of_strips_one_level() {
    let mut pool = TypePool::new();
    let inner = pool.fixed_array(TypeId::F32, 3);
    let outer = pool.fixed_array(inner, 2);
    let dynamic = pool.slice(outer);
    assert_eq!(pool.next_of(dynamic), Some(outer));
    assert_eq!(pool.next_of(outer), Some(inner));
    assert_eq!(pool.next_of(inner), Some(TypeId::F32));
    assert_eq!(pool.next_of(TypeId::F32), None);
}

#[test]
fn display_names() {
    let mut pool = TypePool::new();
    let fixed = pool.fixed_array(TypeId::CHAR, 8);
    let dynamic = pool.slice(fixed);
    let ptr = pool.pointer(TypeId::I16);
    assert_eq!(pool.display(dynamic), "char[8][]");
    assert_eq!(pool.display(ptr), "i16*");
}

#[test]
fn array_predicates() {
    let mut pool = TypePool::new();
    let fixed = pool.fixed_array(TypeId::I32, 2);
    let dynamic = pool.slice(TypeId::I32);
    let ptr = pool.pointer(TypeId::I32);
    assert!(pool.is_array(fixed));
    assert!(pool.is_array(dynamic));
    assert!(!pool.is_array(ptr));
    assert!(pool.is_pointer(ptr));
    assert!(pool.is_slice(dynamic));
    assert!(pool.is_fixed_array(fixed));
}
