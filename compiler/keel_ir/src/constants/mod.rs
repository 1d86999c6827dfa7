//! Module-level constants.
//!
//! Constants are hash-consed: interning the same value twice yields the
//! same [`ConstId`]. Each constant carries its machine type, computed once
//! at interning time.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::globals::GlobalId;
use crate::layout::MemTy;
use crate::types::TypeId;

/// Index of an interned constant.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ConstId(u32);

impl ConstId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ConstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A constant value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstValue {
    /// Integer, truncated to the width of `ty`.
    Int { ty: MemTy, value: u64 },
    /// Float of type `ty`, stored as `f64` bits.
    Float { ty: MemTy, bits: u64 },
    /// The null pointer.
    Null,
    /// All-zero value of any type.
    Zero(MemTy),
    Array { elem: MemTy, elems: Vec<ConstId> },
    Vector { elem: MemTy, elems: Vec<ConstId> },
    Struct { fields: Vec<ConstId>, packed: bool },
    /// Address of a module global.
    GlobalAddr(GlobalId),
    /// Address of the runtime type descriptor of a source type.
    TypeInfo(TypeId),
}

/// Hash-consed constant storage.
#[derive(Default, Debug)]
pub struct ConstArena {
    values: Vec<ConstValue>,
    types: Vec<MemTy>,
    interned: FxHashMap<ConstValue, ConstId>,
}

impl ConstArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a constant, returning the existing id if it was seen before.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "constant counts never exceed u32"
    )]
    pub fn intern(&mut self, value: ConstValue) -> ConstId {
        if let Some(&id) = self.interned.get(&value) {
            return id;
        }
        let value = normalize(value);
        if let Some(&id) = self.interned.get(&value) {
            return id;
        }
        let ty = self.compute_type(&value);
        let id = ConstId(self.values.len() as u32);
        self.values.push(value.clone());
        self.types.push(ty);
        self.interned.insert(value, id);
        id
    }

    fn compute_type(&self, value: &ConstValue) -> MemTy {
        match value {
            ConstValue::Int { ty, .. } | ConstValue::Float { ty, .. } | ConstValue::Zero(ty) => {
                ty.clone()
            }
            ConstValue::Null | ConstValue::GlobalAddr(_) | ConstValue::TypeInfo(_) => MemTy::Ptr,
            ConstValue::Array { elem, elems } => {
                MemTy::Array(Box::new(elem.clone()), elems.len() as u64)
            }
            ConstValue::Vector { elem, elems } => {
                MemTy::Vector(Box::new(elem.clone()), elems.len() as u64)
            }
            ConstValue::Struct { fields, packed } => MemTy::Struct {
                fields: fields.iter().map(|f| self.ty_of(*f).clone()).collect(),
                packed: *packed,
            },
        }
    }

    #[inline]
    pub fn get(&self, id: ConstId) -> &ConstValue {
        &self.values[id.index()]
    }

    #[inline]
    pub fn ty_of(&self, id: ConstId) -> &MemTy {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // Convenience constructors

    pub fn int(&mut self, ty: MemTy, value: u64) -> ConstId {
        self.intern(ConstValue::Int { ty, value })
    }

    pub fn float(&mut self, ty: MemTy, value: f64) -> ConstId {
        self.intern(ConstValue::Float {
            ty,
            bits: value.to_bits(),
        })
    }

    pub fn null(&mut self) -> ConstId {
        self.intern(ConstValue::Null)
    }

    pub fn zero(&mut self, ty: MemTy) -> ConstId {
        self.intern(ConstValue::Zero(ty))
    }

    pub fn global_addr(&mut self, global: GlobalId) -> ConstId {
        self.intern(ConstValue::GlobalAddr(global))
    }

    pub fn type_info(&mut self, ty: TypeId) -> ConstId {
        self.intern(ConstValue::TypeInfo(ty))
    }

    /// A byte array holding `bytes`.
    pub fn bytes(&mut self, bytes: &[u8]) -> ConstId {
        let elems = bytes
            .iter()
            .map(|&b| self.int(MemTy::I8, u64::from(b)))
            .collect();
        self.intern(ConstValue::Array {
            elem: MemTy::I8,
            elems,
        })
    }

    // Queries

    /// Integer value of an integer constant (or zero of an integer type).
    pub fn as_int(&self, id: ConstId) -> Option<u64> {
        match self.get(id) {
            ConstValue::Int { value, .. } => Some(*value),
            ConstValue::Zero(ty) if ty.is_int() => Some(0),
            _ => None,
        }
    }

    /// Whether the constant is the all-zero bit pattern.
    pub fn is_zero(&self, id: ConstId) -> bool {
        match self.get(id) {
            ConstValue::Int { value, .. } => *value == 0,
            ConstValue::Float { bits, .. } => *bits == 0,
            ConstValue::Null | ConstValue::Zero(_) => true,
            ConstValue::Array { elems, .. } | ConstValue::Vector { elems, .. } => {
                elems.iter().all(|e| self.is_zero(*e))
            }
            ConstValue::Struct { fields, .. } => fields.iter().all(|f| self.is_zero(*f)),
            ConstValue::GlobalAddr(_) | ConstValue::TypeInfo(_) => false,
        }
    }
}

/// Mask integers to their declared width so equal values intern equally.
fn normalize(value: ConstValue) -> ConstValue {
    match value {
        ConstValue::Int { ty, value } => {
            let value = match ty.int_bits() {
                Some(bits) if bits < 64 => value & ((1u64 << bits) - 1),
                _ => value,
            };
            ConstValue::Int { ty, value }
        }
        other => other,
    }
}
