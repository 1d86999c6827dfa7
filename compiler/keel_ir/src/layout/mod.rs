//! Machine memory types and data layout.
//!
//! [`MemTy`] is the in-memory shape of a value after lowering. Pointers are
//! opaque. Sizes are allocation sizes (padded to alignment), so element
//! arithmetic `base + i * size_of(elem)` is always correct.

use std::fmt;

use crate::types::{TypeId, TypeKind, TypePool};

/// In-memory machine type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum MemTy {
    /// Comparison result; occupies one byte in memory.
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Array(Box<MemTy>, u64),
    Vector(Box<MemTy>, u64),
    Struct { fields: Vec<MemTy>, packed: bool },
}

impl MemTy {
    /// Integer type of the given bit width.
    pub fn int(bits: u32) -> Option<MemTy> {
        match bits {
            1 => Some(MemTy::I1),
            8 => Some(MemTy::I8),
            16 => Some(MemTy::I16),
            32 => Some(MemTy::I32),
            64 => Some(MemTy::I64),
            _ => None,
        }
    }

    /// Bit width of an integer type.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            MemTy::I1 => Some(1),
            MemTy::I8 => Some(8),
            MemTy::I16 => Some(16),
            MemTy::I32 => Some(32),
            MemTy::I64 => Some(64),
            _ => None,
        }
    }

    pub fn is_int(&self) -> bool {
        self.int_bits().is_some()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, MemTy::F32 | MemTy::F64)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            MemTy::Array(..) | MemTy::Vector(..) | MemTy::Struct { .. }
        )
    }

    /// Element type of an array or vector.
    pub fn element(&self) -> Option<&MemTy> {
        match self {
            MemTy::Array(elem, _) | MemTy::Vector(elem, _) => Some(elem),
            _ => None,
        }
    }

    /// Type of the `index`th member of an aggregate.
    pub fn member(&self, index: u32) -> Option<&MemTy> {
        match self {
            MemTy::Array(elem, len) | MemTy::Vector(elem, len) => {
                (u64::from(index) < *len).then_some(&**elem)
            }
            MemTy::Struct { fields, .. } => fields.get(index as usize),
            _ => None,
        }
    }

    /// Anonymous struct with natural alignment.
    pub fn record(fields: Vec<MemTy>) -> MemTy {
        MemTy::Struct {
            fields,
            packed: false,
        }
    }
}

impl fmt::Display for MemTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemTy::I1 => f.write_str("i1"),
            MemTy::I8 => f.write_str("i8"),
            MemTy::I16 => f.write_str("i16"),
            MemTy::I32 => f.write_str("i32"),
            MemTy::I64 => f.write_str("i64"),
            MemTy::F32 => f.write_str("float"),
            MemTy::F64 => f.write_str("double"),
            MemTy::Ptr => f.write_str("ptr"),
            MemTy::Array(elem, len) => write!(f, "[{len} x {elem}]"),
            MemTy::Vector(elem, len) => write!(f, "<{len} x {elem}>"),
            MemTy::Struct { fields, packed } => {
                if *packed {
                    f.write_str("<")?;
                }
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(" }")?;
                if *packed {
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

/// Target data layout. Only the pointer width varies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct DataLayout {
    pointer_bytes: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::host64()
    }
}

impl DataLayout {
    /// Layout with the given pointer width in bytes (2, 4 or 8).
    pub fn new(pointer_bytes: u32) -> Self {
        debug_assert!(
            matches!(pointer_bytes, 2 | 4 | 8),
            "unsupported pointer width {pointer_bytes}"
        );
        DataLayout { pointer_bytes }
    }

    /// 64-bit target.
    pub fn host64() -> Self {
        DataLayout { pointer_bytes: 8 }
    }

    #[inline]
    pub fn pointer_bytes(&self) -> u32 {
        self.pointer_bytes
    }

    /// The pointer-sized integer type used for lengths and indices.
    pub fn word(&self) -> MemTy {
        match self.pointer_bytes {
            2 => MemTy::I16,
            4 => MemTy::I32,
            _ => MemTy::I64,
        }
    }

    /// The two-word dynamic array record `{ length, pointer }`.
    pub fn slice_record(&self) -> MemTy {
        MemTy::record(vec![self.word(), MemTy::Ptr])
    }

    /// Allocation size in bytes, including tail padding.
    pub fn size_of(&self, ty: &MemTy) -> u64 {
        match ty {
            MemTy::I1 | MemTy::I8 => 1,
            MemTy::I16 => 2,
            MemTy::I32 | MemTy::F32 => 4,
            MemTy::I64 | MemTy::F64 => 8,
            MemTy::Ptr => u64::from(self.pointer_bytes),
            MemTy::Array(elem, len) => self.size_of(elem) * len,
            MemTy::Vector(elem, len) => {
                let raw = self.size_of(elem) * len;
                round_up(raw, self.align_of(ty))
            }
            MemTy::Struct { fields, packed } => {
                let mut offset = 0u64;
                for field in fields {
                    if !packed {
                        offset = round_up(offset, self.align_of(field));
                    }
                    offset += self.size_of(field);
                }
                if *packed {
                    offset
                } else {
                    round_up(offset, self.align_of(ty))
                }
            }
        }
    }

    /// ABI alignment in bytes.
    pub fn align_of(&self, ty: &MemTy) -> u64 {
        match ty {
            MemTy::Array(elem, _) => self.align_of(elem),
            MemTy::Vector(elem, len) => (self.size_of(elem) * len).next_power_of_two().clamp(1, 16),
            MemTy::Struct { packed: true, .. } => 1,
            MemTy::Struct { fields, .. } => fields
                .iter()
                .map(|f| self.align_of(f))
                .max()
                .unwrap_or(1),
            scalar => self.size_of(scalar),
        }
    }

    /// Byte offset of member `index` inside an aggregate.
    pub fn offset_of(&self, ty: &MemTy, index: u32) -> u64 {
        match ty {
            MemTy::Array(elem, _) | MemTy::Vector(elem, _) => {
                self.size_of(elem) * u64::from(index)
            }
            MemTy::Struct { fields, packed } => {
                let mut offset = 0u64;
                for (i, field) in fields.iter().enumerate() {
                    if !packed {
                        offset = round_up(offset, self.align_of(field));
                    }
                    if i == index as usize {
                        return offset;
                    }
                    offset += self.size_of(field);
                }
                offset
            }
            _ => 0,
        }
    }
}

#[inline]
fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

// Source type lowering

/// Lower a source type to its in-memory machine type.
///
/// `bool` and `void` occupy one byte. Dynamic arrays are the two-word
/// `{ length, pointer }` record, length first. A union is its first member
/// padded with bytes up to the size of its largest member.
pub fn mem_type(pool: &TypePool, layout: &DataLayout, ty: TypeId) -> MemTy {
    match pool.kind(ty) {
        TypeKind::Void | TypeKind::Bool => MemTy::I8,
        TypeKind::Int { bits, .. } | TypeKind::Char { bits } => {
            MemTy::int(u32::from(*bits)).unwrap_or(MemTy::I64)
        }
        TypeKind::Size => layout.word(),
        TypeKind::Float { bits: 32 } => MemTy::F32,
        TypeKind::Float { .. } => MemTy::F64,
        TypeKind::Pointer(_) => MemTy::Ptr,
        TypeKind::FixedArray { elem, len } => {
            MemTy::Array(Box::new(mem_type(pool, layout, *elem)), *len)
        }
        TypeKind::Slice(_) => layout.slice_record(),
        TypeKind::Vector { elem, len } => {
            MemTy::Vector(Box::new(mem_type(pool, layout, *elem)), *len)
        }
        TypeKind::Struct(def) => MemTy::record(
            def.fields
                .iter()
                .map(|f| mem_type(pool, layout, f.ty))
                .collect(),
        ),
        TypeKind::Union(def) => {
            let members: Vec<MemTy> = def
                .members
                .iter()
                .map(|m| mem_type(pool, layout, m.ty))
                .collect();
            let Some(first) = members.first().cloned() else {
                return MemTy::record(Vec::new());
            };
            let max_size = members.iter().map(|m| layout.size_of(m)).max().unwrap_or(0);
            let max_align = members.iter().map(|m| layout.align_of(m)).max().unwrap_or(1);
            let total = round_up(max_size, max_align);
            let pad = total - layout.size_of(&first);
            if pad == 0 {
                MemTy::record(vec![first])
            } else {
                MemTy::record(vec![first, MemTy::Array(Box::new(MemTy::I8), pad)])
            }
        }
    }
}

/// Allocation size of a source type.
pub fn size_of_type(pool: &TypePool, layout: &DataLayout, ty: TypeId) -> u64 {
    layout.size_of(&mem_type(pool, layout, ty))
}
