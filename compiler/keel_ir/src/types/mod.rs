//! Source-level type pool.
//!
//! Every type is referenced by a 32-bit [`TypeId`]. Primitives have fixed
//! indices so they can be compared without a lookup. Structural types
//! (pointers, arrays, slices, vectors) are hash-consed; aggregates
//! (structs, unions) are nominal and always get a fresh index.

use std::fmt;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::expr::LitValue;

/// A 32-bit index into the [`TypePool`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const I8: Self = Self(2);
    pub const U8: Self = Self(3);
    pub const I16: Self = Self(4);
    pub const U16: Self = Self(5);
    pub const I32: Self = Self(6);
    pub const U32: Self = Self(7);
    pub const I64: Self = Self(8);
    pub const U64: Self = Self(9);
    pub const F32: Self = Self(10);
    pub const F64: Self = Self(11);
    /// UTF-8 code unit.
    pub const CHAR: Self = Self(12);
    /// UTF-16 code unit.
    pub const WCHAR: Self = Self(13);
    /// UTF-32 code unit.
    pub const DCHAR: Self = Self(14);
    /// Pointer-sized unsigned integer.
    pub const USIZE: Self = Self(15);

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 16;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

bitflags! {
    /// Element properties that drive copy/assign path selection.
    ///
    /// Computed once per type by the element-trait classifier and carried
    /// into runtime type descriptors.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ElementFlags: u8 {
        /// Overwriting or discarding a value runs a destructor.
        const NEEDS_DESTRUCTION = 1 << 0;
        /// Copying a value by value runs a copy-construct (postblit) hook.
        const NEEDS_COPY_CONSTRUCT = 1 << 1;
        /// The default value is the all-zero bit pattern.
        const ZERO_DEFAULT = 1 << 2;
    }
}

/// A named field of a struct or a member of a union.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
    /// Explicit default initializer; `None` uses the field type's default.
    pub default: Option<LitValue>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        FieldDef {
            name: name.into(),
            ty,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: LitValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// A nominal struct definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// User-defined copy-construct hook.
    pub has_postblit: bool,
    /// User-defined destructor.
    pub has_destructor: bool,
    /// Carries a hidden context pointer; literals of it are never constant.
    pub is_nested: bool,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        StructDef {
            name: name.into(),
            fields,
            has_postblit: false,
            has_destructor: false,
            is_nested: false,
        }
    }

    #[must_use]
    pub fn with_postblit(mut self) -> Self {
        self.has_postblit = true;
        self
    }

    #[must_use]
    pub fn with_destructor(mut self) -> Self {
        self.has_destructor = true;
        self
    }

    #[must_use]
    pub fn nested(mut self) -> Self {
        self.is_nested = true;
        self
    }
}

/// A nominal union definition. The first member is the default member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnionDef {
    pub name: String,
    pub members: Vec<FieldDef>,
}

/// The structure of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Int { bits: u8, signed: bool },
    /// Pointer-sized unsigned integer.
    Size,
    Float { bits: u8 },
    /// Character code unit of the given width.
    Char { bits: u8 },
    Pointer(TypeId),
    FixedArray { elem: TypeId, len: u64 },
    Slice(TypeId),
    Vector { elem: TypeId, len: u64 },
    Struct(StructDef),
    Union(UnionDef),
}

/// Interning pool for source types.
pub struct TypePool {
    kinds: Vec<TypeKind>,
    interned: FxHashMap<TypeKind, TypeId>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with all primitives pre-interned at their fixed indices.
    pub fn new() -> Self {
        let primitives = [
            TypeKind::Void,
            TypeKind::Bool,
            TypeKind::Int {
                bits: 8,
                signed: true,
            },
            TypeKind::Int {
                bits: 8,
                signed: false,
            },
            TypeKind::Int {
                bits: 16,
                signed: true,
            },
            TypeKind::Int {
                bits: 16,
                signed: false,
            },
            TypeKind::Int {
                bits: 32,
                signed: true,
            },
            TypeKind::Int {
                bits: 32,
                signed: false,
            },
            TypeKind::Int {
                bits: 64,
                signed: true,
            },
            TypeKind::Int {
                bits: 64,
                signed: false,
            },
            TypeKind::Float { bits: 32 },
            TypeKind::Float { bits: 64 },
            TypeKind::Char { bits: 8 },
            TypeKind::Char { bits: 16 },
            TypeKind::Char { bits: 32 },
            TypeKind::Size,
        ];
        let mut pool = TypePool {
            kinds: Vec::with_capacity(64),
            interned: FxHashMap::default(),
        };
        for kind in primitives {
            pool.intern(kind);
        }
        debug_assert_eq!(pool.kinds.len(), TypeId::PRIMITIVE_COUNT as usize);
        pool
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(
            u32::try_from(self.kinds.len())
                .unwrap_or_else(|_| panic!("type count exceeds u32::MAX")),
        );
        self.kinds.push(kind);
        id
    }

    /// Intern a structural type, returning the existing index if present.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = self.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(elem))
    }

    pub fn fixed_array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::FixedArray { elem, len })
    }

    pub fn slice(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Slice(elem))
    }

    pub fn vector(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::Vector { elem, len })
    }

    /// Register a nominal struct. Each call creates a distinct type.
    pub fn add_struct(&mut self, def: StructDef) -> TypeId {
        self.push(TypeKind::Struct(def))
    }

    /// Register a nominal union. Each call creates a distinct type.
    pub fn add_union(&mut self, name: impl Into<String>, members: Vec<FieldDef>) -> TypeId {
        self.push(TypeKind::Union(UnionDef {
            name: name.into(),
            members,
        }))
    }

    /// Look up the structure of a type.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this pool.
    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    /// Number of types in the pool.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Element type of an array, slice, vector, or pointer.
    pub fn next_of(&self, id: TypeId) -> Option<TypeId> {
        match *self.kind(id) {
            TypeKind::Pointer(elem)
            | TypeKind::Slice(elem)
            | TypeKind::FixedArray { elem, .. }
            | TypeKind::Vector { elem, .. } => Some(elem),
            _ => None,
        }
    }

    pub fn is_slice(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Slice(_))
    }

    pub fn is_fixed_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::FixedArray { .. })
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_))
    }

    /// Fixed or dynamic array (not a pointer, not a vector).
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Slice(_) | TypeKind::FixedArray { .. }
        )
    }

    /// Struct definition, if `id` is a struct.
    pub fn struct_def(&self, id: TypeId) -> Option<&StructDef> {
        match self.kind(id) {
            TypeKind::Struct(def) => Some(def),
            _ => None,
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Void => "void".to_owned(),
            TypeKind::Bool => "bool".to_owned(),
            TypeKind::Int { bits, signed } => {
                format!("{}{bits}", if *signed { "i" } else { "u" })
            }
            TypeKind::Size => "usize".to_owned(),
            TypeKind::Float { bits } => format!("f{bits}"),
            TypeKind::Char { bits: 8 } => "char".to_owned(),
            TypeKind::Char { bits: 16 } => "wchar".to_owned(),
            TypeKind::Char { .. } => "dchar".to_owned(),
            TypeKind::Pointer(elem) => format!("{}*", self.display(*elem)),
            TypeKind::FixedArray { elem, len } => format!("{}[{len}]", self.display(*elem)),
            TypeKind::Slice(elem) => format!("{}[]", self.display(*elem)),
            TypeKind::Vector { elem, len } => format!("vector({}[{len}])", self.display(*elem)),
            TypeKind::Struct(def) => def.name.clone(),
            TypeKind::Union(def) => def.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests;
