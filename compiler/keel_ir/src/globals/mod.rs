//! Module globals and runtime type descriptors.
//!
//! The global table is append-only: a [`GlobalId`] stays valid for the
//! lifetime of the module and globals are never deduplicated, so two
//! promotions of equal literals yield two distinct globals.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::constants::ConstId;
use crate::layout::MemTy;
use crate::types::{ElementFlags, TypeId};

/// Index of a module global.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct GlobalId(u32);

impl GlobalId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@g{}", self.0)
    }
}

/// Symbol visibility of a global.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Linkage {
    /// Visible within the module, may appear in the symbol table.
    Internal,
    /// Visible within the module, never in the symbol table.
    Private,
}

/// A module global variable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalVar {
    pub name: String,
    pub ty: MemTy,
    pub init: ConstId,
    /// Read-only storage.
    pub constant: bool,
    pub linkage: Linkage,
    /// The address is not significant and may be merged with equal data.
    pub unnamed_addr: bool,
}

/// Append-only table of module globals.
#[derive(Default, Debug)]
pub struct GlobalTable {
    globals: Vec<GlobalVar>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "global counts never exceed u32"
    )]
    pub fn add(&mut self, global: GlobalVar) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        tracing::trace!(name = %global.name, id = id.raw(), "add global");
        self.globals.push(global);
        id
    }

    #[inline]
    pub fn get(&self, id: GlobalId) -> &GlobalVar {
        &self.globals[id.index()]
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "global counts never exceed u32"
    )]
    pub fn iter(&self) -> impl Iterator<Item = (GlobalId, &GlobalVar)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId(i as u32), g))
    }
}

/// How the runtime compares elements of a type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarClass {
    /// Aggregate; compared bytewise.
    Aggregate,
    Signed,
    Unsigned,
    Float,
    /// Character code unit; compared unsigned.
    Char,
}

/// Runtime type descriptor contents.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeInfo {
    pub ty: TypeId,
    pub size: u64,
    pub align: u64,
    /// Element type for array descriptors.
    pub elem: Option<TypeId>,
    pub flags: ElementFlags,
    pub scalar: ScalarClass,
    /// Default value, used by the initialized allocation variants.
    pub init: Option<ConstId>,
}

/// One descriptor per referenced source type.
#[derive(Default, Debug)]
pub struct TypeInfoTable {
    entries: FxHashMap<TypeId, TypeInfo>,
}

impl TypeInfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; the first registration for a type wins.
    pub fn insert(&mut self, info: TypeInfo) {
        self.entries.entry(info.ty).or_insert(info);
    }

    pub fn get(&self, ty: TypeId) -> Option<&TypeInfo> {
        self.entries.get(&ty)
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.entries.contains_key(&ty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
