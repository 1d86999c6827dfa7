//! Runtime entry points.
//!
//! The array lowering emits calls to these functions; they are provided by
//! the runtime memory manager and resolved at link time. Symbol names and
//! parameter lists are a stable binary contract.
//!
//! Dynamic arrays cross the boundary by value as the two-word
//! `{ length, pointer }` record. Type descriptors are opaque pointers.

use crate::layout::{DataLayout, MemTy};

/// Parameter and result types of runtime entry points.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AbiTy {
    /// Pointer-sized integer.
    Word,
    Ptr,
    /// Dynamic array record `{ length, pointer }`.
    Slice,
    I32,
    /// Runtime type descriptor address.
    TypeInfo,
}

impl AbiTy {
    /// Machine type of this parameter on the given target.
    pub fn mem(self, layout: &DataLayout) -> MemTy {
        match self {
            AbiTy::Word => layout.word(),
            AbiTy::Ptr | AbiTy::TypeInfo => MemTy::Ptr,
            AbiTy::Slice => layout.slice_record(),
            AbiTy::I32 => MemTy::I32,
        }
    }
}

/// A runtime entry point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum RuntimeFn {
    // Allocation
    NewArrayZeroed,
    NewArrayInit,
    NewArrayUninit,
    NewMultiArrayZeroed,
    NewMultiArrayInit,
    SetLengthZeroed,
    SetLengthInit,

    // Element-wise copy with hooks
    ArrayCtor,
    ArrayAssignAliasing,
    ArrayAssignRaw,
    ArraySetCtor,
    ArraySetAssign,

    // Growth
    AppendCapacity,
    AppendArray,
    AppendCodePointUtf8,
    AppendCodePointUtf16,
    CatBinary,
    CatNary,

    // Checked copy
    SliceCopyChecked,

    // Comparison
    ArrayEquals,
    ArrayCompare,
    ArrayCompareChar,

    // Casts and failures
    CastLength,
    BoundsFail,
}

use AbiTy::{Ptr, Slice, TypeInfo, Word, I32};

impl RuntimeFn {
    /// Every entry point, in declaration order.
    pub const ALL: [RuntimeFn; 24] = [
        RuntimeFn::NewArrayZeroed,
        RuntimeFn::NewArrayInit,
        RuntimeFn::NewArrayUninit,
        RuntimeFn::NewMultiArrayZeroed,
        RuntimeFn::NewMultiArrayInit,
        RuntimeFn::SetLengthZeroed,
        RuntimeFn::SetLengthInit,
        RuntimeFn::ArrayCtor,
        RuntimeFn::ArrayAssignAliasing,
        RuntimeFn::ArrayAssignRaw,
        RuntimeFn::ArraySetCtor,
        RuntimeFn::ArraySetAssign,
        RuntimeFn::AppendCapacity,
        RuntimeFn::AppendArray,
        RuntimeFn::AppendCodePointUtf8,
        RuntimeFn::AppendCodePointUtf16,
        RuntimeFn::CatBinary,
        RuntimeFn::CatNary,
        RuntimeFn::SliceCopyChecked,
        RuntimeFn::ArrayEquals,
        RuntimeFn::ArrayCompare,
        RuntimeFn::ArrayCompareChar,
        RuntimeFn::CastLength,
        RuntimeFn::BoundsFail,
    ];

    /// Link-time symbol name.
    pub fn symbol(self) -> &'static str {
        match self {
            RuntimeFn::NewArrayZeroed => "keel_arr_new_zeroed",
            RuntimeFn::NewArrayInit => "keel_arr_new_init",
            RuntimeFn::NewArrayUninit => "keel_arr_new_uninit",
            RuntimeFn::NewMultiArrayZeroed => "keel_arr_new_multi_zeroed",
            RuntimeFn::NewMultiArrayInit => "keel_arr_new_multi_init",
            RuntimeFn::SetLengthZeroed => "keel_arr_set_length_zeroed",
            RuntimeFn::SetLengthInit => "keel_arr_set_length_init",
            RuntimeFn::ArrayCtor => "keel_arr_ctor",
            RuntimeFn::ArrayAssignAliasing => "keel_arr_assign_alias",
            RuntimeFn::ArrayAssignRaw => "keel_arr_assign_raw",
            RuntimeFn::ArraySetCtor => "keel_arr_set_ctor",
            RuntimeFn::ArraySetAssign => "keel_arr_set_assign",
            RuntimeFn::AppendCapacity => "keel_arr_append_cap",
            RuntimeFn::AppendArray => "keel_arr_append",
            RuntimeFn::AppendCodePointUtf8 => "keel_arr_append_cp8",
            RuntimeFn::AppendCodePointUtf16 => "keel_arr_append_cp16",
            RuntimeFn::CatBinary => "keel_arr_cat",
            RuntimeFn::CatNary => "keel_arr_cat_n",
            RuntimeFn::SliceCopyChecked => "keel_arr_copy_checked",
            RuntimeFn::ArrayEquals => "keel_arr_eq",
            RuntimeFn::ArrayCompare => "keel_arr_cmp",
            RuntimeFn::ArrayCompareChar => "keel_arr_cmp_char",
            RuntimeFn::CastLength => "keel_arr_cast_len",
            RuntimeFn::BoundsFail => "keel_arr_bounds_fail",
        }
    }

    /// Look up an entry point by symbol name.
    pub fn from_symbol(symbol: &str) -> Option<RuntimeFn> {
        Self::ALL.into_iter().find(|f| f.symbol() == symbol)
    }

    /// Parameter list.
    pub fn params(self) -> &'static [AbiTy] {
        match self {
            RuntimeFn::NewArrayZeroed | RuntimeFn::NewArrayInit | RuntimeFn::NewArrayUninit => {
                &[TypeInfo, Word]
            }
            RuntimeFn::NewMultiArrayZeroed
            | RuntimeFn::NewMultiArrayInit
            | RuntimeFn::CatNary => &[TypeInfo, Slice],
            RuntimeFn::SetLengthZeroed | RuntimeFn::SetLengthInit => &[TypeInfo, Word, Ptr],
            RuntimeFn::ArrayCtor | RuntimeFn::CatBinary => &[TypeInfo, Slice, Slice],
            RuntimeFn::ArrayAssignAliasing | RuntimeFn::ArrayAssignRaw => {
                &[TypeInfo, Slice, Slice, Ptr]
            }
            RuntimeFn::ArraySetCtor | RuntimeFn::ArraySetAssign => &[TypeInfo, Ptr, Ptr, Word],
            RuntimeFn::AppendCapacity => &[TypeInfo, Ptr, Word],
            RuntimeFn::AppendArray => &[TypeInfo, Ptr, Slice],
            RuntimeFn::AppendCodePointUtf8 | RuntimeFn::AppendCodePointUtf16 => &[Ptr, I32],
            RuntimeFn::SliceCopyChecked => &[Ptr, Word, Ptr, Word],
            RuntimeFn::ArrayEquals | RuntimeFn::ArrayCompare => &[Slice, Slice, TypeInfo],
            RuntimeFn::ArrayCompareChar => &[Slice, Slice],
            RuntimeFn::CastLength => &[Word, Word, Word],
            RuntimeFn::BoundsFail => &[Slice, I32],
        }
    }

    /// Result type; `None` for entry points returning nothing.
    pub fn ret(self) -> Option<AbiTy> {
        match self {
            RuntimeFn::SliceCopyChecked | RuntimeFn::BoundsFail => None,
            RuntimeFn::ArraySetCtor | RuntimeFn::ArraySetAssign => Some(Ptr),
            RuntimeFn::ArrayEquals | RuntimeFn::ArrayCompare | RuntimeFn::ArrayCompareChar => {
                Some(I32)
            }
            RuntimeFn::CastLength => Some(Word),
            _ => Some(Slice),
        }
    }

    /// Entry points that never return.
    pub fn is_noreturn(self) -> bool {
        matches!(self, RuntimeFn::BoundsFail)
    }
}
