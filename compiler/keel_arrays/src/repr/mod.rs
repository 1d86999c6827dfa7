//! Array representation.
//!
//! A fixed-length array is its element block; a dynamic array is the
//! two-word record `{ length, pointer }`, length first. These helpers read
//! and write both forms from any [`RuntimeValue`] shape so the operation
//! modules never match on representation themselves.

use keel_ir::{MemTy, TypeId, TypeKind, TypePool, ValueId};

use crate::context::LowerCx;
use crate::value::{RuntimeValue, ValueKind};

/// Array-like view of a type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayShape {
    /// Fixed-length array or vector; the length is static.
    Fixed { elem: TypeId, len: u64 },
    /// `{ length, pointer }` pair; the length is a runtime value.
    Slice { elem: TypeId },
    Pointer { elem: TypeId },
}

impl ArrayShape {
    pub fn of(pool: &TypePool, ty: TypeId) -> Option<Self> {
        match *pool.kind(ty) {
            TypeKind::FixedArray { elem, len } | TypeKind::Vector { elem, len } => {
                Some(ArrayShape::Fixed { elem, len })
            }
            TypeKind::Slice(elem) => Some(ArrayShape::Slice { elem }),
            TypeKind::Pointer(elem) => Some(ArrayShape::Pointer { elem }),
            _ => None,
        }
    }

    pub fn elem(self) -> TypeId {
        match self {
            ArrayShape::Fixed { elem, .. }
            | ArrayShape::Slice { elem }
            | ArrayShape::Pointer { elem } => elem,
        }
    }

    #[inline]
    pub fn is_fixed(self) -> bool {
        matches!(self, ArrayShape::Fixed { .. })
    }

    #[inline]
    pub fn is_slice(self) -> bool {
        matches!(self, ArrayShape::Slice { .. })
    }

    /// Fixed or dynamic array; pointers are not arrays.
    #[inline]
    pub fn is_array(self) -> bool {
        !matches!(self, ArrayShape::Pointer { .. })
    }
}

impl LowerCx<'_> {
    pub fn shape(&self, ty: TypeId) -> Option<ArrayShape> {
        ArrayShape::of(self.pool, ty)
    }

    pub(crate) fn is_array_type(&self, ty: TypeId) -> bool {
        self.shape(ty).is_some_and(ArrayShape::is_array)
    }

    /// Length of an array value as a machine word.
    pub fn array_len(&mut self, v: &RuntimeValue) -> ValueId {
        if let Some(ArrayShape::Fixed { len, .. }) = self.shape(v.ty) {
            return self.b.const_word(len);
        }
        debug_assert!(
            !self.pool.is_pointer(v.ty),
            "pointers have no length: {}",
            self.pool.display(v.ty)
        );
        match v.kind {
            ValueKind::Null => self.b.const_word(0),
            ValueKind::Pair { len, .. } => len,
            ValueKind::Address(addr) => {
                let record = self.b.layout().slice_record();
                let word = self.b.word();
                let slot = self.b.field_ptr(&record, addr, 0);
                self.b.load(word, slot)
            }
            ValueKind::Immediate(value) => self.b.extract_value(value, 0),
        }
    }

    /// Address of the first element.
    pub fn array_ptr(&mut self, v: &RuntimeValue) -> ValueId {
        match (self.shape(v.ty), v.kind) {
            (_, ValueKind::Null) => self.b.const_null(),
            (_, ValueKind::Pair { ptr, .. }) => ptr,
            (Some(ArrayShape::Fixed { .. }), ValueKind::Address(addr)) => addr,
            (Some(ArrayShape::Fixed { .. }), ValueKind::Immediate(_)) => self.spill(v),
            (Some(ArrayShape::Pointer { .. }), ValueKind::Address(addr)) => {
                self.b.load(MemTy::Ptr, addr)
            }
            (_, ValueKind::Address(addr)) => {
                let record = self.b.layout().slice_record();
                let slot = self.b.field_ptr(&record, addr, 1);
                self.b.load(MemTy::Ptr, slot)
            }
            (Some(ArrayShape::Pointer { .. }), ValueKind::Immediate(value)) => value,
            (_, ValueKind::Immediate(value)) => self.b.extract_value(value, 1),
        }
    }

    /// Length and pointer of an array value.
    pub fn array_parts(&mut self, v: &RuntimeValue) -> (ValueId, ValueId) {
        let len = self.array_len(v);
        let ptr = self.array_ptr(v);
        (len, ptr)
    }

    /// Store `{len, ptr}` into the dynamic-array location `slot`.
    pub fn set_array(&mut self, slot: ValueId, len: ValueId, ptr: ValueId) {
        let record = self.b.layout().slice_record();
        let len_slot = self.b.field_ptr(&record, slot, 0);
        self.b.store(len, len_slot);
        let ptr_slot = self.b.field_ptr(&record, slot, 1);
        self.b.store(ptr, ptr_slot);
    }

    /// Store the null dynamic array into `slot`.
    pub fn set_array_null(&mut self, slot: ValueId) {
        let record = self.b.layout().slice_record();
        let zero = self.b.const_zero(record);
        self.b.store(zero, slot);
    }

    /// Build a `{len, ptr}` aggregate.
    pub fn make_slice(&mut self, len: ValueId, ptr: ValueId) -> ValueId {
        let record = self.b.layout().slice_record();
        self.b.make_aggregate(record, vec![len, ptr])
    }

    /// Any array value as a `{len, ptr}` aggregate.
    pub fn slice_of(&mut self, v: &RuntimeValue) -> ValueId {
        match v.kind {
            ValueKind::Null => {
                let record = self.b.layout().slice_record();
                self.b.const_zero(record)
            }
            ValueKind::Immediate(value) if self.pool.is_slice(v.ty) => value,
            _ => {
                let (len, ptr) = self.array_parts(v);
                self.make_slice(len, ptr)
            }
        }
    }

    /// An operand of an array operation as a `{len, ptr}` aggregate. A
    /// single element becomes `{1, &tmp}` over a stack temporary.
    pub fn slice_operand(&mut self, v: &RuntimeValue, elem: TypeId) -> ValueId {
        if v.is_null() || (v.ty != elem && self.is_array_type(v.ty)) {
            return self.slice_of(v);
        }
        let tmp = self.spill(v);
        let one = self.b.const_word(1);
        self.make_slice(one, tmp)
    }

    /// Load the complete value.
    pub fn load_value(&mut self, v: &RuntimeValue) -> ValueId {
        match v.kind {
            ValueKind::Immediate(value) => value,
            ValueKind::Address(addr) => {
                let mem = self.mem(v.ty);
                self.b.load(mem, addr)
            }
            ValueKind::Pair { len, ptr } => self.make_slice(len, ptr),
            ValueKind::Null => {
                let mem = self.mem(v.ty);
                self.b.const_zero(mem)
            }
        }
    }

    /// Address holding the value, spilling to a stack temporary if needed.
    pub fn spill(&mut self, v: &RuntimeValue) -> ValueId {
        if let ValueKind::Address(addr) = v.kind {
            return addr;
        }
        let value = self.load_value(v);
        let mem = self.mem(v.ty);
        let tmp = self.b.alloca(mem);
        self.b.store(value, tmp);
        tmp
    }

    /// `v` as a dynamic-array pair of its own element type.
    pub(crate) fn to_pair(&mut self, v: &RuntimeValue) -> RuntimeValue {
        match v.kind {
            ValueKind::Pair { .. } | ValueKind::Null => *v,
            _ => {
                let (len, ptr) = self.array_parts(v);
                RuntimeValue::pair(v.ty, len, ptr)
            }
        }
    }

    /// Split a returned `{len, ptr}` aggregate into a pair value.
    pub(crate) fn pair_from_slice(&mut self, ty: TypeId, slice: ValueId) -> RuntimeValue {
        let len = self.b.extract_value(slice, 0);
        let ptr = self.b.extract_value(slice, 1);
        RuntimeValue::pair(ty, len, ptr)
    }
}

#[cfg(test)]
mod tests;
