//! Transient values produced and consumed by array lowering.

use keel_ir::{TypeId, ValueId};

/// How a lowered value is held.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// A location in memory. For fixed arrays this is the address of the
    /// element block; for dynamic arrays it is the address of the
    /// `{ length, pointer }` record; for scalars the address of the scalar.
    Address(ValueId),
    /// A materialized dynamic array.
    Pair { len: ValueId, ptr: ValueId },
    /// The null dynamic array `{ 0, null }`.
    Null,
    /// A loaded scalar or aggregate value.
    Immediate(ValueId),
}

/// A typed value flowing between lowering operations.
///
/// Owned by exactly one consumer; never outlives the operation that
/// produced it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RuntimeValue {
    pub ty: TypeId,
    pub kind: ValueKind,
}

impl RuntimeValue {
    pub fn address(ty: TypeId, addr: ValueId) -> Self {
        RuntimeValue {
            ty,
            kind: ValueKind::Address(addr),
        }
    }

    pub fn pair(ty: TypeId, len: ValueId, ptr: ValueId) -> Self {
        RuntimeValue {
            ty,
            kind: ValueKind::Pair { len, ptr },
        }
    }

    pub fn null(ty: TypeId) -> Self {
        RuntimeValue {
            ty,
            kind: ValueKind::Null,
        }
    }

    pub fn immediate(ty: TypeId, value: ValueId) -> Self {
        RuntimeValue {
            ty,
            kind: ValueKind::Immediate(value),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    #[inline]
    pub fn is_lvalue(&self) -> bool {
        matches!(self.kind, ValueKind::Address(_))
    }

    /// The address, if this value is a location.
    pub fn addr(&self) -> Option<ValueId> {
        match self.kind {
            ValueKind::Address(addr) => Some(addr),
            _ => None,
        }
    }
}
