//! Basic-block IR.
//!
//! A [`Function`] is a list of [`Block`]s; each block is a straight-line
//! sequence of [`Instr`]s ended by exactly one [`Terminator`]. Values are
//! numbered by [`ValueId`] in a per-function table that records each
//! value's machine type and how it was defined.
//!
//! Memory is explicit: locals are `Alloca` slots, aggregates are read with
//! `Load` and written with `Store`, and addresses of members are computed
//! with `FieldPtr` / `ElemPtr`.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::constants::ConstId;
use crate::layout::MemTy;
use crate::runtime::RuntimeFn;
use crate::types::TypeId;

// ID newtypes

/// An SSA value within one function.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
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
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block within one function.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
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
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A function within a module.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// Operators

/// Integer binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Unsigned division known to have no remainder.
    UDivExact,
    URem,
    And,
    Or,
}

/// Integer comparison predicates. Pointers compare as unsigned addresses.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ICmpPred {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl ICmpPred {
    /// The predicate with the opposite truth value.
    pub fn inverse(self) -> Self {
        match self {
            ICmpPred::Eq => ICmpPred::Ne,
            ICmpPred::Ne => ICmpPred::Eq,
            ICmpPred::Ult => ICmpPred::Uge,
            ICmpPred::Ule => ICmpPred::Ugt,
            ICmpPred::Ugt => ICmpPred::Ule,
            ICmpPred::Uge => ICmpPred::Ult,
            ICmpPred::Slt => ICmpPred::Sge,
            ICmpPred::Sle => ICmpPred::Sgt,
            ICmpPred::Sgt => ICmpPred::Sle,
            ICmpPred::Sge => ICmpPred::Slt,
        }
    }
}

/// Value conversions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    PtrToInt,
    IntToPtr,
}

/// Call targets.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Callee {
    Runtime(RuntimeFn),
    /// The copy-construct hook of a struct type, taking the object address.
    Postblit(TypeId),
}

// Instructions

/// A non-terminating instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Instr {
    /// Reserve a stack slot of type `ty`; `dst` is its address.
    Alloca { dst: ValueId, ty: MemTy },
    Load { dst: ValueId, ty: MemTy, ptr: ValueId },
    Store { value: ValueId, ptr: ValueId },
    /// Address of member `field` of the aggregate of type `agg` at `base`.
    FieldPtr {
        dst: ValueId,
        agg: MemTy,
        base: ValueId,
        field: u32,
    },
    /// `base + index * size_of(elem)`.
    ElemPtr {
        dst: ValueId,
        elem: MemTy,
        base: ValueId,
        index: ValueId,
    },
    Binary {
        dst: ValueId,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// Produces an `i1`.
    ICmp {
        dst: ValueId,
        pred: ICmpPred,
        lhs: ValueId,
        rhs: ValueId,
    },
    ExtractValue {
        dst: ValueId,
        agg: ValueId,
        field: u32,
    },
    /// Build an aggregate value from its members.
    MakeAggregate {
        dst: ValueId,
        ty: MemTy,
        fields: Vec<ValueId>,
    },
    Cast {
        dst: ValueId,
        op: CastOp,
        value: ValueId,
        to: MemTy,
    },
    /// Copy `len` bytes; regions must not overlap.
    MemCpy {
        dst: ValueId,
        src: ValueId,
        len: ValueId,
    },
    /// Fill `len` bytes with the `i8` value `byte`.
    MemSet {
        dst: ValueId,
        byte: ValueId,
        len: ValueId,
    },
    Call {
        dst: Option<ValueId>,
        callee: Callee,
        args: Vec<ValueId>,
    },
}

impl Instr {
    /// The value this instruction defines, if any.
    pub fn defined_value(&self) -> Option<ValueId> {
        match self {
            Instr::Alloca { dst, .. }
            | Instr::Load { dst, .. }
            | Instr::FieldPtr { dst, .. }
            | Instr::ElemPtr { dst, .. }
            | Instr::Binary { dst, .. }
            | Instr::ICmp { dst, .. }
            | Instr::ExtractValue { dst, .. }
            | Instr::MakeAggregate { dst, .. }
            | Instr::Cast { dst, .. } => Some(*dst),
            Instr::Call { dst, .. } => *dst,
            Instr::Store { .. } | Instr::MemCpy { .. } | Instr::MemSet { .. } => None,
        }
    }

    /// Whether this instruction writes memory.
    pub fn writes_memory(&self) -> bool {
        matches!(
            self,
            Instr::Store { .. } | Instr::MemCpy { .. } | Instr::MemSet { .. } | Instr::Call { .. }
        )
    }
}

/// Block terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Option<ValueId>),
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Terminator::Br(target) => smallvec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => smallvec![*then_block, *else_block],
            Terminator::Ret(_) | Terminator::Unreachable => SmallVec::new(),
        }
    }
}

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub id: BlockId,
    /// Label, for readability of dumps and tests.
    pub name: String,
    pub body: Vec<Instr>,
    pub terminator: Terminator,
}

/// How a value came into existence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueDef {
    /// Result of an instruction.
    Instr,
    /// The `n`th function parameter.
    Param(u32),
    /// A module constant.
    Const(ConstId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueData {
    pub ty: MemTy,
    pub def: ValueDef,
}

/// A lowered function.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub name: String,
    pub params: Vec<MemTy>,
    pub ret: Option<MemTy>,
    /// Entry is always block 0.
    pub blocks: Vec<Block>,
    pub values: Vec<ValueData>,
}

impl Function {
    #[inline]
    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    /// All instructions in block order.
    pub fn instrs(&self) -> impl Iterator<Item = &Instr> {
        self.blocks.iter().flat_map(|b| b.body.iter())
    }

    /// All runtime entry points called, in block order.
    pub fn runtime_calls(&self) -> impl Iterator<Item = RuntimeFn> + '_ {
        self.instrs().filter_map(|i| match i {
            Instr::Call {
                callee: Callee::Runtime(f),
                ..
            } => Some(*f),
            _ => None,
        })
    }

    /// Number of calls to `f`.
    pub fn count_calls(&self, f: RuntimeFn) -> usize {
        self.runtime_calls().filter(|c| *c == f).count()
    }

    /// Find a block by label.
    pub fn block_named(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests;
