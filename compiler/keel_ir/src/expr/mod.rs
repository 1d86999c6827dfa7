//! Typed expression arena.
//!
//! The array lowering consumes expressions that semantic analysis has
//! already typed. Expressions are stored flat in an [`ExprArena`] and
//! referenced by [`ExprId`]; children are ids, never boxes.

use std::fmt;
use std::ops::Index;

use crate::span::{SourceLoc, Span};
use crate::types::TypeId;

/// Index of an expression in an [`ExprArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
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

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A local variable slot. The lowering binds each local to an address.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A scalar literal value.
///
/// Floats are stored as `f64` bits so literals can be hashed and compared.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum LitValue {
    Int(i64),
    Float(u64),
    Bool(bool),
    Char(u32),
}

impl LitValue {
    pub fn float(value: f64) -> Self {
        LitValue::Float(value.to_bits())
    }

    /// Integer view of an integral literal (ints, bools, chars).
    pub fn as_int(self) -> Option<i64> {
        match self {
            LitValue::Int(v) => Some(v),
            LitValue::Bool(b) => Some(i64::from(b)),
            LitValue::Char(c) => Some(i64::from(c)),
            LitValue::Float(_) => None,
        }
    }
}

/// Integer arithmetic in index and length expressions.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

/// Expression kinds consumed by the array lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Lit(LitValue),
    /// The null literal; for slices this is the empty `{0, null}` pair.
    Null,
    Local(LocalId),
    /// Positional array literal `[a, b, c]`.
    ArrayLit(Vec<ExprId>),
    /// Struct literal; `None` fields take the field default.
    StructLit(Vec<Option<ExprId>>),
    /// Union literal initializing one member.
    UnionLit { member: u32, value: ExprId },
    /// `lhs ~ rhs`. Either side may be an array or a single element.
    Cat { lhs: ExprId, rhs: ExprId },
    /// `base[index]`.
    Index { base: ExprId, index: ExprId },
    /// `base.length`.
    Length(ExprId),
    Arith { op: ArithOp, lhs: ExprId, rhs: ExprId },
}

/// A typed expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub ty: TypeId,
    pub kind: ExprKind,
    pub loc: SourceLoc,
}

impl Expr {
    pub fn new(ty: TypeId, kind: ExprKind) -> Self {
        Expr {
            ty,
            kind,
            loc: SourceLoc::synthetic(),
        }
    }

    #[must_use]
    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    #[inline]
    pub fn span(&self) -> Span {
        self.loc.span
    }
}

/// Flat storage for expressions.
#[derive(Default, Debug)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "expression counts never exceed u32"
    )]
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::new(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    // Convenience constructors

    pub fn lit(&mut self, ty: TypeId, value: LitValue) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::Lit(value)))
    }

    pub fn int(&mut self, ty: TypeId, value: i64) -> ExprId {
        self.lit(ty, LitValue::Int(value))
    }

    pub fn null(&mut self, ty: TypeId) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::Null))
    }

    pub fn local(&mut self, ty: TypeId, local: LocalId) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::Local(local)))
    }

    pub fn array_lit(&mut self, ty: TypeId, elements: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::ArrayLit(elements)))
    }

    pub fn cat(&mut self, ty: TypeId, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::Cat { lhs, rhs }))
    }

    pub fn index(&mut self, ty: TypeId, base: ExprId, index: ExprId) -> ExprId {
        self.alloc(Expr::new(ty, ExprKind::Index { base, index }))
    }
}

impl Index<ExprId> for ExprArena {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        self.get(id)
    }
}

/// One `[index:] value` entry of an array initializer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitEntry {
    /// Explicit index; `None` continues from the previous entry.
    pub index: Option<ExprId>,
    pub value: Initializer,
}

/// A brace array initializer `{ 0: a, c, 5: d }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayInit {
    pub entries: Vec<InitEntry>,
    /// Inferred dimension: one past the largest index the entries reach.
    pub dim: u64,
    pub span: Span,
}

impl ArrayInit {
    /// Build an initializer and infer its dimension from constant indices.
    ///
    /// Non-constant indices are left for the literal folder to reject.
    pub fn new(entries: Vec<InitEntry>, exprs: &ExprArena, span: Span) -> Self {
        let mut next = 0u64;
        let mut dim = 0u64;
        for entry in &entries {
            if let Some(index) = entry.index {
                if let ExprKind::Lit(lit) = exprs[index].kind {
                    if let Some(i) = lit.as_int().and_then(|i| u64::try_from(i).ok()) {
                        next = i;
                    }
                }
            }
            next = next.saturating_add(1);
            dim = dim.max(next);
        }
        ArrayInit { entries, dim, span }
    }
}

/// Initializer of a static or literal-folded declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Initializer {
    Expr(ExprId),
    Array(ArrayInit),
    /// Explicitly uninitialized; folds to all-zero bits.
    Void,
}
