//! Assignment/copy policy.
//!
//! A pure decision table: given the operation kind, the shapes of both
//! sides, the element traits and the source provenance, pick exactly one
//! [`CopyStrategy`]. The executor in [`crate::assign`] emits IR for the
//! chosen strategy; nothing here touches the builder.
//!
//! | Destination | Source | Strategy |
//! |---|---|---|
//! | dynamic-array binding | array | `Rebind` |
//! | dynamic-array binding | null | `RebindNull` |
//! | elements | null, trivial | `ZeroFill` |
//! | elements | array, trivial | `BulkCopy` |
//! | elements | array, constructing with hooks | `RuntimeConstruct` |
//! | elements | array, assigning with hooks | `RuntimeAssign` |
//! | elements | zero or byte scalar, fast | `BroadcastMemset` |
//! | elements | scalar, fast | `BroadcastLoop` |
//! | elements | scalar with hooks | `RuntimeBroadcast` |

use keel_ir::{ExprArena, ExprId, ExprKind};

use crate::traits::ElementTraits;

/// Kind of store being lowered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    /// Initialize a destination that holds no live value.
    Construct,
    /// Raw bit move into a destination with no live value; never runs hooks.
    Blit,
    /// Overwrite a live destination.
    Assign,
}

impl AssignOp {
    /// The destination holds no value to destroy.
    #[inline]
    pub fn is_constructing(self) -> bool {
        matches!(self, AssignOp::Construct | AssignOp::Blit)
    }
}

/// Whether the source value may share memory with something still live.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceProvenance {
    /// A temporary produced by the expression itself (literal, concatenation,
    /// allocation). Moving it needs no copy hook.
    Fresh,
    /// An lvalue or anything else that may alias.
    MayAlias,
}

impl SourceProvenance {
    /// Conservative static classification of an expression.
    pub fn of_expr(exprs: &ExprArena, expr: ExprId) -> Self {
        match exprs[expr].kind {
            ExprKind::ArrayLit(_)
            | ExprKind::StructLit(_)
            | ExprKind::UnionLit { .. }
            | ExprKind::Cat { .. }
            | ExprKind::Null
            | ExprKind::Lit(_) => SourceProvenance::Fresh,
            _ => SourceProvenance::MayAlias,
        }
    }

    #[inline]
    pub fn may_alias(self) -> bool {
        matches!(self, SourceProvenance::MayAlias)
    }
}

/// Destination of an assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DstShape {
    /// A dynamic-array variable; storing rebinds it.
    Binding,
    /// Elements of a fixed-length array.
    Fixed,
    /// Elements viewed through a dynamic array.
    Elements,
}

/// Source of an assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SrcShape {
    Null,
    /// An array with the destination's element type.
    Array { fixed: bool },
    /// A single element broadcast to every slot.
    Scalar {
        /// Known all-zero constant.
        zero: bool,
        /// One-byte element.
        byte: bool,
    },
}

/// Everything the decision depends on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AssignQuery {
    pub op: AssignOp,
    pub dst: DstShape,
    pub src: SrcShape,
    pub traits: ElementTraits,
    pub provenance: SourceProvenance,
    pub runtime_checks: bool,
}

/// The lowering path chosen for one assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CopyStrategy {
    /// Store the source pair into the binding.
    Rebind,
    /// Store `{0, null}` into the binding.
    RebindNull,
    /// `memset` the destination bytes to zero.
    ZeroFill,
    /// Bulk byte copy; `checked` routes through the overlap/length-checked
    /// runtime copy.
    BulkCopy { checked: bool },
    /// `array-construct(ti, src, dst)`.
    RuntimeConstruct,
    /// `array-assign-*(ti, src, dst, scratch)`.
    RuntimeAssign { aliasing: bool },
    /// `memset` with the scalar byte.
    BroadcastMemset,
    /// Counted store loop.
    BroadcastLoop,
    /// `set-construct` / `set-assign(ti, &scalar, dst, count)`.
    RuntimeBroadcast { construct: bool },
}

impl CopyStrategy {
    /// Strategies that call into the runtime.
    pub fn calls_runtime(self) -> bool {
        matches!(
            self,
            CopyStrategy::BulkCopy { checked: true }
                | CopyStrategy::RuntimeConstruct
                | CopyStrategy::RuntimeAssign { .. }
                | CopyStrategy::RuntimeBroadcast { .. }
        )
    }
}

/// Pick the strategy for `query`.
pub fn select_strategy(query: &AssignQuery) -> CopyStrategy {
    let constructing = query.op.is_constructing();
    let needs_destruction = !constructing && query.traits.needs_destruction();

    match (query.dst, query.src) {
        (DstShape::Binding, SrcShape::Null) => CopyStrategy::RebindNull,
        (DstShape::Binding, SrcShape::Array { .. }) => CopyStrategy::Rebind,

        (dst, SrcShape::Null | SrcShape::Array { .. }) => {
            let src_dynamic = !matches!(query.src, SrcShape::Array { fixed: true });
            let needs_copy = query.op != AssignOp::Blit
                && query.traits.needs_copy_construct()
                && (query.provenance.may_alias() || src_dynamic);

            if !needs_destruction && !needs_copy {
                if query.src == SrcShape::Null {
                    return CopyStrategy::ZeroFill;
                }
                let both_fixed = dst == DstShape::Fixed && !src_dynamic;
                let known_in_bounds = constructing || both_fixed;
                return CopyStrategy::BulkCopy {
                    checked: query.runtime_checks && !known_in_bounds,
                };
            }
            if constructing {
                CopyStrategy::RuntimeConstruct
            } else {
                CopyStrategy::RuntimeAssign {
                    aliasing: query.provenance.may_alias(),
                }
            }
        }

        // A binding never receives a scalar; the caller expands it to the
        // element view first.
        (_, SrcShape::Scalar { zero, byte }) => {
            let needs_copy = query.op != AssignOp::Blit
                && query.provenance.may_alias()
                && query.traits.needs_copy_construct();
            if needs_destruction || needs_copy {
                return CopyStrategy::RuntimeBroadcast {
                    construct: constructing,
                };
            }
            if zero || byte {
                CopyStrategy::BroadcastMemset
            } else {
                CopyStrategy::BroadcastLoop
            }
        }
    }
}
