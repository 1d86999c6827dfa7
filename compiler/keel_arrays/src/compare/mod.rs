//! Array equality, ordering and identity.

use keel_ir::{BinOp, ICmpPred, RuntimeFn, SourceLoc, TypeId, ValueId};

use crate::context::{LowerCx, LowerResult};
use crate::value::RuntimeValue;

/// Ordering relation requested by the source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Signed predicate applied to the runtime's three-way result.
    pub fn predicate(self) -> ICmpPred {
        match self {
            CompareOp::Lt => ICmpPred::Slt,
            CompareOp::Le => ICmpPred::Sle,
            CompareOp::Gt => ICmpPred::Sgt,
            CompareOp::Ge => ICmpPred::Sge,
        }
    }
}

impl LowerCx<'_> {
    /// `lhs == rhs` (`eq`) or `lhs != rhs`. Returns an `i1`.
    ///
    /// Comparing against the null array only tests the other side's length.
    pub fn array_equals(
        &mut self,
        lhs: &RuntimeValue,
        rhs: &RuntimeValue,
        eq: bool,
    ) -> LowerResult<ValueId> {
        let pred = if eq { ICmpPred::Eq } else { ICmpPred::Ne };
        if rhs.is_null() || lhs.is_null() {
            let other = if rhs.is_null() { lhs } else { rhs };
            let len = self.array_len(other);
            let zero = self.b.const_word(0);
            return Ok(self.b.icmp(pred, len, zero));
        }

        let (a, b, ti) = self.compare_operands(lhs, rhs)?;
        let Some(result) = self.b.call_runtime(RuntimeFn::ArrayEquals, vec![a, b, ti]) else {
            return Err(self.ice(SourceLoc::synthetic(), "equality entry point returns nothing"));
        };
        tracing::debug!(ty = %self.pool.display(lhs.ty), eq, "array equality");
        let zero = self.b.const_i32(0);
        // The runtime returns non-zero for equal arrays.
        Ok(self.b.icmp(pred.inverse(), result, zero))
    }

    /// Lexicographic ordering. Returns an `i1`.
    pub fn array_compare(
        &mut self,
        lhs: &RuntimeValue,
        rhs: &RuntimeValue,
        op: CompareOp,
    ) -> LowerResult<ValueId> {
        let elem = self.elem_of(lhs.ty);
        let (a, b, ti) = self.compare_operands(lhs, rhs)?;
        let result = if elem == TypeId::CHAR {
            self.b.call_runtime(RuntimeFn::ArrayCompareChar, vec![a, b])
        } else {
            self.b.call_runtime(RuntimeFn::ArrayCompare, vec![a, b, ti])
        };
        let Some(result) = result else {
            return Err(self.ice(SourceLoc::synthetic(), "compare entry point returns nothing"));
        };
        tracing::debug!(ty = %self.pool.display(lhs.ty), ?op, "array ordering");
        let zero = self.b.const_i32(0);
        Ok(self.b.icmp(op.predicate(), result, zero))
    }

    /// `lhs is rhs` (`is`) or `lhs !is rhs`: same length and same pointer.
    /// Never calls the runtime.
    pub fn array_identity(&mut self, lhs: &RuntimeValue, rhs: &RuntimeValue, is: bool) -> ValueId {
        let (l1, p1) = self.array_parts(lhs);
        let (l2, p2) = self.array_parts(rhs);
        if is {
            let same_len = self.b.icmp(ICmpPred::Eq, l1, l2);
            let same_ptr = self.b.icmp(ICmpPred::Eq, p1, p2);
            self.b.binary(BinOp::And, same_len, same_ptr)
        } else {
            let diff_len = self.b.icmp(ICmpPred::Ne, l1, l2);
            let diff_ptr = self.b.icmp(ICmpPred::Ne, p1, p2);
            self.b.binary(BinOp::Or, diff_len, diff_ptr)
        }
    }

    /// Both sides as `{len, ptr}` of the left operand's element type, plus
    /// the left operand's descriptor.
    fn compare_operands(
        &mut self,
        lhs: &RuntimeValue,
        rhs: &RuntimeValue,
    ) -> LowerResult<(ValueId, ValueId, ValueId)> {
        let elem = self.elem_of(lhs.ty);
        if self.mem(self.elem_of(rhs.ty)) != self.mem(elem) {
            let (l, r) = (self.pool.display(lhs.ty), self.pool.display(rhs.ty));
            return Err(self.ice(
                SourceLoc::synthetic(),
                format!("comparison of `{l}` with `{r}`"),
            ));
        }
        let a = self.slice_of(lhs);
        let b = self.slice_of(rhs);
        let ti = self.type_info(lhs.ty);
        Ok((a, b, ti))
    }
}
