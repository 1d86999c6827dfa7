//! Concatenation and append.
//!
//! Appends grow the array in place through the runtime and then write the
//! new element; concatenations build a fresh array. A left-nested chain
//! `a ~ b ~ c ~ d` is flattened into one n-ary runtime call.

use smallvec::SmallVec;

use keel_ir::{CastOp, ExprId, ExprKind, MemTy, RuntimeFn, TypeId};

use crate::context::{LowerCx, LowerResult};
use crate::value::RuntimeValue;

impl LowerCx<'_> {
    /// `array ~= elem` for a single element.
    ///
    /// The element is evaluated and loaded before the array grows, so an
    /// element expression reading the array sees the old contents.
    pub fn append_element(
        &mut self,
        array: RuntimeValue,
        elem: ExprId,
    ) -> LowerResult<RuntimeValue> {
        let e = self.expr(elem);
        let Some(slot) = array.addr().filter(|_| self.pool.is_slice(array.ty)) else {
            return Err(self.ice(e.loc, "append to something other than a dynamic-array location"));
        };
        let elem_ty = self.elem_of(array.ty);

        let old_len = self.array_len(&array);
        let value = self.lower_expr(elem)?;
        let from_lvalue = value.is_lvalue();
        let loaded = self.load_value(&value);

        let ti = self.type_info(array.ty);
        let one = self.b.const_word(1);
        self.b
            .call_runtime(RuntimeFn::AppendCapacity, vec![ti, slot, one]);

        let ptr = self.array_ptr(&array);
        let elem_mem = self.mem(elem_ty);
        let dst = self.b.elem_ptr(&elem_mem, ptr, old_len);
        self.b.store(loaded, dst);
        if from_lvalue && self.traits_of(elem_ty).needs_copy_construct() {
            self.b.call_postblit(elem_ty, dst);
        }
        tracing::debug!(array = %self.pool.display(array.ty), "append element");
        Ok(array)
    }

    /// `array ~= other` for an array operand.
    pub fn append_array(
        &mut self,
        array: RuntimeValue,
        other: ExprId,
    ) -> LowerResult<RuntimeValue> {
        let e = self.expr(other);
        let Some(slot) = array.addr().filter(|_| self.pool.is_slice(array.ty)) else {
            return Err(self.ice(e.loc, "append to something other than a dynamic-array location"));
        };
        let other = self.lower_expr(other)?;
        let other = self.slice_of(&other);
        let ti = self.type_info(array.ty);
        self.b
            .call_runtime(RuntimeFn::AppendArray, vec![ti, slot, other]);
        tracing::debug!(array = %self.pool.display(array.ty), "append array");
        Ok(array)
    }

    /// Append a code point to a UTF-8 (`char[]`) or UTF-16 (`wchar[]`)
    /// string, encoding it.
    pub fn append_code_point(
        &mut self,
        string: RuntimeValue,
        code_point: ExprId,
    ) -> LowerResult<RuntimeValue> {
        let e = self.expr(code_point);
        let Some(slot) = string.addr() else {
            return Err(self.ice(e.loc, "append to a non-location"));
        };
        let f = match self.elem_of(string.ty) {
            TypeId::CHAR => RuntimeFn::AppendCodePointUtf8,
            TypeId::WCHAR => RuntimeFn::AppendCodePointUtf16,
            _ => {
                let name = self.pool.display(string.ty);
                return Err(self.ice(e.loc, format!("code point append to `{name}`")));
            }
        };
        let cp = self.lower_expr(code_point)?;
        let mut cp = self.load_value(&cp);
        match self.b.value_type(cp).int_bits() {
            Some(bits) if bits < 32 => cp = self.b.cast(CastOp::ZExt, cp, MemTy::I32),
            Some(bits) if bits > 32 => cp = self.b.cast(CastOp::Trunc, cp, MemTy::I32),
            _ => {}
        }
        self.b.call_runtime(f, vec![slot, cp]);
        Ok(string)
    }

    /// `lhs ~ rhs`, producing a new dynamic array of type `expr`'s type.
    pub fn cat(&mut self, expr: ExprId) -> LowerResult<RuntimeValue> {
        let e = self.expr(expr);
        let ExprKind::Cat { lhs, rhs } = e.kind else {
            return Err(self.ice(e.loc, "concatenation of a non-concatenation"));
        };
        let ty = e.ty;
        let elem = self.elem_of(ty);
        let ti = self.type_info(ty);

        let result = if matches!(self.expr(lhs).kind, ExprKind::Cat { .. }) {
            let operands = self.flatten_cat(expr);
            let count = operands.len() as u64;
            let record = self.b.layout().slice_record();
            let pairs = self.b.alloca(MemTy::Array(Box::new(record.clone()), count));
            for (i, operand) in (0u64..).zip(operands) {
                let value = self.lower_expr(operand)?;
                let slice = self.slice_operand(&value, elem);
                let index = self.b.const_word(i);
                let slot = self.b.elem_ptr(&record, pairs, index);
                self.b.store(slice, slot);
            }
            let n = self.b.const_word(count);
            let operands = self.make_slice(n, pairs);
            tracing::debug!(ty = %self.pool.display(ty), count, "n-ary concatenation");
            self.b.call_runtime(RuntimeFn::CatNary, vec![ti, operands])
        } else {
            let a = self.lower_expr(lhs)?;
            let a = self.slice_operand(&a, elem);
            let b = self.lower_expr(rhs)?;
            let b = self.slice_operand(&b, elem);
            tracing::debug!(ty = %self.pool.display(ty), "binary concatenation");
            self.b.call_runtime(RuntimeFn::CatBinary, vec![ti, a, b])
        };
        let Some(result) = result else {
            return Err(self.ice(e.loc, "concatenation entry point returns nothing"));
        };
        Ok(self.pair_from_slice(ty, result))
    }

    /// Operands of a left-nested concatenation chain, leftmost first.
    fn flatten_cat(&self, expr: ExprId) -> SmallVec<[ExprId; 4]> {
        let mut rights: SmallVec<[ExprId; 4]> = SmallVec::new();
        let mut cur = expr;
        while let ExprKind::Cat { lhs, rhs } = self.expr(cur).kind {
            rights.push(rhs);
            cur = lhs;
        }
        rights.push(cur);
        rights.reverse();
        rights
    }
}

#[cfg(test)]
mod tests;
