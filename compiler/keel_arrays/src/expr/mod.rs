//! Expression lowering for the array-typed expression kinds.
//!
//! Produces a [`RuntimeValue`] per expression. Array literals and
//! aggregates are materialized into fresh storage; locals and index
//! expressions produce addresses so they can be assigned through.

use std::cmp::Ordering;

use keel_ir::{ArithOp, BinOp, CastOp, ExprId, ExprKind, TypeId, TypeKind, ValueId};

use crate::alloc::ElementInit;
use crate::context::{LowerCx, LowerResult};
use crate::repr::ArrayShape;
use crate::value::RuntimeValue;

impl LowerCx<'_> {
    /// Lower `expr` to a value.
    pub fn lower_expr(&mut self, expr: ExprId) -> LowerResult<RuntimeValue> {
        let pool = self.pool;
        let e = self.expr(expr);
        let ty = e.ty;
        match &e.kind {
            ExprKind::Lit(lit) => {
                let c = self.lit_const(*lit, ty);
                let value = self.b.const_value(c);
                Ok(RuntimeValue::immediate(ty, value))
            }
            ExprKind::Null => {
                if pool.is_slice(ty) {
                    return Ok(RuntimeValue::null(ty));
                }
                let value = if pool.is_pointer(ty) {
                    self.b.const_null()
                } else {
                    let mem = self.mem(ty);
                    self.b.const_zero(mem)
                };
                Ok(RuntimeValue::immediate(ty, value))
            }
            ExprKind::Local(local) => match self.local_addr(*local) {
                Some(addr) => Ok(RuntimeValue::address(ty, addr)),
                None => Err(self.ice(e.loc, format!("local {} is not bound", local.raw()))),
            },
            ExprKind::ArrayLit(elems) => match self.shape(ty) {
                Some(ArrayShape::Fixed { .. }) => {
                    let mem = self.mem(ty);
                    let slot = self.b.alloca(mem);
                    self.initialize_array_literal(expr, slot)?;
                    Ok(RuntimeValue::address(ty, slot))
                }
                Some(ArrayShape::Slice { .. }) if elems.is_empty() => Ok(RuntimeValue::null(ty)),
                Some(ArrayShape::Slice { elem }) => {
                    let len = self.b.const_word(elems.len() as u64);
                    let array = self.new_dyn_array(ty, len, ElementInit::Uninit)?;
                    let ptr = self.array_ptr(&array);
                    let elem_mem = self.mem(elem);
                    for (i, &el) in (0u64..).zip(elems) {
                        let index = self.b.const_word(i);
                        let slot = self.b.elem_ptr(&elem_mem, ptr, index);
                        self.construct_in_place(el, elem, slot)?;
                    }
                    Ok(array)
                }
                _ => {
                    let name = pool.display(ty);
                    Err(self.ice(e.loc, format!("array literal of type `{name}`")))
                }
            },
            ExprKind::StructLit(_) | ExprKind::UnionLit { .. } => {
                let mem = self.mem(ty);
                let slot = self.b.alloca(mem);
                self.construct_in_place(expr, ty, slot)?;
                Ok(RuntimeValue::address(ty, slot))
            }
            ExprKind::Cat { .. } => self.cat(expr),
            ExprKind::Index { base, index } => self.lower_index(expr, *base, *index),
            ExprKind::Length(base) => {
                let base = self.lower_expr(*base)?;
                let len = self.array_len(&base);
                Ok(RuntimeValue::immediate(TypeId::USIZE, len))
            }
            ExprKind::Arith { op, lhs, rhs } => {
                let l = self.lower_expr(*lhs)?;
                let l = self.load_value(&l);
                let r = self.lower_expr(*rhs)?;
                let r = self.load_value(&r);
                let op = match op {
                    ArithOp::Add => BinOp::Add,
                    ArithOp::Sub => BinOp::Sub,
                    ArithOp::Mul => BinOp::Mul,
                };
                let value = self.b.binary(op, l, r);
                Ok(RuntimeValue::immediate(ty, value))
            }
        }
    }

    /// `base[index]` as the address of the element.
    fn lower_index(
        &mut self,
        expr: ExprId,
        base: ExprId,
        index: ExprId,
    ) -> LowerResult<RuntimeValue> {
        let e = self.expr(expr);
        let base_ty = self.expr(base).ty;
        let Some(shape) = self.shape(base_ty) else {
            let name = self.pool.display(base_ty);
            return Err(self.ice(e.loc, format!("indexing `{name}`")));
        };
        let array = self.lower_expr(base)?;
        let i = self.lower_expr(index)?;
        let i = self.load_value(&i);
        let index_ty = self.expr(index).ty;
        let i = self.widen_index(i, index_ty);

        // A constant index below a static length needs no check.
        let known_in_bounds = match shape {
            ArrayShape::Fixed { len, .. } => self.b.as_const_int(i).is_some_and(|n| n < len),
            _ => false,
        };
        self.index_bounds_check(&array, (!known_in_bounds).then_some(i), e.loc);

        let ptr = self.array_ptr(&array);
        let elem = shape.elem();
        let elem_mem = self.mem(elem);
        let slot = self.b.elem_ptr(&elem_mem, ptr, i);
        Ok(RuntimeValue::address(elem, slot))
    }

    /// Convert an index to a machine word.
    fn widen_index(&mut self, index: ValueId, ty: TypeId) -> ValueId {
        let word = self.b.word();
        let (Some(from), Some(to)) = (self.b.value_type(index).int_bits(), word.int_bits()) else {
            return index;
        };
        let signed = matches!(self.pool.kind(ty), TypeKind::Int { signed: true, .. });
        if let Some(n) = self.b.as_const_int(index) {
            return self.b.const_word(word_value(n, from, to, signed));
        }
        match from.cmp(&to) {
            Ordering::Less if signed => self.b.cast(CastOp::SExt, index, word),
            Ordering::Less => self.b.cast(CastOp::ZExt, index, word),
            Ordering::Greater => self.b.cast(CastOp::Trunc, index, word),
            Ordering::Equal => index,
        }
    }
}

/// `value` of width `from` converted to width `to`.
fn word_value(value: u64, from: u32, to: u32, signed: bool) -> u64 {
    let value = if signed && from < 64 {
        let shift = 64 - from;
        let extended = i64::from_ne_bytes((value << shift).to_ne_bytes()) >> shift;
        u64::from_ne_bytes(extended.to_ne_bytes())
    } else {
        value
    };
    if to < 64 {
        value & ((1u64 << to) - 1)
    } else {
        value
    }
}

#[cfg(test)]
mod tests;
