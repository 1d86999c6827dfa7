//! Casts from arrays and pointers.
//!
//! | From | To | Lowering |
//! |---|---|---|
//! | array | pointer | element pointer |
//! | array | dynamic array | pointer plus rescaled length |
//! | dynamic array | fixed array | bounds check, then reinterpret |
//! | array or pointer | `bool` | `ptr != null` |
//! | array | anything else | reinterpret the element pointer |

use keel_diagnostic::{Diagnostic, ErrorCode, ErrorGuaranteed};
use keel_ir::{BinOp, CastOp, ICmpPred, MemTy, RuntimeFn, SourceLoc, TypeId, TypeKind, ValueId};

use crate::context::{LowerCx, LowerResult};
use crate::repr::ArrayShape;
use crate::value::RuntimeValue;

impl LowerCx<'_> {
    /// Cast `v` to `to`.
    pub fn cast_array(
        &mut self,
        v: &RuntimeValue,
        to: TypeId,
        loc: SourceLoc,
    ) -> LowerResult<RuntimeValue> {
        let pool = self.pool;
        let Some(from) = self.shape(v.ty) else {
            return Err(self.invalid_cast(v.ty, to, loc));
        };
        tracing::debug!(
            from = %pool.display(v.ty),
            to = %pool.display(to),
            "array cast"
        );

        if to == TypeId::BOOL {
            let ptr = self.array_ptr(v);
            let null = self.b.const_null();
            let nonnull = self.b.icmp(ICmpPred::Ne, ptr, null);
            let byte = self.b.cast(CastOp::ZExt, nonnull, MemTy::I8);
            return Ok(RuntimeValue::immediate(to, byte));
        }

        if let ArrayShape::Pointer { .. } = from {
            let ptr = self.array_ptr(v);
            return match pool.kind(to) {
                TypeKind::Pointer(_) => Ok(RuntimeValue::immediate(to, ptr)),
                TypeKind::Slice(_) => Err(self.invalid_cast(v.ty, to, loc)),
                _ => Ok(RuntimeValue::address(to, ptr)),
            };
        }

        match *pool.kind(to) {
            TypeKind::Pointer(_) => {
                let ptr = self.array_ptr(v);
                Ok(RuntimeValue::immediate(to, ptr))
            }
            TypeKind::Slice(to_elem) => {
                let from_size = self.size_of(from.elem());
                let to_size = self.size_of(to_elem);
                let len = match from {
                    ArrayShape::Fixed { len, .. } => {
                        let bytes = len.saturating_mul(from_size);
                        if to_size == 0 || bytes % to_size != 0 {
                            let diag = Diagnostic::error(ErrorCode::E5006)
                                .with_message(format!(
                                    "cannot cast `{}` to `{}`: {bytes} bytes is not a multiple of the element size {to_size}",
                                    pool.display(v.ty),
                                    pool.display(to),
                                ))
                                .with_label(loc.span, "in this cast");
                            return Err(self.error(diag, loc));
                        }
                        self.b.const_word(bytes / to_size)
                    }
                    _ => {
                        let len = self.array_len(v);
                        self.cast_length(len, from_size, to_size)?
                    }
                };
                let ptr = self.array_ptr(v);
                Ok(RuntimeValue::pair(to, len, ptr))
            }
            TypeKind::FixedArray { elem: to_elem, len: to_len } if from.is_slice() => {
                let from_size = self.size_of(from.elem());
                let to_bytes = to_len.saturating_mul(self.size_of(to_elem));
                let (len, ptr) = self.array_parts(v);
                if to_bytes > 0 && from_size > 0 {
                    let last = self.b.const_word((to_bytes - 1) / from_size);
                    let in_bounds = self.b.icmp(ICmpPred::Ult, last, len);
                    self.guard_or_bounds_fail(in_bounds, "cast.ok", "cast.fail", loc);
                }
                Ok(RuntimeValue::address(to, ptr))
            }
            _ => {
                let ptr = self.array_ptr(v);
                Ok(RuntimeValue::address(to, ptr))
            }
        }
    }

    /// Length of a dynamic array after reinterpreting its elements from
    /// `from_size` to `to_size` bytes.
    pub fn cast_length(
        &mut self,
        len: ValueId,
        from_size: u64,
        to_size: u64,
    ) -> LowerResult<ValueId> {
        if from_size == to_size {
            return Ok(len);
        }
        if to_size != 0 && from_size % to_size == 0 {
            let ratio = from_size / to_size;
            if let Some(n) = self.b.as_const_int(len) {
                return Ok(self.b.const_word(n.wrapping_mul(ratio)));
            }
            let ratio = self.b.const_word(ratio);
            return Ok(self.b.binary(BinOp::Mul, len, ratio));
        }
        let from = self.b.const_word(from_size);
        let to = self.b.const_word(to_size);
        let Some(scaled) = self
            .b
            .call_runtime(RuntimeFn::CastLength, vec![len, from, to])
        else {
            return Err(self.ice(SourceLoc::synthetic(), "length cast returns nothing"));
        };
        Ok(scaled)
    }

    #[cold]
    fn invalid_cast(&mut self, from: TypeId, to: TypeId, loc: SourceLoc) -> ErrorGuaranteed {
        let diag = Diagnostic::error(ErrorCode::E5007)
            .with_message(format!(
                "cannot cast `{}` to `{}`",
                self.pool.display(from),
                self.pool.display(to)
            ))
            .with_label(loc.span, "not an array");
        self.error(diag, loc)
    }
}

#[cfg(test)]
mod tests;
