//! Assignment executor.
//!
//! Classifies both sides of a store, asks [`select_strategy`] for the path
//! and emits it. Arrays go through the decision table; other values are a
//! load/store plus the copy-construct hook when the source may alias.

use keel_ir::{BinOp, MemTy, RuntimeFn, SourceLoc, ValueId};

use crate::cfg::counted_loop;
use crate::context::{LowerCx, LowerResult};
use crate::policy::{
    select_strategy, AssignOp, AssignQuery, CopyStrategy, DstShape, SourceProvenance, SrcShape,
};
use crate::repr::ArrayShape;
use crate::value::{RuntimeValue, ValueKind};

impl LowerCx<'_> {
    /// Store `src` into `dst` with the semantics of `op`.
    pub fn assign_value(
        &mut self,
        dst: RuntimeValue,
        src: RuntimeValue,
        op: AssignOp,
        provenance: SourceProvenance,
    ) -> LowerResult<()> {
        if self.is_array_type(dst.ty) {
            return self.assign_array(dst, src, op, provenance);
        }
        let Some(addr) = dst.addr() else {
            return Err(self.ice(SourceLoc::synthetic(), "store into a non-location"));
        };
        let value = self.load_value(&src);
        self.b.store(value, addr);
        if op != AssignOp::Blit
            && provenance.may_alias()
            && self.traits_of(dst.ty).needs_copy_construct()
        {
            self.b.call_postblit(dst.ty, addr);
        }
        Ok(())
    }

    /// Store into an array destination: rebind, copy, or broadcast.
    pub fn assign_array(
        &mut self,
        dst: RuntimeValue,
        src: RuntimeValue,
        op: AssignOp,
        provenance: SourceProvenance,
    ) -> LowerResult<()> {
        let Some(dst_shape) = self.shape(dst.ty).filter(|s| s.is_array()) else {
            let name = self.pool.display(dst.ty);
            return Err(self.ice(SourceLoc::synthetic(), format!("`{name}` is not an array")));
        };
        let elem = dst_shape.elem();
        let elem_mem = self.mem(elem);

        let src_shape = if src.is_null() {
            SrcShape::Null
        } else {
            match self.shape(src.ty) {
                Some(shape) if shape.is_array() && self.mem(shape.elem()) == elem_mem => {
                    SrcShape::Array {
                        fixed: shape.is_fixed(),
                    }
                }
                _ => self.scalar_shape(&src),
            }
        };

        let mut dst = dst;
        let mut dst_kind = match (dst_shape, dst.kind) {
            (ArrayShape::Slice { .. }, ValueKind::Address(_)) => DstShape::Binding,
            (ArrayShape::Fixed { .. }, _) => DstShape::Fixed,
            _ => DstShape::Elements,
        };
        // Broadcasting into a binding writes through its current elements.
        if dst_kind == DstShape::Binding && matches!(src_shape, SrcShape::Scalar { .. }) {
            dst = self.to_pair(&dst);
            dst_kind = DstShape::Elements;
        }

        let traits = self.traits_of(elem);
        let strategy = select_strategy(&AssignQuery {
            op,
            dst: dst_kind,
            src: src_shape,
            traits,
            provenance,
            runtime_checks: self.config.runtime_checks,
        });
        tracing::debug!(
            dst = %self.pool.display(dst.ty),
            src = %self.pool.display(src.ty),
            ?op,
            ?strategy,
            "array assignment"
        );

        match strategy {
            CopyStrategy::Rebind => {
                let (len, ptr) = self.array_parts(&src);
                if let Some(slot) = dst.addr() {
                    self.set_array(slot, len, ptr);
                }
            }
            CopyStrategy::RebindNull => {
                if let Some(slot) = dst.addr() {
                    self.set_array_null(slot);
                }
            }
            CopyStrategy::ZeroFill => {
                let (len, ptr) = self.array_parts(&dst);
                let bytes = self.scale(len, traits.byte_size);
                let zero = self.b.const_int(MemTy::I8, 0);
                self.b.memset(ptr, zero, bytes);
            }
            CopyStrategy::BulkCopy { checked } => {
                let (dst_len, dst_ptr) = self.array_parts(&dst);
                let (src_len, src_ptr) = self.array_parts(&src);
                let dst_bytes = self.scale(dst_len, traits.byte_size);
                if checked {
                    let src_bytes = self.scale(src_len, traits.byte_size);
                    self.b.call_runtime(
                        RuntimeFn::SliceCopyChecked,
                        vec![dst_ptr, dst_bytes, src_ptr, src_bytes],
                    );
                } else {
                    self.b.memcpy(dst_ptr, src_ptr, dst_bytes);
                }
            }
            CopyStrategy::RuntimeConstruct => {
                let ti = self.type_info(elem);
                let src_slice = self.slice_of(&src);
                let dst_slice = self.slice_of(&dst);
                self.b
                    .call_runtime(RuntimeFn::ArrayCtor, vec![ti, src_slice, dst_slice]);
            }
            CopyStrategy::RuntimeAssign { aliasing } => {
                let ti = self.type_info(elem);
                let src_slice = self.slice_of(&src);
                let dst_slice = self.slice_of(&dst);
                let scratch = self.b.alloca(elem_mem);
                let f = if aliasing {
                    RuntimeFn::ArrayAssignAliasing
                } else {
                    RuntimeFn::ArrayAssignRaw
                };
                self.b.call_runtime(f, vec![ti, src_slice, dst_slice, scratch]);
            }
            CopyStrategy::BroadcastMemset
            | CopyStrategy::BroadcastLoop
            | CopyStrategy::RuntimeBroadcast { .. } => {
                self.broadcast(&dst, &src, traits.byte_size, strategy)?;
            }
        }
        Ok(())
    }

    fn scalar_shape(&self, src: &RuntimeValue) -> SrcShape {
        SrcShape::Scalar {
            zero: self.is_zero_constant(src),
            byte: self.size_of(src.ty) == 1,
        }
    }

    /// An immediate whose value is the all-zero constant.
    fn is_zero_constant(&self, v: &RuntimeValue) -> bool {
        match v.kind {
            ValueKind::Immediate(value) => self
                .b
                .as_const(value)
                .is_some_and(|c| self.b.module().consts.is_zero(c)),
            _ => false,
        }
    }

    /// Fill every element of `dst` with the scalar `src`.
    ///
    /// The destination element may itself be an array of the scalar type;
    /// the count is then in scalar units.
    fn broadcast(
        &mut self,
        dst: &RuntimeValue,
        src: &RuntimeValue,
        elem_size: u64,
        strategy: CopyStrategy,
    ) -> LowerResult<()> {
        let scalar_size = self.size_of(src.ty);
        if scalar_size == 0 || elem_size % scalar_size != 0 {
            return Err(self.ice(
                SourceLoc::synthetic(),
                format!(
                    "element size {elem_size} is not a multiple of the broadcast value size {scalar_size}"
                ),
            ));
        }

        let (len, ptr) = self.array_parts(dst);
        let bytes = self.scale(len, elem_size);
        match strategy {
            CopyStrategy::BroadcastMemset => {
                let byte = if self.is_zero_constant(src) {
                    self.b.const_int(MemTy::I8, 0)
                } else {
                    self.load_value(src)
                };
                self.b.memset(ptr, byte, bytes);
            }
            CopyStrategy::BroadcastLoop => {
                let count = self.exact_div(bytes, scalar_size);
                let value = self.load_value(src);
                let scalar_mem = self.mem(src.ty);
                counted_loop(&mut self.b, count, |b, i| {
                    let slot = b.elem_ptr(&scalar_mem, ptr, i);
                    b.store(value, slot);
                });
            }
            CopyStrategy::RuntimeBroadcast { construct } => {
                let count = self.exact_div(bytes, scalar_size);
                let ti = self.type_info(src.ty);
                let scalar = self.spill(src);
                let f = if construct {
                    RuntimeFn::ArraySetCtor
                } else {
                    RuntimeFn::ArraySetAssign
                };
                self.b.call_runtime(f, vec![ti, scalar, ptr, count]);
            }
            _ => {}
        }
        Ok(())
    }

    /// `len * size`, folded when `len` is constant.
    pub(crate) fn scale(&mut self, len: ValueId, size: u64) -> ValueId {
        if let Some(n) = self.b.as_const_int(len) {
            return self.b.const_word(n.wrapping_mul(size));
        }
        if size == 1 {
            return len;
        }
        let size = self.b.const_word(size);
        self.b.binary(BinOp::Mul, len, size)
    }

    /// `value / divisor` known to be exact, folded when `value` is constant.
    fn exact_div(&mut self, value: ValueId, divisor: u64) -> ValueId {
        if let Some(n) = self.b.as_const_int(value) {
            return self.b.const_word(n / divisor);
        }
        if divisor == 1 {
            return value;
        }
        let divisor = self.b.const_word(divisor);
        self.b.binary(BinOp::UDivExact, value, divisor)
    }
}
