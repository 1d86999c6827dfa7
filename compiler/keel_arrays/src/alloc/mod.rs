//! Dynamic-array allocation and resizing.
//!
//! New arrays come from the runtime. The entry point is picked by how the
//! elements must start out: left uninitialized (the caller fills them),
//! zeroed (the element default is all-zero bits), or copied from the
//! element default.

use keel_ir::{ConstValue, GlobalVar, Linkage, MemTy, RuntimeFn, SourceLoc, TypeId, ValueId};

use crate::context::{LowerCx, LowerResult};
use crate::value::RuntimeValue;

/// Initial contents of a freshly allocated array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementInit {
    /// The caller writes every element before reading.
    Uninit,
    /// Every element starts as the type's default.
    Default,
}

impl LowerCx<'_> {
    /// Allocate a dynamic array of type `ty` with `len` elements.
    pub fn new_dyn_array(
        &mut self,
        ty: TypeId,
        len: ValueId,
        init: ElementInit,
    ) -> LowerResult<RuntimeValue> {
        let elem = self.elem_of(ty);
        let f = match init {
            ElementInit::Uninit => RuntimeFn::NewArrayUninit,
            ElementInit::Default if self.traits_of(elem).zero_default() => {
                RuntimeFn::NewArrayZeroed
            }
            ElementInit::Default => RuntimeFn::NewArrayInit,
        };
        tracing::debug!(ty = %self.pool.display(ty), ?f, "new dynamic array");
        let ti = self.type_info(ty);
        let Some(slice) = self.b.call_runtime(f, vec![ti, len]) else {
            return Err(self.ice(SourceLoc::synthetic(), "allocation entry point returns nothing"));
        };
        Ok(self.pair_from_slice(ty, slice))
    }

    /// Allocate a rectangular multi-dimensional dynamic array, one length
    /// per nesting level, outermost first.
    ///
    /// The dimension list is passed as a `{n, ptr}` word array. When every
    /// dimension is a constant the list is a module constant; otherwise it
    /// lives on the stack.
    pub fn new_multi_dim_array(
        &mut self,
        ty: TypeId,
        dims: &[ValueId],
    ) -> LowerResult<RuntimeValue> {
        if dims.is_empty() {
            return Err(self.ice(
                SourceLoc::synthetic(),
                "multi-dimensional allocation without dimensions",
            ));
        }
        // One nesting level per dimension.
        let mut leaf = ty;
        for _ in dims {
            let Some(next) = self.pool.next_of(leaf) else {
                let name = self.pool.display(ty);
                return Err(self.ice(
                    SourceLoc::synthetic(),
                    format!("`{name}` has fewer than {} dimensions", dims.len()),
                ));
            };
            leaf = next;
        }

        let word = self.b.word();
        let count = dims.len() as u64;
        let list_ty = MemTy::Array(Box::new(word.clone()), count);

        let constant: Option<Vec<u64>> = dims.iter().map(|&d| self.b.as_const_int(d)).collect();
        let list = match constant {
            Some(values) => {
                let module = self.b.module_mut();
                let elems = values
                    .iter()
                    .map(|&v| module.consts.int(word.clone(), v))
                    .collect();
                let init = module.consts.intern(ConstValue::Array {
                    elem: word.clone(),
                    elems,
                });
                let global = module.globals.add(GlobalVar {
                    name: ".dimsarray".to_owned(),
                    ty: list_ty,
                    init,
                    constant: true,
                    linkage: Linkage::Private,
                    unnamed_addr: true,
                });
                self.b.global_addr(global)
            }
            None => {
                let list = self.b.alloca(list_ty);
                for (i, &dim) in (0u64..).zip(dims) {
                    let index = self.b.const_word(i);
                    let slot = self.b.elem_ptr(&word, list, index);
                    self.b.store(dim, slot);
                }
                list
            }
        };

        let f = if self.traits_of(leaf).zero_default() {
            RuntimeFn::NewMultiArrayZeroed
        } else {
            RuntimeFn::NewMultiArrayInit
        };
        tracing::debug!(
            ty = %self.pool.display(ty),
            dims = count,
            ?f,
            "new multi-dimensional array"
        );
        let ti = self.type_info(ty);
        let n = self.b.const_word(count);
        let dims = self.make_slice(n, list);
        let Some(slice) = self.b.call_runtime(f, vec![ti, dims]) else {
            return Err(self.ice(SourceLoc::synthetic(), "allocation entry point returns nothing"));
        };
        Ok(self.pair_from_slice(ty, slice))
    }

    /// `array.length = new_len`. New elements take the element default.
    pub fn resize_dyn_array(
        &mut self,
        array: RuntimeValue,
        new_len: ValueId,
    ) -> LowerResult<RuntimeValue> {
        let Some(slot) = array.addr().filter(|_| self.pool.is_slice(array.ty)) else {
            return Err(self.ice(
                SourceLoc::synthetic(),
                "resize of something other than a dynamic-array location",
            ));
        };
        let elem = self.elem_of(array.ty);
        let f = if self.traits_of(elem).zero_default() {
            RuntimeFn::SetLengthZeroed
        } else {
            RuntimeFn::SetLengthInit
        };
        tracing::debug!(ty = %self.pool.display(array.ty), ?f, "resize dynamic array");
        let ti = self.type_info(array.ty);
        let Some(slice) = self.b.call_runtime(f, vec![ti, new_len, slot]) else {
            return Err(self.ice(SourceLoc::synthetic(), "resize entry point returns nothing"));
        };
        Ok(self.pair_from_slice(array.ty, slice))
    }
}
