//! Constant literal folding and array literal initialization.
//!
//! Folds brace initializers and array literals whose elements are all
//! compile-time constants into module constants, promotes them to globals
//! where the target representation needs an address, and initializes
//! destinations from literals either with one store, one `memcpy` from a
//! read-only global, or element by element.

use keel_diagnostic::{Diagnostic, ErrorCode};
use keel_ir::{
    ArithOp, ArrayInit, ConstId, ConstValue, ExprId, ExprKind, GlobalVar, Initializer, Linkage,
    LitValue, MemTy, SourceLoc, TypeId, TypeKind, ValueId,
};

use crate::context::{LowerCx, LowerResult};
use crate::policy::{AssignOp, SourceProvenance};
use crate::value::RuntimeValue;

/// Why a slot could not be filled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotError {
    OutOfRange,
    Duplicate,
}

/// `N` optional constants, one per array index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<Option<ConstId>>,
}

impl SlotTable {
    pub fn new(len: usize) -> Self {
        SlotTable {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn fill(&mut self, index: u64, value: ConstId) -> Result<(), SlotError> {
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .ok_or(SlotError::OutOfRange)?;
        if slot.is_some() {
            return Err(SlotError::Duplicate);
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<ConstId> {
        self.slots.get(index).copied().flatten()
    }

    /// Number of slots no entry filled.
    pub fn missing(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// All slots, gaps filled with `default`. `None` if a gap remains.
    pub fn complete(self, default: Option<ConstId>) -> Option<Vec<ConstId>> {
        self.slots.into_iter().map(|s| s.or(default)).collect()
    }
}

impl LowerCx<'_> {
    /// Fold a brace initializer for `target` (fixed array, vector, dynamic
    /// array or pointer).
    ///
    /// Fixed and vector targets yield the element block constant. Dynamic
    /// arrays and pointers promote the block into a mutable module global
    /// and yield `{len, &global}` or `&global`.
    ///
    /// Duplicate and malformed indices are all reported before failing.
    pub fn const_array_initializer(
        &mut self,
        init: &ArrayInit,
        target: TypeId,
    ) -> LowerResult<ConstId> {
        let loc = SourceLoc::new(init.span, 0);
        let (elem, len) = match *self.pool.kind(target) {
            TypeKind::FixedArray { elem, len } | TypeKind::Vector { elem, len } => (elem, len),
            TypeKind::Slice(elem) | TypeKind::Pointer(elem) => (elem, init.dim),
            _ => {
                let name = self.pool.display(target);
                return Err(self.ice(loc, format!("array initializer for `{name}`")));
            }
        };

        let entries = init.entries.len() as u64;
        if entries > len || init.dim > len {
            let diag = Diagnostic::error(ErrorCode::E5001)
                .with_message(format!(
                    "too many initializers, {} for array[{len}]",
                    entries.max(init.dim)
                ))
                .with_label(init.span, "initializer here");
            return Err(self.error(diag, loc));
        }

        let Ok(slot_count) = usize::try_from(len) else {
            return Err(self.ice(loc, format!("array length {len} exceeds the address space")));
        };
        let mut table = SlotTable::new(slot_count);
        let mut failed = None;
        let mut next = 0u64;
        for entry in &init.entries {
            if let Some(index) = entry.index {
                if let Some(i) = self.const_index(index) {
                    next = i;
                } else {
                    let e = self.expr(index);
                    let diag = Diagnostic::error(ErrorCode::E5004)
                        .with_message("array index must be a non-negative integer constant")
                        .with_label(e.span(), "not a constant index");
                    failed = Some(self.error(diag, e.loc));
                    next = next.saturating_add(1);
                    continue;
                }
            }
            match self.const_initializer(&entry.value, elem) {
                Ok(value) => match table.fill(next, value) {
                    Ok(()) => {}
                    Err(SlotError::OutOfRange) => {
                        let diag = Diagnostic::error(ErrorCode::E5003)
                            .with_message(format!("array index {next} overflows array[{len}]"))
                            .with_label(init.span, "in this initializer");
                        failed = Some(self.error(diag, loc));
                    }
                    Err(SlotError::Duplicate) => {
                        let diag = Diagnostic::error(ErrorCode::E5002)
                            .with_message(format!("index {next} is initialized more than once"))
                            .with_label(init.span, "in this initializer");
                        failed = Some(self.error(diag, loc));
                    }
                },
                Err(guarantee) => failed = Some(guarantee),
            }
            next = next.saturating_add(1);
        }
        if let Some(guarantee) = failed {
            return Err(guarantee);
        }

        // One shared default for every gap, computed only if needed.
        let default = if table.missing() > 0 {
            self.stats.default_evaluations += 1;
            Some(self.default_const(elem))
        } else {
            None
        };
        let Some(elems) = table.complete(default) else {
            return Err(self.ice(loc, "array initializer left a slot empty"));
        };

        let block = self.const_block(target, elem, elems);
        tracing::debug!(
            target = %self.pool.display(target),
            len,
            "folded array initializer"
        );
        Ok(self.place_const_block(target, block, len))
    }

    /// Element block constant. Slots whose machine type differs from the
    /// nominal element type turn the block into a packed anonymous struct.
    fn const_block(&mut self, ty: TypeId, elem: TypeId, elems: Vec<ConstId>) -> ConstId {
        let elem_mem = self.mem(elem);
        let vector = matches!(self.pool.kind(ty), TypeKind::Vector { .. });
        let consts = &mut self.b.module_mut().consts;
        let mismatch = elems.iter().any(|&c| *consts.ty_of(c) != elem_mem);
        let value = if mismatch {
            ConstValue::Struct {
                fields: elems,
                packed: true,
            }
        } else if vector {
            ConstValue::Vector {
                elem: elem_mem,
                elems,
            }
        } else {
            ConstValue::Array {
                elem: elem_mem,
                elems,
            }
        };
        consts.intern(value)
    }

    /// Fixed targets use the block directly; dynamic arrays and pointers
    /// reference a promoted mutable global.
    fn place_const_block(&mut self, target: TypeId, block: ConstId, len: u64) -> ConstId {
        let is_slice = self.pool.is_slice(target);
        if !is_slice && !self.pool.is_pointer(target) {
            return block;
        }
        self.stats.promoted_globals += 1;
        let word = self.b.word();
        let module = self.b.module_mut();
        let ty = module.consts.ty_of(block).clone();
        let global = module.globals.add(GlobalVar {
            name: ".constarray".to_owned(),
            ty,
            init: block,
            constant: false,
            linkage: Linkage::Internal,
            unnamed_addr: false,
        });
        let addr = module.consts.global_addr(global);
        if !is_slice {
            return addr;
        }
        let len = module.consts.int(word, len);
        module.consts.intern(ConstValue::Struct {
            fields: vec![len, addr],
            packed: false,
        })
    }

    /// Fold one initializer for a value of type `ty`.
    pub fn const_initializer(&mut self, init: &Initializer, ty: TypeId) -> LowerResult<ConstId> {
        match init {
            Initializer::Void => {
                let mem = self.mem(ty);
                Ok(self.b.module_mut().consts.zero(mem))
            }
            Initializer::Array(array) => self.const_array_initializer(array, ty),
            Initializer::Expr(expr) => match self.expr_to_const(*expr, ty) {
                Some(c) => Ok(c),
                None => {
                    let e = self.expr(*expr);
                    let diag = Diagnostic::error(ErrorCode::E5005)
                        .with_message("array initializer element is not a constant")
                        .with_label(e.span(), "not a constant");
                    Err(self.error(diag, e.loc))
                }
            },
        }
    }

    /// Constant index of an initializer entry; `None` unless the expression
    /// is a non-negative integer constant.
    fn const_index(&self, expr: ExprId) -> Option<u64> {
        self.const_int_expr(expr).and_then(|i| u64::try_from(i).ok())
    }

    pub(crate) fn const_int_expr(&self, expr: ExprId) -> Option<i64> {
        match self.expr(expr).kind {
            ExprKind::Lit(LitValue::Int(v)) => Some(v),
            ExprKind::Lit(LitValue::Char(c)) => Some(i64::from(c)),
            ExprKind::Arith { op, lhs, rhs } => {
                let (l, r) = (self.const_int_expr(lhs)?, self.const_int_expr(rhs)?);
                match op {
                    ArithOp::Add => l.checked_add(r),
                    ArithOp::Sub => l.checked_sub(r),
                    ArithOp::Mul => l.checked_mul(r),
                }
            }
            _ => None,
        }
    }

    /// Constant of a scalar literal as a value of type `ty`.
    pub fn lit_const(&mut self, lit: LitValue, ty: TypeId) -> ConstId {
        let mem = self.mem(ty);
        let is_float = mem.is_float();
        let consts = &mut self.b.module_mut().consts;
        match lit {
            LitValue::Float(bits) if is_float => consts.float(mem, f64::from_bits(bits)),
            LitValue::Float(bits) => consts.int(mem, float_to_int_bits(f64::from_bits(bits))),
            lit if is_float => consts.float(mem, int_to_float(lit.as_int().unwrap_or(0))),
            lit => {
                let value = lit.as_int().unwrap_or(0);
                consts.int(mem, u64::from_ne_bytes(value.to_ne_bytes()))
            }
        }
    }

    /// Fold an expression to a constant of type `ty`; `None` if it is not
    /// constant.
    pub fn expr_to_const(&mut self, expr: ExprId, ty: TypeId) -> Option<ConstId> {
        let pool = self.pool;
        let e = self.expr(expr);

        // A scalar initializing a fixed-length array fills every slot.
        if e.ty != ty {
            if let TypeKind::FixedArray { elem, len } | TypeKind::Vector { elem, len } =
                *pool.kind(ty)
            {
                if !self.is_array_type(e.ty) {
                    let value = self.expr_to_const(expr, elem)?;
                    let count = usize::try_from(len).ok()?;
                    return Some(self.const_block(ty, elem, vec![value; count]));
                }
            }
        }

        match &e.kind {
            ExprKind::Lit(lit) => Some(self.lit_const(*lit, ty)),
            ExprKind::Null => {
                let mem = self.mem(ty);
                let consts = &mut self.b.module_mut().consts;
                Some(if mem == MemTy::Ptr {
                    consts.null()
                } else {
                    consts.zero(mem)
                })
            }
            ExprKind::ArrayLit(elems) => {
                let block = self.array_literal_to_const(expr)?;
                if matches!(pool.kind(ty), TypeKind::Slice(_) | TypeKind::Pointer(_)) {
                    Some(self.place_const_block(ty, block, elems.len() as u64))
                } else {
                    Some(block)
                }
            }
            ExprKind::StructLit(fields) => {
                let def = pool.struct_def(e.ty)?;
                if def.is_nested {
                    return None;
                }
                let mut consts = Vec::with_capacity(def.fields.len());
                for (i, field) in def.fields.iter().enumerate() {
                    let c = match fields.get(i).copied().flatten() {
                        Some(value) => self.expr_to_const(value, field.ty)?,
                        None => self.field_default(field.ty, field.default),
                    };
                    consts.push(c);
                }
                Some(self.b.module_mut().consts.intern(ConstValue::Struct {
                    fields: consts,
                    packed: false,
                }))
            }
            ExprKind::UnionLit { member, value } => {
                let TypeKind::Union(def) = pool.kind(e.ty) else {
                    return None;
                };
                let member_ty = def.members.get(*member as usize)?.ty;
                let c = self.expr_to_const(*value, member_ty)?;
                Some(self.union_const(e.ty, c))
            }
            ExprKind::Arith { .. } => {
                let value = self.const_int_expr(expr)?;
                Some(self.lit_const(LitValue::Int(value), ty))
            }
            ExprKind::Local(_)
            | ExprKind::Cat { .. }
            | ExprKind::Index { .. }
            | ExprKind::Length(_) => None,
        }
    }

    /// Constant element block of an array literal, or `None` if any element
    /// is not constant.
    pub fn array_literal_to_const(&mut self, expr: ExprId) -> Option<ConstId> {
        let e = self.expr(expr);
        let ExprKind::ArrayLit(elems) = &e.kind else {
            return None;
        };
        let elem = self.elem_of(e.ty);
        let mut consts = Vec::with_capacity(elems.len());
        for &el in elems {
            consts.push(self.expr_to_const(el, elem)?);
        }
        Some(self.const_block(e.ty, elem, consts))
    }

    /// Whether every leaf of a literal is a compile-time constant.
    pub fn is_const_literal(&self, expr: ExprId) -> bool {
        let e = self.expr(expr);
        match &e.kind {
            ExprKind::Lit(_) | ExprKind::Null => true,
            ExprKind::ArrayLit(elems) => elems.iter().all(|&el| self.is_const_literal(el)),
            ExprKind::StructLit(fields) => {
                self.pool.struct_def(e.ty).is_some_and(|def| !def.is_nested)
                    && fields.iter().flatten().all(|&f| self.is_const_literal(f))
            }
            ExprKind::UnionLit { value, .. } => self.is_const_literal(*value),
            ExprKind::Arith { .. } => self.const_int_expr(expr).is_some(),
            _ => false,
        }
    }

    /// Initialize the element block at `dst` from an array literal.
    pub fn initialize_array_literal(&mut self, expr: ExprId, dst: ValueId) -> LowerResult<()> {
        let e = self.expr(expr);
        let ExprKind::ArrayLit(elems) = &e.kind else {
            return Err(self.ice(e.loc, "array literal initialization from a non-literal"));
        };
        if elems.is_empty() {
            return Ok(());
        }

        if self.is_const_literal(expr) {
            if let Some(block) = self.array_literal_to_const(expr) {
                self.store_const_block(block, elems.len(), dst);
                return Ok(());
            }
        }

        let elem = self.elem_of(e.ty);
        let elem_mem = self.mem(elem);
        tracing::debug!(len = elems.len(), "element-wise array literal");
        for (i, &el) in (0u64..).zip(elems) {
            let index = self.b.const_word(i);
            let slot = self.b.elem_ptr(&elem_mem, dst, index);
            self.construct_in_place(el, elem, slot)?;
        }
        Ok(())
    }

    /// Short blocks are one inline store; longer ones are copied from a
    /// read-only global.
    fn store_const_block(&mut self, block: ConstId, len: usize, dst: ValueId) {
        if len <= self.config.inline_literal_limit {
            tracing::debug!(len, "inline array literal store");
            let value = self.b.const_value(block);
            self.b.store(value, dst);
            return;
        }
        tracing::debug!(len, "array literal copied from global");
        self.stats.promoted_globals += 1;
        let layout = self.b.layout();
        let module = self.b.module_mut();
        let block_ty = module.consts.ty_of(block).clone();
        let bytes = layout.size_of(&block_ty);
        let global = module.globals.add(GlobalVar {
            name: ".arrayliteral".to_owned(),
            ty: block_ty,
            init: block,
            constant: true,
            linkage: Linkage::Private,
            unnamed_addr: true,
        });
        let src = self.b.global_addr(global);
        let len = self.b.const_word(bytes);
        self.b.memcpy(dst, src, len);
    }

    /// Construct the value of `expr` directly into `slot` of type `ty`.
    ///
    /// Literals recurse into their parts; anything else is lowered and
    /// stored with construct semantics.
    pub fn construct_in_place(
        &mut self,
        expr: ExprId,
        ty: TypeId,
        slot: ValueId,
    ) -> LowerResult<()> {
        let pool = self.pool;
        let e = self.expr(expr);
        match &e.kind {
            ExprKind::ArrayLit(_) if e.ty == ty && !pool.is_slice(ty) => {
                self.initialize_array_literal(expr, slot)
            }
            ExprKind::StructLit(fields) if e.ty == ty => {
                let Some(def) = pool.struct_def(ty) else {
                    return Err(self.ice(e.loc, "struct literal of a non-struct type"));
                };
                let agg = self.mem(ty);
                for (i, field) in (0u32..).zip(&def.fields) {
                    let field_slot = self.b.field_ptr(&agg, slot, i);
                    match fields.get(i as usize).copied().flatten() {
                        Some(value) => self.construct_in_place(value, field.ty, field_slot)?,
                        None => {
                            let c = self.field_default(field.ty, field.default);
                            let value = self.b.const_value(c);
                            self.b.store(value, field_slot);
                        }
                    }
                }
                Ok(())
            }
            ExprKind::UnionLit { member, value } if e.ty == ty => {
                let TypeKind::Union(def) = pool.kind(ty) else {
                    return Err(self.ice(e.loc, "union literal of a non-union type"));
                };
                let Some(member_def) = def.members.get(*member as usize) else {
                    return Err(self.ice(e.loc, format!("union has no member {member}")));
                };
                // Members live at offset zero; clear the padding first.
                let bytes = self.size_of(ty);
                let zero = self.b.const_int(MemTy::I8, 0);
                let len = self.b.const_word(bytes);
                self.b.memset(slot, zero, len);
                self.construct_in_place(*value, member_def.ty, slot)
            }
            _ => {
                let provenance = SourceProvenance::of_expr(self.exprs, expr);
                let src = self.lower_expr(expr)?;
                let dst = RuntimeValue::address(ty, slot);
                self.assign_value(dst, src, AssignOp::Construct, provenance)
            }
        }
    }

    /// Default value of a field: its explicit default literal or the type
    /// default.
    fn field_default(&mut self, ty: TypeId, default: Option<LitValue>) -> ConstId {
        match default {
            Some(lit) => self.lit_const(lit, ty),
            None => self.default_const(ty),
        }
    }

    /// Default value of a type.
    pub fn default_const(&mut self, ty: TypeId) -> ConstId {
        let mem = self.mem(ty);
        let pool = self.pool;
        match pool.kind(ty) {
            TypeKind::Void | TypeKind::Bool | TypeKind::Int { .. } | TypeKind::Size => {
                self.b.module_mut().consts.int(mem, 0)
            }
            TypeKind::Float { .. } => self.b.module_mut().consts.float(mem, f64::NAN),
            TypeKind::Char { bits: 8 } => self.b.module_mut().consts.int(mem, 0xFF),
            TypeKind::Char { .. } => self.b.module_mut().consts.int(mem, 0xFFFF),
            TypeKind::Pointer(_) => self.b.module_mut().consts.null(),
            TypeKind::Slice(_) => self.b.module_mut().consts.zero(mem),
            &(TypeKind::FixedArray { elem, len } | TypeKind::Vector { elem, len }) => {
                if self.traits.classify(ty).zero_default() {
                    return self.b.module_mut().consts.zero(mem);
                }
                let value = self.default_const(elem);
                let count = usize::try_from(len).unwrap_or(0);
                self.const_block(ty, elem, vec![value; count])
            }
            TypeKind::Struct(def) => {
                let fields = def
                    .fields
                    .iter()
                    .map(|f| self.field_default(f.ty, f.default))
                    .collect();
                self.b.module_mut().consts.intern(ConstValue::Struct {
                    fields,
                    packed: false,
                })
            }
            TypeKind::Union(def) => match def.members.first() {
                Some(first) => {
                    let value = self.field_default(first.ty, first.default);
                    self.union_const(ty, value)
                }
                None => self.b.module_mut().consts.zero(mem),
            },
        }
    }

    /// A union constant holding `value` at offset zero, padded with zero
    /// bytes to the union size.
    fn union_const(&mut self, ty: TypeId, value: ConstId) -> ConstId {
        let layout = self.b.layout();
        let total = self.size_of(ty);
        let consts = &mut self.b.module_mut().consts;
        let value_size = layout.size_of(consts.ty_of(value));
        let mut fields = vec![value];
        if let Some(pad) = total.checked_sub(value_size).filter(|&p| p > 0) {
            fields.push(consts.zero(MemTy::Array(Box::new(MemTy::I8), pad)));
        }
        consts.intern(ConstValue::Struct {
            fields,
            packed: false,
        })
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer literals initializing floats round to nearest"
)]
fn int_to_float(value: i64) -> f64 {
    value as f64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "float literals initializing integers truncate toward zero"
)]
fn float_to_int_bits(value: f64) -> u64 {
    u64::from_ne_bytes((value as i64).to_ne_bytes())
}
