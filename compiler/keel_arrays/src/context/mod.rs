//! Per-function lowering context.
//!
//! [`LowerCx`] bundles everything one function's array lowering needs: the
//! IR builder (which borrows the module), the read-only type pool and
//! expression arena, the configuration, the element-trait classifier and
//! the diagnostic queue. Lowering operations are `impl LowerCx` blocks
//! spread over the sibling modules.

use rustc_hash::FxHashMap;

use keel_diagnostic::{internal_error, Diagnostic, DiagnosticQueue, ErrorGuaranteed};
use keel_ir::{
    mem_type, ConstId, ConstValue, Expr, ExprArena, ExprId, FunctionId, GlobalVar, IrBuilder,
    Linkage, LocalId, MemTy, Module, ScalarClass, SourceLoc, TypeId, TypeInfo, TypeKind, TypePool,
    ValueId,
};

use crate::config::LowerConfig;
use crate::traits::{ElementTraits, TraitsClassifier};

/// Result of a lowering operation. The error side proves a diagnostic was
/// queued.
pub type LowerResult<T> = Result<T, ErrorGuaranteed>;

/// Name and machine signature of the function being lowered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<MemTy>,
    pub ret: Option<MemTy>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Signature {
            name: name.into(),
            params: Vec::new(),
            ret: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<MemTy>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn returning(mut self, ret: MemTy) -> Self {
        self.ret = Some(ret);
        self
    }
}

/// Counters for constant literal folding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LiteralStats {
    /// Times a default element value was computed for a sparse literal.
    pub default_evaluations: u32,
    /// Literals promoted to module globals.
    pub promoted_globals: u32,
}

/// Lowering state for one function.
pub struct LowerCx<'a> {
    pub(crate) pool: &'a TypePool,
    pub(crate) exprs: &'a ExprArena,
    pub(crate) config: &'a LowerConfig,
    pub(crate) b: IrBuilder<'a>,
    pub(crate) traits: TraitsClassifier<'a>,
    pub(crate) stats: LiteralStats,
    diags: DiagnosticQueue,
    locals: FxHashMap<LocalId, ValueId>,
    /// `{len, ptr}` constant naming the module file, created on first use.
    file_name: Option<ConstId>,
}

impl<'a> LowerCx<'a> {
    pub fn new(
        module: &'a mut Module,
        pool: &'a TypePool,
        exprs: &'a ExprArena,
        config: &'a LowerConfig,
        sig: Signature,
    ) -> Self {
        let layout = module.layout;
        tracing::debug!(function = %sig.name, "begin array lowering");
        LowerCx {
            pool,
            exprs,
            config,
            b: IrBuilder::new(module, sig.name, sig.params, sig.ret),
            traits: TraitsClassifier::new(pool, layout),
            stats: LiteralStats::default(),
            diags: DiagnosticQueue::with_config(config.diagnostics.clone()),
            locals: FxHashMap::default(),
            file_name: None,
        }
    }

    /// The underlying IR builder, for emitting surrounding code.
    #[inline]
    pub fn builder(&mut self) -> &mut IrBuilder<'a> {
        &mut self.b
    }

    #[inline]
    pub fn param(&self, index: u32) -> ValueId {
        self.b.param(index)
    }

    #[inline]
    pub fn pool(&self) -> &'a TypePool {
        self.pool
    }

    /// Expression by id, borrowed from the arena rather than from `self`.
    #[inline]
    pub(crate) fn expr(&self, id: ExprId) -> &'a Expr {
        &self.exprs[id]
    }

    #[inline]
    pub fn config(&self) -> &'a LowerConfig {
        self.config
    }

    #[inline]
    pub fn literal_stats(&self) -> LiteralStats {
        self.stats
    }

    // Locals

    /// Bind a local to the address of its storage.
    pub fn bind_local(&mut self, local: LocalId, addr: ValueId) {
        self.locals.insert(local, addr);
    }

    pub(crate) fn local_addr(&self, local: LocalId) -> Option<ValueId> {
        self.locals.get(&local).copied()
    }

    /// Reserve a stack slot for `ty` and bind `local` to it.
    pub fn declare_local(&mut self, local: LocalId, ty: TypeId) -> ValueId {
        let mem = self.mem(ty);
        let addr = self.b.alloca(mem);
        self.bind_local(local, addr);
        addr
    }

    // Types

    /// Machine type of a source type.
    pub fn mem(&self, ty: TypeId) -> MemTy {
        mem_type(self.pool, &self.b.layout(), ty)
    }

    pub fn size_of(&self, ty: TypeId) -> u64 {
        self.b.layout().size_of(&self.mem(ty))
    }

    #[inline]
    pub fn traits_of(&self, ty: TypeId) -> ElementTraits {
        self.traits.classify(ty)
    }

    /// Element type of an array, vector or pointer type; `ty` itself
    /// otherwise.
    pub(crate) fn elem_of(&self, ty: TypeId) -> TypeId {
        self.pool.next_of(ty).unwrap_or(ty)
    }

    // Diagnostics

    /// Queue an error at `loc`.
    pub fn error(&mut self, diag: Diagnostic, loc: SourceLoc) -> ErrorGuaranteed {
        tracing::debug!(code = %diag.code, message = %diag.message, "lowering error");
        self.diags.emit_error(diag, loc.line, loc.span.start.saturating_add(1))
    }

    /// Queue an internal compiler error: a broken contract between lowering
    /// components, not a user mistake.
    #[cold]
    pub fn ice(&mut self, loc: SourceLoc, message: impl Into<String>) -> ErrorGuaranteed {
        self.error(internal_error(loc.span, message), loc)
    }

    pub fn has_errors(&self) -> bool {
        self.diags.has_errors().is_some()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diags.peek()
    }

    /// Finish the function. Fails with every queued diagnostic if any error
    /// was reported, or with an internal error if the IR is malformed.
    pub fn finish(mut self) -> Result<FunctionId, Vec<Diagnostic>> {
        if self.has_errors() {
            return Err(self.diags.flush());
        }
        self.b
            .finish()
            .map_err(|e| vec![internal_error(keel_ir::Span::DUMMY, e.to_string())])
    }

    // Runtime type descriptors

    /// Address of the runtime descriptor of `ty`, registering it (and its
    /// element's) in the module on first use.
    pub fn type_info(&mut self, ty: TypeId) -> ValueId {
        self.register_type_info(ty);
        self.b.type_info_addr(ty)
    }

    fn register_type_info(&mut self, ty: TypeId) {
        if self.b.module().type_infos.contains(ty) {
            return;
        }
        let mem = self.mem(ty);
        let layout = self.b.layout();
        let elem = match *self.pool.kind(ty) {
            TypeKind::Slice(elem)
            | TypeKind::FixedArray { elem, .. }
            | TypeKind::Vector { elem, .. } => Some(elem),
            _ => None,
        };
        let init = self.default_const(ty);
        let info = TypeInfo {
            ty,
            size: layout.size_of(&mem),
            align: layout.align_of(&mem),
            elem,
            flags: self.traits.classify(ty).flags,
            scalar: scalar_class(self.pool.kind(ty)),
            init: Some(init),
        };
        tracing::trace!(ty = %self.pool.display(ty), "register type info");
        self.b.module_mut().type_infos.insert(info);
        if let Some(elem) = elem {
            self.register_type_info(elem);
        }
    }

    // Module file name

    /// `{len, ptr}` naming the module file, for bounds failures.
    pub(crate) fn file_name_slice(&mut self) -> ValueId {
        let c = match self.file_name {
            Some(c) => c,
            None => {
                let bytes = self.config.module_file.as_bytes();
                let word = self.b.word();
                let module = self.b.module_mut();
                let init = module.consts.bytes(bytes);
                let ty = module.consts.ty_of(init).clone();
                let global = module.globals.add(GlobalVar {
                    name: ".file".to_owned(),
                    ty,
                    init,
                    constant: true,
                    linkage: Linkage::Private,
                    unnamed_addr: true,
                });
                let len = module.consts.int(word, bytes.len() as u64);
                let addr = module.consts.global_addr(global);
                let c = module.consts.intern(ConstValue::Struct {
                    fields: vec![len, addr],
                    packed: false,
                });
                self.file_name = Some(c);
                c
            }
        };
        self.b.const_value(c)
    }
}

fn scalar_class(kind: &TypeKind) -> ScalarClass {
    match kind {
        TypeKind::Int { signed: true, .. } => ScalarClass::Signed,
        TypeKind::Bool | TypeKind::Int { .. } | TypeKind::Size | TypeKind::Pointer(_) => {
            ScalarClass::Unsigned
        }
        TypeKind::Float { .. } => ScalarClass::Float,
        TypeKind::Char { .. } => ScalarClass::Char,
        _ => ScalarClass::Aggregate,
    }
}
