//! Element-trait classifier.
//!
//! Walks the type pool to compute, per element type, whether copying runs
//! a copy-construct hook, whether overwriting runs a destructor, and
//! whether the default value is all-zero bits. Results are memoized for
//! the lifetime of the lowering unit.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use keel_ir::{mem_type, DataLayout, ElementFlags, LitValue, TypeId, TypeKind, TypePool};

/// Per-element properties that drive copy path selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementTraits {
    pub flags: ElementFlags,
    pub byte_size: u64,
    pub byte_align: u64,
}

impl ElementTraits {
    #[inline]
    pub fn needs_destruction(&self) -> bool {
        self.flags.contains(ElementFlags::NEEDS_DESTRUCTION)
    }

    #[inline]
    pub fn needs_copy_construct(&self) -> bool {
        self.flags.contains(ElementFlags::NEEDS_COPY_CONSTRUCT)
    }

    #[inline]
    pub fn zero_default(&self) -> bool {
        self.flags.contains(ElementFlags::ZERO_DEFAULT)
    }

    /// Copies are plain byte moves.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        !self.needs_destruction() && !self.needs_copy_construct()
    }
}

/// Caching classifier over a [`TypePool`].
///
/// # Interior Mutability
///
/// Uses `RefCell` for the cache and the cycle-detection set so lookups
/// take `&self` while the lowering context is mutably borrowed elsewhere.
pub struct TraitsClassifier<'pool> {
    pool: &'pool TypePool,
    layout: DataLayout,
    cache: RefCell<FxHashMap<TypeId, ElementTraits>>,
    /// Types currently being classified. A type reached again while in
    /// this set is only reachable through a pointer or slice, which stops
    /// the walk, so a revisit means a malformed pool.
    classifying: RefCell<FxHashSet<TypeId>>,
}

impl<'pool> TraitsClassifier<'pool> {
    pub fn new(pool: &'pool TypePool, layout: DataLayout) -> Self {
        Self {
            pool,
            layout,
            cache: RefCell::new(FxHashMap::default()),
            classifying: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn pool(&self) -> &'pool TypePool {
        self.pool
    }

    /// Number of distinct non-primitive types classified so far.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Classify `ty`, computing at most once per type.
    pub fn classify(&self, ty: TypeId) -> ElementTraits {
        let mem = mem_type(self.pool, &self.layout, ty);
        let byte_size = self.layout.size_of(&mem);
        let byte_align = self.layout.align_of(&mem);

        if ty.is_primitive() {
            return ElementTraits {
                flags: Self::primitive_flags(ty),
                byte_size,
                byte_align,
            };
        }

        if let Some(&cached) = self.cache.borrow().get(&ty) {
            return cached;
        }

        if !self.classifying.borrow_mut().insert(ty) {
            tracing::warn!(ty = %self.pool.display(ty), "recursive element type");
            return ElementTraits {
                flags: ElementFlags::empty(),
                byte_size,
                byte_align,
            };
        }

        let flags = self.flags_by_kind(ty);
        self.classifying.borrow_mut().remove(&ty);

        let traits = ElementTraits {
            flags,
            byte_size,
            byte_align,
        };
        tracing::trace!(ty = %self.pool.display(ty), ?flags, "classified element");
        self.cache.borrow_mut().insert(ty, traits);
        traits
    }

    /// Flags of the pre-interned primitives.
    #[inline]
    fn primitive_flags(ty: TypeId) -> ElementFlags {
        match ty {
            // NaN default for floats, 0xFF.. defaults for code units.
            TypeId::F32 | TypeId::F64 | TypeId::CHAR | TypeId::WCHAR | TypeId::DCHAR => {
                ElementFlags::empty()
            }
            _ => ElementFlags::ZERO_DEFAULT,
        }
    }

    fn flags_by_kind(&self, ty: TypeId) -> ElementFlags {
        match self.pool.kind(ty) {
            TypeKind::Void
            | TypeKind::Bool
            | TypeKind::Int { .. }
            | TypeKind::Size
            | TypeKind::Pointer(_)
            | TypeKind::Slice(_) => ElementFlags::ZERO_DEFAULT,

            TypeKind::Float { .. } | TypeKind::Char { .. } => ElementFlags::empty(),

            TypeKind::FixedArray { elem, .. } | TypeKind::Vector { elem, .. } => {
                self.classify(*elem).flags
            }

            TypeKind::Struct(def) => {
                let mut flags = ElementFlags::ZERO_DEFAULT;
                if def.has_postblit {
                    flags |= ElementFlags::NEEDS_COPY_CONSTRUCT;
                }
                if def.has_destructor {
                    flags |= ElementFlags::NEEDS_DESTRUCTION;
                }
                for field in &def.fields {
                    let field_flags = self.classify(field.ty).flags;
                    flags |= field_flags
                        & (ElementFlags::NEEDS_COPY_CONSTRUCT | ElementFlags::NEEDS_DESTRUCTION);
                    let zero = match field.default {
                        Some(lit) => is_zero_literal(lit),
                        None => field_flags.contains(ElementFlags::ZERO_DEFAULT),
                    };
                    if !zero {
                        flags.remove(ElementFlags::ZERO_DEFAULT);
                    }
                }
                flags
            }

            // Unions never run member hooks; the first member is the default.
            TypeKind::Union(def) => match def.members.first() {
                Some(first) => {
                    let zero = match first.default {
                        Some(lit) => is_zero_literal(lit),
                        None => self.classify(first.ty).zero_default(),
                    };
                    if zero {
                        ElementFlags::ZERO_DEFAULT
                    } else {
                        ElementFlags::empty()
                    }
                }
                None => ElementFlags::ZERO_DEFAULT,
            },
        }
    }
}

fn is_zero_literal(lit: LitValue) -> bool {
    match lit {
        LitValue::Int(v) => v == 0,
        LitValue::Float(bits) => bits == 0,
        LitValue::Bool(b) => !b,
        LitValue::Char(c) => c == 0,
    }
}
