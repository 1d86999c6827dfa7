//! Interpreter for lowered functions.
//!
//! A [`Machine`] executes the functions of one [`Module`] against a flat
//! [`Memory`]. Globals and type descriptors are materialized on first use.
//! Runtime entry points are simulated in [`crate::runtime`]; postblit and
//! destructor hooks are not executed but recorded as [`Event`]s so callers
//! can check that they ran on the right objects.

use rustc_hash::FxHashMap;

use keel_ir::{
    BinOp, BlockId, Callee, CastOp, ConstId, ConstValue, DataLayout, Function, FunctionId,
    GlobalId, ICmpPred, Instr, MemTy, Module, RuntimeFn, Terminator, TypeId, ValueDef, ValueId,
};

use crate::memory::{overlaps, Memory};
use crate::trap::{EvalResult, Trap};
use crate::value::{decode, encode, mask, sign_extend, Val};

/// Something observable that happened during evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A runtime entry point was entered.
    Runtime(RuntimeFn),
    /// The copy-construct hook of `ty` ran on the object at `addr`.
    Postblit { ty: TypeId, addr: u64 },
    /// The destructor of `ty` ran on the object at `addr`.
    Destroy { ty: TypeId, addr: u64 },
}

/// Per-call value table.
struct Frame<'f> {
    function: &'f Function,
    values: Vec<Option<Val>>,
}

pub struct Machine<'m> {
    pub(crate) module: &'m Module,
    pub(crate) layout: DataLayout,
    pub(crate) memory: Memory,
    globals: FxHashMap<GlobalId, u64>,
    type_infos: FxHashMap<TypeId, u64>,
    type_info_addrs: FxHashMap<u64, TypeId>,
    events: Vec<Event>,
    steps: u64,
    step_limit: u64,
}

impl<'m> Machine<'m> {
    pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

    pub fn new(module: &'m Module) -> Self {
        Machine {
            module,
            layout: module.layout,
            memory: Memory::new(),
            globals: FxHashMap::default(),
            type_infos: FxHashMap::default(),
            type_info_addrs: FxHashMap::default(),
            events: Vec::new(),
            steps: 0,
            step_limit: Self::DEFAULT_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Runtime entry points entered so far, in order.
    pub fn runtime_calls(&self) -> Vec<RuntimeFn> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Runtime(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    // Entry

    /// Run `function` with `args` bound to its parameters.
    pub fn run(&mut self, function: FunctionId, args: &[Val]) -> EvalResult<Option<Val>> {
        let module = self.module;
        let f = module
            .functions
            .get(function.index())
            .ok_or(Trap::NoSuchFunction(function))?;
        if args.len() != f.params.len() {
            return Err(Trap::malformed(format!(
                "`{}` takes {} arguments, got {}",
                f.name,
                f.params.len(),
                args.len()
            )));
        }
        tracing::debug!(function = %f.name, "run");
        let mut frame = Frame {
            function: f,
            values: vec![None; f.values.len()],
        };
        for (slot, arg) in frame.values.iter_mut().zip(args) {
            *slot = Some(arg.clone());
        }
        self.exec(&mut frame)
    }

    /// Run the function named `name`.
    pub fn run_named(&mut self, name: &str, args: &[Val]) -> EvalResult<Option<Val>> {
        let index = self
            .module
            .functions
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Trap::malformed(format!("no function named `{name}`")))?;
        let id = u32::try_from(index)
            .map(FunctionId::new)
            .map_err(|_| Trap::malformed("function index overflow"))?;
        self.run(id, args)
    }

    fn exec(&mut self, frame: &mut Frame<'m>) -> EvalResult<Option<Val>> {
        let function = frame.function;
        let mut block = function.entry();
        loop {
            let bb = function.block(block);
            for instr in &bb.body {
                self.tick()?;
                self.step(frame, instr)?;
            }
            self.tick()?;
            block = match &bb.terminator {
                Terminator::Br(target) => *target,
                Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                } => {
                    if self.operand(frame, *cond)?.bits()? & 1 == 1 {
                        *then_block
                    } else {
                        *else_block
                    }
                }
                Terminator::Ret(value) => {
                    return value.map(|v| self.operand(frame, v)).transpose();
                }
                Terminator::Unreachable => return Err(Trap::Unreachable(bb.name.clone())),
            };
            if block.index() >= function.blocks.len() {
                return Err(bad_block(block));
            }
        }
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(Trap::StepLimit);
        }
        Ok(())
    }

    // Values

    fn operand(&mut self, frame: &Frame<'m>, id: ValueId) -> EvalResult<Val> {
        let data = frame
            .function
            .values
            .get(id.index())
            .ok_or_else(|| Trap::malformed(format!("{id:?} is not a value")))?;
        if let ValueDef::Const(c) = data.def {
            return self.const_val(c);
        }
        frame
            .values
            .get(id.index())
            .and_then(Option::clone)
            .ok_or_else(|| Trap::malformed(format!("{id:?} used before definition")))
    }

    fn define(frame: &mut Frame<'m>, id: ValueId, value: Val) -> EvalResult<()> {
        let slot = frame
            .values
            .get_mut(id.index())
            .ok_or_else(|| Trap::malformed(format!("{id:?} is not a value")))?;
        *slot = Some(value);
        Ok(())
    }

    fn ty_of<'f>(frame: &Frame<'f>, id: ValueId) -> EvalResult<&'f MemTy> {
        let function = frame.function;
        function
            .values
            .get(id.index())
            .map(|v| &v.ty)
            .ok_or_else(|| Trap::malformed(format!("{id:?} is not a value")))
    }

    /// Evaluate a module constant.
    pub(crate) fn const_val(&mut self, id: ConstId) -> EvalResult<Val> {
        let module = self.module;
        Ok(match module.consts.get(id) {
            ConstValue::Int { value, .. } => Val::Int(*value),
            ConstValue::Float { bits, .. } => Val::Float(f64::from_bits(*bits)),
            ConstValue::Null => Val::Ptr(0),
            ConstValue::Zero(ty) => Val::zero(ty),
            ConstValue::Array { elems, .. } | ConstValue::Vector { elems, .. } => Val::Agg(
                elems
                    .iter()
                    .map(|e| self.const_val(*e))
                    .collect::<EvalResult<_>>()?,
            ),
            ConstValue::Struct { fields, .. } => Val::Agg(
                fields
                    .iter()
                    .map(|f| self.const_val(*f))
                    .collect::<EvalResult<_>>()?,
            ),
            ConstValue::GlobalAddr(g) => Val::Ptr(self.global_addr(*g)?),
            ConstValue::TypeInfo(ty) => Val::Ptr(self.type_info_addr(*ty)?),
        })
    }

    /// Address of a global, allocating and initializing it on first use.
    pub fn global_addr(&mut self, id: GlobalId) -> EvalResult<u64> {
        if let Some(&addr) = self.globals.get(&id) {
            return Ok(addr);
        }
        let module = self.module;
        let global = module.globals.get(id);
        let size = self.layout.size_of(&global.ty);
        let addr = self.memory.alloc(size, self.layout.align_of(&global.ty))?;
        // Reserve the address first so self-referential initializers resolve.
        self.globals.insert(id, addr);
        let init = self.const_val(global.init)?;
        let init_ty = module.consts.ty_of(global.init);
        self.store_at(init_ty, addr, &init)?;
        if global.constant {
            self.memory.protect(addr, size);
        }
        tracing::trace!(name = %global.name, addr, size, "materialize global");
        Ok(addr)
    }

    /// Address standing for the type descriptor of `ty`.
    pub fn type_info_addr(&mut self, ty: TypeId) -> EvalResult<u64> {
        if let Some(&addr) = self.type_infos.get(&ty) {
            return Ok(addr);
        }
        let addr = self.memory.alloc(8, 8)?;
        self.memory.protect(addr, 8);
        self.type_infos.insert(ty, addr);
        self.type_info_addrs.insert(addr, ty);
        Ok(addr)
    }

    /// The type whose descriptor lives at `addr`.
    pub(crate) fn type_at(&self, addr: u64) -> EvalResult<TypeId> {
        self.type_info_addrs
            .get(&addr)
            .copied()
            .ok_or(Trap::UnknownTypeInfo(addr))
    }

    // Memory helpers

    /// Load a value of type `ty` from `addr`.
    pub fn load(&self, ty: &MemTy, addr: u64) -> EvalResult<Val> {
        let bytes = self.memory.read(addr, self.layout.size_of(ty))?;
        decode(&self.layout, ty, bytes)
    }

    /// Store `value` of type `ty` at `addr`.
    pub fn store_at(&mut self, ty: &MemTy, addr: u64, value: &Val) -> EvalResult<()> {
        let size = usize::try_from(self.layout.size_of(ty))
            .map_err(|_| Trap::malformed(format!("`{ty}` is too large")))?;
        let mut bytes = vec![0u8; size];
        encode(&self.layout, ty, value, &mut bytes)?;
        self.memory.write(addr, &bytes)
    }

    /// Allocate a slot holding `value`; returns its address.
    pub fn alloc_value(&mut self, ty: &MemTy, value: &Val) -> EvalResult<u64> {
        let addr = self
            .memory
            .alloc(self.layout.size_of(ty), self.layout.align_of(ty))?;
        self.store_at(ty, addr, value)?;
        Ok(addr)
    }

    /// Build a heap-backed dynamic array of `elem` holding `elems`.
    pub fn alloc_slice(&mut self, elem: &MemTy, elems: &[Val]) -> EvalResult<Val> {
        if elems.is_empty() {
            return Ok(Val::slice(0, 0));
        }
        let size = self.layout.size_of(elem);
        let len = elems.len() as u64;
        let ptr = self
            .memory
            .alloc_heap(size * len, size * len, self.layout.align_of(elem))?;
        for (i, value) in (0u64..).zip(elems) {
            self.store_at(elem, ptr + i * size, value)?;
        }
        Ok(Val::slice(len, ptr))
    }

    /// Elements of the dynamic array value `slice`.
    pub fn read_slice(&self, elem: &MemTy, slice: &Val) -> EvalResult<Vec<Val>> {
        let (len, ptr) = slice.as_slice()?;
        let size = self.layout.size_of(elem);
        (0..len).map(|i| self.load(elem, ptr + i * size)).collect()
    }

    /// The `{len, ptr}` record stored at `addr`.
    pub fn load_record(&self, addr: u64) -> EvalResult<(u64, u64)> {
        self.load(&self.layout.slice_record(), addr)?.as_slice()
    }

    pub(crate) fn store_record(&mut self, addr: u64, len: u64, ptr: u64) -> EvalResult<()> {
        let record = self.layout.slice_record();
        self.store_at(&record, addr, &Val::slice(len, ptr))
    }

    pub(crate) fn word_bits(&self) -> u32 {
        self.layout.pointer_bytes() * 8
    }

    // Instructions

    fn step(&mut self, frame: &mut Frame<'m>, instr: &Instr) -> EvalResult<()> {
        match instr {
            Instr::Alloca { dst, ty } => {
                let addr = self
                    .memory
                    .alloc(self.layout.size_of(ty), self.layout.align_of(ty))?;
                Self::define(frame, *dst, Val::Ptr(addr))
            }
            Instr::Load { dst, ty, ptr } => {
                let addr = self.operand(frame, *ptr)?.bits()?;
                let value = self.load(ty, addr)?;
                Self::define(frame, *dst, value)
            }
            Instr::Store { value, ptr } => {
                let ty = Self::ty_of(frame, *value)?;
                let v = self.operand(frame, *value)?;
                let addr = self.operand(frame, *ptr)?.bits()?;
                self.store_at(ty, addr, &v)
            }
            Instr::FieldPtr {
                dst,
                agg,
                base,
                field,
            } => {
                let base = self.operand(frame, *base)?.bits()?;
                let addr = base.wrapping_add(self.layout.offset_of(agg, *field));
                Self::define(frame, *dst, Val::Ptr(addr))
            }
            Instr::ElemPtr {
                dst,
                elem,
                base,
                index,
            } => {
                let base = self.operand(frame, *base)?.bits()?;
                let index = self.operand(frame, *index)?.bits()?;
                let offset = index.wrapping_mul(self.layout.size_of(elem));
                let addr = mask(base.wrapping_add(offset), self.word_bits());
                Self::define(frame, *dst, Val::Ptr(addr))
            }
            Instr::Binary { dst, op, lhs, rhs } => {
                let bits = self.int_bits(Self::ty_of(frame, *lhs)?);
                let l = self.operand(frame, *lhs)?.bits()?;
                let r = self.operand(frame, *rhs)?.bits()?;
                let value = binary(*op, mask(l, bits), mask(r, bits))?;
                Self::define(frame, *dst, Val::Int(mask(value, bits)))
            }
            Instr::ICmp {
                dst,
                pred,
                lhs,
                rhs,
            } => {
                let bits = self.int_bits(Self::ty_of(frame, *lhs)?);
                let l = self.operand(frame, *lhs)?.bits()?;
                let r = self.operand(frame, *rhs)?.bits()?;
                let result = compare(*pred, mask(l, bits), mask(r, bits), bits);
                Self::define(frame, *dst, Val::Int(u64::from(result)))
            }
            Instr::ExtractValue { dst, agg, field } => {
                let agg = self.operand(frame, *agg)?;
                let value = usize::try_from(*field)
                    .ok()
                    .and_then(|i| agg.fields().ok()?.get(i).cloned())
                    .ok_or_else(|| Trap::malformed(format!("no member {field} in {agg:?}")))?;
                Self::define(frame, *dst, value)
            }
            Instr::MakeAggregate { dst, fields, .. } => {
                let fields = fields
                    .iter()
                    .map(|f| self.operand(frame, *f))
                    .collect::<EvalResult<_>>()?;
                Self::define(frame, *dst, Val::Agg(fields))
            }
            Instr::Cast { dst, op, value, to } => {
                let from = self.int_bits(Self::ty_of(frame, *value)?);
                let v = self.operand(frame, *value)?.bits()?;
                let to_bits = self.int_bits(to);
                let result = match op {
                    CastOp::Trunc | CastOp::ZExt => Val::Int(mask(mask(v, from), to_bits)),
                    CastOp::SExt => {
                        let extended = sign_extend(v, from);
                        Val::Int(mask(u64::from_ne_bytes(extended.to_ne_bytes()), to_bits))
                    }
                    CastOp::PtrToInt => Val::Int(mask(v, to_bits)),
                    CastOp::IntToPtr => Val::Ptr(mask(v, self.word_bits())),
                };
                Self::define(frame, *dst, result)
            }
            Instr::MemCpy { dst, src, len } => {
                let dst = self.operand(frame, *dst)?.bits()?;
                let src = self.operand(frame, *src)?.bits()?;
                let len = self.operand(frame, *len)?.bits()?;
                if dst != src && overlaps(dst, src, len) {
                    return Err(Trap::OverlappingCopy { dst, src, len });
                }
                self.memory.copy(dst, src, len)
            }
            Instr::MemSet { dst, byte, len } => {
                let dst = self.operand(frame, *dst)?.bits()?;
                let byte = self.operand(frame, *byte)?.bits()?.to_le_bytes()[0];
                let len = self.operand(frame, *len)?.bits()?;
                self.memory.fill(dst, byte, len)
            }
            Instr::Call { dst, callee, args } => {
                let args = args
                    .iter()
                    .map(|a| self.operand(frame, *a))
                    .collect::<EvalResult<Vec<_>>>()?;
                let result = match callee {
                    Callee::Runtime(f) => {
                        self.record(Event::Runtime(*f));
                        tracing::trace!(symbol = f.symbol(), "runtime call");
                        self.call_runtime(*f, &args)?
                    }
                    Callee::Postblit(ty) => {
                        let addr = args
                            .first()
                            .ok_or_else(|| Trap::malformed("postblit without an object"))?
                            .bits()?;
                        self.record(Event::Postblit { ty: *ty, addr });
                        None
                    }
                };
                match (dst, result) {
                    (Some(dst), Some(value)) => Self::define(frame, *dst, value),
                    (None, _) => Ok(()),
                    (Some(_), None) => Err(Trap::malformed(format!("{callee:?} returned nothing"))),
                }
            }
        }
    }

    /// Width of an integer or pointer type.
    fn int_bits(&self, ty: &MemTy) -> u32 {
        match ty {
            MemTy::Ptr => self.word_bits(),
            other => other.int_bits().unwrap_or(64),
        }
    }
}

fn binary(op: BinOp, l: u64, r: u64) -> EvalResult<u64> {
    Ok(match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::UDivExact => {
            if r == 0 || l % r != 0 {
                return Err(Trap::malformed(format!("inexact division {l} / {r}")));
            }
            l / r
        }
        BinOp::URem => {
            if r == 0 {
                return Err(Trap::malformed("remainder by zero"));
            }
            l % r
        }
        BinOp::And => l & r,
        BinOp::Or => l | r,
    })
}

fn compare(pred: ICmpPred, l: u64, r: u64, bits: u32) -> bool {
    let (sl, sr) = (sign_extend(l, bits), sign_extend(r, bits));
    match pred {
        ICmpPred::Eq => l == r,
        ICmpPred::Ne => l != r,
        ICmpPred::Ult => l < r,
        ICmpPred::Ule => l <= r,
        ICmpPred::Ugt => l > r,
        ICmpPred::Uge => l >= r,
        ICmpPred::Slt => sl < sr,
        ICmpPred::Sle => sl <= sr,
        ICmpPred::Sgt => sl > sr,
        ICmpPred::Sge => sl >= sr,
    }
}

#[cold]
fn bad_block(block: BlockId) -> Trap {
    Trap::malformed(format!("branch to missing block {block:?}"))
}
