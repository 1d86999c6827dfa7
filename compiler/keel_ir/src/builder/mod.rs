//! IR builder.
//!
//! Follows the "position at a block, emit instructions, terminate" pattern
//! of LLVM's `IRBuilder`. The builder owns the in-progress function and
//! borrows the module mutably so constants and globals can be created
//! while emitting.
//!
//! | Group | Methods |
//! |---|---|
//! | Blocks | `append_block`, `position_at_end`, `current_block`, `is_terminated` |
//! | Constants | `const_value`, `const_int`, `const_word`, `const_i32`, `const_bool`, `const_null`, `const_zero`, `global_addr`, `type_info_addr` |
//! | Memory | `alloca`, `load`, `store`, `field_ptr`, `elem_ptr`, `memcpy`, `memset` |
//! | Arithmetic | `binary`, `icmp`, `cast` |
//! | Aggregates | `extract_value`, `make_aggregate` |
//! | Calls | `call_runtime`, `call_postblit` |
//! | Terminators | `br`, `cond_br`, `ret`, `unreachable` |

use rustc_hash::FxHashMap;

use crate::constants::{ConstId, ConstValue};
use crate::globals::GlobalId;
use crate::ir::{
    BinOp, Block, BlockId, Callee, CastOp, Function, FunctionId, ICmpPred, Instr, Terminator,
    ValueData, ValueDef, ValueId,
};
use crate::layout::{DataLayout, MemTy};
use crate::module::Module;
use crate::runtime::RuntimeFn;
use crate::types::TypeId;

/// Structural problem detected while building a function.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("block {block} (`{name}`) of `{function}` has no terminator")]
    Unterminated {
        function: String,
        block: u32,
        name: String,
    },
    #[error("instruction emitted after the terminator of block {block} in `{function}`")]
    EmitAfterTerminator { function: String, block: u32 },
    #[error("type `{ty}` has no member {index}")]
    NoSuchMember { ty: String, index: u32 },
}

/// In-progress basic block.
struct BlockBuilder {
    name: String,
    body: Vec<Instr>,
    terminator: Option<Terminator>,
}

/// Builder for one function of a [`Module`].
pub struct IrBuilder<'m> {
    module: &'m mut Module,
    name: String,
    params: Vec<MemTy>,
    ret: Option<MemTy>,
    blocks: Vec<BlockBuilder>,
    current: BlockId,
    values: Vec<ValueData>,
    const_values: FxHashMap<ConstId, ValueId>,
    problems: Vec<BuildError>,
}

impl<'m> IrBuilder<'m> {
    /// Start a function with an `entry` block and the builder positioned
    /// at it. Parameters are values `0..params.len()`.
    pub fn new(
        module: &'m mut Module,
        name: impl Into<String>,
        params: Vec<MemTy>,
        ret: Option<MemTy>,
    ) -> Self {
        let mut builder = IrBuilder {
            module,
            name: name.into(),
            params: params.clone(),
            ret,
            blocks: Vec::new(),
            current: BlockId::new(0),
            values: Vec::with_capacity(params.len() + 32),
            const_values: FxHashMap::default(),
            problems: Vec::new(),
        };
        for (i, ty) in (0u32..).zip(params) {
            builder.fresh_value(ty, ValueDef::Param(i));
        }
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);
        builder
    }

    #[inline]
    pub fn module(&self) -> &Module {
        self.module
    }

    #[inline]
    pub fn module_mut(&mut self) -> &mut Module {
        self.module
    }

    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.module.layout
    }

    /// The machine word type of the target.
    #[inline]
    pub fn word(&self) -> MemTy {
        self.module.layout.word()
    }

    /// The `index`th function parameter.
    #[inline]
    pub fn param(&self, index: u32) -> ValueId {
        ValueId::new(index)
    }

    // Block management

    /// Allocate a new empty block.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "block indices never exceed u32"
    )]
    pub fn append_block(&mut self, name: &str) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder {
            name: name.to_owned(),
            body: Vec::new(),
            terminator: None,
        });
        id
    }

    /// Set the insertion point to the end of `block`.
    pub fn position_at_end(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "BlockId {} out of bounds (have {} blocks)",
            block.raw(),
            self.blocks.len(),
        );
        self.current = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Whether the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current.index()].terminator.is_some()
    }

    // Values

    #[expect(
        clippy::cast_possible_truncation,
        reason = "value counts never exceed u32"
    )]
    fn fresh_value(&mut self, ty: MemTy, def: ValueDef) -> ValueId {
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(ValueData { ty, def });
        id
    }

    /// Machine type of a value.
    #[inline]
    pub fn value_type(&self, value: ValueId) -> &MemTy {
        &self.values[value.index()].ty
    }

    /// The constant a value was created from, if any.
    pub fn as_const(&self, value: ValueId) -> Option<ConstId> {
        match self.values[value.index()].def {
            ValueDef::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Integer value of a constant integer value.
    pub fn as_const_int(&self, value: ValueId) -> Option<u64> {
        self.as_const(value).and_then(|c| self.module.consts.as_int(c))
    }

    // Constants

    /// Materialize a module constant as a value. Repeated uses share one id.
    pub fn const_value(&mut self, id: ConstId) -> ValueId {
        if let Some(&value) = self.const_values.get(&id) {
            return value;
        }
        let ty = self.module.consts.ty_of(id).clone();
        let value = self.fresh_value(ty, ValueDef::Const(id));
        self.const_values.insert(id, value);
        value
    }

    pub fn const_int(&mut self, ty: MemTy, value: u64) -> ValueId {
        let c = self.module.consts.int(ty, value);
        self.const_value(c)
    }

    /// Pointer-sized integer constant.
    pub fn const_word(&mut self, value: u64) -> ValueId {
        let word = self.word();
        self.const_int(word, value)
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.const_int(MemTy::I32, u64::from(u32::from_ne_bytes(value.to_ne_bytes())))
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.const_int(MemTy::I1, u64::from(value))
    }

    pub fn const_null(&mut self) -> ValueId {
        let c = self.module.consts.null();
        self.const_value(c)
    }

    pub fn const_zero(&mut self, ty: MemTy) -> ValueId {
        let c = self.module.consts.zero(ty);
        self.const_value(c)
    }

    pub fn global_addr(&mut self, global: GlobalId) -> ValueId {
        let c = self.module.consts.global_addr(global);
        self.const_value(c)
    }

    /// Address of the runtime type descriptor of `ty`.
    pub fn type_info_addr(&mut self, ty: TypeId) -> ValueId {
        let c = self.module.consts.intern(ConstValue::TypeInfo(ty));
        self.const_value(c)
    }

    // Instruction emission

    fn push(&mut self, instr: Instr) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            self.current.raw()
        );
        if block.terminator.is_some() {
            self.problems.push(BuildError::EmitAfterTerminator {
                function: self.name.clone(),
                block: self.current.raw(),
            });
            return;
        }
        block.body.push(instr);
    }

    fn emit(&mut self, ty: MemTy, make: impl FnOnce(ValueId) -> Instr) -> ValueId {
        let dst = self.fresh_value(ty, ValueDef::Instr);
        self.push(make(dst));
        dst
    }

    /// Reserve a stack slot; returns its address.
    pub fn alloca(&mut self, ty: MemTy) -> ValueId {
        self.emit(MemTy::Ptr, |dst| Instr::Alloca { dst, ty })
    }

    pub fn load(&mut self, ty: MemTy, ptr: ValueId) -> ValueId {
        self.emit(ty.clone(), |dst| Instr::Load { dst, ty, ptr })
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        self.push(Instr::Store { value, ptr });
    }

    /// Address of member `field` of an `agg` at `base`.
    pub fn field_ptr(&mut self, agg: &MemTy, base: ValueId, field: u32) -> ValueId {
        if agg.member(field).is_none() {
            self.problems.push(BuildError::NoSuchMember {
                ty: agg.to_string(),
                index: field,
            });
        }
        let agg = agg.clone();
        self.emit(MemTy::Ptr, |dst| Instr::FieldPtr {
            dst,
            agg,
            base,
            field,
        })
    }

    /// `base + index * size_of(elem)`.
    pub fn elem_ptr(&mut self, elem: &MemTy, base: ValueId, index: ValueId) -> ValueId {
        let elem = elem.clone();
        self.emit(MemTy::Ptr, |dst| Instr::ElemPtr {
            dst,
            elem,
            base,
            index,
        })
    }

    pub fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.value_type(lhs).clone();
        self.emit(ty, |dst| Instr::Binary { dst, op, lhs, rhs })
    }

    pub fn icmp(&mut self, pred: ICmpPred, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(MemTy::I1, |dst| Instr::ICmp {
            dst,
            pred,
            lhs,
            rhs,
        })
    }

    pub fn extract_value(&mut self, agg: ValueId, field: u32) -> ValueId {
        let agg_ty = self.value_type(agg).clone();
        let ty = if let Some(member) = agg_ty.member(field) {
            member.clone()
        } else {
            self.problems.push(BuildError::NoSuchMember {
                ty: agg_ty.to_string(),
                index: field,
            });
            MemTy::I8
        };
        self.emit(ty, |dst| Instr::ExtractValue { dst, agg, field })
    }

    pub fn make_aggregate(&mut self, ty: MemTy, fields: Vec<ValueId>) -> ValueId {
        self.emit(ty.clone(), |dst| Instr::MakeAggregate { dst, ty, fields })
    }

    pub fn cast(&mut self, op: CastOp, value: ValueId, to: MemTy) -> ValueId {
        self.emit(to.clone(), |dst| Instr::Cast { dst, op, value, to })
    }

    pub fn memcpy(&mut self, dst: ValueId, src: ValueId, len: ValueId) {
        self.push(Instr::MemCpy { dst, src, len });
    }

    pub fn memset(&mut self, dst: ValueId, byte: ValueId, len: ValueId) {
        self.push(Instr::MemSet { dst, byte, len });
    }

    /// Call a runtime entry point. Returns the result value, if the entry
    /// point has one.
    pub fn call_runtime(&mut self, f: RuntimeFn, args: Vec<ValueId>) -> Option<ValueId> {
        debug_assert_eq!(
            args.len(),
            f.params().len(),
            "{} takes {} arguments",
            f.symbol(),
            f.params().len()
        );
        let callee = Callee::Runtime(f);
        match f.ret() {
            Some(abi) => {
                let ty = abi.mem(&self.module.layout);
                Some(self.emit(ty, |dst| Instr::Call {
                    dst: Some(dst),
                    callee,
                    args,
                }))
            }
            None => {
                self.push(Instr::Call {
                    dst: None,
                    callee,
                    args,
                });
                None
            }
        }
    }

    /// Call the copy-construct hook of `ty` on the object at `ptr`.
    pub fn call_postblit(&mut self, ty: TypeId, ptr: ValueId) {
        self.push(Instr::Call {
            dst: None,
            callee: Callee::Postblit(ty),
            args: vec![ptr],
        });
    }

    // Terminators

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            self.current.raw()
        );
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    // Finalization

    /// Validate and add the function to the module.
    ///
    /// Fails on the first recorded problem or on any block without a
    /// terminator.
    pub fn finish(self) -> Result<FunctionId, BuildError> {
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(problem);
        }
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (i, bb) in (0u32..).zip(self.blocks) {
            let id = BlockId::new(i);
            let Some(terminator) = bb.terminator else {
                return Err(BuildError::Unterminated {
                    function: self.name,
                    block: id.raw(),
                    name: bb.name,
                });
            };
            blocks.push(Block {
                id,
                name: bb.name,
                body: bb.body,
                terminator,
            });
        }
        tracing::debug!(
            function = %self.name,
            blocks = blocks.len(),
            values = self.values.len(),
            "finished function"
        );
        let function = Function {
            name: self.name,
            params: self.params,
            ret: self.ret,
            blocks,
            values: self.values,
        };
        Ok(self.module.add_function(function))
    }
}
