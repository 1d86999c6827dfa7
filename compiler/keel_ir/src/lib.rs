//! Core IR for the Keel compiler back end.
//!
//! - [`types`]: interned source types (`TypeId`, `TypePool`, element flags)
//! - [`expr`]: typed expression arena consumed by lowering
//! - [`layout`]: machine memory types and target data layout
//! - [`ir`]: basic-block IR (`Function`, `Block`, `Instr`, `Terminator`)
//! - [`builder`]: `IrBuilder` for emitting IR
//! - [`constants`], [`globals`]: module-level constant and global tables
//! - [`runtime`]: runtime entry point contract

pub mod builder;
pub mod constants;
pub mod expr;
pub mod globals;
pub mod ir;
pub mod layout;
mod module;
pub mod runtime;
mod span;
pub mod types;

pub use builder::{BuildError, IrBuilder};
pub use constants::{ConstArena, ConstId, ConstValue};
pub use expr::{
    ArithOp, ArrayInit, Expr, ExprArena, ExprId, ExprKind, InitEntry, Initializer, LitValue,
    LocalId,
};
pub use globals::{GlobalId, GlobalTable, GlobalVar, Linkage, ScalarClass, TypeInfo, TypeInfoTable};
pub use ir::{
    BinOp, Block, BlockId, Callee, CastOp, Function, FunctionId, ICmpPred, Instr, Terminator,
    ValueData, ValueDef, ValueId,
};
pub use layout::{mem_type, size_of_type, DataLayout, MemTy};
pub use module::Module;
pub use runtime::{AbiTy, RuntimeFn};
pub use span::{SourceLoc, Span};
pub use types::{ElementFlags, FieldDef, StructDef, TypeId, TypeKind, TypePool, UnionDef};
