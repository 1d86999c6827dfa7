//! Lowering unit.

use crate::constants::ConstArena;
use crate::globals::{GlobalTable, TypeInfoTable};
use crate::ir::{Function, FunctionId};
use crate::layout::DataLayout;

/// A compilation module: constants, globals, type descriptors and the
/// functions lowered into it.
///
/// Tables are append-only with a single writer. Independent modules share
/// nothing and may be lowered on separate threads.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub layout: DataLayout,
    pub consts: ConstArena,
    pub globals: GlobalTable,
    pub type_infos: TypeInfoTable,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>, layout: DataLayout) -> Self {
        Module {
            name: name.into(),
            layout,
            consts: ConstArena::new(),
            globals: GlobalTable::new(),
            type_infos: TypeInfoTable::new(),
            functions: Vec::new(),
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "function counts never exceed u32"
    )]
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId::new(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_named(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
