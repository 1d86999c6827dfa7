//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use keel_ir::{ExprArena, Function, FunctionId, MemTy, Module, TypePool};

use crate::config::LowerConfig;
use crate::context::{LowerCx, Signature};

/// Everything a [`LowerCx`] borrows, owned in one place.
pub(crate) struct Fixture {
    pub module: Module,
    pub pool: TypePool,
    pub exprs: ExprArena,
    pub config: LowerConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(LowerConfig::default())
    }

    pub fn with_config(config: LowerConfig) -> Self {
        crate::init_tracing();
        Fixture {
            module: config.new_module("test"),
            pool: TypePool::new(),
            exprs: ExprArena::new(),
            config,
        }
    }

    /// A context lowering a function named `f` with the given parameters.
    pub fn cx(&mut self, params: Vec<MemTy>) -> LowerCx<'_> {
        LowerCx::new(
            &mut self.module,
            &self.pool,
            &self.exprs,
            &self.config,
            Signature::new("f").with_params(params),
        )
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        self.module.function(id)
    }
}

/// Terminate the current block and finish, panicking on diagnostics.
pub(crate) fn finish(mut cx: LowerCx<'_>) -> FunctionId {
    cx.builder().ret(None);
    match cx.finish() {
        Ok(id) => id,
        Err(diags) => panic!("lowering failed: {diags:?}"),
    }
}
