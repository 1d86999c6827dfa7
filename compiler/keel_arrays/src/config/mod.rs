//! Lowering configuration.

use keel_diagnostic::DiagnosticConfig;
use keel_ir::{DataLayout, Module};

/// Options controlling array lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerConfig {
    /// Emit bounds checks on indexing.
    pub bounds_checks: bool,
    /// Route unproven bulk copies through the overlap-checked runtime copy.
    pub runtime_checks: bool,
    /// Constant array literals with at most this many elements are stored
    /// inline; longer ones are copied from a read-only global.
    pub inline_literal_limit: usize,
    pub data_layout: DataLayout,
    /// File name reported by bounds failures.
    pub module_file: String,
    pub diagnostics: DiagnosticConfig,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            bounds_checks: true,
            runtime_checks: true,
            inline_literal_limit: 4,
            data_layout: DataLayout::host64(),
            module_file: String::from("<unknown>"),
            diagnostics: DiagnosticConfig::default(),
        }
    }
}

impl LowerConfig {
    /// Release build: no bounds checks, no checked copies.
    pub fn release() -> Self {
        LowerConfig {
            bounds_checks: false,
            runtime_checks: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_module_file(mut self, file: impl Into<String>) -> Self {
        self.module_file = file.into();
        self
    }

    #[must_use]
    pub fn with_data_layout(mut self, layout: DataLayout) -> Self {
        self.data_layout = layout;
        self
    }

    /// An empty module using this configuration's data layout.
    pub fn new_module(&self, name: impl Into<String>) -> Module {
        Module::new(name, self.data_layout)
    }
}
