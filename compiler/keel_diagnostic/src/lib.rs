//! Diagnostic system for the Keel back end.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (where it went wrong)
//! - Notes (why it's wrong)
//!
//! # Error Guarantees
//!
//! The `ErrorGuaranteed` type provides type-level proof that at least one
//! error was emitted. Lowering operations that fail return
//! `Err(ErrorGuaranteed)`; the diagnostics themselves live in the queue.
//!
//! ```text
//! let guarantee = queue.emit_error(diagnostic, line, column);
//! fn lower() -> Result<RuntimeValue, ErrorGuaranteed> { ... }
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
pub mod queue;

pub use diagnostic::{internal_error, Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
