//! Array lowering for the Keel compiler.
//!
//! Turns typed array expressions into basic-block IR for two array forms:
//! fixed-length arrays, which are their element block, and dynamic arrays,
//! the two-word `{ length, pointer }` record whose storage is owned by the
//! runtime memory manager.
//!
//! - **Element traits** ([`ElementTraits`]): which copy and destroy hooks an
//!   element type needs and whether its default is all-zero bits.
//! - **Assignment policy** ([`select_strategy`]): a pure decision table
//!   picking rebind, bulk copy, runtime copy or broadcast for each store.
//! - **Constant literals** ([`LowerCx::const_array_initializer`]): folding
//!   sparse and nested initializers into module constants.
//! - **Operations** on [`LowerCx`]: concatenation and append, equality,
//!   ordering and identity, bounds checks, casts, allocation.
//!
//! # Runtime contract
//!
//! Anything needing allocation or per-element hooks is a call to a
//! [`RuntimeFn`](keel_ir::RuntimeFn). Element-wise entry points take the
//! element's type descriptor; entry points that allocate or inspect a whole
//! array take the array type's descriptor and reach the element through it.
//!
//! # Logging
//!
//! Lowering decisions are logged with `tracing` at `debug`, emitted blocks at
//! `trace`. Enable with `RUST_LOG=keel_arrays=debug`.

pub mod alloc;
mod assign;
mod bounds;
mod cast;
mod cfg;
pub mod compare;
pub mod config;
mod context;
mod concat;
mod expr;
pub mod literal;
pub mod policy;
pub mod repr;
pub mod traits;
pub mod value;

#[cfg(test)]
mod test_helpers;

pub use alloc::ElementInit;
pub use compare::CompareOp;
pub use config::LowerConfig;
pub use context::{LiteralStats, LowerCx, LowerResult, Signature};
pub use literal::{SlotError, SlotTable};
pub use policy::{
    select_strategy, AssignOp, AssignQuery, CopyStrategy, DstShape, SourceProvenance, SrcShape,
};
pub use repr::ArrayShape;
pub use traits::{ElementTraits, TraitsClassifier};
pub use value::{RuntimeValue, ValueKind};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
