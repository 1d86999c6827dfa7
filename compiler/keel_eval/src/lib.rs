//! Reference evaluator for lowered Keel IR.
//!
//! Executes the functions of a [`keel_ir::Module`] on a flat simulated
//! memory, with the array runtime's entry points simulated in-process. It
//! exists to check the observable behavior of lowered code: element values,
//! runtime calls made, hooks run, and failures raised.
//!
//! - [`value`]: evaluated values and their little-endian memory encoding
//! - [`memory`]: flat memory with a faulting null page and read-only ranges
//! - [`machine`]: the interpreter and its event log
//! - `runtime`: simulated runtime entry points
//! - [`trap`]: why evaluation stopped
//!
//! ```text
//! let mut vm = Machine::new(&module);
//! let result = vm.run(function, &[Val::slice(3, ptr)])?;
//! assert_eq!(vm.runtime_calls(), vec![RuntimeFn::CatBinary]);
//! ```

pub mod machine;
pub mod memory;
mod runtime;
pub mod trap;
pub mod value;

pub use machine::{Event, Machine};
pub use memory::{HeapBlock, Memory};
pub use trap::{EvalResult, Trap};
pub use value::Val;
