//! Abnormal termination of an evaluated function.

use keel_ir::{FunctionId, RuntimeFn};

/// Why evaluation stopped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    /// `keel_arr_bounds_fail` was called.
    #[error("array index out of bounds at {file}:{line}")]
    BoundsFail { file: String, line: u32 },
    #[error("overlapping array copy: {len} bytes at {dst:#x} and {src:#x}")]
    OverlappingCopy { dst: u64, src: u64, len: u64 },
    #[error("array length mismatch for copy: {dst} != {src}")]
    LengthMismatch { dst: u64, src: u64 },
    #[error("{bytes} bytes is not a whole number of {elem}-byte elements")]
    InexactCast { bytes: u64, elem: u64 },
    #[error("invalid code point {0:#x}")]
    InvalidCodePoint(u64),
    #[error("access to {len} bytes at invalid address {addr:#x}")]
    BadAddress { addr: u64, len: u64 },
    #[error("write to read-only memory at {0:#x}")]
    WriteToConstant(u64),
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(u64),
    #[error("no type descriptor at {0:#x}")]
    UnknownTypeInfo(u64),
    #[error("reached unreachable code in block `{0}`")]
    Unreachable(String),
    #[error("step limit exceeded")]
    StepLimit,
    #[error("function {0:?} does not exist")]
    NoSuchFunction(FunctionId),
    #[error("{0:?} called with malformed arguments: {1}")]
    BadRuntimeCall(RuntimeFn, String),
    /// The IR itself is inconsistent: wrong operand kinds, undefined values.
    #[error("malformed IR: {0}")]
    Malformed(String),
}

impl Trap {
    #[cold]
    pub fn malformed(message: impl Into<String>) -> Self {
        Trap::Malformed(message.into())
    }

    /// Traps a program can legitimately raise, as opposed to evaluator or
    /// lowering bugs.
    pub fn is_program_error(&self) -> bool {
        matches!(
            self,
            Trap::BoundsFail { .. }
                | Trap::OverlappingCopy { .. }
                | Trap::LengthMismatch { .. }
                | Trap::InexactCast { .. }
                | Trap::InvalidCodePoint(_)
        )
    }
}

pub type EvalResult<T> = Result<T, Trap>;
