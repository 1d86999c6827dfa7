//! Error codes for back-end diagnostics.
//!
//! Each error code is a unique identifier (e.g., `E5001`) with the first
//! digit indicating the compiler phase. Used for `--explain` lookups and
//! documentation.

use std::fmt;

/// Error codes for back-end diagnostics.
///
/// Format: E#### where first digit indicates phase:
/// - E5xxx: Array lowering / codegen errors
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Array lowering (E5xxx)
    /// Too many initializers for a fixed-length array
    E5001,
    /// Array index initialized more than once
    E5002,
    /// Array initializer index out of range
    E5003,
    /// Array initializer index is not an integer constant
    E5004,
    /// Array initializer element is not a constant
    E5005,
    /// Element sizes of an array cast don't line up
    E5006,
    /// Cast source is not an array or pointer
    E5007,

    // Internal errors (E9xxx)
    /// Internal compiler error
    E9001,
    /// Too many errors
    E9002,
}

impl ErrorCode {
    /// All error codes, in declaration order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E5001,
        ErrorCode::E5002,
        ErrorCode::E5003,
        ErrorCode::E5004,
        ErrorCode::E5005,
        ErrorCode::E5006,
        ErrorCode::E5007,
        ErrorCode::E9001,
        ErrorCode::E9002,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E5003 => "E5003",
            ErrorCode::E5004 => "E5004",
            ErrorCode::E5005 => "E5005",
            ErrorCode::E5006 => "E5006",
            ErrorCode::E5007 => "E5007",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    /// One-line description for `--explain`.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E5001 => "too many initializers for a fixed-length array",
            ErrorCode::E5002 => "array index initialized more than once",
            ErrorCode::E5003 => "array initializer index out of range",
            ErrorCode::E5004 => "array initializer index is not an integer constant",
            ErrorCode::E5005 => "array initializer element is not a constant",
            ErrorCode::E5006 => "element sizes of an array cast don't line up",
            ErrorCode::E5007 => "cast source is not an array or pointer",
            ErrorCode::E9001 => "internal compiler error",
            ErrorCode::E9002 => "too many errors",
        }
    }

    pub fn is_codegen_error(&self) -> bool {
        self.as_str().starts_with("E5")
    }

    pub fn is_internal_error(&self) -> bool {
        self.as_str().starts_with("E9")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E5001"`. Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}

#[cfg(test)]
mod tests;
