//! Source location spans.

use std::fmt;

/// Byte range in a source file.
///
/// Layout: 8 bytes total (`start`, `end` exclusive).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Dummy span for generated code.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Check if this is the dummy span.
    #[inline]
    pub const fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A line-resolved source location.
///
/// Runtime failure entries (bounds failures) receive the module file name
/// and the line number, not byte offsets.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SourceLoc {
    /// Byte span, used for diagnostics.
    pub span: Span,
    /// 1-based line number, passed to runtime failure entries.
    pub line: u32,
}

impl SourceLoc {
    pub const fn new(span: Span, line: u32) -> Self {
        SourceLoc { span, line }
    }

    /// A location for synthesized code (no span, line 0).
    pub const fn synthetic() -> Self {
        SourceLoc {
            span: Span::DUMMY,
            line: 0,
        }
    }
}
