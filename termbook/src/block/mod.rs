pub mod key;

use std::ops::Range;

/// Name of the reserved block holding custom variable declarations.
pub const VARIABLES_BLOCK: &str = "$VARIABLES";

/// A named section of a termbook, introduced by a `### Name` header line.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// The header name, trimmed.
    pub name: String,
    /// Everything between the header line and the next header, trimmed.
    pub body: String,
    /// Byte span of the header line (without its line terminator).
    pub header: Range<usize>,
    /// Byte span of the trimmed body.
    pub body_span: Range<usize>,
    /// Byte span of the whole section, header included.
    pub span: Range<usize>,
}

impl Block {
    /// Offset of the `###` that starts this block.
    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn is_variables(&self) -> bool {
        self.name == VARIABLES_BLOCK
    }

    /// Whether the body looks like it references environment variables.
    pub fn references_variables(&self) -> bool {
        self.body.contains('$') || self.body.contains("process.env")
    }
}
