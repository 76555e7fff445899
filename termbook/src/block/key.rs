use std::fmt;

use crate::block::Block;

/// Identity of one parsed block instance: the document it lives in and the
/// offset of its header. Names and content play no part, so edits that move
/// a header also move its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub document: String,
    pub offset: usize,
}

impl BlockKey {
    pub fn new(document: impl Into<String>, offset: usize) -> Self {
        BlockKey {
            document: document.into(),
            offset,
        }
    }

    pub fn for_block(document: &str, block: &Block) -> Self {
        Self::new(document, block.start())
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.document, self.offset)
    }
}
