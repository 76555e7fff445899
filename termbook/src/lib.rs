pub mod block;
pub mod expand;
pub mod include;
pub mod lint;
pub mod parser;
pub mod sanitize;
pub mod variables;

use std::collections::{HashMap, HashSet};

use crate::block::Block;
use crate::include::{BlockMap, ExpandError};
use crate::parser::ParseError;
use crate::variables::VariableTable;

pub use expand::{EnvLookup, ProcessEnv, expand_variables};
pub use sanitize::{SanitizeError, sanitize_command};

/// A parsed termbook document.
#[derive(Debug, Clone)]
pub struct Termbook {
    /// Every block in document order, including `$VARIABLES`.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
    /// Non-fatal problems noticed while parsing.
    pub warnings: Vec<ParseError>,
    bodies: BlockMap,
    variables: VariableTable,
}

impl Termbook {
    pub(crate) fn new(blocks: Vec<Block>, source_id: usize, warnings: Vec<ParseError>) -> Self {
        let mut bodies = HashMap::new();
        for block in blocks.iter().filter(|b| !b.is_variables()) {
            bodies.insert(block.name.clone(), block.body.clone());
        }
        let variables = blocks
            .iter()
            .find(|b| b.is_variables())
            .map(|b| VariableTable::parse(&b.body))
            .unwrap_or_default();
        Termbook {
            blocks,
            source_id,
            warnings,
            bodies,
            variables,
        }
    }

    /// Blocks that can be executed, i.e. everything except `$VARIABLES`.
    pub fn executable_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_variables())
    }

    /// Name to body mapping of executable blocks. On duplicate names the
    /// last block in the document wins.
    pub fn block_map(&self) -> &BlockMap {
        &self.bodies
    }

    /// The first `$VARIABLES` block, if any.
    pub fn variables_block(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.is_variables())
    }

    /// Custom variables declared in the `$VARIABLES` block.
    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// The block currently mapped to `name`.
    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks
            .iter()
            .rev()
            .find(|b| !b.is_variables() && b.name == name)
    }

    /// Find the name of the block whose body equals `command` (trimmed).
    pub fn find_by_command(&self, command: &str) -> Option<&str> {
        let command = command.trim();
        self.executable_blocks()
            .find(|b| b.body == command && self.bodies.get(&b.name) == Some(&b.body))
            .map(|b| b.name.as_str())
    }

    /// Expand every `#include` of the named block.
    pub fn expand_block(&self, name: &str) -> Result<String, ExpandError> {
        include::expand_includes(name, &self.bodies, &mut HashSet::new())
    }
}
