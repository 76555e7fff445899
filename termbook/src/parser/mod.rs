pub mod error;
mod structural;

use std::collections::HashMap;

use tracing::debug;

pub use error::ParseError;

use crate::Termbook;
use crate::block::Block;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            source: source.into(),
            file_id,
        }
    }

    /// Scan the whole source into a [`Termbook`]. Parsing never fails; odd
    /// but legal input is reported through [`Termbook::warnings`].
    pub fn parse(&self) -> Termbook {
        let blocks = structural::scan_blocks(&self.source);
        let warnings = shadowing_warnings(&blocks, self.file_id);
        debug!(
            blocks = blocks.len(),
            warnings = warnings.len(),
            "parsed termbook"
        );
        Termbook::new(blocks, self.file_id, warnings)
    }
}

/// Duplicate names keep only the last block, and only the first `$VARIABLES`
/// block is read. Everything else is shadowed and deserves a warning.
fn shadowing_warnings(blocks: &[Block], file_id: usize) -> Vec<ParseError> {
    let mut warnings = Vec::new();
    let mut last_seen: HashMap<&str, &Block> = HashMap::new();
    let mut variables_seen = false;

    for block in blocks {
        if block.is_variables() {
            if variables_seen {
                warnings.push(
                    ParseError::warning(
                        "additional `$VARIABLES` block is ignored",
                        block.header.clone(),
                        file_id,
                    )
                    .with_note("only the first `$VARIABLES` block declares custom variables"),
                );
            }
            variables_seen = true;
            continue;
        }
        if let Some(earlier) = last_seen.insert(&block.name, block) {
            warnings.push(
                ParseError::warning(
                    format!("block `{}` is shadowed by a later block", earlier.name),
                    earlier.header.clone(),
                    file_id,
                )
                .with_note(format!(
                    "`{}` is redefined at byte {}; the later definition wins",
                    block.name,
                    block.start()
                )),
            );
        }
    }

    warnings
}
