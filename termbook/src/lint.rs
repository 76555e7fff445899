use crate::Termbook;
use crate::include::{ExpandError, include_target};
use crate::parser::ParseError;

impl Termbook {
    /// Report every problem that would make an execution fail before it
    /// reaches the shell: parse warnings, includes of unknown blocks, and
    /// include cycles.
    pub fn lint(&self) -> Vec<ParseError> {
        let mut diagnostics = self.warnings.clone();
        let map = self.block_map();

        for block in self.executable_blocks() {
            let mut offset = block.body_span.start;
            for line in block.body.split_inclusive('\n') {
                let text = line.trim_end_matches(['\n', '\r']);
                if let Some(target) = include_target(text) {
                    if !map.contains_key(target) {
                        diagnostics.push(
                            ParseError::error(
                                format!("included block does not exist: {target}"),
                                offset..offset + text.len(),
                                self.source_id,
                            )
                            .with_note(format!("`{}` cannot be expanded", block.name)),
                        );
                    }
                }
                offset += line.len();
            }
        }

        for block in self.executable_blocks() {
            if self.get(&block.name).map(|b| b.start()) != Some(block.start()) {
                continue;
            }
            if let Err(ExpandError::CyclicInclude(at)) = self.expand_block(&block.name) {
                diagnostics.push(
                    ParseError::error(
                        format!("recursive #include detected for block: {at}"),
                        block.header.clone(),
                        self.source_id,
                    )
                    .with_note(format!("expanding `{}` revisits `{at}`", block.name)),
                );
            }
        }

        diagnostics
    }
}
