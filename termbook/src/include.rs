use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Block name to trimmed body.
pub type BlockMap = HashMap<String, String>;

static INCLUDE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#include\s+(.+)$").expect("include directive regex is a valid constant")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("block not found: {0}")]
    MissingBlock(String),
    #[error("recursive #include detected for block: {0}")]
    CyclicInclude(String),
}

/// The target of an `#include` line, if the line is one.
pub fn include_target(line: &str) -> Option<&str> {
    INCLUDE_DIRECTIVE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Marks a block as being expanded for as long as the guard lives, so the
/// path set is restored on every exit, including early `?` returns.
struct OpenPath<'a> {
    open: &'a mut HashSet<String>,
    name: &'a str,
}

impl<'a> OpenPath<'a> {
    fn enter(open: &'a mut HashSet<String>, name: &'a str) -> Result<Self, ExpandError> {
        if !open.insert(name.to_string()) {
            return Err(ExpandError::CyclicInclude(name.to_string()));
        }
        Ok(OpenPath { open, name })
    }
}

impl Drop for OpenPath<'_> {
    fn drop(&mut self) {
        self.open.remove(self.name);
    }
}

/// Inline every `#include <name>` line of block `name`, recursively.
///
/// `open` holds the blocks on the current recursion path; it is left exactly
/// as it was found whether expansion succeeds or fails. Sibling includes of
/// the same block are fine, only a block reappearing on its own path is a
/// cycle. Lines are re-joined with `\n`.
pub fn expand_includes(
    name: &str,
    blocks: &BlockMap,
    open: &mut HashSet<String>,
) -> Result<String, ExpandError> {
    let path = OpenPath::enter(open, name)?;
    let body = blocks
        .get(name)
        .ok_or_else(|| ExpandError::MissingBlock(name.to_string()))?;

    let mut lines = Vec::new();
    for line in body.lines() {
        match include_target(line) {
            Some(target) => {
                trace!(block = name, target, "expanding include");
                lines.push(expand_includes(target, blocks, &mut *path.open)?);
            }
            None => lines.push(line.to_string()),
        }
    }
    Ok(lines.join("\n"))
}
