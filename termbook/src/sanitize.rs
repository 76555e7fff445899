use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::warn;

/// Shapes of commands that destroy data or weaken the system: recursive
/// deletes, filesystem formatting, raw device writes, writes into `/etc`,
/// wide-open permissions, and moves/deletes aimed at `/etc`.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+-rf",
    r"rmdir",
    r"format",
    r"mkfs",
    r"dd\s+if",
    r">\s*/dev/",
    r">\s*/etc/",
    r"chmod\s+777",
    r"chmod\s+-R",
    r"mv\s+.*\s+/etc/",
    r"rm\s+.*\s+/etc/",
];

static DANGEROUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DANGEROUS_PATTERNS
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("dangerous command patterns are valid constants")
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Potentially dangerous command detected: {command}")]
    DangerousCommand {
        command: String,
        pattern: &'static str,
    },
}

/// The first deny-list pattern `command` matches.
pub fn dangerous_pattern(command: &str) -> Option<&'static str> {
    DANGEROUS
        .iter()
        .zip(DANGEROUS_PATTERNS)
        .find(|(regex, _)| regex.is_match(command))
        .map(|(_, pattern)| *pattern)
}

/// Trim `command` and reject it if it matches the deny-list.
///
/// This is a speed bump, not a security boundary: callers are expected to
/// offer the user a way to run the command anyway.
pub fn sanitize_command(command: &str) -> Result<String, SanitizeError> {
    let trimmed = command.trim();
    if let Some(pattern) = dangerous_pattern(trimmed) {
        warn!(pattern, "dangerous command detected");
        return Err(SanitizeError::DangerousCommand {
            command: command.to_string(),
            pattern,
        });
    }
    Ok(trimmed.to_string())
}
