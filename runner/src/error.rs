use std::io;

use termbook::SanitizeError;
use termbook::include::ExpandError;
use thiserror::Error;

/// Why an execute action failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("block not found: {0}")]
    MissingBlock(String),
    #[error("recursive #include detected for block: {0}")]
    CyclicInclude(String),
    #[error(transparent)]
    DangerousCommand(#[from] SanitizeError),
    #[error("no active document")]
    NoActiveContext,
    #[error("no matching block found for execution")]
    NoMatchingBlock,
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl From<ExpandError> for RuntimeError {
    fn from(error: ExpandError) -> Self {
        match error {
            ExpandError::MissingBlock(name) => RuntimeError::MissingBlock(name),
            ExpandError::CyclicInclude(name) => RuntimeError::CyclicInclude(name),
        }
    }
}

/// Failure to hand a command to a session.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to start `{shell}` for session `{session}`: {source}")]
    Spawn {
        shell: String,
        session: String,
        #[source]
        source: io::Error,
    },
    #[error("session `{0}` no longer accepts input")]
    Closed(String),
    #[error("failed to write to session `{session}`: {source}")]
    Write {
        session: String,
        #[source]
        source: io::Error,
    },
}
