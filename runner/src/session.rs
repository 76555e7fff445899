use async_trait::async_trait;

use crate::error::SinkError;

/// The document an execute action runs against.
#[derive(Debug, Clone)]
pub struct ActiveDocument {
    /// Identity used in block keys, e.g. a path or URI.
    pub uri: String,
    pub text: String,
    /// File ID for codespan diagnostics.
    pub source_id: usize,
}

impl ActiveDocument {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        ActiveDocument {
            uri: uri.into(),
            text: text.into(),
            source_id: 0,
        }
    }

    pub fn with_source_id(mut self, source_id: usize) -> Self {
        self.source_id = source_id;
        self
    }

    /// 0-based line of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.text[..offset.min(self.text.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
    }
}

/// Where finished command strings go, typically a terminal session.
///
/// Delivery is fire-and-forget: the sink reports whether the command was
/// accepted, never whether it succeeded.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn send(&self, session: &str, command: &str) -> Result<(), SinkError>;
}

/// Asks the user whether to go ahead with a command.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

const PROMPT_PREVIEW_CHARS: usize = 100;

/// Confirmation text for `command`, cut after 100 characters.
pub fn confirmation_prompt(command: &str) -> String {
    let mut preview: String = command.chars().take(PROMPT_PREVIEW_CHARS).collect();
    if command.chars().count() > PROMPT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    format!("Are you sure you want to execute: {preview}")
}
