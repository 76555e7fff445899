use std::time::Duration;

use serde::Deserialize;

/// How execute actions behave.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Ask before every execution, not only for dangerous commands.
    pub confirm_before_execute: bool,
    /// Name of the session commands are sent to.
    pub session: String,
    /// How long after sending a command it is assumed to have succeeded.
    pub completion_delay_ms: u64,
}

impl ExecutorSettings {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        ExecutorSettings {
            confirm_before_execute: false,
            session: "Terminal Automator".to_string(),
            completion_delay_ms: 500,
        }
    }
}
