use std::collections::HashMap;
use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use runner::{ExecutionSink, SinkError};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Long-lived shell processes, one per session name. Commands are written to
/// the shell's stdin like keystrokes into a terminal, so `cd` and exported
/// variables carry over between blocks of the same session.
pub struct ShellSessions {
    shell: String,
    sessions: Mutex<HashMap<String, Child>>,
}

impl ShellSessions {
    pub fn new(shell: impl Into<String>) -> Self {
        ShellSessions {
            shell: shell.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn spawn(&self, session: &str) -> Result<Child, SinkError> {
        info!(shell = %self.shell, session, "starting session");
        Command::new(&self.shell)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| SinkError::Spawn {
                shell: self.shell.clone(),
                session: session.to_string(),
                source,
            })
    }

    /// Close every session's input and wait for its shell to finish the
    /// queued commands.
    pub async fn shutdown(&self) -> Vec<(String, io::Result<ExitStatus>)> {
        let mut sessions = self.sessions.lock().await;
        let mut results = Vec::new();
        for (name, mut child) in sessions.drain() {
            drop(child.stdin.take());
            let status = child.wait().await;
            debug!(session = %name, ?status, "session ended");
            results.push((name, status));
        }
        results
    }
}

#[async_trait]
impl ExecutionSink for ShellSessions {
    async fn send(&self, session: &str, command: &str) -> Result<(), SinkError> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(session) {
            let child = self.spawn(session)?;
            sessions.insert(session.to_string(), child);
        }
        let stdin = sessions
            .get_mut(session)
            .and_then(|child| child.stdin.as_mut())
            .ok_or_else(|| SinkError::Closed(session.to_string()))?;

        let write_error = |source| SinkError::Write {
            session: session.to_string(),
            source,
        };
        stdin.write_all(command.as_bytes()).await.map_err(write_error)?;
        stdin.write_all(b"\n").await.map_err(write_error)?;
        stdin.flush().await.map_err(write_error)?;
        Ok(())
    }
}
