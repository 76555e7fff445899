use std::sync::Arc;

use termbook::block::key::BlockKey;
use termbook::parser::Parser;
use termbook::variables::VariableTable;
use termbook::{EnvLookup, ProcessEnv, SanitizeError, expand_variables, sanitize_command};
use tracing::{debug, error, info, warn};

use crate::error::RuntimeError;
use crate::session::{ActiveDocument, Confirm, ExecutionSink, confirmation_prompt};
use crate::settings::ExecutorSettings;
use crate::status::{ExecutionRecord, StatusStore};

/// Everything needed to execute one block, captured when it was rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    /// The block body as it was shown.
    pub command: String,
    pub key: BlockKey,
    /// Custom variables of the document at render time.
    pub variables: VariableTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The expanded command was handed to the sink.
    Executed { command: String },
    /// The user declined a confirmation.
    Cancelled,
}

/// Drives execute actions: status bookkeeping, sanitizing, expansion and
/// delivery to the sink.
pub struct Executor {
    store: Arc<StatusStore>,
    sink: Arc<dyn ExecutionSink>,
    confirm: Arc<dyn Confirm>,
    env: Arc<dyn EnvLookup + Send + Sync>,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(
        store: Arc<StatusStore>,
        sink: Arc<dyn ExecutionSink>,
        confirm: Arc<dyn Confirm>,
        settings: ExecutorSettings,
    ) -> Self {
        Executor {
            store,
            sink,
            confirm,
            env: Arc::new(ProcessEnv),
            settings,
        }
    }

    /// Resolve environment references through `env` instead of the process
    /// environment.
    pub fn with_env(mut self, env: Arc<dyn EnvLookup + Send + Sync>) -> Self {
        self.env = env;
        self
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn status(&self, key: &BlockKey) -> Option<ExecutionRecord> {
        self.store.get(key)
    }

    pub fn clear(&self, key: &BlockKey) {
        self.store.clear(key);
    }

    /// Execute the block `request` was rendered from.
    ///
    /// The key goes pending first and always ends as success or failure,
    /// except when the user cancels, which puts back whatever record the
    /// key had before. Errors are returned for display after the failure
    /// has been recorded.
    pub async fn execute(
        &self,
        document: Option<&ActiveDocument>,
        request: ExecuteRequest,
    ) -> Result<ExecuteOutcome, RuntimeError> {
        let key = &request.key;

        if self.settings.confirm_before_execute
            && !self
                .confirm
                .confirm(&confirmation_prompt(&request.command))
                .await
        {
            info!(%key, "execution declined");
            return Ok(ExecuteOutcome::Cancelled);
        }

        let previous = self.store.set_pending(key);

        match self.run(document, &request).await {
            Ok(Some(command)) => {
                self.store.set_result(key, true);
                info!(%key, "execution assumed successful");
                Ok(ExecuteOutcome::Executed { command })
            }
            Ok(None) => {
                self.store.restore(key, previous);
                info!(%key, "dangerous command cancelled");
                Ok(ExecuteOutcome::Cancelled)
            }
            Err(err) => {
                self.store.set_result(key, false);
                error!(%key, error = %err, "execution failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        document: Option<&ActiveDocument>,
        request: &ExecuteRequest,
    ) -> Result<Option<String>, RuntimeError> {
        let command = match sanitize_command(&request.command) {
            Ok(command) => command,
            Err(SanitizeError::DangerousCommand { command, pattern }) => {
                warn!(pattern, "asking before running dangerous command");
                if !self.confirm.confirm(&confirmation_prompt(&command)).await {
                    return Ok(None);
                }
                command
            }
        };

        let document = document.ok_or(RuntimeError::NoActiveContext)?;
        let termbook = Parser::new(document.text.as_str(), document.source_id).parse();
        let name = termbook
            .find_by_command(&command)
            .ok_or(RuntimeError::NoMatchingBlock)?;

        let expanded = termbook.expand_block(name)?;
        let expanded = expand_variables(&expanded, &request.variables, self.env.as_ref());
        debug!(block = name, command = %expanded, "expanded command");

        self.sink.send(&self.settings.session, &expanded).await?;
        info!(block = name, session = %self.settings.session, "command sent");

        tokio::time::sleep(self.settings.completion_delay()).await;
        Ok(Some(expanded))
    }
}
