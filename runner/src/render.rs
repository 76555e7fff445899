use std::time::Instant;

use termbook::Termbook;
use termbook::block::key::BlockKey;

use crate::executor::ExecuteRequest;
use crate::session::ActiveDocument;
use crate::status::{ExecutionState, StatusStore};

const RECENT_SECS: u64 = 60;

/// An action or badge shown above a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Affordance {
    Execute(ExecuteRequest),
    GetEnvVar,
    Executing,
    Succeeded { clear: BlockKey },
    Failed { clear: BlockKey },
    Age { seconds: u64 },
}

impl Affordance {
    pub fn title(&self) -> String {
        match self {
            Affordance::Execute(_) => "▶ Execute".to_string(),
            Affordance::GetEnvVar => "🔍 Get Env Var".to_string(),
            Affordance::Executing => "⟳ Executing...".to_string(),
            Affordance::Succeeded { .. } => "✓ Success".to_string(),
            Affordance::Failed { .. } => "✗ Error".to_string(),
            Affordance::Age { seconds } => format!("({seconds}s ago)"),
        }
    }

    pub fn tooltip(&self) -> Option<&'static str> {
        match self {
            Affordance::Succeeded { .. } => Some("Command executed successfully"),
            Affordance::Failed { .. } => Some("Command execution failed"),
            _ => None,
        }
    }
}

/// Affordances of one executable block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLens {
    pub key: BlockKey,
    pub name: String,
    /// 0-based line of the block header.
    pub line: usize,
    pub affordances: Vec<Affordance>,
}

impl BlockLens {
    pub fn execute_request(&self) -> Option<&ExecuteRequest> {
        self.affordances.iter().find_map(|a| match a {
            Affordance::Execute(request) => Some(request),
            _ => None,
        })
    }
}

/// Work out what to show above every executable block of `termbook`,
/// reading the current status snapshot.
pub fn render(
    termbook: &Termbook,
    document: &ActiveDocument,
    store: &StatusStore,
) -> Vec<BlockLens> {
    let now = Instant::now();

    termbook
        .executable_blocks()
        .map(|block| {
            let key = BlockKey::for_block(&document.uri, block);
            let mut affordances = vec![Affordance::Execute(ExecuteRequest {
                command: block.body.clone(),
                key: key.clone(),
                variables: termbook.variables().clone(),
            })];

            if block.references_variables() {
                affordances.push(Affordance::GetEnvVar);
            }

            if let Some(record) = store.get(&key) {
                affordances.push(match record.state() {
                    ExecutionState::Pending => Affordance::Executing,
                    ExecutionState::Success => Affordance::Succeeded { clear: key.clone() },
                    ExecutionState::Failure => Affordance::Failed { clear: key.clone() },
                });
                let seconds = now.saturating_duration_since(record.timestamp).as_secs();
                if seconds < RECENT_SECS {
                    affordances.push(Affordance::Age { seconds });
                }
            }

            BlockLens {
                line: document.line_of(block.start()),
                name: block.name.clone(),
                key,
                affordances,
            }
        })
        .collect()
}
