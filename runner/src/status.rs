use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use termbook::block::key::BlockKey;
use tokio::sync::broadcast;
use tracing::trace;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Last known execution state of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// `None` while the command is in flight.
    pub outcome: Option<bool>,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Success,
    Failure,
}

impl ExecutionRecord {
    pub fn state(&self) -> ExecutionState {
        match self.outcome {
            None => ExecutionState::Pending,
            Some(true) => ExecutionState::Success,
            Some(false) => ExecutionState::Failure,
        }
    }
}

/// Sent after every mutation of a [`StatusStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub key: BlockKey,
    /// The record as this mutation left it. Later mutations may already
    /// have replaced it in the store.
    pub record: Option<ExecutionRecord>,
}

/// Execution records keyed by block identity.
///
/// Owned by whoever drives executions and shared through an `Arc`. Reads
/// only take a short lock and never wait on an execution. Writers to the
/// same key are last-writer-wins.
#[derive(Debug)]
pub struct StatusStore {
    records: RwLock<HashMap<BlockKey, ExecutionRecord>>,
    changes: broadcast::Sender<StatusChange>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        StatusStore {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Receive a [`StatusChange`] after each mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.changes.subscribe()
    }

    pub fn get(&self, key: &BlockKey) -> Option<ExecutionRecord> {
        self.records.read().get(key).copied()
    }

    pub fn snapshot(&self) -> HashMap<BlockKey, ExecutionRecord> {
        self.records.read().clone()
    }

    /// Mark `key` as in flight. Returns the record it replaced.
    pub fn set_pending(&self, key: &BlockKey) -> Option<ExecutionRecord> {
        self.write(
            key,
            Some(ExecutionRecord {
                outcome: None,
                timestamp: Instant::now(),
            }),
        )
    }

    /// Record the outcome of an execution.
    pub fn set_result(&self, key: &BlockKey, success: bool) -> Option<ExecutionRecord> {
        self.write(
            key,
            Some(ExecutionRecord {
                outcome: Some(success),
                timestamp: Instant::now(),
            }),
        )
    }

    /// Forget everything about `key`.
    pub fn clear(&self, key: &BlockKey) -> Option<ExecutionRecord> {
        self.write(key, None)
    }

    /// Put back a record saved from an earlier call, or remove the entry.
    pub fn restore(&self, key: &BlockKey, record: Option<ExecutionRecord>) {
        self.write(key, record);
    }

    fn write(&self, key: &BlockKey, record: Option<ExecutionRecord>) -> Option<ExecutionRecord> {
        let previous = {
            let mut records = self.records.write();
            match record {
                Some(record) => records.insert(key.clone(), record),
                None => records.remove(key),
            }
        };
        trace!(%key, state = ?record.map(|r| r.state()), "status changed");
        // Nobody listening is fine.
        let _ = self.changes.send(StatusChange {
            key: key.clone(),
            record,
        });
        previous
    }
}
