use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use runner::{
    ActiveDocument, AutoConfirm, Confirm, ExecuteOutcome, ExecuteRequest, ExecutionSink,
    ExecutionState, Executor, ExecutorSettings, RuntimeError, SinkError, StatusStore, render,
};
use termbook::block::key::BlockKey;
use termbook::parser::Parser;
use termbook::variables::VariableTable;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl ExecutionSink for RecordingSink {
    async fn send(&self, session: &str, command: &str) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Closed(session.to_string()));
        }
        self.sent
            .lock()
            .push((session.to_string(), command.to_string()));
        Ok(())
    }
}

/// Answers from a script and remembers what it was asked.
struct ScriptedConfirm {
    answers: Mutex<Vec<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    fn new(answers: &[bool]) -> Self {
        ScriptedConfirm {
            answers: Mutex::new(answers.iter().rev().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().push(prompt.to_string());
        self.answers.lock().pop().unwrap_or(false)
    }
}

fn settings() -> ExecutorSettings {
    ExecutorSettings {
        completion_delay_ms: 0,
        ..ExecutorSettings::default()
    }
}

fn env(pairs: &[(&str, &str)]) -> Arc<HashMap<String, String>> {
    Arc::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

struct Harness {
    executor: Executor,
    sink: Arc<RecordingSink>,
    document: ActiveDocument,
}

impl Harness {
    fn new(text: &str, confirm: Arc<dyn Confirm>, settings: ExecutorSettings) -> Self {
        Self::with_sink(text, confirm, settings, RecordingSink::default())
    }

    fn with_sink(
        text: &str,
        confirm: Arc<dyn Confirm>,
        settings: ExecutorSettings,
        sink: RecordingSink,
    ) -> Self {
        let sink = Arc::new(sink);
        let executor = Executor::new(
            Arc::new(StatusStore::new()),
            sink.clone(),
            confirm,
            settings,
        )
        .with_env(env(&[("HOME", "/home/tester")]));
        Harness {
            executor,
            sink,
            document: ActiveDocument::new("file:///work/ops.term", text),
        }
    }

    fn request(&self, name: &str) -> ExecuteRequest {
        let termbook = Parser::new(self.document.text.as_str(), 0).parse();
        render(&termbook, &self.document, self.executor.store())
            .into_iter()
            .filter(|lens| lens.name == name)
            .last()
            .and_then(|lens| lens.execute_request().cloned())
            .expect("block is rendered with an execute affordance")
    }

    fn state(&self, key: &BlockKey) -> Option<ExecutionState> {
        self.executor.status(key).map(|r| r.state())
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sink.sent.lock().clone()
    }
}

const DOC: &str = "\
### $VARIABLES
TARGET=release

### Prepare
cd $HOME/project

### Build
#include Prepare
cargo build --${TARGET}
";

#[tokio::test]
async fn executes_expanded_block_and_marks_success() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("Build");
    let key = request.key.clone();

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();

    let expected = "cd /home/tester/project\ncargo build --release";
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            command: expected.to_string()
        }
    );
    assert_eq!(
        h.sent(),
        [("Terminal Automator".to_string(), expected.to_string())]
    );
    assert_eq!(h.state(&key), Some(ExecutionState::Success));
}

#[tokio::test]
async fn status_goes_pending_then_success() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("Prepare");
    let key = request.key.clone();
    let mut changes = h.executor.store().subscribe();

    h.executor.execute(Some(&h.document), request).await.unwrap();

    let pending = changes.try_recv().unwrap();
    assert_eq!(pending.key, key);
    assert_eq!(pending.record.map(|r| r.state()), Some(ExecutionState::Pending));
    let done = changes.try_recv().unwrap();
    assert_eq!(done.key, key);
    assert_eq!(done.record.map(|r| r.state()), Some(ExecutionState::Success));
    assert!(changes.try_recv().is_err());
    assert_eq!(h.state(&key), Some(ExecutionState::Success));
}

#[tokio::test]
async fn dangerous_command_declined_restores_previous_status() {
    let doc = "### Wipe\nrm -rf ./build\n";
    let confirm = Arc::new(ScriptedConfirm::new(&[false]));
    let h = Harness::new(doc, confirm.clone(), settings());
    let request = h.request("Wipe");
    let key = request.key.clone();

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();

    assert_eq!(outcome, ExecuteOutcome::Cancelled);
    assert!(h.sent().is_empty());
    assert!(h.state(&key).is_none());
    assert_eq!(
        confirm.prompts.lock().as_slice(),
        ["Are you sure you want to execute: rm -rf ./build"]
    );
}

#[tokio::test]
async fn dangerous_command_declined_keeps_earlier_result() {
    let doc = "### Wipe\nrm -rf ./build\n";
    let h = Harness::new(doc, Arc::new(ScriptedConfirm::new(&[true, false])), settings());
    let request = h.request("Wipe");
    let key = request.key.clone();

    h.executor
        .execute(Some(&h.document), request.clone())
        .await
        .unwrap();
    assert_eq!(h.state(&key), Some(ExecutionState::Success));

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();
    assert_eq!(outcome, ExecuteOutcome::Cancelled);
    assert_eq!(h.state(&key), Some(ExecutionState::Success));
}

#[tokio::test]
async fn dangerous_command_confirmed_runs() {
    let doc = "### Wipe\nrm -rf ./build\n";
    let h = Harness::new(doc, Arc::new(AutoConfirm(true)), settings());
    let request = h.request("Wipe");

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();

    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            command: "rm -rf ./build".to_string()
        }
    );
    assert_eq!(h.sent().len(), 1);
}

#[tokio::test]
async fn confirm_before_execute_asks_first() {
    let settings = ExecutorSettings {
        confirm_before_execute: true,
        ..settings()
    };
    let confirm = Arc::new(ScriptedConfirm::new(&[false]));
    let h = Harness::new(DOC, confirm.clone(), settings);
    let request = h.request("Prepare");
    let key = request.key.clone();

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();

    assert_eq!(outcome, ExecuteOutcome::Cancelled);
    assert!(h.state(&key).is_none());
    assert_eq!(confirm.prompts.lock().len(), 1);
}

#[tokio::test]
async fn missing_include_marks_failure() {
    let doc = "### Deploy\n#include Build\nscp out host:\n";
    let h = Harness::new(doc, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("Deploy");
    let key = request.key.clone();

    let err = h
        .executor
        .execute(Some(&h.document), request)
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::MissingBlock(ref name) if name == "Build"));
    assert_eq!(h.state(&key), Some(ExecutionState::Failure));
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn cyclic_include_marks_failure() {
    let doc = "### A\n#include B\n### B\n#include A\n";
    let h = Harness::new(doc, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("A");
    let key = request.key.clone();

    let err = h
        .executor
        .execute(Some(&h.document), request)
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::CyclicInclude(_)));
    assert_eq!(h.state(&key), Some(ExecutionState::Failure));
}

#[tokio::test]
async fn missing_document_is_no_active_context() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("Prepare");
    let key = request.key.clone();

    let err = h.executor.execute(None, request).await.unwrap_err();

    assert!(matches!(err, RuntimeError::NoActiveContext));
    assert_eq!(h.state(&key), Some(ExecutionState::Failure));
}

#[tokio::test]
async fn stale_command_text_is_no_matching_block() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let mut request = h.request("Prepare");
    request.command = "cd $HOME/old-project".to_string();
    let key = request.key.clone();

    let err = h
        .executor
        .execute(Some(&h.document), request)
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::NoMatchingBlock));
    assert_eq!(err.to_string(), "no matching block found for execution");
    assert_eq!(h.state(&key), Some(ExecutionState::Failure));
}

#[tokio::test]
async fn sink_failure_marks_failure() {
    let sink = RecordingSink {
        fail: true,
        ..RecordingSink::default()
    };
    let h = Harness::with_sink(DOC, Arc::new(AutoConfirm(false)), settings(), sink);
    let request = h.request("Prepare");
    let key = request.key.clone();

    let err = h
        .executor
        .execute(Some(&h.document), request)
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Sink(SinkError::Closed(_))));
    assert_eq!(h.state(&key), Some(ExecutionState::Failure));
}

#[tokio::test]
async fn request_variables_are_the_render_time_table() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let mut request = h.request("Build");
    request.variables = [("TARGET", "debug")].into_iter().collect::<VariableTable>();

    let outcome = h.executor.execute(Some(&h.document), request).await.unwrap();

    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            command: "cd /home/tester/project\ncargo build --debug".to_string()
        }
    );
}

#[tokio::test]
async fn clear_removes_the_record() {
    let h = Harness::new(DOC, Arc::new(AutoConfirm(false)), settings());
    let request = h.request("Prepare");
    let key = request.key.clone();
    h.executor.execute(Some(&h.document), request).await.unwrap();

    h.executor.clear(&key);

    assert!(h.executor.status(&key).is_none());
}

#[tokio::test(start_paused = true)]
async fn success_waits_for_the_completion_delay() {
    let h = Arc::new(Harness::new(
        DOC,
        Arc::new(AutoConfirm(false)),
        ExecutorSettings::default(),
    ));
    let request = h.request("Prepare");
    let key = request.key.clone();

    let task = {
        let h = h.clone();
        tokio::spawn(async move {
            h.executor
                .execute(Some(&h.document), request)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
    };

    tokio::task::yield_now().await;
    assert_eq!(h.state(&key), Some(ExecutionState::Pending));
    assert_eq!(h.sent().len(), 1);

    tokio::time::advance(std::time::Duration::from_millis(500)).await;
    task.await.unwrap().unwrap();
    assert_eq!(h.state(&key), Some(ExecutionState::Success));
}
