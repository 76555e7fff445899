pub mod error;
pub mod executor;
pub mod render;
pub mod session;
pub mod settings;
pub mod status;

pub use error::{RuntimeError, SinkError};
pub use executor::{ExecuteOutcome, ExecuteRequest, Executor};
pub use render::{Affordance, BlockLens, render};
pub use session::{ActiveDocument, AutoConfirm, Confirm, ExecutionSink};
pub use settings::ExecutorSettings;
pub use status::{ExecutionRecord, ExecutionState, StatusChange, StatusStore};
