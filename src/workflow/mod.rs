/// Workflow Management Layer
///
/// Workflow definitions, execution records and their ownership:
/// - Type definitions (Workflow, WorkflowNode, Connection)
/// - Execution records and their lifecycle
/// - `{{ $json.key }}` template resolution
/// - In-memory store with optional SQLite mirroring

pub mod types;

pub mod execution;

pub mod template;

pub mod storage;

pub mod store;

pub use execution::{Execution, ExecutionMode, ExecutionStatus};
pub use store::WorkflowStore;
pub use types::{Connection, Connections, NewWorkflow, Workflow, WorkflowNode};
