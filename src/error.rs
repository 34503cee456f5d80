/// Engine error taxonomy
///
/// Typed errors surfaced by the registry, store, executor and scheduler. Node
/// handlers and backends work with `anyhow::Error` internally; the executor wraps
/// whatever they return into `EngineError::NodeExecution` at the dispatch boundary.

use thiserror::Error;

/// Errors produced by the automation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Dispatch failure: no handler is registered for the node's type
    #[error("unknown node type '{node_type}' (node '{node_id}')")]
    UnknownNodeType { node_id: String, node_type: String },

    /// A node's underlying call failed (network, templating, validation)
    #[error("node '{node_name}' failed: {source}")]
    NodeExecution {
        node_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A schedule trigger could not be evaluated
    #[error("trigger '{node_id}' in workflow '{workflow_id}' could not be evaluated: {reason}")]
    TriggerEvaluation {
        workflow_id: String,
        node_id: String,
        reason: String,
    },

    /// A monitoring subscriber returned an error or panicked
    #[error("subscriber {subscriber_id} failed: {reason}")]
    BroadcastSubscriber { subscriber_id: u64, reason: String },

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    /// Structural problem in a workflow definition (duplicate ids, dangling connections)
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// Node type definition rejected at registration
    #[error("invalid node type definition: {0}")]
    InvalidNodeType(String),

    /// Persistence layer failure
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    /// Taxonomy name recorded on failed executions
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownNodeType { .. } => "UnknownNodeTypeError",
            EngineError::NodeExecution { .. } => "NodeExecutionError",
            EngineError::TriggerEvaluation { .. } => "TriggerEvaluationError",
            EngineError::BroadcastSubscriber { .. } => "BroadcastSubscriberError",
            EngineError::WorkflowNotFound(_) => "WorkflowNotFoundError",
            EngineError::ExecutionNotFound(_) => "ExecutionNotFoundError",
            EngineError::InvalidWorkflow(_) => "InvalidWorkflowError",
            EngineError::InvalidNodeType(_) => "InvalidNodeTypeError",
            EngineError::Storage(_) => "StorageError",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_taxonomy() {
        let unknown = EngineError::UnknownNodeType {
            node_id: "n1".into(),
            node_type: "nope".into(),
        };
        assert_eq!(unknown.kind(), "UnknownNodeTypeError");
        assert!(unknown.to_string().contains("nope"));

        let failed = EngineError::NodeExecution {
            node_name: "Send".into(),
            source: anyhow::anyhow!("chat unavailable"),
        };
        assert_eq!(failed.kind(), "NodeExecutionError");
        assert_eq!(failed.to_string(), "node 'Send' failed: chat unavailable");
    }
}
