/// Node executor
///
/// Dispatches a single workflow node to the handler registered for its type.
/// Handlers live in a name -> handler table, so new node behaviours plug in
/// through `register_handler` without touching the dispatch path.

use crate::{
    error::{EngineError, EngineResult},
    workflow::types::WorkflowNode,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

/// Behaviour of one node type
///
/// Receives the upstream items (never empty) and returns the produced items.
/// Errors must be returned, not swallowed: the engine decides what a failure
/// means for the run.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

pub struct NodeExecutor {
    /// Key: node type name
    handlers: ArcSwap<HashMap<String, Arc<dyn NodeHandler>>>,
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types = self.handler_types();
        types.sort();
        f.debug_struct("NodeExecutor").field("handlers", &types).finish()
    }
}

impl NodeExecutor {
    /// Executor with no handlers
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Add or replace the handler for a node type
    pub fn register_handler(&self, node_type: &str, handler: Arc<dyn NodeHandler>) {
        let node_type = node_type.to_string();
        self.handlers.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(node_type.clone(), Arc::clone(&handler));
            next
        });
        tracing::debug!("🔌 Registered node handler: {}", node_type);
    }

    pub fn has_handler(&self, node_type: &str) -> bool {
        self.handlers.load().contains_key(node_type)
    }

    pub fn handler_types(&self) -> Vec<String> {
        self.handlers.load().keys().cloned().collect()
    }

    /// Execute a single node against its upstream items
    ///
    /// An empty input is replaced by one synthetic empty item.
    pub async fn execute(&self, node: &WorkflowNode, input_items: Vec<Value>) -> EngineResult<Vec<Value>> {
        let handler = self
            .handlers
            .load()
            .get(&node.node_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            })?;

        let items = if input_items.is_empty() {
            vec![json!({})]
        } else {
            input_items
        };

        tracing::info!("🚀 Starting node execution: {} (type: {})", node.name, node.node_type);
        tracing::debug!(
            "📥 Input data: {}",
            serde_json::to_string(&items).unwrap_or_else(|_| "invalid_json".to_string())
        );

        let start_time = std::time::Instant::now();
        let result = handler.execute(node, items).await;
        let duration = start_time.elapsed();

        match result {
            Ok(output) => {
                tracing::info!("✅ Node execution completed: {} in {:?}", node.name, duration);
                tracing::debug!(
                    "📤 Output data: {}",
                    serde_json::to_string(&output).unwrap_or_else(|_| "invalid_json".to_string())
                );
                Ok(output)
            }
            Err(source) => {
                tracing::error!("❌ Node execution failed: {} in {:?} - Error: {:#}", node.name, duration, source);
                Err(EngineError::NodeExecution {
                    node_name: node.name.clone(),
                    source,
                })
            }
        }
    }
}

impl Default for NodeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl NodeHandler for Echo {
        async fn execute(&self, _node: &WorkflowNode, items: Vec<Value>) -> anyhow::Result<Vec<Value>> {
            Ok(items)
        }
    }

    struct Boom;

    #[async_trait]
    impl NodeHandler for Boom {
        async fn execute(&self, _node: &WorkflowNode, _items: Vec<Value>) -> anyhow::Result<Vec<Value>> {
            anyhow::bail!("backend exploded")
        }
    }

    #[tokio::test]
    async fn unknown_type_is_typed_error() {
        let executor = NodeExecutor::new();
        let node = WorkflowNode::new("n1", "Mystery", "mystery", json!({}));

        let err = executor.execute(&node, vec![]).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownNodeType { ref node_type, .. } if node_type == "mystery"));
    }

    #[tokio::test]
    async fn empty_input_becomes_single_empty_item() {
        let executor = NodeExecutor::new();
        executor.register_handler("echo", Arc::new(Echo));
        let node = WorkflowNode::new("n1", "Echo", "echo", json!({}));

        assert_eq!(executor.execute(&node, vec![]).await.unwrap(), vec![json!({})]);
        assert_eq!(
            executor.execute(&node, vec![json!({ "a": 1 })]).await.unwrap(),
            vec![json!({ "a": 1 })]
        );
    }

    #[tokio::test]
    async fn handler_errors_propagate_as_node_errors() {
        let executor = NodeExecutor::new();
        executor.register_handler("boom", Arc::new(Boom));
        let node = WorkflowNode::new("n1", "Boom", "boom", json!({}));

        let err = executor.execute(&node, vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "NodeExecutionError");
        assert!(err.to_string().contains("backend exploded"));
    }

    #[tokio::test]
    async fn re_registering_replaces_handler() {
        let executor = NodeExecutor::new();
        executor.register_handler("x", Arc::new(Boom));
        executor.register_handler("x", Arc::new(Echo));
        let node = WorkflowNode::new("n1", "X", "x", json!({}));

        assert!(executor.execute(&node, vec![]).await.is_ok());
        assert_eq!(executor.handler_types(), vec!["x".to_string()]);
    }
}
