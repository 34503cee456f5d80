/// In-memory workflow and execution store
///
/// Owns workflow definitions and execution records. Workflows sit behind an
/// ArcSwap so the scheduler and runs read them lock-free; executions live in a
/// tokio RwLock since they are written at the start and end of every run.
/// When a `WorkflowStorage` is attached, writes are mirrored to SQLite.

use crate::{
    error::{EngineError, EngineResult},
    workflow::{
        execution::{Execution, ExecutionSummary},
        storage::WorkflowStorage,
        types::{NewWorkflow, Workflow},
    },
};
use arc_swap::ArcSwap;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct WorkflowStore {
    /// Key: workflow id
    workflows: ArcSwap<HashMap<String, Arc<Workflow>>>,
    executions: RwLock<ExecutionTable>,
    storage: Option<WorkflowStorage>,
    max_execution_history: usize,
}

#[derive(Debug, Default)]
struct ExecutionTable {
    by_id: HashMap<String, Execution>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

impl WorkflowStore {
    pub fn new(max_execution_history: usize) -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
            executions: RwLock::new(ExecutionTable::default()),
            storage: None,
            max_execution_history: max_execution_history.max(1),
        }
    }

    /// Store that mirrors writes into SQLite
    pub fn with_storage(storage: WorkflowStorage, max_execution_history: usize) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new(max_execution_history)
        }
    }

    /// Load persisted workflows and recent executions into memory
    pub async fn init_from_storage(&self) -> EngineResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let workflows = storage.load_all_workflows().await?;
        let count = workflows.len();
        self.workflows.store(Arc::new(
            workflows
                .into_iter()
                .map(|wf| (wf.id.clone(), Arc::new(wf)))
                .collect(),
        ));

        let executions = storage
            .load_recent_executions(self.max_execution_history)
            .await?;
        let mut table = self.executions.write().await;
        for execution in executions {
            table.order.push_back(execution.id.clone());
            table.by_id.insert(execution.id.clone(), execution);
        }

        tracing::info!(
            "📥 Loaded {} workflows and {} executions from storage",
            count,
            table.order.len()
        );
        Ok(())
    }

    /// Create a workflow with a generated id
    pub async fn create_workflow(&self, definition: NewWorkflow) -> EngineResult<Workflow> {
        let id = format!("wf_{}", uuid::Uuid::new_v4().simple());
        let workflow = definition.into_workflow(id);
        self.put_workflow(workflow).await
    }

    /// Insert or replace a workflow that already carries its id (seeding, reload)
    pub async fn insert_workflow(&self, workflow: Workflow) -> EngineResult<Workflow> {
        if workflow.id.trim().is_empty() {
            return Err(EngineError::InvalidWorkflow("workflow id must not be empty".into()));
        }
        self.put_workflow(workflow).await
    }

    async fn put_workflow(&self, workflow: Workflow) -> EngineResult<Workflow> {
        workflow.validate().map_err(EngineError::InvalidWorkflow)?;

        if let Some(storage) = &self.storage {
            storage.save_workflow(&workflow).await?;
        }

        let id = workflow.id.clone();
        let stored = Arc::new(workflow.clone());
        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id.clone(), Arc::clone(&stored));
            next
        });

        tracing::info!(
            "📋 Stored workflow '{}' ({}) with {} nodes, active: {}",
            workflow.name,
            workflow.id,
            workflow.nodes.len(),
            workflow.active
        );
        Ok(workflow)
    }

    pub fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.load().get(id).map(|wf| (**wf).clone())
    }

    /// All workflows, sorted by name then id
    pub fn get_all_workflows(&self) -> Vec<Workflow> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .load()
            .values()
            .map(|wf| (**wf).clone())
            .collect();
        workflows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        workflows
    }

    /// Workflows eligible for automatic trigger evaluation
    pub fn active_workflows(&self) -> Vec<Arc<Workflow>> {
        self.workflows
            .load()
            .values()
            .filter(|wf| wf.active)
            .cloned()
            .collect()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.load().len()
    }

    pub fn active_workflow_count(&self) -> usize {
        self.workflows.load().values().filter(|wf| wf.active).count()
    }

    /// Record a freshly started execution
    pub async fn insert_execution(&self, execution: Execution) {
        let mut table = self.executions.write().await;
        if table.by_id.contains_key(&execution.id) {
            tracing::warn!("⚠️ Execution {} already recorded; ignoring restart", execution.id);
            return;
        }
        table.order.push_back(execution.id.clone());
        table.by_id.insert(execution.id.clone(), execution);
        self.prune(&mut table);
    }

    /// Replace a running execution with its finalized record
    ///
    /// Finished records are immutable: a second finalization is ignored.
    pub async fn finalize_execution(&self, execution: Execution) {
        {
            let mut table = self.executions.write().await;
            match table.by_id.get(&execution.id) {
                Some(existing) if !existing.is_running() => {
                    tracing::warn!("⚠️ Execution {} is already final; ignoring update", execution.id);
                    return;
                }
                Some(_) => {}
                None => table.order.push_back(execution.id.clone()),
            }
            table.by_id.insert(execution.id.clone(), execution.clone());
            self.prune(&mut table);
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_execution(&execution).await {
                tracing::error!("❌ Failed to persist execution {}: {}", execution.id, e);
            }
        }
    }

    /// Drop the oldest finished executions beyond the history limit
    fn prune(&self, table: &mut ExecutionTable) {
        while table.order.len() > self.max_execution_history {
            let Some(position) = table
                .order
                .iter()
                .position(|id| table.by_id.get(id).map(|e| !e.is_running()).unwrap_or(true))
            else {
                break;
            };
            if let Some(id) = table.order.remove(position) {
                table.by_id.remove(&id);
            }
        }
    }

    pub async fn get_execution(&self, id: &str) -> Option<Execution> {
        self.executions.read().await.by_id.get(id).cloned()
    }

    /// All executions, newest first
    pub async fn get_all_executions(&self) -> Vec<Execution> {
        let table = self.executions.read().await;
        table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect()
    }

    /// The `limit` most recent executions, newest first
    pub async fn recent_executions(&self, limit: usize) -> Vec<ExecutionSummary> {
        let table = self.executions.read().await;
        table
            .order
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id).map(Execution::summary))
            .take(limit)
            .collect()
    }

    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{
        execution::{ExecutionMode, ExecutionStatus},
        types::{Connection, WorkflowNode},
    };
    use serde_json::json;

    fn new_workflow(name: &str, active: bool) -> NewWorkflow {
        NewWorkflow {
            name: name.to_string(),
            nodes: vec![
                WorkflowNode::new("t", "Trigger", "manualTrigger", json!({})),
                WorkflowNode::new("s", "Set", "set", json!({ "values": { "a": 1 } })),
            ],
            connections: [("t".to_string(), vec![Connection::main("s")])].into(),
            active,
            settings: json!({}),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn create_assigns_unique_ids() {
        let store = WorkflowStore::new(10);
        let a = store.create_workflow(new_workflow("A", true)).await.unwrap();
        let b = store.create_workflow(new_workflow("B", false)).await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("wf_"));
        assert_eq!(store.workflow_count(), 2);
        assert_eq!(store.active_workflow_count(), 1);
        assert_eq!(store.get_workflow(&a.id).unwrap().name, "A");
        assert_eq!(store.get_all_workflows()[1].name, "B");
    }

    #[tokio::test]
    async fn rejects_dangling_connection() {
        let store = WorkflowStore::new(10);
        let mut def = new_workflow("Broken", false);
        def.connections.insert("s".into(), vec![Connection::main("nowhere")]);

        let err = store.create_workflow(def).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidWorkflow(_)));
        assert_eq!(store.workflow_count(), 0);
    }

    #[tokio::test]
    async fn finished_executions_are_immutable() {
        let store = WorkflowStore::new(10);
        let mut execution = Execution::start("e1".into(), "wf", ExecutionMode::Manual);
        store.insert_execution(execution.clone()).await;

        execution.succeed();
        store.finalize_execution(execution.clone()).await;

        let mut tampered = Execution::start("e1".into(), "wf", ExecutionMode::Manual);
        tampered.fail(crate::workflow::execution::ExecutionError {
            name: "X".into(),
            message: "overwrite".into(),
            stack: String::new(),
        });
        store.finalize_execution(tampered).await;

        let stored = store.get_execution("e1").await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn prunes_oldest_finished_first() {
        let store = WorkflowStore::new(2);
        let running = Execution::start("running".into(), "wf", ExecutionMode::Manual);
        store.insert_execution(running).await;

        for id in ["done-1", "done-2"] {
            let mut execution = Execution::start(id.into(), "wf", ExecutionMode::Manual);
            execution.succeed();
            store.finalize_execution(execution).await;
        }

        let ids: Vec<String> = store.get_all_executions().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["done-2".to_string(), "running".to_string()]);
        assert_eq!(store.recent_executions(1).await[0].id, "done-2");
    }

    #[tokio::test]
    async fn mirrors_into_storage() {
        let storage = WorkflowStorage::connect("sqlite::memory:").await.unwrap();
        let store = WorkflowStore::with_storage(storage.clone(), 10);
        let created = store.create_workflow(new_workflow("Persisted", true)).await.unwrap();

        let reloaded = WorkflowStore::with_storage(storage, 10);
        reloaded.init_from_storage().await.unwrap();
        assert_eq!(reloaded.get_workflow(&created.id).unwrap().name, "Persisted");
    }
}
