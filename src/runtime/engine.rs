/// Workflow execution engine
///
/// Runs a workflow as a dataflow: trigger nodes are seeded with one empty item,
/// then repeated passes over the node list execute every node whose upstream
/// nodes have all produced data. A pass that executes nothing ends the run.
/// Nodes left over after a successful run are diagnosed with petgraph (cycle
/// membership vs. unreachable) and reported on the execution record.

use crate::{
    error::{EngineError, EngineResult},
    nodes::NodeTypeRegistry,
    runtime::{
        executor::NodeExecutor,
        monitor::{MonitorEvent, MonitoringBus},
    },
    workflow::{
        execution::{
            Execution, ExecutionError, ExecutionMode, NodeExecutionRecord, NodeOutput, NodeRef, SkipReason,
            SkippedNode,
        },
        store::WorkflowStore,
        types::Workflow,
    },
};
use petgraph::{algo::tarjan_scc, graph::DiGraph};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

#[derive(Debug)]
pub struct ExecutionEngine {
    executor: Arc<NodeExecutor>,
    registry: Arc<NodeTypeRegistry>,
    store: Arc<WorkflowStore>,
    monitor: Arc<MonitoringBus>,
}

impl ExecutionEngine {
    pub fn new(
        executor: Arc<NodeExecutor>,
        registry: Arc<NodeTypeRegistry>,
        store: Arc<WorkflowStore>,
        monitor: Arc<MonitoringBus>,
    ) -> Self {
        Self {
            executor,
            registry,
            store,
            monitor,
        }
    }

    /// Look up a stored workflow and run it under the given execution id
    pub async fn run(&self, workflow_id: &str, execution_id: String, mode: ExecutionMode) -> EngineResult<Execution> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        Ok(self.execute_workflow(&workflow, execution_id, mode).await)
    }

    /// Run `workflow` to completion
    ///
    /// Always returns a finalized execution; node failures are recorded on it
    /// rather than returned. Exactly one execution update is broadcast.
    pub async fn execute_workflow(&self, workflow: &Workflow, execution_id: String, mode: ExecutionMode) -> Execution {
        let mut execution = Execution::start(execution_id, &workflow.id, mode);
        self.store.insert_execution(execution.clone()).await;

        tracing::info!(
            "🚀 Starting workflow execution: {} ({}) as {}",
            workflow.name,
            workflow.id,
            execution.id
        );

        let outcome = self.run_passes(workflow, &mut execution).await;

        match outcome {
            Ok(executed) => {
                let skipped = diagnose_skipped(workflow, &executed);
                for node in &skipped {
                    tracing::warn!(
                        "⚠️ Node '{}' in workflow {} was never executed ({:?})",
                        node.name,
                        workflow.id,
                        node.reason
                    );
                }
                execution.data.skipped_nodes = skipped;
                execution.succeed();
                tracing::info!(
                    "✅ Workflow execution {} completed in {}ms ({} nodes)",
                    execution.id,
                    execution.data.execution_time.unwrap_or_default(),
                    execution.data.result_data.len()
                );
            }
            Err(error) => {
                tracing::error!("❌ Workflow execution {} failed: {}", execution.id, error);
                execution.fail(ExecutionError::from_engine_error(&error));
            }
        }

        self.store.finalize_execution(execution.clone()).await;
        self.monitor.broadcast(&MonitorEvent::ExecutionUpdate(execution.clone()));
        execution
    }

    /// Execute eligible nodes pass by pass; returns the executed node ids
    async fn run_passes<'w>(
        &self,
        workflow: &'w Workflow,
        execution: &mut Execution,
    ) -> EngineResult<HashSet<&'w str>> {
        let incoming = workflow.incoming();
        let mut node_data: HashMap<&str, Vec<Value>> = HashMap::new();
        let mut executed: HashSet<&str> = HashSet::new();

        let triggers: HashSet<&str> = workflow
            .nodes
            .iter()
            .filter(|node| self.registry.is_trigger(&node.node_type))
            .map(|node| node.id.as_str())
            .collect();
        for &id in &triggers {
            node_data.insert(id, vec![json!({})]);
        }
        tracing::debug!("🎯 Seeded {} trigger node(s)", triggers.len());

        let mut pass = 0;
        loop {
            pass += 1;
            let mut progressed = false;

            for node in &workflow.nodes {
                let id = node.id.as_str();
                if executed.contains(id) {
                    continue;
                }

                let input = if triggers.contains(id) {
                    node_data.get(id).cloned().unwrap_or_default()
                } else {
                    let upstream = incoming.get(id).map(Vec::as_slice).unwrap_or_default();
                    if !upstream.iter().all(|source| executed.contains(source)) {
                        continue;
                    }
                    upstream
                        .iter()
                        .filter_map(|source| node_data.get(source))
                        .flatten()
                        .cloned()
                        .collect()
                };

                let started = std::time::Instant::now();
                let output = self.executor.execute(node, input).await?;
                let elapsed = started.elapsed().as_millis() as u64;

                execution.data.result_data.push(NodeExecutionRecord {
                    node: NodeRef {
                        name: node.name.clone(),
                        node_type: node.node_type.clone(),
                    },
                    data: NodeOutput { main: output.clone() },
                    finished: true,
                    execution_time: elapsed,
                });
                node_data.insert(id, output);
                executed.insert(id);
                progressed = true;
            }

            if !progressed || executed.len() == workflow.nodes.len() {
                tracing::debug!("🔄 Execution {} settled after {} pass(es)", execution.id, pass);
                return Ok(executed);
            }
        }
    }
}

/// Classify nodes that never ran: members of a dependency cycle vs. the rest
fn diagnose_skipped(workflow: &Workflow, executed: &HashSet<&str>) -> Vec<SkippedNode> {
    if executed.len() == workflow.nodes.len() {
        return Vec::new();
    }

    let mut graph = DiGraph::<&str, ()>::new();
    let indices: HashMap<&str, _> = workflow
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), graph.add_node(node.id.as_str())))
        .collect();
    for (source, targets) in &workflow.connections {
        let Some(&from) = indices.get(source.as_str()) else {
            continue;
        };
        for target in targets {
            if let Some(&to) = indices.get(target.node.as_str()) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let in_cycle: HashSet<&str> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1 || graph.contains_edge(component[0], component[0]))
        .flatten()
        .map(|index| graph[index])
        .collect();

    workflow
        .nodes
        .iter()
        .filter(|node| !executed.contains(node.id.as_str()))
        .map(|node| SkippedNode {
            node_id: node.id.clone(),
            name: node.name.clone(),
            reason: if in_cycle.contains(node.id.as_str()) {
                SkipReason::Cycle
            } else {
                SkipReason::Unreachable
            },
        })
        .collect()
}
