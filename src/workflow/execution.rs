/// Execution records
///
/// One `Execution` per run. It is created in the `running` state, finalized
/// exactly once into `success` or `error`, and only read afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Trigger,
    Manual,
}

/// A single workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Generated; embeds workflow id and start timestamp
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub finished: bool,
    pub data: ExecutionData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionData {
    /// Per-node results in execution order
    pub result_data: Vec<NodeExecutionRecord>,
    /// Wall-clock run duration in milliseconds, set on completion
    pub execution_time: Option<u64>,
    /// Nodes a successful run could never reach
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_nodes: Vec<SkippedNode>,
}

/// Result of one node within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionRecord {
    pub node: NodeRef,
    pub data: NodeOutput,
    pub finished: bool,
    /// Milliseconds
    pub execution_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    pub main: Vec<Value>,
}

/// Error captured on a failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub name: String,
    pub message: String,
    pub stack: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    /// Member of a dependency cycle
    Cycle,
    /// Depends on a node that never produced data
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedNode {
    pub node_id: String,
    pub name: String,
    pub reason: SkipReason,
}

/// Compact view used in status snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub execution_time: Option<u64>,
}

/// Generate an execution id traceable to its workflow and start time
pub fn generate_execution_id(workflow_id: &str) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "exec_{}_{}_{}",
        workflow_id,
        Utc::now().timestamp_millis(),
        &nonce[..8]
    )
}

impl Execution {
    /// New run in the `running` state
    pub fn start(id: String, workflow_id: &str, mode: ExecutionMode) -> Self {
        Self {
            id,
            workflow_id: workflow_id.to_string(),
            status: ExecutionStatus::Running,
            mode,
            started_at: Utc::now(),
            stopped_at: None,
            finished: false,
            data: ExecutionData::default(),
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    /// Finalize as success; no-op unless still running
    pub fn succeed(&mut self) -> bool {
        self.finish(ExecutionStatus::Success, None)
    }

    /// Finalize as error; no-op unless still running
    pub fn fail(&mut self, error: ExecutionError) -> bool {
        self.finish(ExecutionStatus::Error, Some(error))
    }

    fn finish(&mut self, status: ExecutionStatus, error: Option<ExecutionError>) -> bool {
        if !self.is_running() {
            tracing::warn!("⚠️ Execution {} already finalized as {:?}", self.id, self.status);
            return false;
        }

        let stopped_at = Utc::now();
        let elapsed = (stopped_at - self.started_at).num_milliseconds().max(0) as u64;

        self.status = status;
        self.error = error;
        self.finished = true;
        self.stopped_at = Some(stopped_at);
        self.data.execution_time = Some(elapsed);
        true
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            id: self.id.clone(),
            workflow_id: self.workflow_id.clone(),
            status: self.status,
            mode: self.mode,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            execution_time: self.data.execution_time,
        }
    }
}

impl ExecutionError {
    /// Capture name, message and the full cause chain of an engine error
    pub fn from_engine_error(error: &crate::error::EngineError) -> Self {
        let mut stack = vec![format!("{}: {}", error.kind(), error)];
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            stack.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            name: error.kind().to_string(),
            message: error.to_string(),
            stack: stack.join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn id_embeds_workflow() {
        let id = generate_execution_id("wf-42");
        assert!(id.starts_with("exec_wf-42_"));
        assert_ne!(id, generate_execution_id("wf-42"));
    }

    #[test]
    fn finalizes_exactly_once() {
        let mut execution = Execution::start("e1".into(), "wf", ExecutionMode::Manual);
        assert!(execution.is_running());
        assert!(!execution.finished);

        assert!(execution.succeed());
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.finished);
        assert!(execution.stopped_at.is_some());
        assert!(execution.data.execution_time.is_some());

        let error = ExecutionError {
            name: "X".into(),
            message: "late".into(),
            stack: String::new(),
        };
        assert!(!execution.fail(error));
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.error.is_none());
    }

    #[test]
    fn captures_cause_chain() {
        let err = EngineError::NodeExecution {
            node_name: "Fetch".into(),
            source: anyhow::anyhow!("connection refused").context("HTTP request failed"),
        };
        let captured = ExecutionError::from_engine_error(&err);

        assert_eq!(captured.name, "NodeExecutionError");
        assert!(captured.message.contains("Fetch"));
        assert!(captured.stack.contains("connection refused"));
    }

    #[test]
    fn serializes_camel_case() {
        let execution = Execution::start("e1".into(), "wf", ExecutionMode::Trigger);
        let json = serde_json::to_value(&execution).unwrap();
        assert_eq!(json["workflowId"], "wf");
        assert_eq!(json["status"], "running");
        assert_eq!(json["mode"], "trigger");
        assert!(json["data"]["resultData"].as_array().unwrap().is_empty());
        assert!(json.get("error").is_none());
    }
}
