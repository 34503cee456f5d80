/// SQLite persistence layer for workflows and finished executions
///
/// Optional: the store runs fully in memory when no database URL is configured.
/// Records are stored as JSON next to a few indexed lookup columns.

use crate::workflow::{execution::Execution, types::Workflow};
use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::str::FromStr;

/// SQLite-backed storage manager
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and initialize the schema
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true);

        // Every in-memory connection is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", url))?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        tracing::info!("🗄️ Workflow storage ready: {}", url);
        Ok(storage)
    }

    /// Create tables and indexes. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 0,
                definition JSON NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                record JSON NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_executions_workflow
            ON executions(workflow_id, started_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update a workflow definition
    pub async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let definition_json = serde_json::to_string(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, active, definition, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(workflow.active)
        .bind(&definition_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_all_workflows(&self) -> Result<Vec<Workflow>> {
        let rows = sqlx::query("SELECT definition FROM workflows ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            let definition_json: String = row.try_get("definition")?;
            workflows.push(serde_json::from_str(&definition_json)?);
        }
        Ok(workflows)
    }

    /// Store a finished execution
    pub async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let record_json = serde_json::to_string(execution)?;
        let status = serde_json::to_value(execution.status)?
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        sqlx::query(
            r#"
            INSERT INTO executions (id, workflow_id, status, started_at, record)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                record = excluded.record
            "#,
        )
        .bind(&execution.id)
        .bind(&execution.workflow_id)
        .bind(status)
        .bind(execution.started_at.to_rfc3339())
        .bind(&record_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent executions, oldest first
    pub async fn load_recent_executions(&self, limit: usize) -> Result<Vec<Execution>> {
        let rows = sqlx::query("SELECT record FROM executions ORDER BY started_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            let record_json: String = row.try_get("record")?;
            executions.push(serde_json::from_str(&record_json)?);
        }
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{
        execution::{Execution, ExecutionMode, ExecutionStatus},
        types::WorkflowNode,
    };
    use serde_json::json;

    fn workflow(id: &str, active: bool) -> Workflow {
        Workflow {
            id: id.to_string(),
            name: format!("Workflow {}", id),
            nodes: vec![WorkflowNode::new("t", "Trigger", "manualTrigger", json!({}))],
            connections: Default::default(),
            active,
            settings: json!({}),
            tags: vec!["demo".to_string()],
        }
    }

    #[tokio::test]
    async fn workflows_round_trip_and_upsert() {
        let storage = WorkflowStorage::connect("sqlite::memory:").await.unwrap();
        storage.save_workflow(&workflow("wf-a", false)).await.unwrap();
        storage.save_workflow(&workflow("wf-a", true)).await.unwrap();
        storage.save_workflow(&workflow("wf-b", false)).await.unwrap();

        let loaded = storage.load_all_workflows().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "wf-a");
        assert!(loaded[0].active);
        assert_eq!(loaded[1].tags, vec!["demo".to_string()]);
    }

    #[tokio::test]
    async fn executions_load_most_recent() {
        let storage = WorkflowStorage::connect("sqlite::memory:").await.unwrap();
        for i in 0..3 {
            let mut execution = Execution::start(format!("e{}", i), "wf-a", ExecutionMode::Manual);
            execution.started_at = execution.started_at + chrono::Duration::seconds(i);
            execution.succeed();
            storage.save_execution(&execution).await.unwrap();
        }

        let recent = storage.load_recent_executions(2).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
        assert_eq!(recent[0].status, ExecutionStatus::Success);
    }
}
