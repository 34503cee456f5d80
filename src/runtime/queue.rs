/// Execution queue
///
/// Single-lane FIFO between the callers that want a run (manual execution,
/// schedule triggers) and the execution engine. Each drain runs the queued
/// items one after another, awaiting every run before starting the next, so
/// runs never overlap.

use crate::{runtime::engine::ExecutionEngine, workflow::execution::ExecutionMode};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::{watch, Mutex};

/// A run waiting for the next drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRun {
    pub workflow_id: String,
    /// Assigned at enqueue time so callers can poll for the result
    pub execution_id: String,
    pub mode: ExecutionMode,
}

#[derive(Debug, Default)]
pub struct ExecutionQueue {
    items: Mutex<VecDeque<QueuedRun>>,
}

impl ExecutionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, run: QueuedRun) {
        let mut items = self.items.lock().await;
        tracing::info!(
            "📥 Queued workflow {} as {} ({:?}, depth {})",
            run.workflow_id,
            run.execution_id,
            run.mode,
            items.len() + 1
        );
        items.push_back(run);
    }

    pub async fn depth(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Run queued items sequentially until the queue is empty
    ///
    /// Returns the number of items taken off the queue. A vanished workflow is
    /// logged and skipped.
    pub async fn drain(&self, engine: &ExecutionEngine) -> usize {
        let mut processed = 0;

        loop {
            // Lock released before the run so enqueue never waits on execution
            let next = self.items.lock().await.pop_front();
            let Some(run) = next else {
                break;
            };
            processed += 1;

            if let Err(e) = engine.run(&run.workflow_id, run.execution_id.clone(), run.mode).await {
                tracing::error!("❌ Dropped queued execution {}: {}", run.execution_id, e);
            }
        }

        processed
    }

    /// Drain on every tick until shutdown is signalled
    pub async fn run_loop(self: Arc<Self>, engine: Arc<ExecutionEngine>, tick: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!("⏱️ Execution queue draining every {:?}", tick);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let processed = self.drain(&engine).await;
                    if processed > 0 {
                        tracing::debug!("📤 Queue tick processed {} run(s)", processed);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("⏹️ Execution queue loop stopped");
    }
}
