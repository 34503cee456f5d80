/// Schedule trigger evaluation
///
/// On every tick the scheduler walks the active workflows, evaluates each
/// `scheduleTrigger` node against the current minute and enqueues matching
/// workflows. A trigger fires at most once per matching minute no matter how
/// often the check runs. A malformed trigger is logged and only affects its
/// own workflow.

use crate::{
    error::{EngineError, EngineResult},
    nodes::builtin,
    runtime::{
        queue::{ExecutionQueue, QueuedRun},
        schedule::{truncate_to_minute, ScheduleRule},
    },
    workflow::{
        execution::{generate_execution_id, ExecutionMode},
        store::WorkflowStore,
        types::Workflow,
    },
};
use chrono::{Local, NaiveDateTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{watch, Mutex};

#[derive(Debug)]
pub struct TriggerScheduler {
    store: Arc<WorkflowStore>,
    queue: Arc<ExecutionQueue>,
    schedule_in_utc: bool,
    /// Key: (workflow id, node id) -> minute the trigger last fired in
    last_fired: Mutex<HashMap<(String, String), NaiveDateTime>>,
}

impl TriggerScheduler {
    pub fn new(store: Arc<WorkflowStore>, queue: Arc<ExecutionQueue>, schedule_in_utc: bool) -> Self {
        Self {
            store,
            queue,
            schedule_in_utc,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    fn wall_clock(&self) -> NaiveDateTime {
        if self.schedule_in_utc {
            Utc::now().naive_utc()
        } else {
            Local::now().naive_local()
        }
    }

    /// Evaluate all active workflows against the current time
    pub async fn check_triggers(&self) -> usize {
        self.check_triggers_at(self.wall_clock()).await
    }

    /// Evaluate all active workflows against `now`; returns how many were enqueued
    pub async fn check_triggers_at(&self, now: NaiveDateTime) -> usize {
        let minute = truncate_to_minute(now);
        let mut last_fired = self.last_fired.lock().await;
        last_fired.retain(|_, fired| *fired == minute);

        let mut enqueued = 0;
        for workflow in self.store.active_workflows() {
            let due = match due_triggers(&workflow, now) {
                Ok(due) => due,
                Err(e) => {
                    tracing::error!("❌ Skipping workflow {} this tick: {}", workflow.id, e);
                    continue;
                }
            };

            let fresh: Vec<String> = due
                .into_iter()
                .filter(|node_id| last_fired.get(&(workflow.id.clone(), node_id.clone())) != Some(&minute))
                .collect();
            if fresh.is_empty() {
                continue;
            }

            for node_id in &fresh {
                last_fired.insert((workflow.id.clone(), node_id.clone()), minute);
            }

            tracing::info!("⏰ Schedule trigger {:?} fired for workflow {}", fresh, workflow.id);
            self.queue
                .enqueue(QueuedRun {
                    workflow_id: workflow.id.clone(),
                    execution_id: generate_execution_id(&workflow.id),
                    mode: ExecutionMode::Trigger,
                })
                .await;
            enqueued += 1;
        }

        enqueued
    }

    /// Check on every tick until shutdown is signalled
    pub async fn run_loop(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("⏰ Trigger scheduler checking every {:?}", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let enqueued = self.check_triggers().await;
                    tracing::debug!("⏰ Trigger check enqueued {} workflow(s)", enqueued);
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("⏹️ Trigger scheduler stopped");
    }
}

/// Ids of schedule trigger nodes in `workflow` that match `now`
fn due_triggers(workflow: &Workflow, now: NaiveDateTime) -> EngineResult<Vec<String>> {
    let mut due = Vec::new();

    for node in workflow
        .nodes
        .iter()
        .filter(|node| node.node_type == builtin::SCHEDULE_TRIGGER)
    {
        let rule = ScheduleRule::from_parameters(&node.parameters).map_err(|e| EngineError::TriggerEvaluation {
            workflow_id: workflow.id.clone(),
            node_id: node.id.clone(),
            reason: format!("{:#}", e),
        })?;
        if rule.matches(now) {
            due.push(node.id.clone());
        }
    }

    Ok(due)
}
