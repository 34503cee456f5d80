/// Monitoring bus
///
/// Fan-out of system status snapshots and finished executions to in-process
/// subscribers. A subscriber that errors or panics is logged and skipped; the
/// remaining subscribers still receive the event.

use crate::{
    error::EngineError,
    workflow::execution::{Execution, ExecutionSummary},
};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

/// Snapshot returned by `get_system_status` and broadcast periodically
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub is_live: bool,
    pub total_workflows: usize,
    pub active_workflows: usize,
    pub total_executions: usize,
    pub node_type_count: usize,
    pub queue_depth: usize,
    pub recent_executions: Vec<ExecutionSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum MonitorEvent {
    SystemStatus(SystemStatus),
    ExecutionUpdate(Execution),
}

impl MonitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::SystemStatus(_) => "systemStatus",
            MonitorEvent::ExecutionUpdate(_) => "executionUpdate",
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&MonitorEvent) -> anyhow::Result<()> + Send + Sync>;

type SubscriberTable = BTreeMap<u64, Subscriber>;

#[derive(Default)]
pub struct MonitoringBus {
    /// Ordered by subscription id so delivery follows subscription order
    subscribers: Arc<ArcSwap<SubscriberTable>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for MonitoringBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl MonitoringBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; dropping the returned guard unsubscribes it
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&MonitorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let callback: Subscriber = Arc::new(callback);
        self.subscribers.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id, Arc::clone(&callback));
            next
        });
        tracing::debug!("📡 Monitoring subscriber {} added", id);

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    /// Deliver `event` to every subscriber, returning how many accepted it
    pub fn broadcast(&self, event: &MonitorEvent) -> usize {
        let subscribers = self.subscribers.load_full();
        let mut delivered = 0;

        for (&subscriber_id, callback) in subscribers.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
            let reason = match outcome {
                Ok(Ok(())) => {
                    delivered += 1;
                    continue;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => panic_message(panic.as_ref()),
            };

            let error = EngineError::BroadcastSubscriber { subscriber_id, reason };
            tracing::warn!("⚠️ {} event not delivered: {}", event.name(), error);
        }

        delivered
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Handle for a registered subscriber
///
/// Unsubscribes on drop. Holds only a weak reference to the bus, so an
/// outstanding guard never keeps the bus alive.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<ArcSwap<SubscriberTable>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {}

    fn remove(&self) {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return;
        };
        let id = self.id;
        subscribers.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(&id);
            next
        });
        tracing::debug!("📡 Monitoring subscriber {} removed", id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
