/// Automation system facade
///
/// Owns one instance of every engine component and exposes the programmatic
/// API. Components are built explicitly and shared through `Arc`; there is no
/// process-wide instance. `start` spawns the three timer loops (trigger check,
/// queue drain, status broadcast) and `shutdown` stops them.

use crate::{
    backends::{OpenAiGenerator, TelegramSender},
    config::{Config, EngineConfig},
    connectors::InMemoryConnectorCatalog,
    error::{EngineError, EngineResult},
    nodes::{NodeTypeDefinition, NodeTypeRegistry},
    runtime::{
        register_builtin_handlers, ExecutionEngine, ExecutionQueue, MonitorEvent, MonitoringBus, NodeExecutor,
        NodeHandler, NodeServices, QueuedRun, Subscription, SystemStatus, TriggerScheduler,
    },
    workflow::{
        execution::{generate_execution_id, Execution, ExecutionMode},
        storage::WorkflowStorage,
        NewWorkflow, Workflow, WorkflowStore,
    },
};
use anyhow::Context;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

pub struct AutomationSystem {
    config: EngineConfig,
    registry: Arc<NodeTypeRegistry>,
    store: Arc<WorkflowStore>,
    executor: Arc<NodeExecutor>,
    engine: Arc<ExecutionEngine>,
    queue: Arc<ExecutionQueue>,
    scheduler: Arc<TriggerScheduler>,
    monitor: Arc<MonitoringBus>,
    status: StatusSource,
    loops: Mutex<Option<RunningLoops>>,
}

struct RunningLoops {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Everything a status snapshot reads; cloned into the broadcast loop
#[derive(Clone)]
struct StatusSource {
    registry: Arc<NodeTypeRegistry>,
    store: Arc<WorkflowStore>,
    queue: Arc<ExecutionQueue>,
    live: Arc<AtomicBool>,
    recent_executions: usize,
}

impl StatusSource {
    async fn snapshot(&self) -> SystemStatus {
        SystemStatus {
            is_live: self.live.load(Ordering::SeqCst),
            total_workflows: self.store.workflow_count(),
            active_workflows: self.store.active_workflow_count(),
            total_executions: self.store.execution_count().await,
            node_type_count: self.registry.len(),
            queue_depth: self.queue.depth().await,
            recent_executions: self.store.recent_executions(self.recent_executions).await,
        }
    }
}

impl std::fmt::Debug for AutomationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationSystem")
            .field("config", &self.config)
            .field("live", &self.is_live())
            .field("node_types", &self.registry.len())
            .field("workflows", &self.store.workflow_count())
            .finish()
    }
}

impl AutomationSystem {
    /// Wire a system around `store`, with built-in node types and handlers
    pub fn new(config: EngineConfig, store: WorkflowStore, services: NodeServices) -> Self {
        let registry = Arc::new(NodeTypeRegistry::with_builtins());
        let store = Arc::new(store);
        let monitor = Arc::new(MonitoringBus::new());

        let executor = Arc::new(NodeExecutor::new());
        register_builtin_handlers(&executor, services);

        let engine = Arc::new(ExecutionEngine::new(
            Arc::clone(&executor),
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&monitor),
        ));
        let queue = Arc::new(ExecutionQueue::new());
        let scheduler = Arc::new(TriggerScheduler::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            config.schedule_in_utc,
        ));
        let status = StatusSource {
            registry: Arc::clone(&registry),
            store: Arc::clone(&store),
            queue: Arc::clone(&queue),
            live: Arc::new(AtomicBool::new(false)),
            recent_executions: config.recent_executions,
        };

        Self {
            config,
            registry,
            store,
            executor,
            engine,
            queue,
            scheduler,
            monitor,
            status,
            loops: Mutex::new(None),
        }
    }

    /// Build the system described by `config`: persistence, network backends,
    /// credentials from the environment and the optional seed file
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let max_history = config.engine.max_execution_history;
        let store = match &config.database.url {
            Some(url) => {
                let storage = WorkflowStorage::connect(url).await?;
                let store = WorkflowStore::with_storage(storage, max_history);
                store.init_from_storage().await?;
                store
            }
            None => {
                tracing::info!("💾 No database configured; running in memory");
                WorkflowStore::new(max_history)
            }
        };

        let services = NodeServices {
            catalog: Arc::new(InMemoryConnectorCatalog::from_config(&config.credentials)),
            generator: Arc::new(OpenAiGenerator::new()),
            sender: Arc::new(TelegramSender::new()),
            http: reqwest::Client::new(),
        };

        let system = Self::new(config.engine.clone(), store, services);
        if let Some(path) = &config.engine.seed_file {
            let seeded = system.load_seed_file(path).await?;
            tracing::info!("🌱 Seeded {} workflow(s) from {}", seeded, path);
        }
        Ok(system)
    }

    /// Insert the workflows listed in a JSON file (array of workflows with ids)
    pub async fn load_seed_file(&self, path: &str) -> anyhow::Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path))?;
        let workflows: Vec<Workflow> =
            serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path))?;

        let count = workflows.len();
        for workflow in workflows {
            let id = workflow.id.clone();
            self.store
                .insert_workflow(workflow)
                .await
                .with_context(|| format!("Failed to seed workflow {}", id))?;
        }
        Ok(count)
    }

    pub fn register_node_type(&self, definition: NodeTypeDefinition) -> EngineResult<()> {
        self.registry.register_node_type(definition)
    }

    /// Attach behaviour to a (usually custom) node type
    pub fn register_handler(&self, node_type: &str, handler: Arc<dyn NodeHandler>) {
        self.executor.register_handler(node_type, handler);
    }

    pub fn get_node_types(&self) -> Vec<NodeTypeDefinition> {
        self.registry.get_node_types()
    }

    pub async fn create_workflow(&self, definition: NewWorkflow) -> EngineResult<Workflow> {
        for node in &definition.nodes {
            if self.registry.get(&node.node_type).is_none() {
                tracing::warn!(
                    "⚠️ Workflow '{}' uses unregistered node type '{}' (node '{}')",
                    definition.name,
                    node.node_type,
                    node.name
                );
            }
        }
        self.store.create_workflow(definition).await
    }

    pub fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.store.get_workflow(id)
    }

    pub fn get_all_workflows(&self) -> Vec<Workflow> {
        self.store.get_all_workflows()
    }

    /// Queue a manual run; the execution id is returned before the run starts
    pub async fn execute_workflow_manually(&self, workflow_id: &str) -> EngineResult<String> {
        if self.store.get_workflow(workflow_id).is_none() {
            return Err(EngineError::WorkflowNotFound(workflow_id.to_string()));
        }

        let execution_id = generate_execution_id(workflow_id);
        self.queue
            .enqueue(QueuedRun {
                workflow_id: workflow_id.to_string(),
                execution_id: execution_id.clone(),
                mode: ExecutionMode::Manual,
            })
            .await;
        Ok(execution_id)
    }

    /// Run everything queued right now instead of waiting for the next tick
    pub async fn process_queue(&self) -> usize {
        self.queue.drain(&self.engine).await
    }

    /// Evaluate schedule triggers right now instead of waiting for the next tick
    pub async fn check_triggers(&self) -> usize {
        self.scheduler.check_triggers().await
    }

    pub async fn get_execution(&self, id: &str) -> Option<Execution> {
        self.store.get_execution(id).await
    }

    pub async fn get_all_executions(&self) -> Vec<Execution> {
        self.store.get_all_executions().await
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        self.status.snapshot().await
    }

    /// Receive status snapshots and execution updates until the guard is dropped
    pub fn subscribe_to_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&MonitorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.monitor.subscribe(callback)
    }

    pub fn is_live(&self) -> bool {
        self.status.live.load(Ordering::SeqCst)
    }

    /// Spawn the trigger, queue and monitoring loops
    pub async fn start(&self) {
        let mut loops = self.loops.lock().await;
        if loops.is_some() {
            tracing::warn!("⚠️ Automation system already running");
            return;
        }

        let (shutdown, receiver) = watch::channel(false);
        let handles = vec![
            tokio::spawn(Arc::clone(&self.scheduler).run_loop(self.config.trigger_check_interval(), receiver.clone())),
            tokio::spawn(Arc::clone(&self.queue).run_loop(
                Arc::clone(&self.engine),
                self.config.queue_tick(),
                receiver.clone(),
            )),
            tokio::spawn(status_loop(
                self.status.clone(),
                Arc::clone(&self.monitor),
                self.config.monitoring_interval(),
                receiver,
            )),
        ];

        *loops = Some(RunningLoops { shutdown, handles });
        self.status.live.store(true, Ordering::SeqCst);
        tracing::info!("✅ Automation system started");
    }

    /// Stop the loops and wait for them; a run in progress finishes first
    pub async fn shutdown(&self) {
        let Some(running) = self.loops.lock().await.take() else {
            return;
        };

        tracing::info!("⏹️ Shutting down automation system");
        let _ = running.shutdown.send(true);
        for handle in running.handles {
            if let Err(e) = handle.await {
                tracing::error!("❌ Background loop ended abnormally: {}", e);
            }
        }
        self.status.live.store(false, Ordering::SeqCst);
        tracing::info!("✅ Automation system stopped");
    }
}

async fn status_loop(
    source: StatusSource,
    monitor: Arc<MonitoringBus>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::info!("📡 Status broadcast every {:?}", period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let status = source.snapshot().await;
                monitor.broadcast(&MonitorEvent::SystemStatus(status));
            }
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!("⏹️ Status broadcast stopped");
}
