/// Runtime Execution Layer
///
/// Everything that happens after a workflow is defined:
/// - Node dispatch through a handler table, plus the built-in handlers
/// - Pass-based dataflow execution of a single run
/// - Schedule trigger evaluation and the single-lane execution queue
/// - Monitoring fan-out to in-process subscribers

pub mod engine;

pub mod executor;

pub mod handlers;

pub mod monitor;

pub mod queue;

pub mod schedule;

pub mod scheduler;

pub use engine::ExecutionEngine;
pub use executor::{NodeExecutor, NodeHandler};
pub use handlers::{register_builtin_handlers, NodeServices};
pub use monitor::{MonitorEvent, MonitoringBus, Subscription, SystemStatus};
pub use queue::{ExecutionQueue, QueuedRun};
pub use schedule::ScheduleRule;
pub use scheduler::TriggerScheduler;
