/// Nodeweave: node-based workflow automation engine
///
/// Workflows are graphs of typed nodes executed as a dataflow. Runs are started
/// by hand or by schedule triggers, serialized through a single queue, and
/// reported to monitoring subscribers as they finish.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by every layer
pub mod error;

// Node type schemas and the registry
pub mod nodes;

// Workflow definitions, execution records, templates and storage
pub mod workflow;

// Credential and connector metadata lookup
pub mod connectors;

// External calls: content generation and chat messaging
pub mod backends;

// Execution engine, node handlers, scheduler, queue and monitoring
pub mod runtime;

// Programmatic facade wiring all components together
pub mod system;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use error::{EngineError, EngineResult};
pub use nodes::{NodeTypeDefinition, NodeTypeRegistry};
pub use runtime::{MonitorEvent, NodeHandler, NodeServices, Subscription, SystemStatus};
pub use server::start_server;
pub use system::AutomationSystem;
pub use workflow::{Execution, ExecutionMode, ExecutionStatus, NewWorkflow, Workflow, WorkflowNode};
