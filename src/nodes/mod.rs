/// Node Type Layer
///
/// Schema catalog for workflow building blocks:
/// - Type definitions (ports, parameter schema, credentials)
/// - Built-in node types
/// - Append-only registry with lock-free reads

pub mod types;

pub mod builtin;

pub mod registry;

pub use registry::NodeTypeRegistry;
pub use types::{NodeProperty, NodeTypeDefinition, PortDefinition, PropertyType};
