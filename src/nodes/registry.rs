/// Node type registry
///
/// Append-only catalog of node type definitions. Reads are lock-free through
/// ArcSwap; each registration swaps in a new map so in-flight runs keep the
/// snapshot they started with.

use crate::{
    error::{EngineError, EngineResult},
    nodes::{builtin, types::NodeTypeDefinition},
};
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct NodeTypeRegistry {
    /// Key: node type name
    types: ArcSwap<HashMap<String, Arc<NodeTypeDefinition>>>,
}

impl NodeTypeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            types: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Registry seeded with the built-in node types
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for definition in builtin::definitions() {
            // Built-ins are statically valid.
            if let Err(e) = registry.register_node_type(definition) {
                tracing::error!("❌ Built-in node type rejected: {}", e);
            }
        }
        registry
    }

    /// Insert or overwrite a definition by name
    pub fn register_node_type(&self, definition: NodeTypeDefinition) -> EngineResult<()> {
        definition.validate().map_err(EngineError::InvalidNodeType)?;

        let name = definition.name.clone();
        let definition = Arc::new(definition);
        let previous = self.types.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(name.clone(), Arc::clone(&definition));
            next
        });

        if previous.contains_key(&name) {
            tracing::info!("🔁 Replaced node type: {}", name);
        } else {
            tracing::debug!("➕ Registered node type: {}", name);
        }
        Ok(())
    }

    /// Copy of every definition, sorted by name
    pub fn get_node_types(&self) -> Vec<NodeTypeDefinition> {
        let mut types: Vec<NodeTypeDefinition> = self
            .types
            .load()
            .values()
            .map(|def| (**def).clone())
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    pub fn get(&self, name: &str) -> Option<Arc<NodeTypeDefinition>> {
        self.types.load().get(name).cloned()
    }

    /// Whether `name` is a registered trigger-group type
    pub fn is_trigger(&self, name: &str) -> bool {
        self.get(name).map(|def| def.is_trigger()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.types.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::types::PortDefinition;

    fn definition(name: &str, description: &str) -> NodeTypeDefinition {
        NodeTypeDefinition {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: description.to_string(),
            version: 1,
            group: vec![],
            inputs: vec![PortDefinition::main()],
            outputs: vec![PortDefinition::main()],
            properties: vec![],
            credentials: vec![],
            webhook_url: None,
        }
    }

    #[test]
    fn registering_twice_keeps_latest() {
        let registry = NodeTypeRegistry::new();
        registry.register_node_type(definition("custom", "first")).unwrap();
        registry.register_node_type(definition("custom", "second")).unwrap();

        let types = registry.get_node_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].description, "second");
    }

    #[test]
    fn returned_list_is_a_copy() {
        let registry = NodeTypeRegistry::new();
        registry.register_node_type(definition("custom", "kept")).unwrap();

        let mut types = registry.get_node_types();
        types[0].description = "mutated".to_string();
        types.clear();

        assert_eq!(registry.get("custom").unwrap().description, "kept");
    }

    #[test]
    fn invalid_definition_is_rejected() {
        let registry = NodeTypeRegistry::new();
        let err = registry.register_node_type(definition("", "nameless")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidNodeType(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn builtins_include_triggers() {
        let registry = NodeTypeRegistry::with_builtins();
        assert!(registry.is_trigger(builtin::SCHEDULE_TRIGGER));
        assert!(registry.is_trigger(builtin::MANUAL_TRIGGER));
        assert!(!registry.is_trigger(builtin::SET));
        assert!(!registry.is_trigger("not-registered"));
    }
}
