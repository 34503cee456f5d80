/// Node type schema definitions
///
/// A node type is an immutable description of a kind of workflow step: its
/// ports, its parameter schema and the credential sets it needs. Behaviour lives
/// in the runtime's node handlers; this module is schema only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Group tag marking node types that can start a run without upstream data
pub const TRIGGER_GROUP: &str = "trigger";

/// Immutable schema for one kind of workflow node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDefinition {
    /// Unique registry key (e.g. "scheduleTrigger")
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Tags such as "trigger", "transform", "output"
    #[serde(default)]
    pub group: Vec<String>,
    /// Ordered input ports
    pub inputs: Vec<PortDefinition>,
    /// Ordered output ports
    pub outputs: Vec<PortDefinition>,
    #[serde(default)]
    pub properties: Vec<NodeProperty>,
    /// Names of the credential sets this node needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

fn default_version() -> u32 {
    1
}

/// A labelled input or output port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub label: String,
}

impl PortDefinition {
    pub fn main() -> Self {
        Self {
            label: "main".to_string(),
        }
    }
}

/// Supported parameter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Options,
    Collection,
}

/// One entry of a node type's parameter schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for `options` properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Conditional visibility: shown only when every listed property holds one
    /// of the listed values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default)]
    pub show: HashMap<String, Vec<Value>>,
}

impl NodeTypeDefinition {
    /// Whether this node type belongs to the trigger group
    pub fn is_trigger(&self) -> bool {
        self.group.iter().any(|g| g == TRIGGER_GROUP)
    }

    /// Structural validation performed at registration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("node type is missing a name".to_string());
        }
        if self.version == 0 {
            return Err(format!("node type '{}' must have version >= 1", self.name));
        }

        let mut seen = std::collections::HashSet::new();
        for property in &self.properties {
            if property.name.trim().is_empty() {
                return Err(format!("node type '{}' has a property without a name", self.name));
            }
            if !seen.insert(property.name.as_str()) {
                return Err(format!(
                    "node type '{}' declares property '{}' twice",
                    self.name, property.name
                ));
            }
            if property.property_type == PropertyType::Options && property.options.is_empty() {
                return Err(format!(
                    "options property '{}' of '{}' lists no options",
                    property.name, self.name
                ));
            }
        }

        for property in &self.properties {
            if let Some(display) = &property.display_options {
                if let Some(missing) = display.show.keys().find(|k| !seen.contains(k.as_str())) {
                    return Err(format!(
                        "property '{}' of '{}' depends on unknown property '{}'",
                        property.name, self.name, missing
                    ));
                }
            }
        }

        Ok(())
    }
}

impl NodeProperty {
    pub fn new(name: &str, display_name: &str, property_type: PropertyType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            property_type,
            default: Value::Null,
            required: false,
            options: Vec::new(),
            display_options: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Show this property only when `property` holds one of `values`
    pub fn shown_when(mut self, property: &str, values: &[&str]) -> Self {
        let display = self.display_options.get_or_insert_with(DisplayOptions::default);
        display.show.insert(
            property.to_string(),
            values.iter().map(|v| Value::String(v.to_string())).collect(),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(name: &str) -> NodeTypeDefinition {
        NodeTypeDefinition {
            name: name.to_string(),
            display_name: "Test".to_string(),
            description: String::new(),
            version: 1,
            group: vec!["transform".to_string()],
            inputs: vec![PortDefinition::main()],
            outputs: vec![PortDefinition::main()],
            properties: vec![],
            credentials: vec![],
            webhook_url: None,
        }
    }

    #[test]
    fn rejects_blank_name() {
        assert!(definition("  ").validate().is_err());
        assert!(definition("ok").validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_and_dangling_properties() {
        let mut def = definition("dup");
        def.properties = vec![
            NodeProperty::new("a", "A", PropertyType::String),
            NodeProperty::new("a", "A again", PropertyType::Number),
        ];
        assert!(def.validate().is_err());

        let mut def = definition("dangling");
        def.properties =
            vec![NodeProperty::new("b", "B", PropertyType::String).shown_when("missing", &["x"])];
        assert!(def.validate().unwrap_err().contains("missing"));
    }

    #[test]
    fn deserialization_requires_ports() {
        let without_ports = json!({ "name": "x", "displayName": "X" });
        assert!(serde_json::from_value::<NodeTypeDefinition>(without_ports).is_err());

        let with_ports = json!({
            "name": "x",
            "displayName": "X",
            "group": ["trigger"],
            "inputs": [],
            "outputs": [{ "label": "main" }]
        });
        let def: NodeTypeDefinition = serde_json::from_value(with_ports).unwrap();
        assert!(def.is_trigger());
        assert_eq!(def.version, 1);
    }
}
