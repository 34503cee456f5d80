/// Core workflow type definitions
///
/// A workflow is a named graph of node instances plus an adjacency map keyed by
/// source node id. These types round-trip through JSON for the HTTP API, the
/// seed file and SQLite persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Adjacency: source node id -> outgoing connections
pub type Connections = HashMap<String, Vec<Connection>>;

/// A complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier (e.g., "wf-daily-digest")
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Connections,
    /// Gates automatic trigger evaluation only; manual runs ignore it
    #[serde(default)]
    pub active: bool,
    #[serde(default = "empty_object")]
    pub settings: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A node instance inside a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Unique within the workflow
    pub id: String,
    pub name: String,
    /// Key into the node type registry
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_type_version")]
    pub type_version: u32,
    /// Layout hint for editors
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default = "empty_object")]
    pub parameters: Value,
    /// Credential set type -> credential name (e.g. "telegramApi" -> "ops-bot")
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, String>,
}

/// One outgoing edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Target node id
    pub node: String,
    #[serde(rename = "type", default = "main_connection")]
    pub connection_type: String,
    #[serde(default)]
    pub index: usize,
}

/// Payload for `create_workflow`; the store assigns the id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkflow {
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "empty_object")]
    pub settings: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

fn default_type_version() -> u32 {
    1
}

fn main_connection() -> String {
    "main".to_string()
}

impl Connection {
    pub fn main(target: &str) -> Self {
        Self {
            node: target.to_string(),
            connection_type: main_connection(),
            index: 0,
        }
    }
}

impl WorkflowNode {
    pub fn new(id: &str, name: &str, node_type: &str, parameters: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            node_type: node_type.to_string(),
            type_version: 1,
            position: [0.0, 0.0],
            parameters,
            credentials: HashMap::new(),
        }
    }

    /// String parameter lookup
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    /// Credential name configured for a credential type, "default" otherwise
    pub fn credential_name(&self, credential_type: &str) -> &str {
        self.credentials
            .get(credential_type)
            .map(String::as_str)
            .unwrap_or("default")
    }
}

impl NewWorkflow {
    pub fn into_workflow(self, id: String) -> Workflow {
        Workflow {
            id,
            name: self.name,
            nodes: self.nodes,
            connections: self.connections,
            active: self.active,
            settings: self.settings,
            tags: self.tags,
        }
    }
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Upstream node ids per target, in node declaration order
    pub fn incoming(&self) -> HashMap<&str, Vec<&str>> {
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        for source in &self.nodes {
            for connection in self.connections.get(&source.id).into_iter().flatten() {
                let upstream = incoming.entry(connection.node.as_str()).or_default();
                if !upstream.contains(&source.id.as_str()) {
                    upstream.push(source.id.as_str());
                }
            }
        }
        incoming
    }

    /// Structural checks: non-empty unique node ids, connections between known nodes
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("workflow name must not be empty".to_string());
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(format!("node '{}' has an empty id", node.name));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(format!("duplicate node id '{}'", node.id));
            }
        }

        for (source, targets) in &self.connections {
            if !ids.contains(source.as_str()) {
                return Err(format!("connection from unknown node '{}'", source));
            }
            if let Some(target) = targets.iter().find(|c| !ids.contains(c.node.as_str())) {
                return Err(format!(
                    "connection from '{}' targets unknown node '{}'",
                    source, target.node
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain() -> Workflow {
        let mut connections = Connections::new();
        connections.insert("a".into(), vec![Connection::main("b"), Connection::main("c")]);
        connections.insert("b".into(), vec![Connection::main("c")]);
        Workflow {
            id: "wf".into(),
            name: "Chain".into(),
            nodes: vec![
                WorkflowNode::new("a", "A", "manualTrigger", json!({})),
                WorkflowNode::new("b", "B", "set", json!({})),
                WorkflowNode::new("c", "C", "set", json!({})),
            ],
            connections,
            active: false,
            settings: json!({}),
            tags: vec![],
        }
    }

    #[test]
    fn incoming_follows_declaration_order() {
        let wf = chain();
        let incoming = wf.incoming();
        assert_eq!(incoming.get("c").unwrap(), &vec!["a", "b"]);
        assert_eq!(incoming.get("b").unwrap(), &vec!["a"]);
        assert!(incoming.get("a").is_none());
    }

    #[test]
    fn validate_catches_dangling_and_duplicate() {
        let mut wf = chain();
        assert!(wf.validate().is_ok());

        wf.connections.insert("c".into(), vec![Connection::main("ghost")]);
        assert!(wf.validate().unwrap_err().contains("ghost"));

        let mut wf = chain();
        wf.nodes.push(WorkflowNode::new("a", "Again", "set", json!({})));
        assert!(wf.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn parses_connection_map_shape() {
        let wf: Workflow = serde_json::from_value(json!({
            "id": "wf-1",
            "name": "Parsed",
            "nodes": [
                { "id": "t", "name": "Trigger", "type": "manualTrigger" },
                { "id": "s", "name": "Set", "type": "set", "parameters": { "values": { "x": 1 } } }
            ],
            "connections": { "t": [{ "node": "s", "type": "main", "index": 0 }] }
        }))
        .unwrap();

        assert!(!wf.active);
        assert_eq!(wf.nodes[0].type_version, 1);
        assert_eq!(wf.connections["t"][0], Connection::main("s"));
        assert_eq!(wf.nodes[1].credential_name("openAiApi"), "default");
    }
}
