/// Connector and credential catalog
///
/// Node handlers look up integration metadata and resolve secrets here before
/// calling an external service. The engine only consumes the `ConnectorCatalog`
/// trait; `InMemoryConnectorCatalog` is the default implementation, filled from
/// configuration at start-up.

use crate::config::CredentialsConfig;
use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

pub const OPENAI_CONNECTOR: &str = "openAi";
pub const TELEGRAM_CONNECTOR: &str = "telegram";
pub const HTTP_CONNECTOR: &str = "http";

/// Metadata describing one integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Fields a credential set for this connector must provide
    pub credential_fields: Vec<CredentialField>,
    /// Node types backed by this connector
    pub node_types: Vec<String>,
    /// JSON schema of the node parameters the connector understands
    pub parameter_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialField {
    pub name: String,
    pub required: bool,
    pub secret: bool,
}

/// A resolved credential set
#[derive(Clone)]
pub struct Credentials {
    pub connector_id: String,
    pub name: String,
    fields: HashMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();
        f.debug_struct("Credentials")
            .field("connector_id", &self.connector_id)
            .field("name", &self.name)
            .field("fields", &keys)
            .finish()
    }
}

impl Credentials {
    pub fn new(connector_id: &str, name: &str) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            name: name.to_string(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Field lookup that fails with a readable error
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).filter(|v| !v.is_empty()).ok_or_else(|| {
            anyhow!(
                "credential '{}' for connector '{}' is missing field '{}'",
                self.name,
                self.connector_id,
                key
            )
        })
    }

    /// Check the set against a connector's required fields
    pub fn validate_for(&self, connector: &ConnectorInfo) -> Result<()> {
        for field in connector.credential_fields.iter().filter(|f| f.required) {
            self.require(&field.name)?;
        }
        Ok(())
    }
}

/// Lookup interface consumed by node handlers
pub trait ConnectorCatalog: Send + Sync {
    fn get_connector(&self, id: &str) -> Option<ConnectorInfo>;

    fn get_credentials(&self, connector_id: &str, credential_name: &str) -> Option<Credentials>;
}

/// Resolve and validate a credential set, failing when absent
pub fn resolve_credentials(
    catalog: &dyn ConnectorCatalog,
    connector_id: &str,
    credential_name: &str,
) -> Result<Credentials> {
    let connector = catalog
        .get_connector(connector_id)
        .ok_or_else(|| anyhow!("unknown connector '{}'", connector_id))?;
    let credentials = catalog
        .get_credentials(connector_id, credential_name)
        .ok_or_else(|| {
            anyhow!(
                "no credentials named '{}' for connector '{}'",
                credential_name,
                connector_id
            )
        })?;
    credentials.validate_for(&connector)?;
    Ok(credentials)
}

#[derive(Debug, Default, Clone)]
struct CatalogState {
    connectors: HashMap<String, ConnectorInfo>,
    /// Key: (connector id, credential name)
    credentials: HashMap<(String, String), Credentials>,
}

/// Catalog held in memory
#[derive(Debug)]
pub struct InMemoryConnectorCatalog {
    state: ArcSwap<CatalogState>,
}

impl InMemoryConnectorCatalog {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::new(Arc::new(CatalogState::default())),
        }
    }

    /// Catalog with the built-in connectors and no credentials
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        for connector in builtin_connectors() {
            catalog.add_connector(connector);
        }
        catalog
    }

    /// Built-in connectors plus "default" credential sets taken from config
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let catalog = Self::with_builtins();

        if let Some(api_key) = &config.openai_api_key {
            let mut credentials = Credentials::new(OPENAI_CONNECTOR, "default").with_field("apiKey", api_key.clone());
            if let Some(base_url) = &config.openai_base_url {
                credentials = credentials.with_field("baseUrl", base_url.clone());
            }
            if let Some(model) = &config.openai_model {
                credentials = credentials.with_field("model", model.clone());
            }
            catalog.add_credentials(credentials);
        }

        if let Some(token) = &config.telegram_bot_token {
            catalog.add_credentials(
                Credentials::new(TELEGRAM_CONNECTOR, "default").with_field("accessToken", token.clone()),
            );
        }

        catalog
    }

    pub fn add_connector(&self, connector: ConnectorInfo) {
        self.state.rcu(|current| {
            let mut next = (**current).clone();
            next.connectors.insert(connector.id.clone(), connector.clone());
            next
        });
    }

    pub fn add_credentials(&self, credentials: Credentials) {
        tracing::debug!(
            "🔐 Registered credentials '{}' for connector '{}'",
            credentials.name,
            credentials.connector_id
        );
        self.state.rcu(|current| {
            let mut next = (**current).clone();
            next.credentials.insert(
                (credentials.connector_id.clone(), credentials.name.clone()),
                credentials.clone(),
            );
            next
        });
    }
}

impl Default for InMemoryConnectorCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConnectorCatalog for InMemoryConnectorCatalog {
    fn get_connector(&self, id: &str) -> Option<ConnectorInfo> {
        self.state.load().connectors.get(id).cloned()
    }

    fn get_credentials(&self, connector_id: &str, credential_name: &str) -> Option<Credentials> {
        self.state
            .load()
            .credentials
            .get(&(connector_id.to_string(), credential_name.to_string()))
            .cloned()
    }
}

fn field(name: &str, required: bool, secret: bool) -> CredentialField {
    CredentialField {
        name: name.to_string(),
        required,
        secret,
    }
}

fn builtin_connectors() -> Vec<ConnectorInfo> {
    vec![
        ConnectorInfo {
            id: OPENAI_CONNECTOR.to_string(),
            name: "OpenAI-compatible".to_string(),
            description: "Chat completion API used for content generation".to_string(),
            credential_fields: vec![
                field("apiKey", true, true),
                field("baseUrl", false, false),
                field("model", false, false),
            ],
            node_types: vec![crate::nodes::builtin::AI_GENERATE.to_string()],
            parameter_schema: json!({
                "type": "object",
                "required": ["prompt"],
                "properties": {
                    "prompt": { "type": "string" },
                    "model": { "type": "string" },
                    "maxTokens": { "type": "integer" }
                }
            }),
        },
        ConnectorInfo {
            id: TELEGRAM_CONNECTOR.to_string(),
            name: "Telegram".to_string(),
            description: "Telegram Bot API messaging".to_string(),
            credential_fields: vec![field("accessToken", true, true)],
            node_types: vec![crate::nodes::builtin::SEND_MESSAGE.to_string()],
            parameter_schema: json!({
                "type": "object",
                "required": ["chatId", "message"],
                "properties": {
                    "chatId": { "type": "string" },
                    "message": { "type": "string" }
                }
            }),
        },
        ConnectorInfo {
            id: HTTP_CONNECTOR.to_string(),
            name: "HTTP".to_string(),
            description: "Generic HTTP endpoint".to_string(),
            credential_fields: vec![],
            node_types: vec![crate::nodes::builtin::HTTP_REQUEST.to_string()],
            parameter_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" },
                    "method": { "type": "string" },
                    "headers": { "type": "object" }
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_credentials_become_default_sets() {
        let catalog = InMemoryConnectorCatalog::from_config(&CredentialsConfig {
            openai_api_key: Some("sk-test".into()),
            openai_base_url: None,
            openai_model: Some("small".into()),
            telegram_bot_token: None,
        });

        let creds = resolve_credentials(&catalog, OPENAI_CONNECTOR, "default").unwrap();
        assert_eq!(creds.get("apiKey"), Some("sk-test"));
        assert_eq!(creds.get("model"), Some("small"));
        assert!(resolve_credentials(&catalog, TELEGRAM_CONNECTOR, "default").is_err());
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let catalog = InMemoryConnectorCatalog::with_builtins();
        catalog.add_credentials(Credentials::new(TELEGRAM_CONNECTOR, "bot"));

        let err = resolve_credentials(&catalog, TELEGRAM_CONNECTOR, "bot").unwrap_err();
        assert!(err.to_string().contains("accessToken"));
        assert!(resolve_credentials(&catalog, "nope", "bot").is_err());
    }

    #[test]
    fn debug_output_hides_secret_values() {
        let creds = Credentials::new(TELEGRAM_CONNECTOR, "bot").with_field("accessToken", "super-secret");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("accessToken"));
        assert!(!printed.contains("super-secret"));
    }
}
