/// Built-in node handlers
///
/// Behaviours for the node types in `nodes::builtin`:
/// - Triggers: pass items through, stamped with the trigger time
/// - Set: field merge with templated values
/// - AI generate / send message: one backend call per node per run
/// - If: per-item boolean flag
/// - HTTP request: one reqwest call, response merged into every item
///
/// Templates resolve against the first input item.

use crate::{
    backends::{ContentGenerator, GenerationRequest, MessageSender, OutgoingMessage},
    connectors::{self, ConnectorCatalog},
    nodes::builtin,
    runtime::executor::{NodeExecutor, NodeHandler},
    workflow::{template, types::WorkflowNode},
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::{collections::HashMap, sync::Arc};

/// Collaborators the built-in handlers call out to
#[derive(Clone)]
pub struct NodeServices {
    pub catalog: Arc<dyn ConnectorCatalog>,
    pub generator: Arc<dyn ContentGenerator>,
    pub sender: Arc<dyn MessageSender>,
    pub http: reqwest::Client,
}

/// Register every built-in behaviour on `executor`
pub fn register_builtin_handlers(executor: &NodeExecutor, services: NodeServices) {
    let trigger: Arc<dyn NodeHandler> = Arc::new(TriggerHandler);
    executor.register_handler(builtin::MANUAL_TRIGGER, Arc::clone(&trigger));
    executor.register_handler(builtin::SCHEDULE_TRIGGER, trigger);
    executor.register_handler(builtin::SET, Arc::new(SetHandler));
    executor.register_handler(
        builtin::AI_GENERATE,
        Arc::new(AiGenerateHandler {
            catalog: Arc::clone(&services.catalog),
            generator: services.generator,
        }),
    );
    executor.register_handler(
        builtin::SEND_MESSAGE,
        Arc::new(SendMessageHandler {
            catalog: services.catalog,
            sender: services.sender,
        }),
    );
    executor.register_handler(builtin::IF, Arc::new(ConditionalHandler));
    executor.register_handler(builtin::HTTP_REQUEST, Arc::new(HttpRequestHandler { client: services.http }));
}

/// Object view of an item; non-objects are wrapped under "value"
fn item_object(item: &Value) -> Map<String, Value> {
    match item {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// Merge `fields` into a copy of every item
fn merge_into_all(items: &[Value], fields: &Map<String, Value>) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let mut object = item_object(item);
            object.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(object)
        })
        .collect()
}

fn first(items: &[Value]) -> Value {
    items.first().cloned().unwrap_or_else(|| json!({}))
}

fn required_str<'a>(node: &'a WorkflowNode, key: &str) -> Result<&'a str> {
    node.param_str(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{} node '{}' missing '{}' parameter", node.node_type, node.name, key))
}

struct TriggerHandler;

#[async_trait]
impl NodeHandler for TriggerHandler {
    async fn execute(&self, _node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let mut fields = Map::new();
        fields.insert("triggeredAt".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        Ok(merge_into_all(&items, &fields))
    }
}

struct SetHandler;

#[async_trait]
impl NodeHandler for SetHandler {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let values = node
            .parameters
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("set node '{}' needs an object 'values' parameter", node.name))?;
        let keep_only_set = node
            .parameters
            .get("keepOnlySet")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let context = first(&items);
        let resolved: Map<String, Value> = values
            .iter()
            .map(|(key, value)| (key.clone(), template::resolve_deep(value, &context)))
            .collect();

        if keep_only_set {
            return Ok(items.iter().map(|_| Value::Object(resolved.clone())).collect());
        }
        Ok(merge_into_all(&items, &resolved))
    }
}

struct AiGenerateHandler {
    catalog: Arc<dyn ConnectorCatalog>,
    generator: Arc<dyn ContentGenerator>,
}

#[async_trait]
impl NodeHandler for AiGenerateHandler {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let prompt = template::resolve_value(required_str(node, "prompt")?, &first(&items));
        let output_field = node.param_str("outputField").unwrap_or("content");

        let credentials = connectors::resolve_credentials(
            self.catalog.as_ref(),
            connectors::OPENAI_CONNECTOR,
            node.credential_name(builtin::OPENAI_CREDENTIAL),
        )?;

        let request = GenerationRequest {
            prompt: prompt.clone(),
            model: node.param_str("model").map(str::to_string),
            max_tokens: node
                .parameters
                .get("maxTokens")
                .and_then(Value::as_u64)
                .map(|n| n.min(u32::MAX as u64) as u32),
        };

        tracing::debug!("🤖 Generating content for node '{}'", node.name);
        let content = self
            .generator
            .generate(request, &credentials)
            .await
            .context("content generation failed")?;

        let mut fields = Map::new();
        fields.insert(output_field.to_string(), Value::String(content));
        fields.insert("prompt".to_string(), Value::String(prompt));
        Ok(merge_into_all(&items, &fields))
    }
}

struct SendMessageHandler {
    catalog: Arc<dyn ConnectorCatalog>,
    sender: Arc<dyn MessageSender>,
}

#[async_trait]
impl NodeHandler for SendMessageHandler {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let context = first(&items);
        let chat_id = template::resolve_value(required_str(node, "chatId")?, &context);
        let text = template::resolve_value(required_str(node, "message")?, &context);

        let credentials = connectors::resolve_credentials(
            self.catalog.as_ref(),
            connectors::TELEGRAM_CONNECTOR,
            node.credential_name(builtin::TELEGRAM_CREDENTIAL),
        )?;

        tracing::debug!("💬 Sending message from node '{}' to chat {}", node.name, chat_id);
        let receipt = self
            .sender
            .send(
                OutgoingMessage {
                    chat_id: chat_id.clone(),
                    text: text.clone(),
                },
                &credentials,
            )
            .await
            .context("message send failed")?;

        let mut fields = Map::new();
        fields.insert("chatId".to_string(), Value::String(chat_id));
        fields.insert("message".to_string(), Value::String(text));
        fields.insert("messageId".to_string(), Value::String(receipt.message_id));
        fields.insert("sentAt".to_string(), json!(receipt.sent_at.to_rfc3339()));
        Ok(merge_into_all(&items, &fields))
    }
}

struct ConditionalHandler;

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let field = required_str(node, "field")?;
        let operation = node.param_str("operation").unwrap_or("equals");
        let expected = node
            .param_str("value")
            .map(|v| template::resolve_value(v, &first(&items)))
            .unwrap_or_default();

        items
            .iter()
            .map(|item| {
                let mut object = item_object(item);
                let met = evaluate_condition(object.get(field), operation, &expected)
                    .with_context(|| format!("if node '{}' could not evaluate '{}'", node.name, field))?;
                object.insert("conditionMet".to_string(), Value::Bool(met));
                Ok(Value::Object(object))
            })
            .collect()
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn evaluate_condition(actual: Option<&Value>, operation: &str, expected: &str) -> Result<bool> {
    let present = actual.filter(|v| !v.is_null());

    match operation {
        "exists" => Ok(present.is_some()),
        "isTrue" => Ok(match present {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }),
        "equals" | "notEquals" => {
            let equal = match present {
                Some(value) => match (as_number(value), expected.trim().parse::<f64>().ok()) {
                    (Some(a), Some(b)) => a == b,
                    _ => as_text(value) == expected,
                },
                None => false,
            };
            Ok(if operation == "equals" { equal } else { !equal })
        }
        "contains" => Ok(match present {
            Some(Value::Array(values)) => values.iter().any(|v| as_text(v) == expected),
            Some(value) => as_text(value).contains(expected),
            None => false,
        }),
        "greaterThan" | "lessThan" => {
            let Some(value) = present else {
                return Ok(false);
            };
            let actual = as_number(value).ok_or_else(|| anyhow!("value {} is not numeric", value))?;
            let expected: f64 = expected
                .trim()
                .parse()
                .map_err(|_| anyhow!("comparison value '{}' is not numeric", expected))?;
            Ok(if operation == "greaterThan" { actual > expected } else { actual < expected })
        }
        other => bail!("unsupported operation '{}'", other),
    }
}

struct HttpRequestHandler {
    client: reqwest::Client,
}

#[async_trait]
impl NodeHandler for HttpRequestHandler {
    async fn execute(&self, node: &WorkflowNode, items: Vec<Value>) -> Result<Vec<Value>> {
        let context = first(&items);
        let url = template::resolve_value(required_str(node, "url")?, &context);
        let method = node.param_str("method").unwrap_or("GET").to_uppercase();

        let mut request_builder = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            "PATCH" => self.client.patch(&url),
            _ => bail!("Unsupported HTTP method: {}", method),
        };

        if let Some(headers) = node.parameters.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(header_value) = value.as_str() {
                    request_builder = request_builder.header(key, template::resolve_value(header_value, &context));
                }
            }
        }

        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            if let Some(body) = node.parameters.get("body").filter(|b| !b.is_null()) {
                let body = template::resolve_deep(body, &context);
                request_builder = match body {
                    Value::String(text) => request_builder.header("Content-Type", "text/plain").body(text),
                    other => request_builder.json(&other),
                };
            }
        }

        tracing::debug!("🌍 HTTP Request: {} {}", method, url);
        let response = request_builder.send().await.context("HTTP request failed")?;

        let status = response.status();
        let headers_map: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let response_text = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            bail!("HTTP {} {} returned status {}", method, url, status);
        }

        let body = serde_json::from_str::<Value>(&response_text).unwrap_or(Value::String(response_text));
        tracing::info!("✅ HTTP request completed: {} {} (status: {})", method, url, status);

        let mut fields = Map::new();
        fields.insert("statusCode".to_string(), json!(status.as_u16()));
        fields.insert("headers".to_string(), json!(headers_map));
        fields.insert("body".to_string(), body);
        Ok(merge_into_all(&items, &fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::MessageReceipt,
        connectors::{Credentials, InMemoryConnectorCatalog},
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, message: OutgoingMessage, _credentials: &Credentials) -> Result<MessageReceipt> {
            self.sent.lock().unwrap().push(message);
            Ok(MessageReceipt {
                message_id: "m-1".into(),
                sent_at: chrono::Utc::now(),
            })
        }
    }

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl ContentGenerator for FixedGenerator {
        async fn generate(&self, request: GenerationRequest, credentials: &Credentials) -> Result<String> {
            assert_eq!(credentials.get("apiKey"), Some("sk"));
            Ok(format!("{} <{}>", self.0, request.prompt))
        }
    }

    fn catalog() -> Arc<InMemoryConnectorCatalog> {
        let catalog = InMemoryConnectorCatalog::with_builtins();
        catalog.add_credentials(Credentials::new(connectors::OPENAI_CONNECTOR, "default").with_field("apiKey", "sk"));
        catalog.add_credentials(
            Credentials::new(connectors::TELEGRAM_CONNECTOR, "default").with_field("accessToken", "tok"),
        );
        Arc::new(catalog)
    }

    fn executor_with(sender: Arc<RecordingSender>) -> NodeExecutor {
        let executor = NodeExecutor::new();
        register_builtin_handlers(
            &executor,
            NodeServices {
                catalog: catalog(),
                generator: Arc::new(FixedGenerator("draft")),
                sender,
                http: reqwest::Client::new(),
            },
        );
        executor
    }

    #[tokio::test]
    async fn set_merges_and_resolves_against_first_item() {
        let executor = executor_with(Arc::default());
        let node = WorkflowNode::new(
            "s",
            "Set",
            builtin::SET,
            json!({ "values": { "topic": "X", "greeting": "hi {{ $json.name }}" } }),
        );

        let out = executor
            .execute(&node, vec![json!({ "name": "Ada" }), json!({ "name": "Bob" })])
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "name": "Ada", "topic": "X", "greeting": "hi Ada" }));
        assert_eq!(out[1]["greeting"], "hi Ada");

        let only = WorkflowNode::new("s2", "Only", builtin::SET, json!({ "values": { "a": 1 }, "keepOnlySet": true }));
        assert_eq!(executor.execute(&only, vec![json!({ "b": 2 })]).await.unwrap(), vec![json!({ "a": 1 })]);
    }

    #[tokio::test]
    async fn send_message_resolves_and_calls_once() {
        let sender = Arc::new(RecordingSender::default());
        let executor = executor_with(Arc::clone(&sender));
        let node = WorkflowNode::new(
            "m",
            "Notify",
            builtin::SEND_MESSAGE,
            json!({ "chatId": "c1", "message": "{{ $json.topic }}" }),
        );

        let out = executor
            .execute(&node, vec![json!({ "topic": "X" }), json!({ "topic": "Y" })])
            .await
            .unwrap();

        assert_eq!(out[0]["message"], "X");
        assert_eq!(out[0]["messageId"], "m-1");
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "c1");
        assert_eq!(sent[0].text, "X");
    }

    #[tokio::test]
    async fn send_message_without_credentials_fails() {
        let executor = executor_with(Arc::default());
        let mut node = WorkflowNode::new("m", "Notify", builtin::SEND_MESSAGE, json!({ "chatId": "c1", "message": "hi" }));
        node.credentials.insert(builtin::TELEGRAM_CREDENTIAL.into(), "missing".into());

        let err = executor.execute(&node, vec![]).await.unwrap_err();
        assert!(format!("{:#}", anyhow::Error::from(err)).contains("missing"));
    }

    #[tokio::test]
    async fn ai_generate_writes_output_field() {
        let executor = executor_with(Arc::default());
        let node = WorkflowNode::new(
            "ai",
            "Write",
            builtin::AI_GENERATE,
            json!({ "prompt": "About {{ $json.topic }}", "outputField": "post" }),
        );

        let out = executor.execute(&node, vec![json!({ "topic": "Rust" })]).await.unwrap();
        assert_eq!(out[0]["post"], "draft <About Rust>");
        assert_eq!(out[0]["prompt"], "About Rust");
    }

    #[tokio::test]
    async fn conditional_flags_each_item() {
        let executor = executor_with(Arc::default());
        let node = WorkflowNode::new(
            "if",
            "Big?",
            builtin::IF,
            json!({ "field": "score", "operation": "greaterThan", "value": "50" }),
        );

        let out = executor
            .execute(&node, vec![json!({ "score": 80 }), json!({ "score": "20" }), json!({})])
            .await
            .unwrap();
        let flags: Vec<bool> = out.iter().map(|i| i["conditionMet"].as_bool().unwrap()).collect();
        assert_eq!(flags, vec![true, false, false]);

        let bad = WorkflowNode::new("if2", "Bad", builtin::IF, json!({ "field": "score", "operation": "matches" }));
        assert!(executor.execute(&bad, vec![json!({ "score": 1 })]).await.is_err());
    }

    #[test]
    fn condition_operations() {
        assert!(evaluate_condition(Some(&json!("X")), "equals", "X").unwrap());
        assert!(evaluate_condition(Some(&json!(3)), "equals", "3.0").unwrap());
        assert!(evaluate_condition(Some(&json!("a")), "notEquals", "b").unwrap());
        assert!(evaluate_condition(Some(&json!(["a", "b"])), "contains", "b").unwrap());
        assert!(evaluate_condition(Some(&json!("hello")), "contains", "ell").unwrap());
        assert!(!evaluate_condition(Some(&Value::Null), "exists", "").unwrap());
        assert!(evaluate_condition(Some(&json!("TRUE")), "isTrue", "").unwrap());
        assert!(evaluate_condition(Some(&json!("abc")), "lessThan", "3").is_err());
    }

    #[tokio::test]
    async fn http_request_validates_before_sending() {
        let executor = executor_with(Arc::default());
        let no_url = WorkflowNode::new("h", "Fetch", builtin::HTTP_REQUEST, json!({}));
        assert!(executor.execute(&no_url, vec![]).await.is_err());

        let bad_method = WorkflowNode::new(
            "h2",
            "Fetch",
            builtin::HTTP_REQUEST,
            json!({ "url": "http://localhost", "method": "TRACE" }),
        );
        let err = executor.execute(&bad_method, vec![]).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported HTTP method"));
    }

    #[tokio::test]
    async fn triggers_stamp_items() {
        let executor = executor_with(Arc::default());
        let node = WorkflowNode::new("t", "Every morning", builtin::SCHEDULE_TRIGGER, json!({ "rule": "daily" }));
        let out = executor.execute(&node, vec![json!({})]).await.unwrap();
        assert!(out[0]["triggeredAt"].is_string());
    }
}
