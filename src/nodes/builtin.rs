/// Built-in node type catalog
///
/// Schemas for the node types every engine ships with. Their behaviours are the
/// handlers registered by `runtime::handlers::register_builtin_handlers`.

use crate::nodes::types::{NodeProperty, NodeTypeDefinition, PortDefinition, PropertyType, TRIGGER_GROUP};
use serde_json::json;

pub const MANUAL_TRIGGER: &str = "manualTrigger";
pub const SCHEDULE_TRIGGER: &str = "scheduleTrigger";
pub const SET: &str = "set";
pub const AI_GENERATE: &str = "aiGenerate";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const IF: &str = "if";
pub const HTTP_REQUEST: &str = "httpRequest";

/// Credential set names used by the built-in nodes
pub const OPENAI_CREDENTIAL: &str = "openAiApi";
pub const TELEGRAM_CREDENTIAL: &str = "telegramApi";

pub fn definitions() -> Vec<NodeTypeDefinition> {
    vec![
        manual_trigger(),
        schedule_trigger(),
        set(),
        ai_generate(),
        send_message(),
        conditional(),
        http_request(),
    ]
}

fn base(name: &str, display_name: &str, description: &str, group: &[&str]) -> NodeTypeDefinition {
    let is_trigger = group.contains(&TRIGGER_GROUP);
    NodeTypeDefinition {
        name: name.to_string(),
        display_name: display_name.to_string(),
        description: description.to_string(),
        version: 1,
        group: group.iter().map(|g| g.to_string()).collect(),
        inputs: if is_trigger { vec![] } else { vec![PortDefinition::main()] },
        outputs: vec![PortDefinition::main()],
        properties: vec![],
        credentials: vec![],
        webhook_url: None,
    }
}

fn manual_trigger() -> NodeTypeDefinition {
    base(MANUAL_TRIGGER, "Manual Trigger", "Starts the workflow when executed by hand", &[TRIGGER_GROUP])
}

fn schedule_trigger() -> NodeTypeDefinition {
    let mut def = base(
        SCHEDULE_TRIGGER,
        "Schedule Trigger",
        "Starts the workflow on a daily, weekly, monthly or cron schedule",
        &[TRIGGER_GROUP, "schedule"],
    );
    def.properties = vec![
        NodeProperty::new("rule", "Rule", PropertyType::Options)
            .with_options(&["daily", "weekly", "monthly", "cron"])
            .with_default(json!("daily"))
            .required(),
        NodeProperty::new("time", "Time of Day", PropertyType::String)
            .with_default(json!("09:00"))
            .shown_when("rule", &["daily", "weekly", "monthly"]),
        NodeProperty::new("weekday", "Weekday", PropertyType::Options)
            .with_options(&["sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday"])
            .with_default(json!("monday"))
            .shown_when("rule", &["weekly"]),
        NodeProperty::new("dayOfMonth", "Day of Month", PropertyType::Number)
            .with_default(json!(1))
            .shown_when("rule", &["monthly"]),
        NodeProperty::new("expression", "Cron Expression", PropertyType::String)
            .shown_when("rule", &["cron"]),
    ];
    def
}

fn set() -> NodeTypeDefinition {
    let mut def = base(SET, "Set Data", "Merges fixed or templated fields into every item", &["transform"]);
    def.properties = vec![
        NodeProperty::new("values", "Values", PropertyType::Collection)
            .with_default(json!({}))
            .required(),
        NodeProperty::new("keepOnlySet", "Keep Only Set Fields", PropertyType::Boolean)
            .with_default(json!(false)),
    ];
    def
}

fn ai_generate() -> NodeTypeDefinition {
    let mut def = base(AI_GENERATE, "AI Generate", "Generates text content from a prompt", &["transform", "ai"]);
    def.properties = vec![
        NodeProperty::new("prompt", "Prompt", PropertyType::String).required(),
        NodeProperty::new("model", "Model", PropertyType::String),
        NodeProperty::new("maxTokens", "Max Tokens", PropertyType::Number).with_default(json!(512)),
        NodeProperty::new("outputField", "Output Field", PropertyType::String).with_default(json!("content")),
    ];
    def.credentials = vec![OPENAI_CREDENTIAL.to_string()];
    def
}

fn send_message() -> NodeTypeDefinition {
    let mut def = base(SEND_MESSAGE, "Send Message", "Sends a chat message", &["output"]);
    def.properties = vec![
        NodeProperty::new("chatId", "Chat ID", PropertyType::String).required(),
        NodeProperty::new("message", "Message", PropertyType::String).required(),
    ];
    def.credentials = vec![TELEGRAM_CREDENTIAL.to_string()];
    def
}

fn conditional() -> NodeTypeDefinition {
    let mut def = base(IF, "If", "Flags each item with whether a condition holds", &["transform", "flow"]);
    def.properties = vec![
        NodeProperty::new("field", "Field", PropertyType::String).required(),
        NodeProperty::new("operation", "Operation", PropertyType::Options)
            .with_options(&["equals", "notEquals", "contains", "exists", "greaterThan", "lessThan", "isTrue"])
            .with_default(json!("equals"))
            .required(),
        NodeProperty::new("value", "Value", PropertyType::String)
            .shown_when("operation", &["equals", "notEquals", "contains", "greaterThan", "lessThan"]),
    ];
    def
}

fn http_request() -> NodeTypeDefinition {
    let mut def = base(HTTP_REQUEST, "HTTP Request", "Calls an HTTP endpoint", &["transform", "network"]);
    def.properties = vec![
        NodeProperty::new("url", "URL", PropertyType::String).required(),
        NodeProperty::new("method", "Method", PropertyType::Options)
            .with_options(&["GET", "POST", "PUT", "PATCH", "DELETE"])
            .with_default(json!("GET")),
        NodeProperty::new("headers", "Headers", PropertyType::Collection).with_default(json!({})),
        NodeProperty::new("body", "Body", PropertyType::Collection)
            .shown_when("method", &["POST", "PUT", "PATCH"]),
    ];
    def
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_is_valid_and_unique() {
        let defs = definitions();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), defs.len());

        for def in &defs {
            assert!(def.validate().is_ok(), "{} failed validation", def.name);
        }
    }

    #[test]
    fn triggers_have_no_inputs() {
        for def in definitions().iter().filter(|d| d.is_trigger()) {
            assert!(def.inputs.is_empty(), "{} should have no inputs", def.name);
        }
    }
}
