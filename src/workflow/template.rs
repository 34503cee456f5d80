/// Parameter template resolution
///
/// Substitutes `{{ $json.key }}` placeholders with values from an input item.
/// Flat keys only; unknown keys and malformed placeholders are left verbatim.

use serde_json::{Map, Value};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const PREFIX: &str = "$json.";

/// Replace every `{{ $json.<key> }}` in `template` with `data[key]`
pub fn resolve(template: &str, data: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        match lookup(after_open[..end].trim(), data) {
            Some(value) => {
                out.push_str(&stringify(value));
                rest = &after_open[end + CLOSE.len()..];
            }
            // Not a placeholder we can fill: keep the braces, rescan after them
            None => {
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve against an arbitrary JSON value; non-objects resolve nothing
pub fn resolve_value(template: &str, item: &Value) -> String {
    match item.as_object() {
        Some(data) => resolve(template, data),
        None => resolve(template, &Map::new()),
    }
}

/// Resolve every string inside a JSON structure, leaving other values alone
pub fn resolve_deep(value: &Value, item: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_value(s, item)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_deep(v, item)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_deep(v, item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn lookup<'a>(expression: &str, data: &'a Map<String, Value>) -> Option<&'a Value> {
    let key = expression.strip_prefix(PREFIX)?.trim();
    if key.is_empty() {
        return None;
    }
    data.get(key)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
