/// OpenAI-compatible chat completion backend

use crate::{
    backends::{ContentGenerator, GenerationRequest},
    connectors::Credentials,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Default)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate(&self, request: GenerationRequest, credentials: &Credentials) -> Result<String> {
        let api_key = credentials.require("apiKey")?;
        let base_url = credentials.get("baseUrl").unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let model = request
            .model
            .as_deref()
            .or_else(|| credentials.get("model"))
            .unwrap_or(DEFAULT_MODEL);

        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        tracing::debug!("🤖 Chat completion request: model {} via {}", model, base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Content generation request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read content generation response")?;

        if !status.is_success() {
            let message = payload["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(anyhow!("Content generation returned {}: {}", status, message));
        }

        extract_content(&payload)
    }
}

fn extract_content(payload: &Value) -> Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Content generation response has no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice() {
        let payload = json!({ "choices": [{ "message": { "role": "assistant", "content": " Hello \n" } }] });
        assert_eq!(extract_content(&payload).unwrap(), "Hello");
        assert!(extract_content(&json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn refuses_without_api_key() {
        let generator = OpenAiGenerator::new();
        let request = GenerationRequest {
            prompt: "hi".into(),
            model: None,
            max_tokens: None,
        };
        let err = generator
            .generate(request, &Credentials::new("openAi", "default"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("apiKey"));
    }

    #[tokio::test]
    async fn transport_errors_omit_the_endpoint() {
        let generator = OpenAiGenerator::new();
        let credentials = Credentials::new("openAi", "default")
            .with_field("apiKey", "sk-secret")
            .with_field("baseUrl", "http://127.0.0.1:1/v1?key=sk-secret");
        let request = GenerationRequest {
            prompt: "hi".into(),
            model: None,
            max_tokens: None,
        };
        let err = generator.generate(request, &credentials).await.unwrap_err();
        let rendered = format!("{:#} {:?}", err, err);
        assert!(rendered.contains("Content generation request failed"));
        assert!(!rendered.contains("sk-secret"));
    }
}
