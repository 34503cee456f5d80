/// Telegram Bot API message sender

use crate::{
    backends::{MessageReceipt, MessageSender, OutgoingMessage},
    connectors::Credentials,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point at a different Bot API host (self-hosted server, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl Default for TelegramSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, message: OutgoingMessage, credentials: &Credentials) -> Result<MessageReceipt> {
        let token = credentials.require("accessToken")?;
        if message.chat_id.trim().is_empty() {
            return Err(anyhow!("chat id must not be empty"));
        }

        tracing::debug!("💬 Sending Telegram message to chat {}", message.chat_id);

        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, token))
            .json(&json!({ "chat_id": message.chat_id, "text": message.text }))
            .send()
            .await
            // The request URL carries the bot token
            .map_err(reqwest::Error::without_url)
            .context("Telegram sendMessage request failed")?;

        let payload: Value = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read Telegram response")?;
        parse_receipt(&payload)
    }
}

fn parse_receipt(payload: &Value) -> Result<MessageReceipt> {
    if !payload["ok"].as_bool().unwrap_or(false) {
        let description = payload["description"].as_str().unwrap_or("unknown error");
        return Err(anyhow!("Telegram rejected message: {}", description));
    }

    let message_id = payload["result"]["message_id"]
        .as_i64()
        .ok_or_else(|| anyhow!("Telegram response has no message_id"))?;

    Ok(MessageReceipt {
        message_id: message_id.to_string(),
        sent_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok_and_error_payloads() {
        let receipt = parse_receipt(&json!({ "ok": true, "result": { "message_id": 99 } })).unwrap();
        assert_eq!(receipt.message_id, "99");

        let err = parse_receipt(&json!({ "ok": false, "description": "chat not found" })).unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn rejects_empty_chat_before_calling_out() {
        let sender = TelegramSender::new().with_api_base("http://127.0.0.1:9");
        let credentials = Credentials::new("telegram", "default").with_field("accessToken", "t");
        let message = OutgoingMessage {
            chat_id: " ".into(),
            text: "hello".into(),
        };
        let err = sender.send(message, &credentials).await.unwrap_err();
        assert!(err.to_string().contains("chat id"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_reveal_the_token() {
        let sender = TelegramSender::new().with_api_base("http://127.0.0.1:1");
        let credentials = Credentials::new("telegram", "default").with_field("accessToken", "SECRET-TOKEN-123");
        let message = OutgoingMessage {
            chat_id: "c1".into(),
            text: "hello".into(),
        };
        let err = sender.send(message, &credentials).await.unwrap_err();
        let rendered = format!("{:#} {:?}", err, err);
        assert!(rendered.contains("Telegram sendMessage request failed"));
        assert!(!rendered.contains("SECRET-TOKEN-123"));
    }
}
