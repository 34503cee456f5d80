/// External call backends
///
/// Content generation and chat messaging are opaque async calls from the
/// engine's point of view. Node handlers resolve credentials through the
/// connector catalog and hand them to these traits; the network
/// implementations live in the submodules.

use crate::connectors::Credentials;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod openai;

pub mod telegram;

pub use openai::OpenAiGenerator;
pub use telegram::TelegramSender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: String,
    pub sent_at: DateTime<Utc>,
}

/// Text generation call (e.g. an LLM chat completion)
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest, credentials: &Credentials) -> Result<String>;
}

/// Chat send call
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: OutgoingMessage, credentials: &Credentials) -> Result<MessageReceipt>;
}
