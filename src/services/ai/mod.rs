pub mod groq;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Narrow seam to the external completion service: one assembled prompt in,
/// one plain string out. Any provider-specific response shape stays inside
/// the adapter.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}
