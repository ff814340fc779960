pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;

pub use openai::OpenAIClient;

#[async_trait]
pub trait LLMClient {
    /// Sends one system/user exchange and returns the assistant reply.
    /// An empty `system` prompt is not sent.
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String>;
}
