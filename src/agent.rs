use async_trait::async_trait;

use crate::error::Result;

/// Rewrites a chat question before it is sent as a `solidity_answer`.
#[async_trait]
pub trait PromptAgent: Send + Sync {
    async fn chat_command(&self, prompt: &str) -> Result<String>;
}

/// Sends the question as typed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAgent;

#[async_trait]
impl PromptAgent for PassthroughAgent {
    async fn chat_command(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}
