use async_trait::async_trait;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Single request/response call; returns the raw text payload.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
    fn name(&self) -> &str;
}
