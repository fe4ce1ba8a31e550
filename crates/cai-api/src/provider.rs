//! OpenAI-compatible provider implementation.

use crate::client::ChatClient;
use cai_types::{ApiError, ChatProvider, ChatRequest, ChatResponse};
use std::future::Future;
use std::pin::Pin;

/// Chat provider for any endpoint speaking the OpenAI chat-completions
/// dialect (OpenRouter, vLLM, LiteLLM, ...).
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: ChatClient,
}

impl OpenAiCompatibleProvider {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

impl ChatProvider for OpenAiCompatibleProvider {
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ApiError>> + Send + 'a>> {
        Box::pin(self.client.complete(request))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
