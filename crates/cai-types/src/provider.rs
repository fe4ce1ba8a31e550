//! Provider trait for chat-completions endpoints.

use crate::{ApiError, ChatRequest, ChatResponse};
use std::future::Future;
use std::pin::Pin;

/// A chat-completions endpoint.
///
/// Dyn-compatible so the conversation loop works with `Arc<dyn ChatProvider>`.
pub trait ChatProvider: Send + Sync {
    /// Send one request and return the model's single choice.
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ApiError>> + Send + 'a>>;

    /// Provider name for logging (e.g., "openai-compatible").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn provider_is_dyn_compatible() {
        fn _accept(_p: &dyn ChatProvider) {}
    }

    #[test]
    fn arc_provider_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn ChatProvider>>();
    }
}
