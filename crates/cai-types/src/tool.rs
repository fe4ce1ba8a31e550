//! Tool execution seam between the conversation loop and the tool provider.

use crate::Message;
use std::future::Future;
use std::pin::Pin;

/// Executes tool calls on behalf of the conversation loop.
///
/// Implementations never fail: a broken call yields `None`, which the loop
/// hands back to the model as an empty tool result.
pub trait ToolBackend: Send + Sync {
    /// Run `tool_name` with `arguments` and return its text output.
    fn invoke<'a>(
        &'a self,
        tool_name: &'a str,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

/// The outcome of one tool call, keyed by the request id it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub text: Option<String>,
}

impl From<ToolCallResult> for Message {
    fn from(result: ToolCallResult) -> Self {
        Message::tool_result(result.tool_call_id, result.text)
    }
}
