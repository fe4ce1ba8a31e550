//! Tool invocation, one provider process per call.

use crate::config::ProviderConfig;
use crate::error::McpError;
use crate::session::{ClientInfo, Exchange, RpcSession};
use cai_types::ToolBackend;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

#[derive(Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// What one `tools/call` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallOutput {
    /// Text of the first textual content item, if there is one.
    pub text: Option<String>,
    /// The provider flagged the call as failed.
    pub is_error: bool,
}

impl From<CallToolResult> for ToolCallOutput {
    fn from(result: CallToolResult) -> Self {
        let text = result
            .content
            .into_iter()
            .filter(|item| matches!(item.kind.as_deref(), None | Some("text")))
            .find_map(|item| item.text);
        Self {
            text,
            is_error: result.is_error,
        }
    }
}

/// Runs tool calls, each in a brand-new provider process, so a crashing or
/// hanging tool cannot affect later calls.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    config: ProviderConfig,
    client: ClientInfo,
}

impl ToolInvoker {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: ClientInfo::default(),
        }
    }

    /// Run one call in a fresh session and return what the provider sent back.
    pub async fn try_invoke(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, McpError> {
        let exchange = Exchange::CallTool {
            name: tool_name.to_string(),
            arguments,
        };
        let result = RpcSession::run(&self.config, self.client.clone(), exchange).await?;
        let parsed: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;
        Ok(parsed.into())
    }

    /// Run one call; any failure is logged and yields `None`.
    pub async fn invoke(&self, tool_name: &str, arguments: serde_json::Value) -> Option<String> {
        tracing::info!("Calling tool '{tool_name}' ({arguments})");
        match self.try_invoke(tool_name, arguments).await {
            Ok(output) => {
                if output.is_error {
                    tracing::warn!("Tool '{tool_name}' reported an error: {:?}", output.text);
                } else {
                    tracing::debug!("Tool '{tool_name}' returned: {:?}", output.text);
                }
                output.text
            }
            Err(e) => {
                tracing::warn!("Tool '{tool_name}' invocation failed: {e}");
                None
            }
        }
    }
}

impl ToolBackend for ToolInvoker {
    fn invoke<'a>(
        &'a self,
        tool_name: &'a str,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(ToolInvoker::invoke(self, tool_name, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(json: &str) -> ToolCallOutput {
        serde_json::from_str::<CallToolResult>(json).unwrap().into()
    }

    #[test]
    fn first_text_item_wins() {
        let out = output(
            r#"{"content": [{"type": "text", "text": "5"}, {"type": "text", "text": "6"}]}"#,
        );
        assert_eq!(out.text.as_deref(), Some("5"));
        assert!(!out.is_error);
    }

    #[test]
    fn untyped_text_item_is_accepted() {
        assert_eq!(output(r#"{"content": [{"text": "0"}]}"#).text.as_deref(), Some("0"));
    }

    #[test]
    fn non_text_items_are_skipped() {
        let out = output(
            r#"{"content": [
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "caption"}
            ]}"#,
        );
        assert_eq!(out.text.as_deref(), Some("caption"));
    }

    #[test]
    fn empty_content_yields_none() {
        assert_eq!(output(r#"{"content": []}"#).text, None);
        assert_eq!(output(r#"{}"#).text, None);
    }

    #[test]
    fn error_flag_is_carried() {
        let out = output(r#"{"content": [{"type": "text", "text": "boom"}], "isError": true}"#);
        assert!(out.is_error);
        assert_eq!(out.text.as_deref(), Some("boom"));
    }

    #[test]
    fn malformed_content_does_not_parse() {
        assert!(serde_json::from_str::<CallToolResult>(r#"{"content": "text"}"#).is_err());
    }

    #[tokio::test]
    async fn spawn_failure_yields_none() {
        let invoker = ToolInvoker::new(ProviderConfig::new("nonexistent_command_xyz123", vec![]));
        assert_eq!(invoker.invoke("sum", serde_json::json!({})).await, None);
    }

    #[test]
    fn invoker_is_a_send_sync_backend() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ToolInvoker>();
        fn _accept(_b: &dyn ToolBackend) {}
    }
}
