//! Tool discovery: `tools/list` translated into [`ToolDefinition`]s.

use crate::config::ProviderConfig;
use crate::error::McpError;
use crate::session::{ClientInfo, Exchange, RpcSession};
use cai_types::ToolDefinition;
use serde::Deserialize;

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl From<ToolEntry> for ToolDefinition {
    fn from(entry: ToolEntry) -> Self {
        ToolDefinition {
            name: entry.name,
            description: entry.description.unwrap_or_default(),
            parameter_schema: entry.input_schema,
        }
    }
}

/// Fetches the provider's tool manifest in a dedicated discovery session.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    config: ProviderConfig,
    client: ClientInfo,
}

impl ToolCatalog {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: ClientInfo::default(),
        }
    }

    /// Discover tools, in manifest order. Any session failure is returned.
    pub async fn try_fetch(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let result = RpcSession::run(&self.config, self.client.clone(), Exchange::ListTools).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list result: {e}")))?;
        Ok(list.tools.into_iter().map(ToolDefinition::from).collect())
    }

    /// Discover tools, degrading to an empty catalog when the provider is
    /// unavailable. The conversation can still proceed without tools.
    pub async fn fetch(&self) -> Vec<ToolDefinition> {
        match self.try_fetch().await {
            Ok(tools) => {
                tracing::info!(
                    "Tool provider '{}' offers {} tools",
                    self.config.display_name(),
                    tools.len()
                );
                tools
            }
            Err(e) => {
                tracing::warn!(
                    "Tool catalog unavailable from '{}': {e}",
                    self.config.display_name()
                );
                Vec::new()
            }
        }
    }
}
