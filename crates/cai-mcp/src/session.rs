//! RPC session: one handshake, one exchange, one teardown.
//!
//! A session never has more than one request in flight, so each reply is
//! matched by position and then checked against the id that was sent.

use crate::config::ProviderConfig;
use crate::error::McpError;
use crate::jsonrpc::{JsonRpcErrorReply, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::StdioTransport;
use serde_json::json;
use tokio::time::Instant;

/// Protocol version sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Identity this client reports in the `initialize` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl ClientInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new("cai", env!("CARGO_PKG_VERSION"))
    }
}

/// The single request a session performs after its handshake.
#[derive(Debug, Clone)]
pub enum Exchange {
    /// `tools/list`
    ListTools,
    /// `tools/call` with `{name, arguments}`
    CallTool {
        name: String,
        arguments: serde_json::Value,
    },
}

impl Exchange {
    pub fn method(&self) -> &'static str {
        match self {
            Exchange::ListTools => "tools/list",
            Exchange::CallTool { .. } => "tools/call",
        }
    }

    fn into_params(self) -> serde_json::Value {
        match self {
            Exchange::ListTools => json!({}),
            Exchange::CallTool { name, arguments } => json!({
                "name": name,
                "arguments": arguments,
            }),
        }
    }
}

/// A JSON-RPC session bound to one freshly spawned provider process.
pub struct RpcSession {
    transport: StdioTransport,
    next_id: u64,
    client: ClientInfo,
}

impl RpcSession {
    /// Spawn a provider for a new session. Ids start at 1.
    pub fn open(config: &ProviderConfig, client: ClientInfo) -> Result<Self, McpError> {
        Ok(Self {
            transport: StdioTransport::spawn(config)?,
            next_id: 1,
            client,
        })
    }

    /// Open a session, handshake, perform `exchange`, and terminate the
    /// provider before returning, whatever the outcome.
    pub async fn run(
        config: &ProviderConfig,
        client: ClientInfo,
        exchange: Exchange,
    ) -> Result<serde_json::Value, McpError> {
        let mut session = Self::open(config, client)?;
        let outcome = session.perform(exchange).await;
        session.close().await;
        outcome
    }

    async fn perform(&mut self, exchange: Exchange) -> Result<serde_json::Value, McpError> {
        self.handshake().await?;
        let method = exchange.method();
        self.request(method, exchange.into_params()).await
    }

    /// `initialize` followed by the `notifications/initialized` notification.
    pub async fn handshake(&mut self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": self.client.name,
                "version": self.client.version,
            }
        });

        let outcome = async {
            let result = self.request("initialize", params).await?;
            if !result.is_object() {
                return Err(McpError::Protocol(format!(
                    "initialize result is not an object: {result}"
                )));
            }
            tracing::debug!(
                "Tool provider '{}' initialized (server: {}, protocol: {})",
                self.transport.name(),
                result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
                result["protocolVersion"].as_str().unwrap_or("unknown"),
            );
            self.notify("notifications/initialized", None).await
        }
        .await;

        outcome.map_err(|source| McpError::HandshakeFailed {
            server: self.transport.name().to_string(),
            source: Box::new(source),
        })
    }

    /// Send a request and wait for its reply, returning the `result` member.
    pub async fn request(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        let deadline = self.transport.deadline();
        self.transport.send(&serde_json::to_string(&request)?).await?;

        let response = self.receive_reply(deadline).await?;

        if response.id != Some(id) {
            return Err(McpError::ProtocolMismatch {
                server: self.transport.name().to_string(),
                expected: id,
                actual: response.id,
            });
        }

        if let Some(err) = response.error {
            return Err(McpError::JsonRpc {
                server: self.transport.name().to_string(),
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or_else(|| {
            McpError::Protocol(format!(
                "{method} response has neither result nor error"
            ))
        })
    }

    /// Send a notification. No reply is expected.
    pub async fn notify(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport
            .send(&serde_json::to_string(&notification)?)
            .await
    }

    /// Next line that is a reply. Provider notifications are skipped and
    /// provider requests are refused; neither extends `deadline`.
    async fn receive_reply(&mut self, deadline: Instant) -> Result<JsonRpcResponse, McpError> {
        loop {
            let line = self.transport.receive_until(deadline).await?;
            let response: JsonRpcResponse = serde_json::from_str(&line).map_err(|e| {
                McpError::Protocol(format!(
                    "unparseable line from '{}': {e}: {line}",
                    self.transport.name()
                ))
            })?;
            let Some(method) = response.method.clone() else {
                return Ok(response);
            };
            match response.id {
                None => {
                    tracing::debug!(
                        "Ignoring notification from '{}': {method}",
                        self.transport.name()
                    );
                }
                Some(id) => {
                    tracing::debug!(
                        "Refusing request {id} from '{}': {method}",
                        self.transport.name()
                    );
                    let reply = JsonRpcErrorReply::method_not_found(id, &method);
                    self.transport.send(&serde_json::to_string(&reply)?).await?;
                }
            }
        }
    }

    /// Terminate the provider. Safe to call more than once.
    pub async fn close(&mut self) -> bool {
        self.transport.close().await
    }

    pub fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }
}
