//! Stdio tool-provider bridge for cai.
//!
//! A tool provider is a child process speaking newline-delimited JSON-RPC 2.0
//! on its stdin/stdout. Every discovery and every tool call runs in its own
//! freshly spawned process: handshake, one exchange, teardown.

pub mod catalog;
pub mod config;
pub mod error;
pub mod invoker;
pub mod jsonrpc;
pub mod session;
pub mod transport;

pub use catalog::ToolCatalog;
pub use config::ProviderConfig;
pub use error::McpError;
pub use invoker::{ToolCallOutput, ToolInvoker};
pub use session::{ClientInfo, Exchange, RpcSession};
pub use transport::StdioTransport;
