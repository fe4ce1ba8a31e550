//! Configuration for the tool-provider process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_timeout() -> u64 {
    30_000
}

fn default_shutdown_grace() -> u64 {
    2_000
}

/// How to launch the tool provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Command to run (e.g., "python", "uvx").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the provider process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// How long to wait for any single reply, in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// How long a closing provider may take to exit on its own before it is
    /// killed, in milliseconds (default: 2000).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

impl ProviderConfig {
    /// A provider launched as `command args...` with default timeouts.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout_ms: default_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }

    /// Name used in logs and errors.
    pub fn display_name(&self) -> &str {
        &self.command
    }
}
