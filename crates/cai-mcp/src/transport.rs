//! Stdio transport for tool-provider communication.
//!
//! Spawns a child process and exchanges newline-delimited lines over its
//! stdin/stdout. One transport owns exactly one process.

use crate::config::ProviderConfig;
use crate::error::McpError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;

/// Line transport over one spawned tool-provider process.
///
/// The process is terminated by [`close`](Self::close), or by `Drop` when the
/// transport goes away without being closed (e.g. a cancelled future).
pub struct StdioTransport {
    name: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    timeout_ms: u64,
    shutdown_grace_ms: u64,
}

fn channel_closed(name: &str) -> McpError {
    McpError::ChannelClosed {
        server: name.to_string(),
    }
}

impl StdioTransport {
    /// Spawn the provider with piped stdin/stdout and discarded stderr.
    pub fn spawn(config: &ProviderConfig) -> Result<Self, McpError> {
        let name = config.display_name().to_string();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: name.clone(),
            source: e,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::Protocol(format!(
                "tool provider '{name}' was spawned without piped stdio"
            )));
        };

        tracing::debug!("Spawned tool provider '{}' (pid {:?})", name, child.id());

        Ok(Self {
            name,
            child: Some(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            timeout_ms: config.timeout_ms,
            shutdown_grace_ms: config.shutdown_grace_ms,
        })
    }

    /// Write one line and flush it so the provider sees it before we block.
    pub async fn send(&mut self, line: &str) -> Result<(), McpError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| channel_closed(&self.name))?;

        tracing::debug!("-> {}: {}", self.name, line);

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe => channel_closed(&self.name),
            _ => McpError::Io(e),
        })
    }

    /// Block until the provider writes one non-blank line, for at most
    /// `timeout_ms`.
    pub async fn receive(&mut self) -> Result<String, McpError> {
        let deadline = self.deadline();
        self.receive_until(deadline).await
    }

    /// The instant a wait starting now must give up.
    pub fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.timeout_ms)
    }

    /// Like [`receive`](Self::receive), but bounded by a caller-supplied
    /// deadline that skipped blank lines do not extend.
    pub async fn receive_until(&mut self, deadline: Instant) -> Result<String, McpError> {
        if self.child.is_none() {
            return Err(channel_closed(&self.name));
        }

        loop {
            let next = tokio::time::timeout_at(deadline, self.stdout.next_line())
                .await
                .map_err(|_| McpError::Timeout {
                    name: self.name.clone(),
                    timeout_ms: self.timeout_ms,
                })?;

            match next? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    tracing::debug!("<- {}: {}", self.name, line);
                    return Ok(line);
                }
                None => return Err(channel_closed(&self.name)),
            }
        }
    }

    /// Terminate the provider: close its stdin, give it `shutdown_grace_ms` to
    /// exit, then kill it. Returns `true` only on the call that terminated it.
    pub async fn close(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return false;
        };

        // EOF on stdin is the polite shutdown request.
        drop(self.stdin.take());

        let grace = Duration::from_millis(self.shutdown_grace_ms);
        let exited = match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Tool provider '{}' exited: {status}", self.name);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait on tool provider '{}': {e}", self.name);
                false
            }
            Err(_) => false,
        };

        if !exited {
            tracing::debug!("Killing tool provider '{}'", self.name);
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill tool provider '{}': {e}", self.name);
            }
        }

        true
    }

    /// OS process id while the provider has not been closed.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            tracing::debug!("Tool provider '{}' dropped without close; killing", self.name);
            let _ = child.start_kill();
        }
    }
}
