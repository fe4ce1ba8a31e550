//! Assembles the opening message list from the command-line inputs.

use anyhow::{Context, Result};
use cai_types::Message;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

/// Everything the user handed us before the first model call.
#[derive(Debug, Default)]
pub struct PromptInputs {
    pub system_prompt: Option<String>,
    pub stdin: Option<String>,
    pub file: Option<FileContext>,
    pub prompt: String,
}

/// A file included in the conversation context.
#[derive(Debug)]
pub struct FileContext {
    pub path: String,
    pub contents: String,
}

impl FileContext {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            path: path.display().to_string(),
            contents,
        })
    }
}

/// Read piped standard input. A terminal is never read from.
pub fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut text = String::new();
    stdin
        .lock()
        .read_to_string(&mut text)
        .context("Failed to read standard input")?;
    Ok(Some(text))
}

/// Messages in order: system, stdin, file, prompt. Blank inputs are dropped.
pub fn build_messages(inputs: PromptInputs) -> Vec<Message> {
    let mut messages = Vec::new();

    if let Some(system) = inputs.system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system));
    }
    if let Some(piped) = inputs.stdin.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::user(piped));
    }
    if let Some(file) = inputs.file {
        messages.push(Message::user(format!(
            "File: {}\n\n{}",
            file.path, file.contents
        )));
    }
    messages.push(Message::user(inputs.prompt));

    messages
}
