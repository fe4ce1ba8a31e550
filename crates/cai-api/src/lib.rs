//! OpenAI-compatible chat-completions client for cai.

mod client;
mod provider;
mod wire;

pub use client::ChatClient;
pub use provider::OpenAiCompatibleProvider;
