//! cai: ask a language model from the command line, optionally letting it
//! call tools from an external provider process.

mod prompt;

use anyhow::{Context, Result};
use cai_api::{ChatClient, OpenAiCompatibleProvider};
use cai_config::{CaiConfig, CliOverrides};
use cai_core::{Conversation, ConversationConfig, ConversationEvent};
use cai_mcp::{ToolCatalog, ToolInvoker};
use cai_types::{ChatProvider, ChatRequest, Message, ToolBackend, ToolChoice};
use clap::{Parser, ValueEnum};
use prompt::{FileContext, PromptInputs};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Send the prompt and print the answer
    Prompt,
    /// Let the model call tools from the configured provider
    Knowit,
}

#[derive(Parser)]
#[command(
    name = "cai",
    version,
    about = "Use a language model from the command line"
)]
struct Cli {
    /// The action to perform
    #[arg(short, long, value_enum)]
    action: Action,

    /// The prompt to send to the model
    #[arg(short, long)]
    prompt: Option<String>,

    /// System prompt to send ahead of everything else
    #[arg(long)]
    system_prompt: Option<String>,

    /// File to include in the conversation context
    #[arg(long)]
    file: Option<PathBuf>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// API key (overrides CAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Maximum tool rounds before the answer is returned as-is
    #[arg(long)]
    max_tool_rounds: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let Some(prompt_text) = cli.prompt else {
        eprintln!("this action requires --prompt to be provided.");
        return Ok(());
    };

    let config = CaiConfig::load(CliOverrides {
        api_key: cli.api_key,
        model: cli.model,
        max_tool_rounds: cli.max_tool_rounds,
    })
    .context("Failed to load configuration")?;

    let file = cli.file.as_deref().map(FileContext::load).transpose()?;
    let mut messages = prompt::build_messages(PromptInputs {
        system_prompt: cli.system_prompt,
        stdin: prompt::read_piped_stdin()?,
        file,
        prompt: prompt_text,
    });

    let client = ChatClient::new(&config.api_key, &config.base_url)
        .and_then(|c| c.with_timeout(Duration::from_millis(config.api_timeout_ms)))
        .context("Failed to create API client")?;
    let provider: Arc<dyn ChatProvider> = Arc::new(OpenAiCompatibleProvider::new(client));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let answer = match cli.action {
        Action::Prompt => run_prompt(provider.as_ref(), &config, messages, &cancel).await?,
        Action::Knowit => run_knowit(provider, &config, &mut messages, cancel).await?,
    };

    println!("{answer}");
    Ok(())
}

/// One chat call, no tools.
async fn run_prompt(
    provider: &dyn ChatProvider,
    config: &CaiConfig,
    messages: Vec<Message>,
    cancel: &CancellationToken,
) -> Result<String> {
    let request = ChatRequest {
        model: config.model.clone(),
        messages,
        tools: None,
        tool_choice: ToolChoice::Auto,
    };

    let response = tokio::select! {
        _ = cancel.cancelled() => anyhow::bail!("Interrupted"),
        response = provider.complete(&request) => response.context("Chat request failed")?,
    };
    Ok(response.content)
}

/// Fetch the provider's catalog and let the model call tools until it answers.
async fn run_knowit(
    provider: Arc<dyn ChatProvider>,
    config: &CaiConfig,
    messages: &mut Vec<Message>,
    cancel: CancellationToken,
) -> Result<String> {
    let provider_config = config.provider.clone().with_context(|| {
        format!(
            "knowit needs a [provider] section in {}",
            config.config_dir.join("config.toml").display()
        )
    })?;

    let catalog = ToolCatalog::new(provider_config.clone());
    let tools = if config.strict_catalog {
        catalog
            .try_fetch()
            .await
            .context("Failed to fetch tool catalog")?
    } else {
        catalog.fetch().await
    };
    let backend: Arc<dyn ToolBackend> = Arc::new(ToolInvoker::new(provider_config.clone()));
    let conversation = Conversation::new(
        provider,
        backend,
        tools,
        ConversationConfig {
            max_tool_rounds: config.max_tool_rounds,
            resubmit_tools: config.resubmit_tools,
            ..ConversationConfig::new(config.model.clone())
        },
    );

    tracing::debug!(
        "Catalog from {}: {} tools",
        provider_config.display_name(),
        conversation.catalog().len()
    );

    let outcome = conversation
        .run(messages, cancel, |event| match event {
            ConversationEvent::ToolSkipped { id, call_type } => {
                eprintln!("[!] skipped tool call {id} with unsupported type: {call_type}");
            }
            ConversationEvent::ToolEnd {
                name, output: None, ..
            } => {
                eprintln!("[!] tool {name} failed");
            }
            _ => {}
        })
        .await
        .context("Conversation failed")?;

    if outcome.truncated {
        eprintln!(
            "[!] stopped after {} tool rounds; the answer may be incomplete",
            outcome.rounds
        );
    }

    Ok(outcome.content)
}
