//! The conversation loop: ask the model, run the tools it requests, repeat.

use cai_types::{
    CaiError, ChatProvider, ChatRequest, ChatResponse, Message, ToolBackend, ToolCallRequest,
    ToolCallResult, ToolChoice, ToolDefinition,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default number of tool rounds before the loop gives up on the model.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Settings for one [`Conversation`].
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub model: String,
    /// Tool rounds allowed before a still-tool-hungry response is returned
    /// as truncated.
    pub max_tool_rounds: usize,
    /// Send the catalog again after tool results. When off, only the first
    /// request offers tools.
    pub resubmit_tools: bool,
}

impl ConversationConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            resubmit_tools: true,
        }
    }
}

/// Events emitted while the conversation runs.
#[derive(Debug)]
pub enum ConversationEvent {
    /// A tool is about to be invoked.
    ToolStart { id: String, name: String },
    /// A tool finished; `output` is `None` when it failed.
    ToolEnd {
        id: String,
        name: String,
        output: Option<String>,
    },
    /// A tool call of an unrecognized kind was skipped.
    ToolSkipped { id: String, call_type: String },
    /// The tool-round budget ran out.
    Truncated { rounds: usize },
    /// The model produced its final answer.
    Done,
}

/// The final model turn of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationOutcome {
    pub content: String,
    pub reasoning: String,
    /// Completed tool rounds.
    pub rounds: usize,
    /// The model still wanted tools when the budget ran out.
    pub truncated: bool,
}

impl ConversationOutcome {
    fn from_response(response: ChatResponse, rounds: usize, truncated: bool) -> Self {
        Self {
            content: response.content,
            reasoning: response.reasoning,
            rounds,
            truncated,
        }
    }
}

/// Drives one conversation against a chat provider and a tool backend.
///
/// The catalog is fetched by the caller before construction and never changes
/// afterwards.
pub struct Conversation {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<dyn ToolBackend>,
    catalog: Vec<ToolDefinition>,
    config: ConversationConfig,
}

impl Conversation {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<dyn ToolBackend>,
        catalog: Vec<ToolDefinition>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            catalog,
            config,
        }
    }

    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    fn tool_definitions(&self, rounds: usize) -> Option<Vec<ToolDefinition>> {
        if self.catalog.is_empty() || (rounds > 0 && !self.config.resubmit_tools) {
            None
        } else {
            Some(self.catalog.clone())
        }
    }

    /// Run until the model answers without requesting tools.
    ///
    /// Tool results are appended to `messages` in the order the model asked
    /// for them. A chat API failure ends the run with an error; tool failures
    /// never do.
    pub async fn run<F>(
        &self,
        messages: &mut Vec<Message>,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<ConversationOutcome, CaiError>
    where
        F: FnMut(ConversationEvent),
    {
        let mut rounds = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(CaiError::Cancelled);
            }

            let mut request = ChatRequest {
                model: self.config.model.clone(),
                messages: std::mem::take(messages),
                tools: self.tool_definitions(rounds),
                tool_choice: ToolChoice::Auto,
            };

            tracing::debug!(
                "Sending {} messages to {} (round {rounds})",
                request.messages.len(),
                self.provider.name()
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.provider.complete(&request) => Some(result),
            };

            // Hand the history back before looking at the outcome.
            *messages = std::mem::take(&mut request.messages);

            let response = match result {
                Some(result) => result?,
                None => return Err(CaiError::Cancelled),
            };

            if response.tool_calls.is_empty() {
                on_event(ConversationEvent::Done);
                return Ok(ConversationOutcome::from_response(response, rounds, false));
            }

            if rounds >= self.config.max_tool_rounds {
                tracing::warn!(
                    "Model still requested {} tool calls after {rounds} rounds; stopping",
                    response.tool_calls.len()
                );
                on_event(ConversationEvent::Truncated { rounds });
                on_event(ConversationEvent::Done);
                return Ok(ConversationOutcome::from_response(response, rounds, true));
            }

            let content = Some(response.content).filter(|c| !c.is_empty());
            self.execute_tools(messages, content, response.tool_calls, &cancel, &mut on_event)
                .await?;
            rounds += 1;
        }
    }

    /// Append the assistant turn and one tool message per executable call.
    async fn execute_tools<F>(
        &self,
        messages: &mut Vec<Message>,
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Result<(), CaiError>
    where
        F: FnMut(ConversationEvent),
    {
        let (runnable, skipped): (Vec<_>, Vec<_>) =
            calls.into_iter().partition(ToolCallRequest::is_function);

        for call in skipped {
            tracing::warn!(
                "Skipping tool call {} with unsupported type '{}'",
                call.id,
                call.call_type
            );
            on_event(ConversationEvent::ToolSkipped {
                id: call.id,
                call_type: call.call_type,
            });
        }

        if runnable.is_empty() {
            return Ok(());
        }

        let checkpoint = messages.len();
        messages.push(Message::assistant_tool_calls(content, runnable.clone()));

        for call in runnable {
            let name = call.tool_name().to_string();
            on_event(ConversationEvent::ToolStart {
                id: call.id.clone(),
                name: name.clone(),
            });

            let text = match call.parse_arguments() {
                Ok(arguments) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            // Drop the half-finished round.
                            messages.truncate(checkpoint);
                            return Err(CaiError::Cancelled);
                        }
                        text = self.tools.invoke(&name, arguments) => text,
                    }
                }
                Err(e) => {
                    tracing::warn!("Tool call {} has invalid arguments: {e}", call.id);
                    None
                }
            };

            on_event(ConversationEvent::ToolEnd {
                id: call.id.clone(),
                name,
                output: text.clone(),
            });

            messages.push(
                ToolCallResult {
                    tool_call_id: call.id,
                    text,
                }
                .into(),
            );
        }

        Ok(())
    }
}
