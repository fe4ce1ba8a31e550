//! Request and response bodies of `/chat/completions`.

use cai_types::{
    ApiError, ChatRequest, ChatResponse, FUNCTION_CALL_TYPE, Message, ToolCallRequest, ToolChoice,
    ToolDefinition,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<FunctionTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

impl<'a> From<&'a ToolDefinition> for FunctionTool<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            kind: FUNCTION_CALL_TYPE,
            function: FunctionSpec {
                name: &def.name,
                description: &def.description,
                parameters: &def.parameter_schema,
            },
        }
    }
}

impl<'a> From<&'a ChatRequest> for ChatCompletionBody<'a> {
    /// `tools` and `tool_choice` are sent only when there is at least one tool.
    fn from(request: &'a ChatRequest) -> Self {
        let tools: Option<Vec<FunctionTool<'a>>> = request
            .tools
            .as_deref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(FunctionTool::from).collect());
        let tool_choice = tools.as_ref().map(|_| request.tool_choice);
        Self {
            model: &request.model,
            messages: &request.messages,
            tools,
            tool_choice,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatCompletionResponse {
    /// Exactly one choice with a message is a usable response.
    pub(crate) fn into_chat_response(self) -> Result<ChatResponse, ApiError> {
        let count = self.choices.len();
        let mut choices = self.choices.into_iter();
        let (Some(choice), None) = (choices.next(), choices.next()) else {
            return Err(ApiError::InvalidResponse(format!(
                "expected exactly 1 choice, got {count}"
            )));
        };
        let message = choice
            .message
            .ok_or_else(|| ApiError::InvalidResponse("choice has no message".into()))?;

        Ok(ChatResponse {
            content: message.content.unwrap_or_default(),
            reasoning: message.reasoning.unwrap_or_default(),
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}
