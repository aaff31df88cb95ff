//! OpenAI chat completions backend.

use super::{ContentBlock, LanguageModel, ModelRequest, ModelResponse, StopReason, ToolChoice, Turn};
use crate::config::LlmSettings;
use crate::error::{Result, SyllabusError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat models via the OpenAI chat completions API.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIModel {
    /// Create a model client. The API key is read from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_seconds))?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn build_request(&self, request: &ModelRequest) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(build_messages(request)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);

        if request.offers_tools() {
            args.tools(build_tools(request));
            if let Some(ToolChoice::Auto) = request.tool_choice {
                args.tool_choice(ChatCompletionToolChoiceOption::Auto);
            }
        }

        args.build().map_err(|e| SyllabusError::Llm(e.to_string()))
    }
}

fn build_tools(request: &ModelRequest) -> Vec<ChatCompletionTool> {
    request
        .tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}

fn build_messages(request: &ModelRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.clone())
            .build()
            .map_err(|e| SyllabusError::Llm(e.to_string()))?
            .into(),
    ];

    for turn in &request.messages {
        match turn {
            Turn::User(text) => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(|e| SyllabusError::Llm(e.to_string()))?
                    .into(),
            ),
            Turn::Assistant(blocks) => {
                let text: String = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();

                // Unparsable tool calls were never executed, so they are not replayed
                let tool_calls: Vec<ChatCompletionMessageToolCall> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolUse { id, name, input } => {
                            Some(ChatCompletionMessageToolCall {
                                id: id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            })
                        }
                        _ => None,
                    })
                    .collect();

                let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    assistant.content(text);
                }
                if !tool_calls.is_empty() {
                    assistant.tool_calls(tool_calls);
                }
                messages.push(
                    assistant
                        .build()
                        .map_err(|e| SyllabusError::Llm(e.to_string()))?
                        .into(),
                );
            }
            Turn::ToolResults(results) => {
                for result in results {
                    messages.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(result.tool_use_id.clone())
                            .content(result.content.clone())
                            .build()
                            .map_err(|e| SyllabusError::Llm(e.to_string()))?
                            .into(),
                    );
                }
            }
        }
    }

    Ok(messages)
}

fn convert_tool_call(call: ChatCompletionMessageToolCall) -> ContentBlock {
    match serde_json::from_str::<Value>(&call.function.arguments) {
        Ok(input) if input.is_object() => {
            ContentBlock::tool_use(call.id, call.function.name, input)
        }
        _ => ContentBlock::Unknown {
            kind: "tool_use".to_string(),
            raw: json!({
                "id": call.id,
                "name": call.function.name,
                "arguments": call.function.arguments,
            }),
        },
    }
}

fn convert_finish_reason(reason: Option<FinishReason>) -> StopReason {
    match reason {
        Some(FinishReason::ToolCalls) => StopReason::ToolUse,
        Some(FinishReason::Length) => StopReason::MaxTokens,
        Some(FinishReason::Stop) | None => StopReason::EndTurn,
        Some(other) => StopReason::Other(format!("{:?}", other)),
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    #[instrument(skip_all, fields(model = %self.model, tools = request.tools.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let api_request = self.build_request(request)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| SyllabusError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SyllabusError::Llm("No response from model".to_string()))?;

        let stop_reason = convert_finish_reason(choice.finish_reason);
        debug!("OpenAI response stop reason: {:?}", stop_reason);

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::text(text));
            }
        }
        content.extend(
            choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(convert_tool_call),
        );

        Ok(ModelResponse {
            stop_reason,
            content,
        })
    }
}
