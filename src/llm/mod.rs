//! Language model abstraction for tool-assisted answer generation.
//!
//! The conversation is modeled with provider-neutral types. Each provider
//! translates [`ModelRequest`] into its own wire format.

mod anthropic;
mod openai;

pub use anthropic::AnthropicModel;
pub use openai::OpenAIModel;

use crate::config::{LlmProvider, LlmSettings};
use crate::error::Result;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    /// The model requested one or more tool invocations.
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    /// Parse a provider stop reason string.
    pub fn parse(value: &str) -> Self {
        match value {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A block of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// A block kind this crate does not interpret. Kept so the assistant
    /// turn can be replayed as-is.
    Unknown {
        kind: String,
        raw: Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Interpret a raw content block. Tool-use blocks missing an id or name
    /// degrade to [`ContentBlock::Unknown`] and are never executed.
    pub fn from_value(value: Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "text" => match value.get("text").and_then(Value::as_str) {
                Some(text) => Self::text(text),
                None => Self::Unknown { kind, raw: value },
            },
            "tool_use" => {
                let id = value.get("id").and_then(Value::as_str);
                let name = value.get("name").and_then(Value::as_str);
                match (id, name) {
                    (Some(id), Some(name)) => {
                        let input = value
                            .get("input")
                            .cloned()
                            .unwrap_or_else(|| Value::Object(Default::default()));
                        Self::tool_use(id, name, input)
                    }
                    _ => Self::Unknown { kind, raw: value },
                }
            }
            _ => Self::Unknown { kind, raw: value },
        }
    }
}

/// Result of a single tool invocation, paired with the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
}

/// One turn of the conversation log.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Assistant(Vec<ContentBlock>),
    /// Results for the tool requests of the preceding assistant turn.
    ToolResults(Vec<ToolResult>),
}

/// Append-only conversation log for a single query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation with the user's question.
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User(user_message.into())],
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// A new log with `turn` appended; `self` is left untouched.
    pub fn appended(&self, turn: Turn) -> Self {
        let mut next = self.clone();
        next.push(turn);
        next
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Tool selection policy sent with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    Auto,
}

/// A request to the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
}

impl ModelRequest {
    /// A request that offers no tools.
    pub fn without_tools(system: impl Into<String>, conversation: &Conversation) -> Self {
        Self {
            system: system.into(),
            messages: conversation.turns().to_vec(),
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    /// A request that offers tools with automatic selection.
    pub fn with_tools(
        system: impl Into<String>,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Self {
        Self {
            system: system.into(),
            messages: conversation.turns().to_vec(),
            tools: tools.to_vec(),
            tool_choice: Some(ToolChoice::Auto),
        }
    }

    pub fn offers_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// A response from the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// A plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::EndTurn,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenated text of all text blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks in response order as `(id, name, input)`.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// A chat model that can optionally call tools.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one request and return the model's response.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

/// Build the configured language model.
pub fn create_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    match settings.provider {
        LlmProvider::Anthropic => Ok(Arc::new(AnthropicModel::from_settings(settings)?)),
        LlmProvider::OpenAI => Ok(Arc::new(OpenAIModel::from_settings(settings)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("max_tokens"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::parse("refusal"),
            StopReason::Other("refusal".to_string())
        );
    }

    #[test]
    fn test_content_block_from_value() {
        let block = ContentBlock::from_value(json!({"type": "text", "text": "hi"}));
        assert_eq!(block, ContentBlock::text("hi"));

        let block = ContentBlock::from_value(json!({
            "type": "tool_use",
            "id": "tu_1",
            "name": "search_course_content",
            "input": {"query": "rust"}
        }));
        assert_eq!(
            block,
            ContentBlock::tool_use("tu_1", "search_course_content", json!({"query": "rust"}))
        );
    }

    #[test]
    fn test_malformed_tool_use_degrades_to_unknown() {
        let block = ContentBlock::from_value(json!({"type": "tool_use", "input": {}}));
        assert!(matches!(block, ContentBlock::Unknown { ref kind, .. } if kind == "tool_use"));

        let block = ContentBlock::from_value(json!({"type": "thinking", "thinking": "..."}));
        assert!(matches!(block, ContentBlock::Unknown { ref kind, .. } if kind == "thinking"));
    }

    #[test]
    fn test_response_accessors() {
        let response = ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![
                ContentBlock::text("Let me "),
                ContentBlock::tool_use("a", "search_course_content", json!({})),
                ContentBlock::text("look."),
            ],
        };

        assert_eq!(response.text_content(), "Let me look.");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].0, "a");
        assert_eq!(uses[0].1, "search_course_content");
    }

    #[test]
    fn test_request_constructors() {
        let conversation = Conversation::new("question");
        let request = ModelRequest::without_tools("sys", &conversation);
        assert!(!request.offers_tools());
        assert_eq!(request.tool_choice, None);
        assert_eq!(request.messages, vec![Turn::User("question".to_string())]);

        let tools = vec![ToolDefinition::new("t", "d", json!({"type": "object"}))];
        let request = ModelRequest::with_tools("sys", &conversation, &tools);
        assert!(request.offers_tools());
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
    }
}
