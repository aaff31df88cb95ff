//! Anthropic Messages API client.

use super::{ContentBlock, LanguageModel, ModelRequest, ModelResponse, StopReason, ToolChoice, Turn};
use crate::config::LlmSettings;
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    content: Vec<Value>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Claude models via the Anthropic Messages API.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicModel {
    /// Create a model client with an explicit API key.
    pub fn new(api_key: impl Into<String>, settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| SyllabusError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: settings.anthropic_base_url.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Create a model client using `ANTHROPIC_API_KEY` from the environment.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| SyllabusError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        Self::new(api_key, settings)
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/v1/messages")
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|_| {
                SyllabusError::Config("API key contains invalid header characters".to_string())
            })?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request<'a>(&'a self, request: &'a ModelRequest) -> Request<'a> {
        let tools = request.offers_tools().then(|| {
            request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    })
                })
                .collect()
        });

        let tool_choice = match request.tool_choice {
            Some(ToolChoice::Auto) if request.offers_tools() => Some(json!({"type": "auto"})),
            _ => None,
        };

        Request {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &request.system,
            messages: request.messages.iter().filter_map(turn_to_message).collect(),
            tools,
            tool_choice,
        }
    }
}

/// Malformed tool-use blocks were never executed and have no result to pair
/// with, so they are not replayed.
fn block_to_value(block: &ContentBlock) -> Option<Value> {
    match block {
        ContentBlock::Text { text } => Some(json!({"type": "text", "text": text})),
        ContentBlock::ToolUse { id, name, input } => Some(json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        })),
        ContentBlock::Unknown { kind, .. } if kind == "tool_use" => None,
        ContentBlock::Unknown { raw, .. } => Some(raw.clone()),
    }
}

/// Convert a turn to a wire message. Turns left without content are omitted
/// because the API rejects messages with empty content.
fn turn_to_message(turn: &Turn) -> Option<Value> {
    match turn {
        Turn::User(text) => Some(json!({"role": "user", "content": text})),
        Turn::Assistant(blocks) => {
            let content: Vec<Value> = blocks.iter().filter_map(block_to_value).collect();
            (!content.is_empty()).then(|| json!({"role": "assistant", "content": content}))
        }
        Turn::ToolResults(results) if results.is_empty() => None,
        Turn::ToolResults(results) => Some(json!({
            "role": "user",
            "content": results
                .iter()
                .map(|r| json!({
                    "type": "tool_result",
                    "tool_use_id": r.tool_use_id,
                    "content": r.content,
                }))
                .collect::<Vec<_>>(),
        })),
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    #[instrument(skip_all, fields(model = %self.model, tools = request.tools.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(self.messages_url())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(SyllabusError::Llm(format!(
                "Anthropic API error ({}): {}",
                status, message
            )));
        }

        let api_response: Response = response
            .json()
            .await
            .map_err(|e| SyllabusError::Llm(format!("Failed to parse Anthropic response: {}", e)))?;

        let stop_reason = api_response
            .stop_reason
            .as_deref()
            .map(StopReason::parse)
            .unwrap_or(StopReason::EndTurn);

        debug!("Anthropic response stop reason: {:?}", stop_reason);

        Ok(ModelResponse {
            stop_reason,
            content: api_response
                .content
                .into_iter()
                .map(ContentBlock::from_value)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Conversation, ToolResult};
    use crate::tools::ToolDefinition;

    fn model() -> AnthropicModel {
        AnthropicModel::new("test-key", &LlmSettings::default()).unwrap()
    }

    #[test]
    fn test_messages_url() {
        assert_eq!(model().messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_request_without_tools_omits_tool_fields() {
        let model = model();
        let request = ModelRequest::without_tools("system", &Conversation::new("hello"));
        let body = serde_json::to_value(model.build_request(&request)).unwrap();

        assert_eq!(body["system"], "system");
        assert_eq!(body["max_tokens"], 800);
        assert_eq!(body["messages"][0], json!({"role": "user", "content": "hello"}));
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_request_with_tools_and_results() {
        let model = model();
        let mut conversation = Conversation::new("question");
        conversation.push(Turn::Assistant(vec![ContentBlock::tool_use(
            "tu_1",
            "search_course_content",
            json!({"query": "q"}),
        )]));
        conversation.push(Turn::ToolResults(vec![ToolResult {
            tool_use_id: "tu_1".to_string(),
            content: "result".to_string(),
        }]));
        conversation.push(Turn::ToolResults(Vec::new()));

        let tools = vec![ToolDefinition::new(
            "search_course_content",
            "Search",
            json!({"type": "object"}),
        )];
        let request = ModelRequest::with_tools("system", &conversation, &tools);
        let body = serde_json::to_value(model.build_request(&request)).unwrap();

        assert_eq!(body["tool_choice"], json!({"type": "auto"}));
        assert_eq!(body["tools"][0]["name"], "search_course_content");
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "tu_1");
    }

    #[test]
    fn test_malformed_tool_use_is_not_replayed() {
        let model = model();
        let conversation = Conversation::new("q")
            .appended(Turn::Assistant(vec![ContentBlock::from_value(
                json!({"type": "tool_use", "input": {}}),
            )]))
            .appended(Turn::ToolResults(Vec::new()));

        let request = ModelRequest::without_tools("system", &conversation);
        let body = serde_json::to_value(model.build_request(&request)).unwrap();

        assert_eq!(body["messages"], json!([{"role": "user", "content": "q"}]));
    }

    #[test]
    fn test_text_kept_beside_malformed_tool_use() {
        let model = model();
        let conversation = Conversation::new("q").appended(Turn::Assistant(vec![
            ContentBlock::text("Let me look that up"),
            ContentBlock::from_value(json!({"type": "tool_use", "name": "search_course_content"})),
        ]));

        let request = ModelRequest::without_tools("system", &conversation);
        let body = serde_json::to_value(model.build_request(&request)).unwrap();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1]["content"],
            json!([{"type": "text", "text": "Let me look that up"}])
        );
        assert!(!body.to_string().contains("tool_use"));
    }

    #[test]
    fn test_parse_response_body() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "Searching"},
                {"type": "tool_use", "id": "tu_9", "name": "get_course_outline", "input": {"course_title": "MCP"}}
            ],
            "stop_reason": "tool_use",
            "model": "claude"
        });
        let parsed: Response = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(parsed.content.len(), 2);
    }
}
