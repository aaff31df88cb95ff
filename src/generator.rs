//! Multi-round tool-assisted answer generation.
//!
//! The generator drives a bounded number of model rounds. Each round the
//! model either answers directly or requests tools; requested tools are run
//! in order through a [`ToolSession`] and their results fed back. When the
//! round budget is spent, one final call is made with no tools attached so
//! the model has to answer.

use crate::llm::{Conversation, LanguageModel, ModelRequest, StopReason, ToolResult, Turn};
use crate::tools::{ToolDefinition, ToolSession};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How a query terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model's answer text.
    Answer(String),
    /// A tool raised while executing. The query was aborted.
    ToolError(String),
    /// The model call failed in the given round (1-based).
    ModelError { round: usize, detail: String },
}

impl Outcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    /// The user-facing text for this outcome.
    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) => text,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answer(text) => write!(f, "{}", text),
            Self::ToolError(detail) => write!(f, "Tool execution failed: {}", detail),
            Self::ModelError { round, detail } => write!(f, "Error in round {}: {}", round, detail),
        }
    }
}

/// Generates answers with a language model and optional tools.
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
        }
    }

    /// System instructions, with the conversation history appended when present.
    fn system_content(&self, history: Option<&str>) -> String {
        match history {
            Some(history) if !history.is_empty() => {
                format!("{}\n\nPrevious conversation:\n{}", self.system_prompt, history)
            }
            _ => self.system_prompt.clone(),
        }
    }

    /// Answer `query`, letting the model call tools for up to `max_rounds` rounds.
    ///
    /// Falls back to a single tool-less call when `max_rounds` is zero, no
    /// tool definitions are given or no session is available. Never fails:
    /// errors are reported through [`Outcome`].
    #[instrument(skip(self, history, tools, session))]
    pub async fn generate_answer(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&[ToolDefinition]>,
        session: Option<&mut ToolSession<'_>>,
        max_rounds: usize,
    ) -> Outcome {
        let system = self.system_content(history);

        match (tools, session) {
            (Some(tools), Some(session)) if max_rounds > 0 && !tools.is_empty() => {
                self.run_rounds(query, &system, tools, session, max_rounds)
                    .await
            }
            _ => self.single_call(query, &system).await,
        }
    }

    async fn single_call(&self, query: &str, system: &str) -> Outcome {
        debug!("Generating answer without tools");
        let request = ModelRequest::without_tools(system, &Conversation::new(query));

        match self.model.complete(&request).await {
            Ok(response) => Outcome::Answer(response.text_content()),
            Err(e) => Outcome::ModelError {
                round: 1,
                detail: e.to_string(),
            },
        }
    }

    async fn run_rounds(
        &self,
        query: &str,
        system: &str,
        tools: &[ToolDefinition],
        session: &mut ToolSession<'_>,
        max_rounds: usize,
    ) -> Outcome {
        let mut conversation = Conversation::new(query);
        let mut round = 1;

        loop {
            debug!("Starting round {} of {}", round, max_rounds);

            let request = ModelRequest::with_tools(system, &conversation, tools);
            let response = match self.model.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Model call failed in round {}: {}", round, e);
                    return Outcome::ModelError {
                        round,
                        detail: e.to_string(),
                    };
                }
            };

            if response.stop_reason != StopReason::ToolUse {
                info!("Model answered directly in round {}", round);
                return Outcome::Answer(response.text_content());
            }

            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                info!("Executing tool {} in round {}", name, round);
                match session.execute(name, input).await {
                    Ok(content) => results.push(ToolResult {
                        tool_use_id: id.to_string(),
                        content,
                    }),
                    Err(e) => {
                        warn!("Tool {} failed: {}", name, e);
                        return Outcome::ToolError(e.to_string());
                    }
                }
            }

            conversation = conversation
                .appended(Turn::Assistant(response.content))
                .appended(Turn::ToolResults(results));

            if round == max_rounds {
                debug!("Round budget spent, requesting final answer without tools");
                let request = ModelRequest::without_tools(system, &conversation);
                return match self.model.complete(&request).await {
                    Ok(response) => Outcome::Answer(response.text_content()),
                    Err(e) => Outcome::ModelError {
                        round,
                        detail: e.to_string(),
                    },
                };
            }

            round += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyllabusError;
    use crate::llm::{ContentBlock, ModelResponse};
    use crate::testing::{tool_use_response, ScriptedModel, StaticTool};
    use crate::tools::{Source, ToolRegistry};
    use serde_json::json;

    fn registry_with(tools: Vec<Arc<StaticTool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_direct_answer_makes_one_call() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("Direct answer"))]));
        let tool = Arc::new(StaticTool::new("search_course_content", "unused"));
        let registry = registry_with(vec![tool.clone()]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "What is MCP?",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(outcome, Outcome::Answer("Direct answer".to_string()));
        assert_eq!(model.requests().len(), 1);
        assert!(tool.inputs().is_empty());
    }

    #[tokio::test]
    async fn test_two_rounds_then_forced_final_call() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("tu_1", "tool_a", json!({"query": "first"}))])),
            Ok(tool_use_response(vec![("tu_2", "tool_b", json!({"query": "second"}))])),
            Ok(ModelResponse::text("Final synthesized answer")),
        ]));
        let tool_a = Arc::new(StaticTool::new("tool_a", "X"));
        let tool_b = Arc::new(StaticTool::new("tool_b", "Y"));
        let registry = registry_with(vec![tool_a.clone(), tool_b.clone()]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "Compare lessons",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(outcome, Outcome::Answer("Final synthesized answer".to_string()));
        assert_eq!(tool_a.inputs(), vec![json!({"query": "first"})]);
        assert_eq!(tool_b.inputs(), vec![json!({"query": "second"})]);

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].offers_tools());
        assert!(requests[1].offers_tools());
        assert!(!requests[2].offers_tools());
        assert_eq!(requests[2].tool_choice, None);

        // user, assistant, results, assistant, results
        assert_eq!(requests[2].messages.len(), 5);
        assert_eq!(
            requests[1].messages[2],
            Turn::ToolResults(vec![ToolResult {
                tool_use_id: "tu_1".to_string(),
                content: "X".to_string(),
            }])
        );
    }

    #[tokio::test]
    async fn test_call_count_bounded_by_budget() {
        for budget in 1..=4 {
            let responses = (0..budget + 1)
                .map(|i| {
                    if i < budget {
                        Ok(tool_use_response(vec![("id", "tool_a", json!({}))]))
                    } else {
                        Ok(ModelResponse::text("done"))
                    }
                })
                .collect();
            let model = Arc::new(ScriptedModel::new(responses));
            let registry = registry_with(vec![Arc::new(StaticTool::new("tool_a", "r"))]);
            let mut session = registry.session();
            let generator = AnswerGenerator::new(model.clone(), "system");

            let outcome = generator
                .generate_answer(
                    "q",
                    None,
                    Some(registry.definitions().as_slice()),
                    Some(&mut session),
                    budget,
                )
                .await;

            assert!(outcome.is_answer());
            assert_eq!(model.requests().len(), budget + 1);
        }
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_execute_in_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![
                ("a", "tool_a", json!({"n": 1})),
                ("b", "tool_a", json!({"n": 2})),
            ])),
            Ok(ModelResponse::text("answer")),
        ]));
        let tool = Arc::new(StaticTool::new("tool_a", "r"));
        let registry = registry_with(vec![tool.clone()]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(tool.inputs(), vec![json!({"n": 1}), json!({"n": 2})]);
        let requests = model.requests();
        let Turn::ToolResults(results) = &requests[1].messages[2] else {
            panic!("expected tool results turn");
        };
        let ids: Vec<&str> = results.iter().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_tool_failure_aborts_query() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("a", "broken", json!({}))])),
            Ok(ModelResponse::text("never reached")),
        ]));
        let registry =
            registry_with(vec![Arc::new(StaticTool::failing("broken", "index offline"))]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        let text = outcome.into_text();
        assert!(text.starts_with("Tool execution failed"));
        assert!(text.contains("index offline"));
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_result_goes_back_to_model() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("tu_1", "nope", json!({}))])),
            Ok(ModelResponse::text("answer")),
        ]));
        let tool = Arc::new(StaticTool::new("tool_a", "r"));
        let registry = registry_with(vec![tool.clone()]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(outcome, Outcome::Answer("answer".to_string()));
        assert!(tool.inputs().is_empty());
        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].messages[2],
            Turn::ToolResults(vec![ToolResult {
                tool_use_id: "tu_1".to_string(),
                content: "Tool 'nope' not found".to_string(),
            }])
        );
    }

    #[tokio::test]
    async fn test_model_error_reports_round() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("a", "tool_a", json!({}))])),
            Err(SyllabusError::Llm("rate limited".to_string())),
        ]));
        let registry = registry_with(vec![Arc::new(StaticTool::new("tool_a", "r"))]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model, "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(
            outcome.into_text(),
            "Error in round 2: Language model error: rate limited"
        );
    }

    #[tokio::test]
    async fn test_final_call_error_reports_last_round() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("a", "tool_a", json!({}))])),
            Err(SyllabusError::Llm("overloaded".to_string())),
        ]));
        let registry = registry_with(vec![Arc::new(StaticTool::new("tool_a", "r"))]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model, "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                1,
            )
            .await;

        assert!(matches!(outcome, Outcome::ModelError { round: 1, .. }));
    }

    #[tokio::test]
    async fn test_malformed_tool_use_yields_empty_results_turn() {
        let malformed = ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![ContentBlock::from_value(json!({"type": "tool_use", "input": {}}))],
        };
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(malformed),
            Ok(ModelResponse::text("recovered")),
        ]));
        let tool = Arc::new(StaticTool::new("tool_a", "r"));
        let registry = registry_with(vec![tool.clone()]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(outcome, Outcome::Answer("recovered".to_string()));
        assert!(tool.inputs().is_empty());
        let requests = model.requests();
        assert_eq!(requests[1].messages[2], Turn::ToolResults(Vec::new()));
    }

    #[tokio::test]
    async fn test_degraded_path_without_tools() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("plain"))]));
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator.generate_answer("q", None, None, None, 2).await;
        assert_eq!(outcome, Outcome::Answer("plain".to_string()));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].offers_tools());
    }

    #[tokio::test]
    async fn test_zero_budget_uses_degraded_path() {
        let model = Arc::new(ScriptedModel::new(vec![Err(SyllabusError::Llm("down".to_string()))]));
        let registry = registry_with(vec![Arc::new(StaticTool::new("tool_a", "r"))]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model.clone(), "system");

        let outcome = generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                0,
            )
            .await;

        assert_eq!(
            outcome,
            Outcome::ModelError {
                round: 1,
                detail: "Language model error: down".to_string()
            }
        );
        assert!(!model.requests()[0].offers_tools());
    }

    #[tokio::test]
    async fn test_history_goes_into_system_prompt() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::text("a")),
            Ok(ModelResponse::text("b")),
        ]));
        let generator = AnswerGenerator::new(model.clone(), "system");

        generator
            .generate_answer("q", Some("User: hi\nAssistant: hello"), None, None, 2)
            .await;
        generator.generate_answer("q", Some(""), None, None, 2).await;

        let requests = model.requests();
        assert_eq!(
            requests[0].system,
            "system\n\nPrevious conversation:\nUser: hi\nAssistant: hello"
        );
        assert_eq!(requests[0].messages, vec![Turn::User("q".to_string())]);
        assert_eq!(requests[1].system, "system");
    }

    #[tokio::test]
    async fn test_sources_collected_from_session() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_use_response(vec![("a", "cited", json!({}))])),
            Ok(ModelResponse::text("answer")),
        ]));
        let registry = registry_with(vec![Arc::new(
            StaticTool::new("cited", "r")
                .with_sources(vec![Source::new("Course A - Lesson 1", None)]),
        )]);
        let mut session = registry.session();
        let generator = AnswerGenerator::new(model, "system");

        generator
            .generate_answer(
                "q",
                None,
                Some(registry.definitions().as_slice()),
                Some(&mut session),
                2,
            )
            .await;

        assert_eq!(session.get_last_sources().len(), 1);
    }
}
