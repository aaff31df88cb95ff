//! Test doubles shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::llm::{ContentBlock, LanguageModel, ModelRequest, ModelResponse, StopReason};
use crate::models::Course;
use crate::tools::{Source, Tool, ToolDefinition, ToolOutput};
use crate::vector_store::{SearchHit, SearchIndex, SearchResults};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Deterministic bag-of-words embedder. Texts sharing words are close.
pub struct WordEmbedder {
    dimensions: usize,
}

impl Default for WordEmbedder {
    fn default() -> Self {
        Self { dimensions: 512 }
    }
}

impl WordEmbedder {
    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

type ErrorFactory = Arc<dyn Fn() -> SyllabusError + Send + Sync>;

/// Search index returning canned data and recording search calls.
#[derive(Default)]
pub struct StubIndex {
    hits: Vec<SearchHit>,
    courses: Vec<Course>,
    links: HashMap<(String, u32), String>,
    failure: Option<ErrorFactory>,
    failing_links: bool,
    calls: Mutex<Vec<(String, Option<String>, Option<u32>)>>,
}

impl StubIndex {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn with_courses(courses: Vec<Course>) -> Self {
        Self {
            courses,
            ..Default::default()
        }
    }

    /// Every call fails with the error produced by `make`.
    pub fn failing(make: impl Fn() -> SyllabusError + Send + Sync + 'static) -> Self {
        Self {
            failure: Some(Arc::new(make)),
            ..Default::default()
        }
    }

    pub fn with_lesson_link(mut self, course: &str, lesson: u32, link: &str) -> Self {
        self.links
            .insert((course.to_string(), lesson), link.to_string());
        self
    }

    pub fn with_failing_links(mut self) -> Self {
        self.failing_links = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<String>, Option<u32>)> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SearchIndex for StubIndex {
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults> {
        self.calls.lock().unwrap().push((
            query.to_string(),
            course_name.map(str::to_string),
            lesson_number,
        ));
        self.check()?;
        Ok(SearchResults::new(self.hits.clone()))
    }

    async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>> {
        if self.failing_links {
            return Err(SyllabusError::VectorStore("link lookup failed".to_string()));
        }
        self.check()?;
        Ok(self
            .links
            .get(&(course_title.to_string(), lesson_number))
            .cloned())
    }

    async fn get_all_course_metadata(&self) -> Result<Vec<Course>> {
        self.check()?;
        Ok(self.courses.clone())
    }
}

/// Tool returning fixed content and recording its inputs.
pub struct StaticTool {
    name: String,
    content: String,
    sources: Vec<Source>,
    failure: Option<String>,
    inputs: Mutex<Vec<Value>>,
}

impl StaticTool {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_string(),
            sources: Vec::new(),
            failure: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// A tool whose execution always fails with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(name, "")
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name.clone(),
            format!("Test tool {}", self.name),
            json!({"type": "object", "properties": {}, "required": []}),
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolOutput> {
        self.inputs.lock().unwrap().push(input.clone());
        if let Some(message) = &self.failure {
            return Err(SyllabusError::Tool(message.clone()));
        }
        Ok(ToolOutput::with_sources(self.content.clone(), self.sources.clone()))
    }
}

/// Language model replaying queued responses and recording every request.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ModelResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyllabusError::Llm("no scripted response left".to_string())))
    }
}

/// A tool-use response requesting the given `(id, name, input)` calls.
pub fn tool_use_response(calls: Vec<(&str, &str, Value)>) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::ToolUse,
        content: calls
            .into_iter()
            .map(|(id, name, input)| ContentBlock::tool_use(id, name, input))
            .collect(),
    }
}
