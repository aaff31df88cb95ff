//! Tools the language model can call, and the registry that dispatches them.

mod outline;
mod search;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Declaration of a tool as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's input object.
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A citation shown alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Label such as "Course Title - Lesson 2".
    pub text: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl Source {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
        }
    }
}

/// Text handed back to the model plus the sources that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// Output with no sources.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            content: content.into(),
            sources,
        }
    }
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and input schema offered to the model.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Domain failures are reported inside the output text;
    /// `Err` means the tool itself broke.
    async fn execute(&self, input: &Value) -> Result<ToolOutput>;
}

/// Registered tools, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its definition's name. A tool with the same
    /// name replaces the previous one in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if name.is_empty() {
            return Err(SyllabusError::Tool(
                "Tool must have a 'name' in its definition".to_string(),
            ));
        }

        match self.tools.iter().position(|t| t.definition().name == name) {
            Some(index) => {
                debug!("Replacing tool {}", name);
                self.tools[index] = tool;
            }
            None => {
                info!("Registered tool {}", name);
                self.tools.push(tool);
            }
        }
        Ok(())
    }

    /// Definitions of every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.definition().name == name)
    }

    /// Start a per-query session that records each tool's latest sources.
    pub fn session(&self) -> ToolSession<'_> {
        ToolSession {
            registry: self,
            sources: vec![Vec::new(); self.tools.len()],
        }
    }
}

/// Dispatches tool calls for a single query and remembers their sources.
///
/// Holds one source slot per registered tool, parallel to registration order.
pub struct ToolSession<'a> {
    registry: &'a ToolRegistry,
    sources: Vec<Vec<Source>>,
}

impl ToolSession<'_> {
    /// Execute a tool by name. Unknown names are not an error: the model
    /// gets a "not found" message back instead.
    pub async fn execute(&mut self, name: &str, input: &Value) -> Result<String> {
        let Some(index) = self.registry.position(name) else {
            debug!("Model requested unknown tool {}", name);
            return Ok(format!("Tool '{}' not found", name));
        };

        let output = self.registry.tools[index].execute(input).await?;
        // Each execution replaces that tool's previous sources
        self.sources[index] = output.sources;
        Ok(output.content)
    }

    /// Every tool's most recent sources, concatenated in registration order.
    pub fn get_last_sources(&self) -> Vec<Source> {
        self.sources.iter().flatten().cloned().collect()
    }

    /// Clear every tool's recorded sources.
    pub fn reset_sources(&mut self) {
        for slot in &mut self.sources {
            slot.clear();
        }
    }
}
