//! Content search tool.

use super::{Source, Tool, ToolDefinition, ToolOutput};
use crate::error::{Result, SyllabusError};
use crate::vector_store::{SearchIndex, SearchResults};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches course content with fuzzy course-name matching and lesson filtering.
pub struct CourseSearchTool {
    index: Arc<dyn SearchIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    async fn format_results(&self, results: &SearchResults) -> ToolOutput {
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for hit in &results.hits {
            let course_title = &hit.metadata.course_title;
            let label = match hit.metadata.lesson_number {
                Some(n) => format!("{} - Lesson {}", course_title, n),
                None => course_title.clone(),
            };

            let link = match hit.metadata.lesson_number {
                Some(n) => match self.index.get_lesson_link(course_title, n).await {
                    Ok(link) => link,
                    Err(e) => {
                        warn!("Failed to look up lesson link for {}: {}", label, e);
                        None
                    }
                },
                None => None,
            };

            blocks.push(format!("[{}]\n{}", label, hit.content));
            sources.push(Source::new(label, link));
        }

        ToolOutput::with_sources(blocks.join("\n\n"), sources)
    }
}

fn empty_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut filter_info = String::new();
    if let Some(course) = course_name {
        filter_info.push_str(&format!(" in course '{}'", course));
    }
    if let Some(n) = lesson_number {
        filter_info.push_str(&format!(" in lesson {}", n));
    }
    format!("No relevant content found{}.", filter_info)
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_course_content",
            "Search course materials with smart course name matching and lesson filtering",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    #[instrument(skip(self, input))]
    async fn execute(&self, input: &Value) -> Result<ToolOutput> {
        let args: SearchArgs = serde_json::from_value(input.clone()).map_err(|e| {
            SyllabusError::Tool(format!("Invalid arguments for search_course_content: {}", e))
        })?;

        debug!(
            "Searching for {:?} (course: {:?}, lesson: {:?})",
            args.query, args.course_name, args.lesson_number
        );

        let results = match self
            .index
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await
        {
            Ok(results) => results,
            Err(e) => return Ok(ToolOutput::text(e.to_string())),
        };

        if results.is_empty() {
            return Ok(ToolOutput::text(empty_message(
                args.course_name.as_deref(),
                args.lesson_number,
            )));
        }

        Ok(self.format_results(&results).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubIndex;
    use crate::vector_store::{ChunkMetadata, SearchHit};

    fn hit(content: &str, course: &str, lesson: Option<u32>) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            metadata: ChunkMetadata {
                course_title: course.to_string(),
                lesson_number: lesson,
                chunk_index: 0,
            },
            distance: 0.1,
        }
    }

    #[tokio::test]
    async fn test_formats_hits_with_headers_and_sources() {
        let index = StubIndex::with_hits(vec![
            hit("Lesson text about servers.", "Building MCP Servers", Some(1)),
            hit("Course overview.", "Building MCP Servers", None),
        ])
        .with_lesson_link("Building MCP Servers", 1, "https://example.com/mcp/1");
        let tool = CourseSearchTool::new(Arc::new(index));

        let output = tool.execute(&json!({"query": "servers"})).await.unwrap();

        assert_eq!(
            output.content,
            "[Building MCP Servers - Lesson 1]\nLesson text about servers.\n\n[Building MCP Servers]\nCourse overview."
        );
        assert_eq!(
            output.sources,
            vec![
                Source::new(
                    "Building MCP Servers - Lesson 1",
                    Some("https://example.com/mcp/1".to_string())
                ),
                Source::new("Building MCP Servers", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_forwards_filters_verbatim() {
        let index = Arc::new(StubIndex::with_hits(Vec::new()));
        let tool = CourseSearchTool::new(index.clone());

        tool.execute(&json!({"query": "q", "course_name": "MCP", "lesson_number": 3}))
            .await
            .unwrap();

        assert_eq!(
            index.calls(),
            vec![("q".to_string(), Some("MCP".to_string()), Some(3))]
        );
    }

    #[tokio::test]
    async fn test_empty_results_mention_filters() {
        let tool = CourseSearchTool::new(Arc::new(StubIndex::with_hits(Vec::new())));

        let output = tool
            .execute(&json!({"query": "q", "course_name": "Nonexistent"}))
            .await
            .unwrap();
        assert!(output.content.contains("No relevant content found"));
        assert!(output.content.contains("in course 'Nonexistent'"));
        assert!(output.sources.is_empty());

        let output = tool
            .execute(&json!({"query": "q", "course_name": "X", "lesson_number": 2}))
            .await
            .unwrap();
        assert_eq!(output.content, "No relevant content found in course 'X' in lesson 2.");

        let output = tool.execute(&json!({"query": "q"})).await.unwrap();
        assert_eq!(output.content, "No relevant content found.");
    }

    #[tokio::test]
    async fn test_index_error_is_returned_as_text() {
        let index = StubIndex::failing(|| SyllabusError::CourseNotFound("Nonexistent".to_string()));
        let tool = CourseSearchTool::new(Arc::new(index));

        let output = tool
            .execute(&json!({"query": "q", "course_name": "Nonexistent"}))
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'Nonexistent'");
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_lesson_link_failure_degrades_to_none() {
        let index =
            StubIndex::with_hits(vec![hit("text", "Course A", Some(2))]).with_failing_links();
        let tool = CourseSearchTool::new(Arc::new(index));

        let output = tool.execute(&json!({"query": "q"})).await.unwrap();
        assert_eq!(output.sources, vec![Source::new("Course A - Lesson 2", None)]);
    }

    #[tokio::test]
    async fn test_missing_query_is_an_error() {
        let tool = CourseSearchTool::new(Arc::new(StubIndex::with_hits(Vec::new())));
        assert!(tool.execute(&json!({"course_name": "MCP"})).await.is_err());
    }

    #[test]
    fn test_definition_schema() {
        let tool = CourseSearchTool::new(Arc::new(StubIndex::with_hits(Vec::new())));
        let definition = tool.definition();
        assert_eq!(definition.name, "search_course_content");
        assert_eq!(definition.input_schema["type"], "object");
        assert_eq!(definition.input_schema["required"], json!(["query"]));
    }
}
