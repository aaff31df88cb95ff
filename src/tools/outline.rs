//! Course outline tool.

use super::{Source, Tool, ToolDefinition, ToolOutput};
use crate::error::{Result, SyllabusError};
use crate::models::Course;
use crate::vector_store::SearchIndex;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Placeholder values some course files use instead of a missing link.
const LINK_SENTINELS: [&str; 3] = ["no link available", "none", "null"];

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_title: String,
}

/// Returns a course's title, link and lesson list.
pub struct CourseOutlineTool {
    index: Arc<dyn SearchIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }
}

/// Find the course best matching `query`: exact, then substring, then any
/// shared word. Comparisons are case-insensitive.
fn find_matching_course<'a>(query: &str, courses: &'a [Course]) -> Option<&'a Course> {
    let query = query.to_lowercase();

    if let Some(course) = courses.iter().find(|c| c.title.to_lowercase() == query) {
        return Some(course);
    }

    if let Some(course) = courses
        .iter()
        .find(|c| c.title.to_lowercase().contains(&query))
    {
        return Some(course);
    }

    let query_words: HashSet<&str> = query.split_whitespace().collect();
    courses.iter().find(|c| {
        c.title
            .to_lowercase()
            .split_whitespace()
            .any(|word| query_words.contains(word))
    })
}

/// Return the link if it is a usable absolute http(s) URL.
fn valid_link(link: Option<&str>) -> Option<&str> {
    let link = link?.trim();
    if link.is_empty() {
        return None;
    }

    let lowered = link.to_lowercase();
    if LINK_SENTINELS.contains(&lowered.as_str()) {
        return None;
    }

    match Url::parse(link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(link),
        _ => None,
    }
}

fn format_outline(course: &Course) -> ToolOutput {
    let title = &course.title;
    let link = valid_link(course.course_link.as_deref());

    let mut outline = format!("**{}**\n\n", title);

    match link {
        Some(link) => outline.push_str(&format!("Course Link: [{}]({})\n\n", title, link)),
        None => outline.push_str("Course Link: Available through the course platform\n\n"),
    }

    if course.lessons.is_empty() {
        outline.push_str("No lesson information available.");
    } else {
        outline.push_str("**Lessons:**\n");
        let mut lessons: Vec<_> = course.lessons.iter().collect();
        lessons.sort_by_key(|l| l.lesson_number);
        for lesson in lessons {
            outline.push_str(&format!("{}. {}\n", lesson.lesson_number, lesson.title));
        }
    }

    let sources = link
        .map(|link| vec![Source::new(format!("{} - Course Link", title), Some(link.to_string()))])
        .unwrap_or_default();

    ToolOutput::with_sources(outline, sources)
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_course_outline",
            "Get complete course outline including title, link, and all lessons",
            json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title to get outline for (partial matches work)"
                    }
                },
                "required": ["course_title"]
            }),
        )
    }

    #[instrument(skip(self, input))]
    async fn execute(&self, input: &Value) -> Result<ToolOutput> {
        let args: OutlineArgs = serde_json::from_value(input.clone()).map_err(|e| {
            SyllabusError::Tool(format!("Invalid arguments for get_course_outline: {}", e))
        })?;

        let courses = match self.index.get_all_course_metadata().await {
            Ok(courses) => courses,
            Err(e) => {
                return Ok(ToolOutput::text(format!(
                    "Error retrieving course outline: {}",
                    e
                )))
            }
        };

        if courses.is_empty() {
            return Ok(ToolOutput::text("No courses available in the system."));
        }

        let Some(course) = find_matching_course(&args.course_title, &courses) else {
            let available: Vec<&str> = courses.iter().map(|c| c.title.as_str()).collect();
            return Ok(ToolOutput::text(format!(
                "No course found matching '{}'. Available courses: {}",
                args.course_title,
                available.join(", ")
            )));
        };

        debug!("Resolved outline request {:?} to {}", args.course_title, course.title);
        Ok(format_outline(course))
    }
}
