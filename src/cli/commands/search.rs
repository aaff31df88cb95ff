//! Search command implementation.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SyllabusError;
use crate::vector_store::SearchIndex;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assistant = CourseAssistant::new(settings)?;
    let store = assistant.vector_store();

    let spinner = Output::spinner("Searching...");
    let results = store.search(query, course, lesson).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} results", results.len()));

            for hit in &results.hits {
                let label = match hit.metadata.lesson_number {
                    Some(n) => format!("{} - Lesson {}", hit.metadata.course_title, n),
                    None => hit.metadata.course_title.clone(),
                };
                Output::search_result(&label, hit.distance, &hit.content);
            }
        }
        Err(SyllabusError::CourseNotFound(name)) => {
            Output::warning(&format!("No course found matching '{}'", name));
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
