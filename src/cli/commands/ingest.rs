//! Ingest command implementation.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(path: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'syllabus doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let folder = Settings::expand_path(path);
    if !folder.is_dir() {
        Output::warning(&format!("Folder not found: {}", folder.display()));
        return Ok(());
    }

    let assistant = CourseAssistant::new(settings)?;

    let spinner = Output::spinner(&format!("Indexing courses in {}...", folder.display()));
    let result = assistant.add_course_folder(Path::new(&folder), clear).await;
    spinner.finish_and_clear();

    let (courses, chunks) = result?;
    if courses == 0 {
        Output::info("No new courses found.");
    } else {
        Output::success(&format!("Indexed {} courses ({} chunks)", courses, chunks));
    }

    let analytics = assistant.course_analytics().await?;
    Output::kv("Courses in catalog", &analytics.total_courses.to_string());

    Ok(())
}
