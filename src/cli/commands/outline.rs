//! Outline command implementation.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use serde_json::json;

/// Run the outline command through the same tool the model uses.
pub async fn run_outline(course: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assistant = CourseAssistant::new(settings)?;
    let mut session = assistant.tools().session();

    let outline = session
        .execute("get_course_outline", &json!({ "course_name": course }))
        .await?;

    println!("\n{}\n", outline);

    for source in session.get_last_sources() {
        Output::source(&source.text, source.link.as_deref());
    }

    Ok(())
}
