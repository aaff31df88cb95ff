//! Courses command implementation.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::SearchIndex;
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assistant = CourseAssistant::new(settings)?;

    match assistant.vector_store().get_all_course_metadata().await {
        Ok(courses) => {
            if courses.is_empty() {
                Output::info("No courses indexed yet. Use 'syllabus ingest <folder>' to add content.");
            } else {
                Output::header(&format!("Indexed Courses ({})", courses.len()));
                println!();

                for course in &courses {
                    Output::course_info(
                        &course.title,
                        course.instructor.as_deref(),
                        course.lessons.len(),
                    );
                }

                let total_lessons: usize = courses.iter().map(|c| c.lessons.len()).sum();
                println!();
                Output::kv("Total courses", &courses.len().to_string());
                Output::kv("Total lessons", &total_lessons.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
