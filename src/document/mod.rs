//! Course document parsing and chunking.
//!
//! A course file starts with a small header followed by lesson sections:
//!
//! ```text
//! Course Title: Building MCP Servers
//! Course Link: https://example.com/mcp
//! Course Instructor: Ada Lovelace
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/mcp/0
//! Lesson text...
//! ```

mod chunker;

pub use chunker::SentenceChunker;

use crate::config::ChunkingSettings;
use crate::error::{Result, SyllabusError};
use crate::models::{ContentChunk, Course, Lesson};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case(key)
        .then(|| value.trim())
}

/// Matches "Lesson 3: Title", case-insensitive.
static LESSON_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.+)$").expect("Invalid lesson marker regex")
});

/// Turns course files into a catalog entry plus content chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    chunker: SentenceChunker,
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(SentenceChunker::default())
    }
}

struct LessonSection {
    number: u32,
    title: String,
    link: Option<String>,
    body: Vec<String>,
}

impl DocumentProcessor {
    pub fn new(chunker: SentenceChunker) -> Self {
        Self { chunker }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(SentenceChunker::from_settings(settings))
    }

    /// Read and parse a course file. The file stem is used as the title when
    /// the header has none.
    #[instrument(skip(self))]
    pub fn process_course_document(&self, path: &Path) -> Result<(Course, Vec<ContentChunk>)> {
        let text = std::fs::read_to_string(path)?;
        let fallback_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SyllabusError::Document(format!("Invalid file name: {}", path.display()))
            })?;

        let (course, chunks) = self.parse_course(&text, &fallback_title);
        info!(
            "Parsed course '{}' with {} lessons and {} chunks",
            course.title,
            course.lessons.len(),
            chunks.len()
        );
        Ok((course, chunks))
    }

    /// Parse course text.
    pub fn parse_course(&self, text: &str, fallback_title: &str) -> (Course, Vec<ContentChunk>) {
        let mut course = Course::new(fallback_title);
        let mut preamble: Vec<String> = Vec::new();
        let mut sections: Vec<LessonSection> = Vec::new();
        let mut in_header = true;

        for line in text.lines() {
            let trimmed = line.trim();

            if in_header {
                if let Some(title) = header_value(trimmed, "Course Title") {
                    if !title.is_empty() {
                        course.title = title.to_string();
                    }
                    continue;
                }
                if let Some(link) = header_value(trimmed, "Course Link") {
                    course.course_link = (!link.is_empty()).then(|| link.to_string());
                    continue;
                }
                if let Some(instructor) = header_value(trimmed, "Course Instructor") {
                    course.instructor = (!instructor.is_empty()).then(|| instructor.to_string());
                    continue;
                }
            }

            if let Some(caps) = LESSON_MARKER.captures(trimmed) {
                in_header = false;
                if let Ok(number) = caps[1].parse::<u32>() {
                    sections.push(LessonSection {
                        number,
                        title: caps[2].trim().to_string(),
                        link: None,
                        body: Vec::new(),
                    });
                    continue;
                }
            }

            match sections.last_mut() {
                Some(section) => {
                    if section.body.is_empty() && section.link.is_none() {
                        if let Some(link) = header_value(trimmed, "Lesson Link") {
                            section.link = Some(link.to_string());
                            continue;
                        }
                    }
                    section.body.push(line.to_string());
                }
                None => {
                    if !trimmed.is_empty() {
                        in_header = false;
                    }
                    preamble.push(line.to_string());
                }
            }
        }

        let mut chunks = Vec::new();
        let mut chunk_index = 0u32;

        if sections.is_empty() {
            for content in self.chunker.chunk(&preamble.join("\n")) {
                chunks.push(ContentChunk {
                    content,
                    course_title: course.title.clone(),
                    lesson_number: None,
                    chunk_index,
                });
                chunk_index += 1;
            }
        }

        for section in sections {
            course
                .lessons
                .push(Lesson::new(section.number, section.title, section.link));

            for (i, text) in self.chunker.chunk(&section.body.join("\n")).into_iter().enumerate() {
                let content = if i == 0 {
                    format!("Lesson {} content: {}", section.number, text)
                } else {
                    text
                };
                chunks.push(ContentChunk {
                    content,
                    course_title: course.title.clone(),
                    lesson_number: Some(section.number),
                    chunk_index,
                });
                chunk_index += 1;
            }
        }

        debug!("Built {} chunks for '{}'", chunks.len(), course.title);
        (course, chunks)
    }
}
