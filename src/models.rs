//! Course catalog and content entities.

use serde::{Deserialize, Serialize};

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number, unique within its course.
    pub lesson_number: u32,
    /// Lesson title.
    #[serde(rename = "lesson_title")]
    pub title: String,
    /// Deep link to the lesson, if the source document has one.
    #[serde(default)]
    pub lesson_link: Option<String>,
}

impl Lesson {
    pub fn new(lesson_number: u32, title: impl Into<String>, lesson_link: Option<String>) -> Self {
        Self {
            lesson_number,
            title: title.into(),
            lesson_link,
        }
    }
}

/// A course and its ordered lesson list. The title is the course's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default)]
    pub course_link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Find a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

/// A searchable passage of course text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Passage text.
    pub content: String,
    /// Title of the owning course.
    pub course_title: String,
    /// Lesson the passage belongs to, if any.
    pub lesson_number: Option<u32>,
    /// Position of the passage within its course.
    pub chunk_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_lookup() {
        let mut course = Course::new("Sample Course");
        course.lessons.push(Lesson::new(1, "Introduction", None));
        course
            .lessons
            .push(Lesson::new(2, "Advanced Topics", Some("https://example.com/l2".into())));

        assert_eq!(course.lesson(2).unwrap().title, "Advanced Topics");
        assert!(course.lesson(3).is_none());
    }

    #[test]
    fn test_lesson_serializes_with_lesson_title_key() {
        let lesson = Lesson::new(1, "Intro", None);
        let json = serde_json::to_value(&lesson).unwrap();
        assert_eq!(json["lesson_title"], "Intro");
        assert_eq!(json["lesson_number"], 1);
    }
}
