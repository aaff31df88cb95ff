//! Semantic index over the course catalog and course content.
//!
//! [`SearchIndex`] is the capability the tools depend on. [`VectorStore`]
//! implements it on top of an [`Embedder`] and a [`CourseStore`] backend.

mod memory;
mod sqlite;

pub use memory::MemoryCourseStore;
pub use sqlite::SqliteCourseStore;

use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::models::{ContentChunk, Course};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Metadata stored alongside each content passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u32,
}

/// A single ranked passage.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Passage text.
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Ranked passages returned by a search, closest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Metadata filter applied to content search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ChunkFilter {
    /// Build a filter from a resolved course title and optional lesson number.
    pub fn new(course_title: Option<String>, lesson_number: Option<u32>) -> Self {
        Self {
            course_title,
            lesson_number,
        }
    }

    /// Whether a passage satisfies every constraint of this filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        let course_ok = self
            .course_title
            .as_ref()
            .map_or(true, |title| &metadata.course_title == title);
        let lesson_ok = self
            .lesson_number
            .map_or(true, |n| metadata.lesson_number == Some(n));
        course_ok && lesson_ok
    }
}

/// Search capability consumed by the assistant's tools.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Search course content, optionally restricted to a course (fuzzy name)
    /// and/or a lesson number.
    ///
    /// Fails with [`SyllabusError::CourseNotFound`] when the course name
    /// resolves to nothing and [`SyllabusError::Search`] on backend failure.
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults>;

    /// Deep link of a lesson, if the course and lesson exist and have one.
    async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>>;

    /// Every course in the catalog with its lessons.
    async fn get_all_course_metadata(&self) -> Result<Vec<Course>>;
}

/// Storage backend for catalog entries and passages with their embeddings.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Insert or replace a catalog entry.
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()>;

    /// Append passages. `embeddings` is parallel to `chunks`.
    async fn insert_chunks(
        &self,
        chunks: &[ContentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize>;

    /// Catalog entries closest to the embedding, with their similarity scores.
    async fn nearest_courses(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Course, f32)>>;

    /// Passages matching the filter, closest first.
    async fn search_chunks(
        &self,
        embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Catalog entry by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// Every catalog entry, ordered by title.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Remove all catalog entries and passages.
    async fn clear(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits closest first and keep at most `limit`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}

/// Embedding-backed implementation of [`SearchIndex`].
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CourseStore>,
    max_results: usize,
}

impl VectorStore {
    /// Create a vector store returning at most `max_results` passages per search.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CourseStore>,
        max_results: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            max_results,
        }
    }

    /// Resolve a user-supplied course name to the closest catalog title.
    #[instrument(skip(self))]
    pub async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>> {
        let embedding = self.embedder.embed(course_name).await?;
        let nearest = self.store.nearest_courses(&embedding, 1).await?;
        let resolved = nearest.into_iter().next().map(|(course, _)| course.title);
        debug!("Resolved course name {:?} to {:?}", course_name, resolved);
        Ok(resolved)
    }

    /// Add a course to the catalog.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let embedding = self.embedder.embed(&course.title).await?;
        self.store.upsert_course(course, &embedding).await?;
        info!("Added course metadata for {}", course.title);
        Ok(())
    }

    /// Add course passages to the content collection.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_course_content(&self, chunks: &[ContentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(SyllabusError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        self.store.insert_chunks(chunks, &embeddings).await
    }

    /// Titles of every course in the catalog.
    pub async fn get_existing_course_titles(&self) -> Result<Vec<String>> {
        let courses = self.store.list_courses().await?;
        Ok(courses.into_iter().map(|c| c.title).collect())
    }

    /// Number of courses in the catalog.
    pub async fn get_course_count(&self) -> Result<usize> {
        Ok(self.store.list_courses().await?.len())
    }

    /// Remove all catalog entries and passages.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.store.clear().await?;
        info!("Cleared all course data");
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for VectorStore {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => return Err(SyllabusError::CourseNotFound(name.to_string())),
                Err(e) => return Err(SyllabusError::Search(e.to_string())),
            },
            None => None,
        };

        let filter = ChunkFilter::new(course_title, lesson_number);

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| SyllabusError::Search(e.to_string()))?;

        let hits = self
            .store
            .search_chunks(&embedding, &filter, self.max_results)
            .await
            .map_err(|e| SyllabusError::Search(e.to_string()))?;

        debug!("Search returned {} hits", hits.len());
        Ok(SearchResults::new(hits))
    }

    async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>> {
        let course = self.store.get_course(course_title).await?;
        Ok(course
            .and_then(|c| c.lesson(lesson_number).cloned())
            .and_then(|l| l.lesson_link))
    }

    async fn get_all_course_metadata(&self) -> Result<Vec<Course>> {
        self.store.list_courses().await
    }
}
