//! In-memory course store.
//!
//! Useful for testing and small catalogs.

use super::{cosine_similarity, rank_hits, ChunkFilter, ChunkMetadata, CourseStore, SearchHit};
use crate::error::{Result, SyllabusError};
use crate::models::{ContentChunk, Course};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct StoredChunk {
    chunk: ContentChunk,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    courses: BTreeMap<String, (Course, Vec<f32>)>,
    chunks: Vec<StoredChunk>,
}

/// In-memory course store.
#[derive(Default)]
pub struct MemoryCourseStore {
    inner: RwLock<Inner>,
}

impl MemoryCourseStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .courses
            .insert(course.title.clone(), (course.clone(), embedding.to_vec()));
        Ok(())
    }

    async fn insert_chunks(
        &self,
        chunks: &[ContentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let mut inner = self.write()?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            inner.chunks.push(StoredChunk {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
            });
        }
        Ok(chunks.len().min(embeddings.len()))
    }

    async fn nearest_courses(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Course, f32)>> {
        let inner = self.read()?;

        let mut scored: Vec<(Course, f32)> = inner
            .courses
            .values()
            .map(|(course, course_embedding)| {
                (course.clone(), cosine_similarity(embedding, course_embedding))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn search_chunks(
        &self,
        embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let inner = self.read()?;

        let hits: Vec<SearchHit> = inner
            .chunks
            .iter()
            .filter_map(|stored| {
                let metadata = ChunkMetadata {
                    course_title: stored.chunk.course_title.clone(),
                    lesson_number: stored.chunk.lesson_number,
                    chunk_index: stored.chunk.chunk_index,
                };
                filter.matches(&metadata).then(|| SearchHit {
                    content: stored.chunk.content.clone(),
                    metadata,
                    distance: 1.0 - cosine_similarity(embedding, &stored.embedding),
                })
            })
            .collect();

        Ok(rank_hits(hits, limit))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let inner = self.read()?;
        Ok(inner.courses.get(title).map(|(course, _)| course.clone()))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let inner = self.read()?;
        Ok(inner.courses.values().map(|(course, _)| course.clone()).collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.courses.clear();
        inner.chunks.clear();
        Ok(())
    }
}
