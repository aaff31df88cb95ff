//! SQLite-based course store.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Catalog entries and passages live in separate tables.

use super::{cosine_similarity, rank_hits, ChunkFilter, ChunkMetadata, CourseStore, SearchHit};
use crate::error::{Result, SyllabusError};
use crate::models::{ContentChunk, Course, Lesson};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS courses (
        title TEXT PRIMARY KEY,
        instructor TEXT,
        course_link TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        course_title TEXT NOT NULL,
        lesson_number INTEGER,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_title);
"#;

/// SQLite-based course store.
pub struct SqliteCourseStore {
    conn: Mutex<Connection>,
}

impl SqliteCourseStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_course(
        title: String,
        instructor: Option<String>,
        course_link: Option<String>,
        lessons_json: &str,
    ) -> Result<Course> {
        let lessons: Vec<Lesson> = serde_json::from_str(lessons_json).map_err(|e| {
            SyllabusError::VectorStore(format!("Corrupt lesson list for '{}': {}", title, e))
        })?;

        Ok(Course {
            title,
            course_link,
            instructor,
            lessons,
        })
    }
}

#[async_trait]
impl CourseStore for SqliteCourseStore {
    #[instrument(skip(self, course, embedding), fields(title = %course.title))]
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let conn = self.lock()?;
        let lessons_json = serde_json::to_string(&course.lessons)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO courses
            (title, instructor, course_link, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                course.title,
                course.instructor,
                course.course_link,
                lessons_json,
                Self::embedding_to_bytes(embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Upserted course {}", course.title);
        Ok(())
    }

    #[instrument(skip(self, chunks, embeddings))]
    async fn insert_chunks(
        &self,
        chunks: &[ContentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                r#"
                INSERT INTO chunks (course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index,
                    chunk.content,
                    Self::embedding_to_bytes(embedding),
                ],
            )?;
            inserted += 1;
        }

        tx.commit()?;
        info!("Inserted {} chunks", inserted);
        Ok(inserted)
    }

    #[instrument(skip(self, embedding))]
    async fn nearest_courses(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Course, f32)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT title, instructor, course_link, lessons_json, embedding FROM courses")?;

        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let instructor: Option<String> = row.get(1)?;
            let course_link: Option<String> = row.get(2)?;
            let lessons_json: String = row.get(3)?;
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((title, instructor, course_link, lessons_json, embedding_bytes))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (title, instructor, course_link, lessons_json, embedding_bytes) = row?;
            let score = cosine_similarity(embedding, &Self::bytes_to_embedding(&embedding_bytes));
            let course = Self::row_to_course(title, instructor, course_link, &lessons_json)?;
            scored.push((course, score));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    #[instrument(skip(self, embedding))]
    async fn search_chunks(
        &self,
        embedding: &[f32],
        filter: &ChunkFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, lesson_number, chunk_index, content, embedding
            FROM chunks
            WHERE (?1 IS NULL OR course_title = ?1)
              AND (?2 IS NULL OR lesson_number = ?2)
            "#,
        )?;

        let rows = stmt.query_map(params![filter.course_title, filter.lesson_number], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                ChunkMetadata {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: row.get(2)?,
                },
                row.get::<_, String>(3)?,
                embedding_bytes,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (metadata, content, embedding_bytes) = row?;
            let similarity =
                cosine_similarity(embedding, &Self::bytes_to_embedding(&embedding_bytes));
            hits.push(SearchHit {
                content,
                metadata,
                distance: 1.0 - similarity,
            });
        }

        let hits = rank_hits(hits, limit);
        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;

        let row = conn.query_row(
            "SELECT title, instructor, course_link, lessons_json FROM courses WHERE title = ?1",
            params![title],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        match row {
            Ok((title, instructor, course_link, lessons_json)) => Ok(Some(Self::row_to_course(
                title,
                instructor,
                course_link,
                &lessons_json,
            )?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT title, instructor, course_link, lessons_json FROM courses ORDER BY title")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut courses = Vec::new();
        for row in rows {
            let (title, instructor, course_link, lessons_json) = row?;
            courses.push(Self::row_to_course(title, instructor, course_link, &lessons_json)?);
        }
        Ok(courses)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM courses;")?;
        info!("Cleared course store");
        Ok(())
    }
}
