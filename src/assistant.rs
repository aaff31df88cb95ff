//! Course assistant facade.
//!
//! Wires configuration, the course index, the tools, the answer generator
//! and session memory together.

use crate::config::{Prompts, Settings};
use crate::document::DocumentProcessor;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generator::AnswerGenerator;
use crate::llm::{create_model, LanguageModel};
use crate::models::Course;
use crate::session::SessionManager;
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolRegistry};
use crate::vector_store::{CourseStore, SearchIndex, SqliteCourseStore, VectorStore};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// File extensions picked up when ingesting a folder.
const COURSE_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Answer to a query with the sources that informed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Catalog summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// The main entry point for asking questions and ingesting courses.
pub struct CourseAssistant {
    settings: Settings,
    prompts: Prompts,
    processor: DocumentProcessor,
    vector_store: Arc<VectorStore>,
    tools: ToolRegistry,
    generator: AnswerGenerator,
    sessions: SessionManager,
}

impl CourseAssistant {
    /// Create an assistant from settings, using the SQLite store, OpenAI
    /// embeddings and the configured language model.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);
        let store: Arc<dyn CourseStore> =
            Arc::new(SqliteCourseStore::new(&settings.sqlite_path())?);
        let model = create_model(&settings.llm)?;

        info!(
            "Using {} model {} with up to {} tool rounds",
            settings.llm.provider, settings.llm.model, settings.llm.max_rounds
        );

        Self::with_components(settings, prompts, embedder, store, model)
    }

    /// Create an assistant with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CourseStore>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        settings.validate()?;

        let vector_store = Arc::new(VectorStore::new(
            embedder,
            store,
            settings.vector_store.max_results,
        ));

        let index: Arc<dyn SearchIndex> = vector_store.clone();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CourseSearchTool::new(index.clone())))?;
        tools.register(Arc::new(CourseOutlineTool::new(index)))?;

        let generator = AnswerGenerator::new(model, prompts.system_prompt());
        let processor = DocumentProcessor::from_settings(&settings.chunking);
        let sessions = SessionManager::new(settings.session.max_history);

        Ok(Self {
            settings,
            prompts,
            processor,
            vector_store,
            tools,
            generator,
            sessions,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn vector_store(&self) -> Arc<VectorStore> {
        self.vector_store.clone()
    }

    /// Answer a question, optionally in the context of a session.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let prompt = self.prompts.query_prompt(query);

        let history = match session_id {
            Some(id) => self.sessions.get_conversation_history(id)?,
            None => None,
        };

        let definitions = self.tools.definitions();
        let mut session = self.tools.session();

        let outcome = self
            .generator
            .generate_answer(
                &prompt,
                history.as_deref(),
                Some(definitions.as_slice()),
                Some(&mut session),
                self.settings.llm.max_rounds,
            )
            .await;

        if !outcome.is_answer() {
            warn!("Query ended without an answer: {}", outcome);
        }
        let answer = outcome.into_text();

        let sources = session.get_last_sources();
        session.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer)?;
        }

        Ok(QueryResponse { answer, sources })
    }

    /// Parse and index a single course file.
    #[instrument(skip(self))]
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize)> {
        let (course, chunks) = self.processor.process_course_document(path)?;
        self.vector_store.add_course_metadata(&course).await?;
        let count = self.vector_store.add_course_content(&chunks).await?;
        Ok((course, count))
    }

    /// Index every course file in a folder, skipping courses already indexed.
    ///
    /// Returns the number of courses and chunks added. A missing folder adds nothing.
    #[instrument(skip(self))]
    pub async fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize)> {
        if !folder.is_dir() {
            warn!("Folder {} does not exist", folder.display());
            return Ok((0, 0));
        }

        if clear_existing {
            info!("Clearing existing course data");
            self.vector_store.clear_all_data().await?;
        }

        let mut existing: HashSet<String> = self
            .vector_store
            .get_existing_course_titles()
            .await?
            .into_iter()
            .collect();

        let mut paths: Vec<_> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_course_file(path))
            .collect();
        paths.sort();

        let mut total_courses = 0;
        let mut total_chunks = 0;

        for path in paths {
            let (course, chunks) = match self.processor.process_course_document(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if existing.contains(&course.title) {
                info!("Course already indexed: {}", course.title);
                continue;
            }

            self.vector_store.add_course_metadata(&course).await?;
            total_chunks += self.vector_store.add_course_content(&chunks).await?;
            total_courses += 1;

            info!("Added course {} ({} chunks)", course.title, chunks.len());
            existing.insert(course.title);
        }

        Ok((total_courses, total_chunks))
    }

    /// Number of courses and their titles.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.vector_store.get_existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

fn is_course_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| COURSE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
