//! Syllabus - Course Materials Assistant
//!
//! A CLI and HTTP service that answers questions about course materials by
//! letting a language model call search and outline tools over an indexed
//! course catalog.
//!
//! # Overview
//!
//! Syllabus allows you to:
//! - Ingest course documents into a searchable catalog
//! - Ask questions and get answers grounded in lesson content, with sources
//! - Look up course outlines with lesson lists and links
//! - Chat with per-session conversation memory
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `document` - Course file parsing and sentence chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Course catalog and chunk index
//! - `tools` - Model-callable tools and the tool registry
//! - `llm` - Language model abstraction (Anthropic, OpenAI)
//! - `generator` - Multi-round tool-calling answer loop
//! - `session` - Conversation memory
//! - `assistant` - Facade wiring everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus::assistant::CourseAssistant;
//! use syllabus::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let assistant = CourseAssistant::new(settings)?;
//!
//!     let (courses, chunks) = assistant
//!         .add_course_folder(std::path::Path::new("docs"), false)
//!         .await?;
//!     println!("Indexed {} courses ({} chunks)", courses, chunks);
//!
//!     let response = assistant.query("What does lesson 1 cover?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod assistant;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod llm;
pub mod models;
pub mod openai;
pub mod session;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, SyllabusError};
