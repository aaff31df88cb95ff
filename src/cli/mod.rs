//! CLI module for Syllabus.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Syllabus - Course Materials Assistant
///
/// Ask questions about your course materials. Answers are grounded in lesson
/// content found by searching the indexed catalog.
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Index all course documents (.txt, .md) in a folder
    Ingest {
        /// Folder containing course documents
        path: String,

        /// Clear the existing catalog before indexing
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about your courses
    Ask {
        /// The question to ask
        question: String,

        /// Maximum number of tool-calling rounds
        #[arg(short, long)]
        rounds: Option<usize>,
    },

    /// Start an interactive chat session
    Chat {
        /// Maximum number of tool-calling rounds per question
        #[arg(short, long)]
        rounds: Option<usize>,
    },

    /// Search lesson content directly, without the language model
    Search {
        /// Search query
        query: String,

        /// Course name (partial matches work)
        #[arg(long)]
        course: Option<String>,

        /// Lesson number
        #[arg(short, long)]
        lesson: Option<u32>,
    },

    /// Show a course outline with its lessons
    Outline {
        /// Course title or partial name
        course: String,
    },

    /// List indexed courses
    Courses,

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Folder of course documents to index on startup
        #[arg(long)]
        docs: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
