//! Pre-flight checks before expensive operations.
//!
//! Validates that API keys are available before starting operations that
//! would otherwise fail midway.

use crate::config::{LlmProvider, Settings};
use crate::error::{Result, SyllabusError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Indexing embeds chunks.
    Ingest,
    /// Searching embeds the query.
    Search,
    /// Asking questions embeds and calls the language model.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    for key in required_keys(operation, &settings.llm.provider) {
        check_api_key(key)?;
    }
    Ok(())
}

/// Environment variables an operation needs.
fn required_keys(operation: Operation, provider: &LlmProvider) -> Vec<&'static str> {
    let mut keys = vec!["OPENAI_API_KEY"];
    if let Operation::Ask = operation {
        if *provider == LlmProvider::Anthropic {
            keys.push("ANTHROPIC_API_KEY");
        }
    }
    keys
}

fn check_api_key(name: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SyllabusError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        Err(_) => Err(SyllabusError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_keys() {
        assert_eq!(
            required_keys(Operation::Search, &LlmProvider::Anthropic),
            vec!["OPENAI_API_KEY"]
        );
        assert_eq!(
            required_keys(Operation::Ask, &LlmProvider::Anthropic),
            vec!["OPENAI_API_KEY", "ANTHROPIC_API_KEY"]
        );
        assert_eq!(
            required_keys(Operation::Ask, &LlmProvider::OpenAI),
            vec!["OPENAI_API_KEY"]
        );
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = check_api_key("SYLLABUS_TEST_KEY_THAT_IS_NEVER_SET");
        assert!(matches!(result, Err(SyllabusError::Config(_))));
    }
}
