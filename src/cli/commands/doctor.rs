//! Doctor command - verify configuration and API access.

use crate::cli::Output;
use crate::config::{LlmProvider, Settings};
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Syllabus Doctor");
    println!();

    let sections = [
        ("API Keys", check_api_keys(settings)),
        ("Storage", check_storage(settings)),
        ("Configuration", vec![check_config_file(), check_rounds(settings)]),
    ];

    let mut errors = 0;
    let mut warnings = 0;

    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Syllabus.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Syllabus is ready to use.");
    }

    Ok(())
}

fn check_api_keys(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![check_key(
        "OPENAI_API_KEY",
        std::env::var("OPENAI_API_KEY").ok(),
        "needed for embeddings",
    )];
    if settings.llm.provider == LlmProvider::Anthropic {
        results.push(check_key(
            "ANTHROPIC_API_KEY",
            std::env::var("ANTHROPIC_API_KEY").ok(),
            "needed for answers",
        ));
    }
    results
}

/// Check a key value without echoing it back in full.
fn check_key(name: &str, value: Option<String>, purpose: &str) -> CheckResult {
    let hint = format!("Set with: export {}='...' ({})", name, purpose);
    match value {
        Some(key) if key.is_empty() => CheckResult::error(name, "empty", &hint),
        Some(key) if key.chars().count() > 12 => {
            let chars: Vec<char> = key.chars().collect();
            let head: String = chars[..7].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            CheckResult::ok(name, &format!("configured ({}...{})", head, tail))
        }
        Some(_) => CheckResult::warning(name, "set but looks too short", &hint),
        None => CheckResult::error(name, "not set", &hint),
    }
}

fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Course index",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Course index",
            &format!("{} (not created yet)", db_path.display()),
            "Run: syllabus ingest <folder>",
        ));
    }

    results
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: syllabus config edit",
        )
    }
}

fn check_rounds(settings: &Settings) -> CheckResult {
    let rounds = settings.llm.max_rounds;
    if rounds == 0 {
        CheckResult::warning(
            "Tool rounds",
            "0 (answers without searching)",
            "Set llm.max_rounds to 1 or more",
        )
    } else {
        CheckResult::ok("Tool rounds", &rounds.to_string())
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
