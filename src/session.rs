//! Per-user conversation memory across queries.

use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Keeps the most recent exchanges of each session.
#[derive(Debug)]
pub struct SessionManager {
    max_history: usize,
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl SessionManager {
    /// `max_history` is the number of exchanges (question and answer pairs) kept.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Message>>>> {
        self.sessions
            .lock()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }

    /// Create an empty session and return its id.
    pub fn create_session(&self) -> Result<String> {
        let id = format!("session_{}", Uuid::new_v4());
        self.lock()?.insert(id.clone(), Vec::new());
        debug!("Created session {}", id);
        Ok(id)
    }

    /// Append a message, creating the session if needed.
    pub fn add_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let messages = sessions.entry(session_id.to_string()).or_default();
        messages.push(Message {
            role,
            content: content.to_string(),
        });

        let limit = self.max_history * 2;
        if messages.len() > limit {
            let excess = messages.len() - limit;
            messages.drain(..excess);
        }
        Ok(())
    }

    /// Record a question and its answer.
    pub fn add_exchange(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        self.add_message(session_id, Role::User, question)?;
        self.add_message(session_id, Role::Assistant, answer)
    }

    /// The session's messages as `User: ...` / `Assistant: ...` lines, or
    /// `None` for an unknown or empty session.
    pub fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>> {
        let sessions = self.lock()?;
        let history = sessions
            .get(session_id)
            .filter(|messages| !messages.is_empty())
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| format!("{}: {}", m.role.label(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        Ok(history)
    }

    /// Forget a session's messages.
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        if let Some(messages) = self.lock()?.get_mut(session_id) {
            messages.clear();
        }
        Ok(())
    }
}
