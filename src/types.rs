//! Shared conversation types.
//!
//! Prior turns arrive from the persistence layer as stored messages; the
//! workflow only ever sees them flattened into alternating user /
//! assistant-summary text blocks.

use serde::{Deserialize, Serialize};

/// Role of a stored conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A persisted conversation message, as handed over by the caller.
///
/// Assistant messages carry a short summary alongside the full content;
/// the history fed to the models uses the summary to keep prompts small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl StoredMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            summary: None,
        }
    }

    pub fn assistant(content: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            summary: Some(summary.into()),
        }
    }
}

/// Flatten stored messages into the text-block history format the prompt
/// templates expect. Assistant turns contribute their summary; if one is
/// missing the full content is used instead.
pub fn format_history(messages: &[StoredMessage]) -> String {
    let mut history = String::new();
    for message in messages {
        match message.role {
            Role::User => {
                history.push_str(&format!("\nuser: {}\n", message.content));
            }
            Role::Assistant => {
                let text = message.summary.as_deref().unwrap_or(&message.content);
                history.push_str(&format!("\nassistant summary: {}\n", text));
            }
        }
    }
    history
}
