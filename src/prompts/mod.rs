//! Prompt collaborator: named, role-tagged templates.
//!
//! Every stage prompt ships as a built-in default and can be overridden
//! from a directory of toml files at startup. The store is populated once
//! and read-only afterwards; a lookup miss is an error, not a fallback.

mod defaults;

use crate::errors::{AdvisorError, Result};
use crate::llm::{ChatMessage, ChatRole};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{info, warn};

/// A role-tagged message sequence with `{name}` substitution slots
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    messages: Vec<(ChatRole, String)>,
}

impl PromptTemplate {
    pub fn new(messages: Vec<(ChatRole, String)>) -> Self {
        Self { messages }
    }

    /// Substitute named variables and produce the model request messages.
    /// Unknown slots are left verbatim; extra variables are ignored.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|(role, text)| {
                let mut content = text.clone();
                for (name, value) in vars {
                    content = content.replace(&format!("{{{}}}", name), value);
                }
                ChatMessage {
                    role: *role,
                    content,
                }
            })
            .collect()
    }
}

/// Named prompt registry, preloaded with the built-in stage prompts
pub struct PromptStore {
    templates: RwLock<HashMap<String, PromptTemplate>>,
}

impl PromptStore {
    /// Create a store holding the built-in defaults for every stage
    pub fn with_defaults() -> Self {
        let store = Self {
            templates: RwLock::new(HashMap::new()),
        };
        for (name, template) in defaults::builtin_prompts() {
            store.insert(name, template);
        }
        store
    }

    fn insert(&self, name: &str, template: PromptTemplate) {
        self.templates
            .write()
            .expect("prompt store lock poisoned")
            .insert(name.to_string(), template);
    }

    /// Look up a registered template by name
    pub fn get(&self, name: &str) -> Result<PromptTemplate> {
        self.templates
            .read()
            .expect("prompt store lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| AdvisorError::PromptNotFound(name.to_string()))
    }

    /// Names of all registered templates
    pub fn names(&self) -> Vec<String> {
        self.templates
            .read()
            .expect("prompt store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Load prompt overrides from a directory of toml files. A file that
    /// fails to parse is skipped with a warning; the built-in stays active.
    pub fn load_overrides(&self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            match toml::from_str::<PromptFile>(&contents) {
                Ok(file) => {
                    let template = PromptTemplate::new(
                        file.messages
                            .into_iter()
                            .map(|m| (m.role_tag(), m.content))
                            .collect(),
                    );
                    info!(prompt = %file.name, "loaded prompt override");
                    self.insert(&file.name, template);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparseable prompt file");
                }
            }
        }
        Ok(loaded)
    }
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    name: String,
    messages: Vec<PromptFileMessage>,
}

#[derive(Debug, Deserialize)]
struct PromptFileMessage {
    role: String,
    content: String,
}

impl PromptFileMessage {
    fn role_tag(&self) -> ChatRole {
        match self.role.as_str() {
            "system" => ChatRole::System,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }
}
