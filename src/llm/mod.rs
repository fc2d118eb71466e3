//! Generative-model collaborator interface.
//!
//! The core treats text generation as an opaque capability: blocking
//! completion, streaming completion, and JSON-mode completion for
//! structured extraction. Everything upstream programs against the
//! [`LanguageModel`] trait so tests can substitute a mock.

pub mod ollama;

pub use ollama::OllamaChat;

use crate::errors::{AdvisorError, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role tag for a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a model request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Stream of text deltas from a generating model
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Opaque text-generation capability.
///
/// `invoke_json` constrains the model to emit a JSON object; callers parse
/// it into a declared schema with [`parse_structured`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete and return the full response text
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Complete in JSON mode (structured-output extraction)
    async fn invoke_json(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Complete token-by-token
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;
}

/// Parse a structured-output response into its declared schema.
///
/// Models occasionally wrap JSON in a markdown code fence even in JSON
/// mode; strip it before parsing.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_start_matches('\n'))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| AdvisorError::StructuredOutputError(format!("{}: {}", e, body.trim())))
}

/// Per-stage model binding.
///
/// Classification and extraction run on cheaper, faster models; grounded
/// generation gets the higher-capability one.
#[derive(Clone)]
pub struct ModelSet {
    pub rewriter: Arc<dyn LanguageModel>,
    pub classifier: Arc<dyn LanguageModel>,
    pub extractor: Arc<dyn LanguageModel>,
    pub conversational: Arc<dyn LanguageModel>,
    pub grounded: Arc<dyn LanguageModel>,
}

impl ModelSet {
    /// Build the stage bindings from configuration, one Ollama client each.
    pub fn from_config(config: &crate::config::LlmConfig) -> Result<Self> {
        Ok(Self {
            rewriter: Arc::new(OllamaChat::new(&config.base_url, &config.rewrite_model)?),
            classifier: Arc::new(OllamaChat::new(&config.base_url, &config.classifier_model)?),
            extractor: Arc::new(OllamaChat::new(&config.base_url, &config.extractor_model)?),
            conversational: Arc::new(OllamaChat::new(&config.base_url, &config.chat_model)?),
            grounded: Arc::new(OllamaChat::new(&config.base_url, &config.grounded_model)?),
        })
    }

    /// Bind every stage to the same model (tests, single-model deployments)
    pub fn uniform(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            rewriter: model.clone(),
            classifier: model.clone(),
            extractor: model.clone(),
            conversational: model.clone(),
            grounded: model,
        }
    }
}
