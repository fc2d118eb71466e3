//! Deployment configuration.
//!
//! Loaded from `~/.counselbot/config.toml` (created with defaults on first
//! run), with environment-variable overrides for the values that differ per
//! deployment. Retrieval tunables (result count headroom, price tolerance
//! bands) live here rather than as hard-coded constants.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vectorstore: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Per-stage model binding. Classification and extraction run on cheaper
/// models; grounded generation gets the higher-capability one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub rewrite_model: String,
    pub classifier_model: String,
    pub extractor_model: String,
    pub chat_model: String,
    pub grounded_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            rewrite_model: "qwen2.5:7b-instruct".to_string(),
            classifier_model: "qwen2.5:3b-instruct".to_string(),
            extractor_model: "qwen2.5:3b-instruct".to_string(),
            chat_model: "qwen2.5:7b-instruct".to_string(),
            grounded_model: "qwen2.5:14b-instruct".to_string(),
        }
    }
}

/// Vector-index and parent-document locations.
///
/// The three collections are the logical partitions of the corpus:
/// general-track schools, specialized-track schools, and specializations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub general_collection: String,
    pub specialized_collection: String,
    pub specialization_collection: String,
    /// Offline-built id -> full program record JSON map
    pub parent_documents: String,
    pub embedding_model: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            general_collection: "grande_ecole".to_string(),
            specialized_collection: "ecole_specialisee".to_string(),
            specialization_collection: "specialization".to_string(),
            parent_documents: String::new(),
            embedding_model: "nomic-ai/nomic-embed-text-v1.5".to_string(),
        }
    }
}

/// Retrieval tunables. The price bands pad approximate natural-language
/// price constraints toward recall; the headroom requests one extra result
/// for downstream de-duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub k: usize,
    pub k_headroom: usize,
    pub price_band_lower: i64,
    pub price_band_upper: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 14,
            k_headroom: 1,
            price_band_lower: 1000,
            price_band_upper: 2000,
        }
    }
}

impl Config {
    /// Load configuration from file, creating a default file if missing,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".counselbot").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COUNSELBOT_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Ok(url) = std::env::var("COUNSELBOT_QDRANT_URL") {
            self.vectorstore.url = url;
        }
        if let Ok(path) = std::env::var("COUNSELBOT_PARENT_DOCUMENTS") {
            self.vectorstore.parent_documents = path;
        }
        if let Ok(name) = std::env::var("COUNSELBOT_EMBEDDING_MODEL") {
            self.vectorstore.embedding_model = name;
        }
    }

    /// Validate the fields retrieval cannot run without. Called at the
    /// retrieval boundary; a missing value here is a deployment error and
    /// must fail loudly instead of degrading.
    pub fn validate_for_retrieval(&self) -> crate::errors::Result<()> {
        if self.vectorstore.parent_documents.is_empty() {
            return Err(crate::errors::AdvisorError::ConfigError(
                "vectorstore.parent_documents is not configured".to_string(),
            ));
        }
        if self.vectorstore.url.is_empty() {
            return Err(crate::errors::AdvisorError::ConfigError(
                "vectorstore.url is not configured".to_string(),
            ));
        }
        if self.vectorstore.embedding_model.is_empty() {
            return Err(crate::errors::AdvisorError::ConfigError(
                "vectorstore.embedding_model is not configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retrieval_tunables() {
        let config = Config::default();
        assert_eq!(config.retrieval.k, 14);
        assert_eq!(config.retrieval.k_headroom, 1);
        assert_eq!(config.retrieval.price_band_lower, 1000);
        assert_eq!(config.retrieval.price_band_upper, 2000);
    }

    #[test]
    fn test_validate_for_retrieval_requires_parent_documents() {
        let config = Config::default();
        let err = config.validate_for_retrieval().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("parent_documents"));
    }

    #[test]
    fn test_validate_for_retrieval_passes_when_configured() {
        let mut config = Config::default();
        config.vectorstore.parent_documents = "/data/parents.json".to_string();
        assert!(config.validate_for_retrieval().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.llm.base_url, config.llm.base_url);
        assert_eq!(
            deserialized.vectorstore.general_collection,
            config.vectorstore.general_collection
        );
    }
}
