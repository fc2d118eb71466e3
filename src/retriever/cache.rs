//! Process-wide retriever cache.
//!
//! The embedding model and the three vector-index connections take seconds
//! to initialize; the cache pays that cost on the first retrieval request
//! and serves every later request from the same read-only instance. There
//! is exactly one configuration per process, so the cache never evicts.

use crate::config::Config;
use crate::errors::Result;
use crate::retriever::engine::{ChildParentRetriever, DocumentRetriever, RetrievalOutput};
use crate::retriever::filter::RetrieverConfig;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Lazily-initialized shared retriever.
///
/// Construction validates the retrieval configuration so that deployment
/// errors surface immediately; the heavy resource loading itself is
/// deferred to the first request. Transient init failures (vector store
/// unreachable) degrade that request to an empty result and are retried on
/// the next one.
pub struct RetrieverCache {
    config: Config,
    cell: OnceCell<Arc<ChildParentRetriever>>,
}

impl std::fmt::Debug for RetrieverCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverCache").finish_non_exhaustive()
    }
}

impl RetrieverCache {
    pub fn new(config: Config) -> Result<Self> {
        config.validate_for_retrieval()?;
        if !Path::new(&config.vectorstore.parent_documents).exists() {
            return Err(crate::errors::AdvisorError::ConfigError(format!(
                "parent documents file does not exist: {}",
                config.vectorstore.parent_documents
            )));
        }

        Ok(Self {
            config,
            cell: OnceCell::new(),
        })
    }

    async fn retriever(&self) -> Result<Arc<ChildParentRetriever>> {
        self.cell
            .get_or_try_init(|| async {
                info!("initializing child/parent retriever (first request)");
                let start = Instant::now();
                let retriever = ChildParentRetriever::connect(&self.config).await?;
                info!(elapsed = ?start.elapsed(), "child/parent retriever cached");
                Ok(Arc::new(retriever))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl DocumentRetriever for RetrieverCache {
    async fn multiple_invoke(&self, config: &RetrieverConfig) -> RetrievalOutput {
        match self.retriever().await {
            Ok(retriever) => retriever.multiple_invoke(config).await,
            Err(e) => {
                error!(error = %e, "retriever initialization failed");
                RetrievalOutput::default()
            }
        }
    }
}
