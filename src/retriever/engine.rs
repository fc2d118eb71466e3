//! Two-stage child/parent retrieval engine.
//!
//! Stage one runs a filtered similarity search over the three corpus
//! partitions independently; stage two deduplicates the parent ids the
//! child hits carry and resolves them to formatted program blocks.
//!
//! `multiple_invoke` never fails: a broken partition degrades to empty
//! results for that partition, and any engine-internal failure degrades to
//! an empty output. A failing specialization index must not block general
//! results.

use crate::config::Config;
use crate::errors::{AdvisorError, Result};
use crate::retriever::embedding::QueryEmbedder;
use crate::retriever::filter::RetrieverConfig;
use crate::retriever::parent::ParentStore;
use crate::retriever::vector::{ChildHit, PartitionIndex};
use async_trait::async_trait;
use qdrant_client::client::QdrantClient;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one retrieval pass: formatted parent blocks plus the ids they
/// were resolved from, in hit order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutput {
    pub content: Vec<String>,
    pub ids: Vec<String>,
}

/// Retrieval collaborator boundary. Implementations apply the supplied
/// search parameters verbatim and must never raise.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn multiple_invoke(&self, config: &RetrieverConfig) -> RetrievalOutput;
}

/// Three-partition child search with parent-document resolution
pub struct ChildParentRetriever {
    embedder: Arc<QueryEmbedder>,
    partitions: Vec<PartitionIndex>,
    parents: ParentStore,
}

impl std::fmt::Debug for ChildParentRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildParentRetriever").finish_non_exhaustive()
    }
}

impl ChildParentRetriever {
    /// Connect to the vector store and load the heavy backing resources
    /// (embedding model, parent map). Missing configuration fails loudly
    /// here; this is the deployment-error boundary.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate_for_retrieval()?;

        let store = &config.vectorstore;
        let client = Arc::new(
            QdrantClient::from_url(&store.url)
                .build()
                .map_err(|e| AdvisorError::RetrievalError(format!("qdrant client: {}", e)))?,
        );

        let partitions = vec![
            PartitionIndex::new(client.clone(), store.general_collection.clone()),
            PartitionIndex::new(client.clone(), store.specialized_collection.clone()),
            PartitionIndex::new(client, store.specialization_collection.clone()),
        ];

        let parents = ParentStore::load(Path::new(&store.parent_documents))?;
        info!(records = parents.len(), "parent document store loaded");

        let model_id = store.embedding_model.clone();
        let embedder = tokio::task::spawn_blocking(move || QueryEmbedder::load(&model_id))
            .await
            .map_err(|e| AdvisorError::RetrievalError(format!("embedder load task: {}", e)))??;

        Ok(Self {
            embedder: Arc::new(embedder),
            partitions,
            parents,
        })
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_query(&query))
            .await
            .map_err(|e| AdvisorError::RetrievalError(format!("embedding task: {}", e)))?
            .map_err(AdvisorError::from)
    }

    async fn search_partitions(&self, vector: &[f32], config: &RetrieverConfig) -> Vec<ChildHit> {
        let mut hits = Vec::new();
        for partition in &self.partitions {
            match partition.search(vector, &config.search_params).await {
                Ok(partition_hits) => hits.extend(partition_hits),
                Err(e) => {
                    // Isolated per partition by design
                    warn!(
                        collection = partition.collection(),
                        error = %e,
                        "partition search failed, continuing without it"
                    );
                }
            }
        }
        hits
    }
}

#[async_trait]
impl DocumentRetriever for ChildParentRetriever {
    async fn multiple_invoke(&self, config: &RetrieverConfig) -> RetrievalOutput {
        let vector = match self.embed(&config.rewritten_query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "query embedding failed, returning empty retrieval");
                return RetrievalOutput::default();
            }
        };

        let hits = self.search_partitions(&vector, config).await;
        let ids = dedupe_parent_ids(hits);
        let content = self.parents.resolve(&ids);
        RetrievalOutput { content, ids }
    }
}

/// Collapse cross-partition hits to unique parent ids, keeping first-hit
/// order. The same parent often surfaces from more than one partition.
fn dedupe_parent_ids(hits: Vec<ChildHit>) -> Vec<String> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.program_id.clone()))
        .map(|hit| hit.program_id)
        .collect()
}
