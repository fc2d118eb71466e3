//! Per-partition vector index access.
//!
//! Each logical partition of the corpus (general-track, specialized-track,
//! specialization-track) is one qdrant collection of child documents. A
//! child document's payload carries the parent `program_id` the engine
//! resolves afterwards.

use crate::errors::{AdvisorError, Result};
use crate::retriever::filter::SearchParams;
use qdrant_client::client::QdrantClient;
use qdrant_client::qdrant::{
    with_payload_selector::SelectorOptions, SearchPoints, WithPayloadSelector,
};
use std::sync::Arc;

/// A child-document hit from one partition
#[derive(Debug, Clone)]
pub struct ChildHit {
    pub program_id: String,
    pub score: f32,
}

/// Filtered similarity search over one qdrant collection
pub struct PartitionIndex {
    client: Arc<QdrantClient>,
    collection: String,
}

impl PartitionIndex {
    pub fn new(client: Arc<QdrantClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Run a filtered similarity search. The search parameters are applied
    /// verbatim; this layer never invents or edits filter semantics.
    pub async fn search(
        &self,
        query_vector: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ChildHit>> {
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: query_vector.to_vec(),
                limit: params.k as u64,
                filter: Some(params.filter.to_filter()),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                AdvisorError::RetrievalError(format!(
                    "search failed on collection {}: {}",
                    self.collection, e
                ))
            })?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let program_id = point.payload.get("program_id").and_then(payload_to_id)?;
                Some(ChildHit {
                    program_id,
                    score: point.score,
                })
            })
            .collect();

        Ok(hits)
    }
}

/// Parent ids are stored as strings or integers depending on corpus
/// generation vintage; accept both.
fn payload_to_id(value: &qdrant_client::qdrant::Value) -> Option<String> {
    use qdrant_client::qdrant::value::Kind;
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        Kind::IntegerValue(i) => Some(i.to_string()),
        _ => None,
    }
}
