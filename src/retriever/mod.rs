//! Two-stage (child/parent) document retrieval over three corpus
//! partitions, with filter construction and a process-wide cache for the
//! heavy backing resources.

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod filter;
pub mod parent;
pub mod vector;

pub use cache::RetrieverCache;
pub use engine::{ChildParentRetriever, DocumentRetriever, RetrievalOutput};
pub use filter::{
    build_filter_conditions, build_search_params, FilterExpr, PriceCampusInfo, PriceCondition,
    RetrieverConfig, SearchParams, DEFAULT_PROGRAM_TYPES,
};
pub use parent::ParentStore;
