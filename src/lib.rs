//! Conversational advisory core for educational program selection.
//!
//! One conversation turn flows through a small stage machine: the raw
//! question is rewritten into a self-contained query, classified into one
//! of four categories, and routed either straight to a conversational
//! answer or through constraint extraction and two-stage child/parent
//! retrieval into a grounded, streamed recommendation. The grounded stream
//! is re-assembled on the fly so inline school-logo and program-link
//! annotations surface as typed events instead of answer text, and the
//! program ids an answer showed are recorded so the next turn can exclude
//! them.

pub mod agents;
pub mod config;
pub mod errors;
pub mod llm;
pub mod prompts;
pub mod retriever;
pub mod streaming;
pub mod types;
pub mod workflow;

pub use config::Config;
pub use errors::{AdvisorError, Result};
pub use llm::{ChatMessage, ChatRole, LanguageModel, ModelSet, OllamaChat, TokenStream};
pub use prompts::{PromptStore, PromptTemplate};
pub use retriever::{
    ChildParentRetriever, DocumentRetriever, RetrievalOutput, RetrieverCache, RetrieverConfig,
};
pub use streaming::{ResponseAssembler, ResponseType, StreamEvent};
pub use types::{format_history, Role, StoredMessage};
pub use workflow::{QuestionCategory, TurnRequest, TurnStream, TurnSummary, Workflow};
