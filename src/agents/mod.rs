//! Per-stage agents: query rewrite, classification, constraint extraction,
//! and the four generation branches. Each is an async function from inputs
//! to a partial state update, backed by a named prompt and a stage-bound
//! model.

pub mod classify;
pub mod extract;
pub mod generate;
pub mod rewrite;

pub use classify::classify_question;
pub use extract::{extract_filter_parameters, ExtractedFilters};
pub use generate::{
    extract_program_ids, format_content, stream_generation_branch, FALLBACK_MESSAGE,
};
pub use rewrite::rewrite_query;

use crate::errors::Result;
use crate::llm::{parse_structured, LanguageModel, ModelSet};
use crate::prompts::PromptStore;
use serde::de::DeserializeOwned;

/// One structured-extraction call: render the named prompt, invoke the
/// model in JSON mode, parse into the declared schema.
pub(crate) async fn structured_call<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    prompts: &PromptStore,
    prompt_name: &str,
    vars: &[(&str, &str)],
) -> Result<T> {
    let template = prompts.get(prompt_name)?;
    let messages = template.render(vars);
    let raw = model.invoke_json(&messages).await?;
    parse_structured(&raw)
}

/// Shared inputs every stage call receives
pub struct StageContext<'a> {
    pub models: &'a ModelSet,
    pub prompts: &'a PromptStore,
}
