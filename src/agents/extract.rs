//! Constraint extraction for the program-selection path.
//!
//! Four independent structured extractions run concurrently; the stage
//! joins on all of them and tolerates individual failures. A failed
//! extractor is logged and its field left absent, never substituted with
//! an error. Constraints are semantically independent, so end-to-end
//! latency is bounded by the slowest single extractor.

use crate::agents::{structured_call, StageContext};
use crate::retriever::filter::PriceCampusInfo;
use crate::workflow::state::RetrieverIntent;
use serde::Deserialize;
use tracing::warn;

/// Combined result of the extraction fan-out; absent fields mean that
/// extractor failed or found nothing.
#[derive(Debug, Default, Clone)]
pub struct ExtractedFilters {
    pub program_type: Option<Vec<String>>,
    pub price_campus_info: Option<PriceCampusInfo>,
    pub retriever_intent: Option<RetrieverIntent>,
    pub entry_level: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ProgramTypeExtraction {
    #[serde(default)]
    program_type: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RetrieverIntentOutput {
    retriever_intent: RetrieverIntent,
}

#[derive(Debug, Deserialize)]
struct EntryLevelExtraction {
    #[serde(default)]
    entry_level: Vec<String>,
}

pub async fn extract_filter_parameters(
    ctx: &StageContext<'_>,
    rewritten_query: &str,
    history: &str,
) -> ExtractedFilters {
    let extractor = ctx.models.extractor.as_ref();

    let user_input_vars = [("user_input", rewritten_query)];
    let intent_vars = [("user_input", rewritten_query), ("chat_history", history)];

    let program_task = structured_call::<ProgramTypeExtraction>(
        extractor,
        ctx.prompts,
        "program-type-extraction",
        &user_input_vars,
    );
    let price_task = structured_call::<PriceCampusInfo>(
        extractor,
        ctx.prompts,
        "price-campus-extraction",
        &user_input_vars,
    );
    let intent_task = structured_call::<RetrieverIntentOutput>(
        extractor,
        ctx.prompts,
        "retriever-intent",
        &intent_vars,
    );
    let entry_level_task = structured_call::<EntryLevelExtraction>(
        extractor,
        ctx.prompts,
        "entry-level-extraction",
        &user_input_vars,
    );

    // Fan-out/fan-in: collect all outcomes, tolerate individual failures
    let (program_result, price_result, intent_result, entry_level_result) =
        tokio::join!(program_task, price_task, intent_task, entry_level_task);

    let mut filters = ExtractedFilters::default();

    match program_result {
        Ok(output) => filters.program_type = Some(output.program_type),
        Err(e) => warn!(error = %e, "program-type extraction failed"),
    }
    match price_result {
        Ok(info) => filters.price_campus_info = Some(info),
        Err(e) => warn!(error = %e, "price/campus extraction failed"),
    }
    match intent_result {
        Ok(output) => filters.retriever_intent = Some(output.retriever_intent),
        Err(e) => warn!(error = %e, "retriever-intent extraction failed"),
    }
    match entry_level_result {
        Ok(output) => filters.entry_level = Some(output.entry_level),
        Err(e) => warn!(error = %e, "entry-level extraction failed"),
    }

    filters
}
