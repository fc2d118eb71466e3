//! 4-way question classification.
//!
//! Fails open: any model or parse failure routes the turn to the general
//! branch, the safest and cheapest downstream path.

use crate::agents::{structured_call, StageContext};
use crate::workflow::state::QuestionCategory;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ClassifierOutput {
    question_category: QuestionCategory,
}

pub async fn classify_question(
    ctx: &StageContext<'_>,
    rewritten_query: &str,
    history: &str,
) -> QuestionCategory {
    let result: crate::errors::Result<ClassifierOutput> = structured_call(
        ctx.models.classifier.as_ref(),
        ctx.prompts,
        "query-classifier",
        &[
            ("rewritten_query", rewritten_query),
            ("chat_history", history),
        ],
    )
    .await;

    match result {
        Ok(output) => output.question_category,
        Err(e) => {
            warn!(error = %e, "classification failed, defaulting to general");
            QuestionCategory::General
        }
    }
}
