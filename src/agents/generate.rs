//! Generation branches.
//!
//! Every branch streams its answer token-by-token. Non-grounded branches
//! receive only the rewritten query and history; the grounded branch also
//! receives the formatted retrieval content, joined with a clear block
//! separator. Program ids referenced in a grounded answer are harvested
//! afterwards for the exclusion list.

use crate::agents::StageContext;
use crate::errors::Result;
use crate::llm::TokenStream;
use crate::workflow::state::Stage;
use regex::Regex;
use std::sync::OnceLock;

/// Fixed fail-open answer when a generation branch cannot produce one
pub const FALLBACK_MESSAGE: &str = "I apologize, but I'm experiencing technical \
difficulties. Please try rephrasing your question or contact support if the issue persists.";

/// Separator between program blocks in the grounded prompt
const CONTENT_SEPARATOR: &str = "\n\n----\n\n";

/// Join formatted program blocks for prompt injection
pub fn format_content(content: &[String]) -> String {
    content.join(CONTENT_SEPARATOR)
}

/// Harvest the document identifiers a grounded answer referenced, by the
/// id-label pattern the grounded prompt mandates.
pub fn extract_program_ids(response: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"Program Id:\s*(\d+)").expect("id pattern is valid"));

    pattern
        .captures_iter(response)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Open the token stream for the given terminal generation stage.
pub async fn stream_generation_branch(
    ctx: &StageContext<'_>,
    stage: Stage,
    user_input: &str,
    history: &str,
    content: &str,
) -> Result<TokenStream> {
    let (prompt_name, model) = match stage {
        Stage::GenerateGrounded => ("grounded-advisor", &ctx.models.grounded),
        Stage::GenerateRules => ("rules-explainer", &ctx.models.conversational),
        Stage::GenerateFollowUp => ("follow-up-questions", &ctx.models.conversational),
        _ => ("general-question", &ctx.models.conversational),
    };

    let template = ctx.prompts.get(prompt_name)?;
    let messages = template.render(&[
        ("user_input", user_input),
        ("chat_history", history),
        ("content", content),
    ]);

    model.stream(&messages).await
}
