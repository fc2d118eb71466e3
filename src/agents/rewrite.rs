//! Query rewrite stage.
//!
//! Normalizes the raw utterance into a self-contained query for retrieval
//! and generation. Failure propagates to the caller, which falls back to
//! the raw query downstream; the turn itself continues.

use crate::agents::StageContext;
use crate::errors::Result;

pub async fn rewrite_query(
    ctx: &StageContext<'_>,
    query: &str,
    history: &str,
) -> Result<String> {
    let template = ctx.prompts.get("rewrite-query")?;
    let messages = template.render(&[("user_input", query), ("chat_history", history)]);

    let rewritten = ctx.models.rewriter.invoke(&messages).await?;
    Ok(rewritten.trim().to_string())
}
