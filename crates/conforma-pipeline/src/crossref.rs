//! Per-requirement cross-referencing against regulatory documents.

use conforma_core::{
    DocumentSelection, Partition, Requirement, RetrieveOptions, SearchExcerpt, SearchMode,
};
use tracing::info;

use crate::{AnalysisContext, PipelineError};

/// The sentinel recorded when a requirement matches nothing.
pub const NO_MATCH: &str = "No matching regulations found.";

/// Hybrid reranked query for one requirement, restricted to `selection`.
pub async fn query_requirement(
    ctx: &AnalysisContext,
    requirement: &Requirement,
    selection: &DocumentSelection,
) -> Result<Vec<SearchExcerpt>, PipelineError> {
    let options = RetrieveOptions {
        mode: SearchMode::Hybrid,
        top_k: ctx.config.rerank_top_n,
        dense_top_k: ctx.config.dense_top_k,
        sparse_top_k: ctx.config.sparse_top_k,
        alpha: ctx.config.alpha,
        rerank: true,
    };

    let excerpts = ctx
        .store
        .retrieve(Partition::Regulatory, &requirement.text, selection, &options)
        .await
        .map_err(PipelineError::CrossReference)?;

    info!(
        ordinal = requirement.ordinal,
        hits = excerpts.len(),
        "cross-referenced requirement"
    );
    Ok(excerpts)
}

/// Render ranked excerpts into the finding's `compliance_info` blob.
///
/// Scores are printed to two decimals on the store's documented scale.
pub fn render_excerpts(excerpts: &[SearchExcerpt]) -> String {
    if excerpts.is_empty() {
        return NO_MATCH.to_string();
    }
    excerpts
        .iter()
        .map(|e| format!("**[{}]** (score: {:.2})\n{}", e.doc_id, e.score, e.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
