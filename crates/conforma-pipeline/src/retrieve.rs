//! Bulk retrieval of internal document content.

use conforma_core::{DocumentSelection, Partition, RetrieveOptions};
use tracing::info;

use crate::{AnalysisContext, PipelineError};

/// Fetch the full content of the selected internal documents as one string.
///
/// Issues a single unranked retrieval (empty query, bulk cap) restricted to
/// `selection` and joins the chunk texts with a blank line in index order.
/// Returns the content and the chunk count. Callers must not invoke this
/// with an empty selection — that gate lives in the orchestrator.
pub async fn fetch_internal(
    ctx: &AnalysisContext,
    selection: &DocumentSelection,
) -> Result<(String, usize), PipelineError> {
    let options = RetrieveOptions::bulk(ctx.config.bulk_top_k);
    let excerpts = ctx
        .store
        .retrieve(Partition::Internal, "", selection, &options)
        .await
        .map_err(PipelineError::Retrieval)?;

    let count = excerpts.len();
    let content = excerpts
        .into_iter()
        .map(|e| e.text)
        .collect::<Vec<_>>()
        .join("\n\n");

    info!(chunks = count, "retrieved internal document content");
    Ok((content, count))
}
