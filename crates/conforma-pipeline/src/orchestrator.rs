//! Progress-streaming orchestrator.
//!
//! Drives the stages in sequence over one mutable [`PipelineResult`] and
//! emits a status event with a result snapshot after every meaningful
//! sub-step. Stage gates:
//!
//! - internal retrieval runs only for a non-empty internal selection;
//! - extraction runs only when internal content was retrieved *and* the
//!   regulatory selection is non-empty;
//! - cross-referencing runs only when at least one requirement exists.
//!
//! The terminal event is always emitted, whatever failed or was skipped.
//! Events flow through a bounded channel of capacity one, so the producer
//! suspends until the consumer pulls; when the consumer drops the stream,
//! the next send fails and the run stops producing.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use conforma_core::{ComplianceFinding, DocumentSelection, PipelineResult, StatusEvent};

use crate::{crossref, extract, retrieve, AnalysisContext};

const REQUIREMENT_PREVIEW_CHARS: usize = 80;
const FINDING_PREVIEW_CHARS: usize = 500;

/// Run the analysis pipeline, returning its event stream.
///
/// Never yields an error: failures inside any stage become error-flavored
/// status messages. The stream is finite and not restartable; a fresh run
/// needs a fresh invocation.
pub fn run_analysis(
    ctx: AnalysisContext,
    internal: DocumentSelection,
    regulatory: DocumentSelection,
) -> impl Stream<Item = StatusEvent> + Send {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        drive(ctx, internal, regulatory, tx).await;
    });
    ReceiverStream::new(rx)
}

async fn drive(
    ctx: AnalysisContext,
    internal: DocumentSelection,
    regulatory: DocumentSelection,
    tx: mpsc::Sender<StatusEvent>,
) {
    let mut result = PipelineResult::default();

    // Step 1: full content from the selected internal documents.
    if !internal.is_empty() {
        if !emit(&tx, "**Step 1/3:** Retrieving internal documents...", &result).await {
            return;
        }
        match retrieve::fetch_internal(&ctx, &internal).await {
            Ok((content, chunks)) => {
                result.internal_content = content;
                let message =
                    format!("**Step 1/3:** Retrieved {chunks} chunks from internal documents");
                if !emit(&tx, &message, &result).await {
                    return;
                }
            }
            Err(e) => {
                // Content stays empty; the failure is reported, not raised.
                error!(error = %e, "internal retrieval failed");
                if !emit(&tx, &format!("**Error:** {e}"), &result).await {
                    return;
                }
            }
        }
    }

    // Step 2: extract requirements, gated on retrieved content and a
    // non-empty regulatory selection.
    if !result.internal_content.is_empty() && !regulatory.is_empty() {
        if !emit(
            &tx,
            "**Step 2/3:** Extracting requirements from internal documents...",
            &result,
        )
        .await
        {
            return;
        }
        match extract::extract_requirements(&ctx, &result.internal_content).await {
            Ok(requirements) => {
                result.requirements = requirements;
                let listing = result
                    .requirements
                    .iter()
                    .map(|r| {
                        format!(
                            "  {}. {}",
                            r.ordinal + 1,
                            preview(&r.text, REQUIREMENT_PREVIEW_CHARS)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let message = format!(
                    "**Step 2/3:** Extracted {} requirements:\n{listing}",
                    result.requirements.len()
                );
                if !emit(&tx, &message, &result).await {
                    return;
                }
            }
            Err(e) => {
                // Unparseable or failed extraction means zero requirements,
                // not a fatal error.
                error!(error = %e, "requirement extraction failed");
                if !emit(&tx, &format!("**Error:** {e}"), &result).await {
                    return;
                }
            }
        }
    }

    // Step 3: cross-reference each requirement, strictly in extraction
    // order; one failure never aborts the batch.
    if !result.requirements.is_empty() {
        let total = result.requirements.len();
        let requirements = result.requirements.clone();
        for requirement in &requirements {
            let position = requirement.ordinal + 1;
            let message = format!(
                "**Step 3/3:** Querying compliance for requirement {position}/{total}...\n\n\
                 **Requirement:** {}",
                requirement.text
            );
            if !emit(&tx, &message, &result).await {
                return;
            }

            match crossref::query_requirement(&ctx, requirement, &regulatory).await {
                Ok(excerpts) => {
                    let compliance_info = crossref::render_excerpts(&excerpts);
                    let message = format!(
                        "**Step 3/3:** Requirement {position}/{total} complete\n\n\
                         **Requirement:** {}\n\n\
                         **Compliance Result:**\n{}",
                        requirement.text,
                        preview(&compliance_info, FINDING_PREVIEW_CHARS)
                    );
                    result.compliance_results.push(ComplianceFinding {
                        requirement: requirement.clone(),
                        compliance_info,
                    });
                    if !emit(&tx, &message, &result).await {
                        return;
                    }
                }
                Err(e) => {
                    error!(ordinal = requirement.ordinal, error = %e, "cross-reference failed");
                    result.compliance_results.push(ComplianceFinding {
                        requirement: requirement.clone(),
                        compliance_info: e.to_string(),
                    });
                    let message = format!("**Step 3/3:** Requirement {position} - Error: {e}");
                    if !emit(&tx, &message, &result).await {
                        return;
                    }
                }
            }
        }
    }

    // Terminal checkpoint: always reached, even for fully empty runs.
    emit(&tx, "**Complete:** Analysis ready", &result).await;
}

/// Send one event; false means the consumer dropped the stream.
async fn emit(tx: &mpsc::Sender<StatusEvent>, message: &str, result: &PipelineResult) -> bool {
    tx.send(StatusEvent {
        message: message.to_string(),
        snapshot: result.clone(),
    })
    .await
    .is_ok()
}

/// First `max` characters, with an ellipsis marker when truncated.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
