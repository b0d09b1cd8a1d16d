//! Streaming answer synthesis over accumulated findings.

use conforma_core::{ChatTurn, FragmentStream, PipelineResult};
use tracing::info;

use crate::{AnalysisContext, PipelineError};

/// Render the findings into the prompt's compliance-context block.
///
/// One section per finding, in requirement order; empty findings render as
/// an empty string so the prompt falls back to its placeholder.
pub fn render_compliance_context(result: &PipelineResult) -> String {
    result
        .compliance_results
        .iter()
        .map(|finding| {
            format!(
                "**Internal Requirement:** {}\n**Compliance Analysis:** {}",
                finding.requirement.text, finding.compliance_info
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn system_prompt(result: &PipelineResult) -> String {
    let compliance_context = render_compliance_context(result);
    let compliance_block = if compliance_context.is_empty() {
        "No compliance documents selected."
    } else {
        &compliance_context
    };
    let internal_block = if result.internal_content.is_empty() {
        "No internal documents selected."
    } else {
        &result.internal_content
    };
    let total = result.requirements.len();

    format!(
        "You are a compliance analysis assistant. Your role is to:\n\
         1. Analyze internal requirement documents against compliance regulations\n\
         2. Identify compliance gaps and issues\n\
         3. Provide specific recommendations for achieving compliance\n\
         \n\
         ## COMPLIANCE DOCUMENTS:\n\
         {compliance_block}\n\
         \n\
         ## INTERNAL REQUIREMENT DOCUMENTS:\n\
         {internal_block}\n\
         \n\
         When answering questions:\n\
         - Open with a one-line summary stating how many of the {total} extracted \
         requirements are covered, in the form \"X of {total} requirements\"\n\
         - Address every one of the {total} extracted requirements by name\n\
         - Compare the internal documents against the compliance documents\n\
         - Reference specific sections from both document types\n\
         - Clearly state compliance status (Compliant / Partially Compliant / \
         Non-Compliant), or \"cannot be assessed\" where no regulation matched\n\
         - Identify specific gaps between internal requirements and compliance regulations\n\
         - Provide actionable recommendations\n\
         - If the user greets you or asks something unrelated, respond naturally but \
         guide them back to compliance analysis"
    )
}

/// Stream the assistant's answer for `message` over the run's findings.
///
/// `history` is replayed in full ahead of the message; the caller bounds it.
pub async fn stream_answer(
    ctx: &AnalysisContext,
    message: &str,
    result: &PipelineResult,
    history: &[ChatTurn],
) -> Result<FragmentStream, PipelineError> {
    let prompt = system_prompt(result);
    info!(
        requirements = result.requirements.len(),
        findings = result.compliance_results.len(),
        history_turns = history.len(),
        "synthesizing answer"
    );
    ctx.generator
        .stream_chat(&prompt, history, message)
        .await
        .map_err(PipelineError::Synthesis)
}
