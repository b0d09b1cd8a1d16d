//! LLM requirement extraction.
//!
//! Sends a bounded prefix of the internal content to the generator and
//! parses its free-text reply into verbatim requirement statements.

use conforma_core::Requirement;
use tracing::info;

use crate::{AnalysisContext, PipelineError};

/// Extract atomic requirement statements from internal document text.
///
/// Input is truncated to `config.extract_max_chars` characters before the
/// generator sees it — a hard cost control, which means requirements past
/// the boundary in long documents are silently dropped. Duplicates in the
/// generator's reply are kept; order is preserved.
pub async fn extract_requirements(
    ctx: &AnalysisContext,
    text: &str,
) -> Result<Vec<Requirement>, PipelineError> {
    let prompt = extraction_prompt(truncate_chars(text, ctx.config.extract_max_chars));
    let response = ctx
        .generator
        .complete(&prompt)
        .await
        .map_err(PipelineError::Extraction)?;

    let requirements = parse_requirements(&response);
    info!(count = requirements.len(), "extracted requirements");
    Ok(requirements)
}

fn extraction_prompt(document: &str) -> String {
    format!(
        "Extract all specific requirements, policies, or procedures from this document.\n\
         \n\
         IMPORTANT RULES:\n\
         - Extract each requirement EXACTLY as written - do NOT summarize or shorten\n\
         - Preserve all details, conditions, and qualifications\n\
         - Return as a numbered list, one requirement per line\n\
         \n\
         Document:\n\
         {document}\n\
         \n\
         Requirements (verbatim, complete sentences):"
    )
}

/// First `max` characters of `text` (whole string when shorter).
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Parse the generator's reply line by line.
///
/// A trimmed line qualifies iff it is non-empty and starts with an ASCII
/// digit or `-`; leading enumeration markers (digits, `.`, `)`, `-`, spaces)
/// are stripped and a non-empty remainder becomes the next requirement.
pub fn parse_requirements(response: &str) -> Vec<Requirement> {
    let mut requirements = Vec::new();
    for line in response.lines() {
        let line = line.trim();
        let Some(first) = line.chars().next() else {
            continue;
        };
        if !first.is_ascii_digit() && first != '-' {
            continue;
        }
        let cleaned = line
            .trim_start_matches(|c: char| {
                c.is_ascii_digit() || c == '.' || c == '-' || c == ')' || c == ' '
            })
            .trim();
        if !cleaned.is_empty() {
            requirements.push(Requirement {
                ordinal: requirements.len(),
                text: cleaned.to_string(),
            });
        }
    }
    requirements
}
