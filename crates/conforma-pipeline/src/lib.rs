//! The compliance-analysis pipeline.
//!
//! Four stages driven by a progress-streaming orchestrator: bulk retrieval
//! of internal content, LLM requirement extraction, per-requirement hybrid
//! cross-referencing against regulatory documents, and streaming answer
//! synthesis. Every stage failure is caught at its boundary and reported as
//! a status event; the run always reaches its terminal event.

mod error;
pub use error::PipelineError;

mod context;
pub use context::AnalysisContext;

mod retrieve;
pub use retrieve::fetch_internal;

mod extract;
pub use extract::{extract_requirements, parse_requirements};

mod crossref;
pub use crossref::{query_requirement, render_excerpts};

mod orchestrator;
pub use orchestrator::run_analysis;

mod synthesize;
pub use synthesize::{render_compliance_context, stream_answer};

#[cfg(test)]
pub(crate) mod testutil;
