use conforma_core::BackendError;
use thiserror::Error;

/// Stage-local pipeline failures.
///
/// None of these propagate past the orchestrator: each is converted into an
/// error-flavored status event at the stage boundary. The synthesizer's
/// variant surfaces through the transport's terminal `error` event.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error retrieving internal documents: {0}")]
    Retrieval(BackendError),

    #[error("Error extracting requirements: {0}")]
    Extraction(BackendError),

    #[error("Error querying compliance: {0}")]
    CrossReference(BackendError),

    #[error("Error generating answer: {0}")]
    Synthesis(BackendError),
}
