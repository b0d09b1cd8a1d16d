use thiserror::Error;

/// Error surfaced across a collaborator boundary.
///
/// Collaborators (stores, generators) map their internal failures into a
/// single human-readable message here; raw backend errors and stack traces
/// never cross into the pipeline.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
