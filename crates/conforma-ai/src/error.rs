use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Response(String),

    #[error("{op} failed after {attempts} attempts: {last}")]
    Exhausted {
        op: &'static str,
        attempts: u32,
        last: String,
    },
}
