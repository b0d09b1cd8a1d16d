//! AI collaborator implementations: hashed-feature embeddings and an
//! Ollama-compatible text generator.

mod error;
pub use error::AiError;

mod embedder;
pub use embedder::HashEmbedder;

mod generator;
pub use generator::OllamaGenerator;

mod retry;
