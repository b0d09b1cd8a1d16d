//! Collaborator capability interfaces.
//!
//! The pipeline consumes exactly three external capabilities through these
//! narrow seams: a filterable document store, a text generator, and an
//! embedder. Concrete backends live in `conforma-store` and `conforma-ai`;
//! tests substitute stubs.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::BackendError;
use crate::types::{ChatTurn, DocumentSelection, Partition, RetrieveOptions, SearchExcerpt};

/// A lazy sequence of text fragments from a streaming generation.
///
/// Fragment granularity is backend-defined; consumers concatenate and stop
/// when the stream ends.
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

/// A partitioned document store with filterable ranked retrieval.
///
/// Implementations must apply the inclusion `filter` before or jointly with
/// ranking, never as a post-hoc truncation of an already-capped top-K.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ranked retrieval against one partition, restricted to `filter` when
    /// it is non-empty. An empty `query` in dense mode returns chunks in
    /// insertion order (bulk fetch).
    async fn retrieve(
        &self,
        partition: Partition,
        query: &str,
        filter: &DocumentSelection,
        options: &RetrieveOptions,
    ) -> Result<Vec<SearchExcerpt>, BackendError>;

    /// Sorted unique document ids present in a partition.
    async fn list_documents(&self, partition: Partition) -> Result<Vec<String>, BackendError>;

    /// Insert or replace one document's content in a partition.
    async fn upsert(
        &self,
        partition: Partition,
        doc_id: &str,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), BackendError>;

    /// Remove all content for a document id from a partition.
    async fn delete(&self, partition: Partition, doc_id: &str) -> Result<(), BackendError>;
}

/// A hosted generative-text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single-shot completion for a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;

    /// Incremental chat generation: the system prompt is followed by the
    /// replayed `history` in order, then the new user `message`.
    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<FragmentStream, BackendError>;
}

/// Deterministic text-to-vector embedding.
///
/// Vectors must be unit-normalized so the dense channel can rank by dot
/// product.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}
