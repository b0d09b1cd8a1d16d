//! Core types, collaborator traits, and shared configuration for Conforma.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{PipelineConfig, Settings};
pub use error::BackendError;
pub use traits::{DocumentStore, Embedder, FragmentStream, TextGenerator};
pub use types::{
    ChatRole, ChatTurn, ComplianceFinding, DocumentSelection, Partition, PipelineResult,
    Requirement, RetrieveOptions, SearchExcerpt, SearchMode, StatusEvent,
};
