//! Storage layer: chunking and an in-memory hybrid document store.

mod error;
pub use error::StoreError;

mod chunker;
pub use chunker::{Chunk, Chunker};

mod memory;
pub use memory::MemoryStore;
