use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chunk_overlap ({overlap}) must be less than chunk_size ({size})")]
    InvalidChunking { size: usize, overlap: usize },
}
