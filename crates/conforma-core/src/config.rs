//! Environment-driven configuration.
//!
//! Settings are read once at process start (`CONFORMA_*` variables, with
//! defaults for everything but deployment-specific values) and passed into
//! the pipeline by the caller. There is no global settings singleton.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Knobs for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-query result cap for bulk content fetch (index maximum).
    pub bulk_top_k: usize,
    /// Extraction input is truncated to this many characters before the
    /// generator sees it. A hard cost/latency control: requirements past the
    /// boundary in long documents are silently dropped.
    pub extract_max_chars: usize,
    /// Candidates per channel for cross-reference queries.
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    /// Dense weight in the hybrid blend.
    pub alpha: f32,
    /// Results kept after reranking.
    pub rerank_top_n: usize,
    /// Chunking parameters for ingestion.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bulk_top_k: 100,
            extract_max_chars: 8000,
            dense_top_k: 5,
            sparse_top_k: 5,
            alpha: 0.5,
            rerank_top_n: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the Ollama-compatible generation backend.
    pub generator_url: String,
    pub generator_model: String,
    /// Per-call timeout for non-streaming generator requests.
    pub request_timeout_secs: u64,
    /// Bounded-retry attempts for generator calls.
    pub max_retries: u32,
    pub server_addr: String,
    pub embed_dim: usize,
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generator_url: "http://localhost:11434".into(),
            generator_model: "llama3.2:3b".into(),
            request_timeout_secs: 30,
            max_retries: 3,
            server_addr: "127.0.0.1:8080".into(),
            embed_dim: 384,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from `CONFORMA_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        let mut settings = Settings {
            generator_url: lookup("CONFORMA_GENERATOR_URL").unwrap_or(defaults.generator_url),
            generator_model: lookup("CONFORMA_GENERATOR_MODEL").unwrap_or(defaults.generator_model),
            request_timeout_secs: parse_or(
                &lookup,
                "CONFORMA_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            max_retries: parse_or(&lookup, "CONFORMA_MAX_RETRIES", defaults.max_retries),
            server_addr: lookup("CONFORMA_SERVER_ADDR").unwrap_or(defaults.server_addr),
            embed_dim: parse_or(&lookup, "CONFORMA_EMBED_DIM", defaults.embed_dim),
            pipeline: defaults.pipeline,
        };
        settings.pipeline.bulk_top_k = parse_or(
            &lookup,
            "CONFORMA_BULK_TOP_K",
            settings.pipeline.bulk_top_k,
        );
        settings.pipeline.extract_max_chars = parse_or(
            &lookup,
            "CONFORMA_EXTRACT_MAX_CHARS",
            settings.pipeline.extract_max_chars,
        );
        settings.pipeline.chunk_size =
            parse_or(&lookup, "CONFORMA_CHUNK_SIZE", settings.pipeline.chunk_size);
        settings.pipeline.chunk_overlap = parse_or(
            &lookup,
            "CONFORMA_CHUNK_OVERLAP",
            settings.pipeline.chunk_overlap,
        );
        settings
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}
