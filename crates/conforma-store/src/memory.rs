//! In-memory hybrid document store.
//!
//! Documents are chunked at ingest; each chunk keeps its embedding (from the
//! injected [`Embedder`]) and token list. Retrieval materializes the
//! inclusion-filtered candidate set *first*, then ranks it — a dense channel
//! (dot product of unit vectors), a sparse channel (BM25 with statistics
//! computed over the filtered set), a weighted blend, and an optional
//! term-overlap rerank. Blended scores are min-max normalized per channel
//! into [0, 1] within one query; they are not comparable across queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use conforma_core::{
    BackendError, DocumentSelection, DocumentStore, Embedder, Partition, PipelineConfig,
    RetrieveOptions, SearchExcerpt, SearchMode,
};

use crate::{Chunker, StoreError};

// BM25 constants.
const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Debug, Clone)]
struct StoredChunk {
    doc_id: String,
    text: String,
    embedding: Vec<f32>,
    tokens: Vec<String>,
    #[allow(dead_code)]
    metadata: HashMap<String, String>,
}

/// In-memory hybrid store over two partitions.
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    partitions: RwLock<HashMap<Partition, Vec<StoredChunk>>>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, config: &PipelineConfig) -> Result<Self, StoreError> {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            embedder,
            chunker,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    /// Total chunk count in a partition.
    pub fn chunk_count(&self, partition: Partition) -> usize {
        self.partitions
            .read()
            .map(|parts| parts.get(&partition).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn retrieve(
        &self,
        partition: Partition,
        query: &str,
        filter: &DocumentSelection,
        options: &RetrieveOptions,
    ) -> Result<Vec<SearchExcerpt>, BackendError> {
        let parts = self
            .partitions
            .read()
            .map_err(|_| BackendError::new("store lock poisoned"))?;
        let chunks = match parts.get(&partition) {
            Some(chunks) => chunks,
            None => return Ok(Vec::new()),
        };

        // Filter before ranking: the candidate set is fixed up front so a
        // selected document can never be displaced by excluded ones.
        let candidates: Vec<&StoredChunk> = chunks
            .iter()
            .filter(|c| filter.is_empty() || filter.contains(&c.doc_id))
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // An empty query is a bulk fetch: insertion order, capped.
        if query.trim().is_empty() {
            return Ok(candidates
                .iter()
                .take(options.top_k)
                .map(|c| SearchExcerpt {
                    text: c.text.clone(),
                    score: 1.0,
                    doc_id: c.doc_id.clone(),
                })
                .collect());
        }

        let scored = match options.mode {
            SearchMode::Dense => {
                let dense = dense_scores(&self.embedder.embed(query), &candidates);
                top_n(dense, options.top_k)
            }
            SearchMode::Hybrid => {
                let dense = top_n(
                    dense_scores(&self.embedder.embed(query), &candidates),
                    options.dense_top_k,
                );
                let query_tokens = tokenize(query);
                let sparse = top_n(bm25_scores(&query_tokens, &candidates), options.sparse_top_k);
                let mut blended = blend(&dense, &sparse, options.alpha);
                if options.rerank {
                    rerank_by_overlap(&mut blended, &query_tokens, &candidates);
                }
                blended.truncate(options.top_k);
                blended
            }
        };

        debug!(
            partition = %partition,
            candidates = candidates.len(),
            results = scored.len(),
            "retrieval complete"
        );

        Ok(scored
            .into_iter()
            .map(|(idx, score)| SearchExcerpt {
                text: candidates[idx].text.clone(),
                score,
                doc_id: candidates[idx].doc_id.clone(),
            })
            .collect())
    }

    async fn list_documents(&self, partition: Partition) -> Result<Vec<String>, BackendError> {
        let parts = self
            .partitions
            .read()
            .map_err(|_| BackendError::new("store lock poisoned"))?;
        let ids: BTreeSet<String> = parts
            .get(&partition)
            .into_iter()
            .flatten()
            .map(|c| c.doc_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn upsert(
        &self,
        partition: Partition,
        doc_id: &str,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), BackendError> {
        if doc_id.is_empty() {
            return Err(BackendError::new("document id must not be empty"));
        }

        let mut stored = Vec::new();
        for chunk in self.chunker.chunk(text) {
            let mut chunk_meta = metadata.clone();
            chunk_meta.insert("chunk_index".into(), chunk.chunk_index.to_string());
            chunk_meta.insert("ingested_at".into(), chrono::Utc::now().to_rfc3339());
            stored.push(StoredChunk {
                doc_id: doc_id.to_string(),
                embedding: self.embedder.embed(&chunk.text),
                tokens: tokenize(&chunk.text),
                text: chunk.text,
                metadata: chunk_meta,
            });
        }

        let mut parts = self
            .partitions
            .write()
            .map_err(|_| BackendError::new("store lock poisoned"))?;
        let chunks = parts.entry(partition).or_default();
        chunks.retain(|c| c.doc_id != doc_id);
        let count = stored.len();
        chunks.extend(stored);

        info!(partition = %partition, doc_id, chunks = count, "upserted document");
        Ok(())
    }

    async fn delete(&self, partition: Partition, doc_id: &str) -> Result<(), BackendError> {
        let mut parts = self
            .partitions
            .write()
            .map_err(|_| BackendError::new("store lock poisoned"))?;
        let chunks = parts.entry(partition).or_default();
        let before = chunks.len();
        chunks.retain(|c| c.doc_id != doc_id);
        let removed = before - chunks.len();
        if removed == 0 {
            warn!(partition = %partition, doc_id, "delete found no chunks");
        } else {
            info!(partition = %partition, doc_id, removed, "deleted document");
        }
        Ok(())
    }
}

// ── Ranking ──

/// Lowercased alphanumeric terms.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Dot product per candidate. Embeddings are unit vectors, so this is
/// cosine similarity.
fn dense_scores(query_vec: &[f32], candidates: &[&StoredChunk]) -> Vec<(usize, f32)> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let score: f32 = query_vec
                .iter()
                .zip(&c.embedding)
                .map(|(a, b)| a * b)
                .sum();
            (idx, score)
        })
        .collect()
}

/// BM25 over the filtered candidate set; document frequencies come from the
/// same set, so excluded documents cannot influence ranking.
fn bm25_scores(query_tokens: &[String], candidates: &[&StoredChunk]) -> Vec<(usize, f32)> {
    let n = candidates.len() as f32;
    let avg_len: f32 =
        candidates.iter().map(|c| c.tokens.len() as f32).sum::<f32>() / n.max(1.0);

    let mut df: HashMap<&str, f32> = HashMap::new();
    for term in query_tokens {
        let count = candidates
            .iter()
            .filter(|c| c.tokens.iter().any(|t| t == term))
            .count() as f32;
        df.insert(term, count);
    }

    candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let len_norm = 1.0 - BM25_B + BM25_B * (c.tokens.len() as f32 / avg_len.max(1.0));
            let score: f32 = query_tokens
                .iter()
                .map(|term| {
                    let tf = c.tokens.iter().filter(|t| *t == term).count() as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let d = df[term.as_str()];
                    let idf = ((n - d + 0.5) / (d + 0.5) + 1.0).ln();
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * len_norm)
                })
                .sum();
            (idx, score)
        })
        .collect()
}

/// Sort by score descending (index ascending on ties) and keep the top `n`.
fn top_n(mut scored: Vec<(usize, f32)>, n: usize) -> Vec<(usize, f32)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.truncate(n);
    scored
}

/// Min-max normalize a channel into [0, 1]; a constant channel maps to 1.0.
fn normalize_channel(scored: &[(usize, f32)]) -> HashMap<usize, f32> {
    let (min, max) = scored.iter().fold((f32::MAX, f32::MIN), |(lo, hi), (_, s)| {
        (lo.min(*s), hi.max(*s))
    });
    scored
        .iter()
        .map(|(idx, s)| {
            let norm = if max > min { (s - min) / (max - min) } else { 1.0 };
            (*idx, norm)
        })
        .collect()
}

/// Weighted blend of the two channels over their candidate union.
fn blend(dense: &[(usize, f32)], sparse: &[(usize, f32)], alpha: f32) -> Vec<(usize, f32)> {
    let dense_norm = normalize_channel(dense);
    let sparse_norm = normalize_channel(sparse);

    let mut union: BTreeSet<usize> = BTreeSet::new();
    union.extend(dense_norm.keys());
    union.extend(sparse_norm.keys());

    let blended: Vec<(usize, f32)> = union
        .into_iter()
        .map(|idx| {
            let d = dense_norm.get(&idx).copied().unwrap_or(0.0);
            let s = sparse_norm.get(&idx).copied().unwrap_or(0.0);
            (idx, alpha * d + (1.0 - alpha) * s)
        })
        .collect();

    let n = blended.len();
    top_n(blended, n)
}

/// Rerank by averaging the blended score with the fraction of query terms
/// present in the chunk, then re-sort. Keeps scores in [0, 1].
fn rerank_by_overlap(
    blended: &mut Vec<(usize, f32)>,
    query_tokens: &[String],
    candidates: &[&StoredChunk],
) {
    if query_tokens.is_empty() {
        return;
    }
    for (idx, score) in blended.iter_mut() {
        let present = query_tokens
            .iter()
            .filter(|term| candidates[*idx].tokens.iter().any(|t| t == *term))
            .count() as f32;
        let overlap = present / query_tokens.len() as f32;
        *score = (*score + overlap) / 2.0;
    }
    blended.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use conforma_core::PipelineConfig;

    /// Deterministic word-count embedder over a tiny fixed vocabulary. The
    /// final axis catches everything out of vocabulary, so unrelated texts
    /// still get unit vectors.
    struct VocabEmbedder {
        vocab: Vec<&'static str>,
    }

    impl VocabEmbedder {
        fn new() -> Self {
            Self {
                vocab: vec!["breach", "report", "data", "retention", "consent", "fire"],
            }
        }
    }

    impl Embedder for VocabEmbedder {
        fn dim(&self) -> usize {
            self.vocab.len() + 1
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            let tokens = tokenize(text);
            let mut v = vec![0.0f32; self.dim()];
            for token in &tokens {
                match self.vocab.iter().position(|w| *w == token) {
                    Some(i) => v[i] += 1.0,
                    None => *v.last_mut().unwrap() += 0.1,
                }
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            v
        }
    }

    fn store() -> MemoryStore {
        let config = PipelineConfig {
            chunk_size: 200,
            chunk_overlap: 40,
            ..PipelineConfig::default()
        };
        MemoryStore::new(Arc::new(VocabEmbedder::new()), &config).unwrap()
    }

    fn no_filter() -> DocumentSelection {
        DocumentSelection::default()
    }

    #[tokio::test]
    async fn upsert_list_delete_roundtrip() {
        let store = store();
        store
            .upsert(Partition::Regulatory, "gdpr", "data breach reporting", HashMap::new())
            .await
            .unwrap();
        store
            .upsert(Partition::Regulatory, "hipaa", "health data consent", HashMap::new())
            .await
            .unwrap();

        let ids = store.list_documents(Partition::Regulatory).await.unwrap();
        assert_eq!(ids, vec!["gdpr", "hipaa"]);

        store.delete(Partition::Regulatory, "gdpr").await.unwrap();
        let ids = store.list_documents(Partition::Regulatory).await.unwrap();
        assert_eq!(ids, vec!["hipaa"]);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = store();
        store
            .upsert(Partition::Internal, "hr_policy", "report breaches fast", HashMap::new())
            .await
            .unwrap();

        assert!(store
            .list_documents(Partition::Regulatory)
            .await
            .unwrap()
            .is_empty());
        let hits = store
            .retrieve(
                Partition::Regulatory,
                "report breaches",
                &no_filter(),
                &RetrieveOptions::default(),
            )
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn reupsert_replaces_chunks() {
        let store = store();
        store
            .upsert(Partition::Internal, "doc", "first version text", HashMap::new())
            .await
            .unwrap();
        let first = store.chunk_count(Partition::Internal);
        store
            .upsert(Partition::Internal, "doc", "second version text", HashMap::new())
            .await
            .unwrap();
        assert_eq!(store.chunk_count(Partition::Internal), first);

        let hits = store
            .retrieve(
                Partition::Internal,
                "",
                &no_filter(),
                &RetrieveOptions::bulk(100),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second version text");
    }

    #[tokio::test]
    async fn bulk_fetch_preserves_insertion_order() {
        let store = store();
        for (id, text) in [("a", "alpha content"), ("b", "bravo content"), ("c", "charlie content")] {
            store
                .upsert(Partition::Internal, id, text, HashMap::new())
                .await
                .unwrap();
        }

        let hits = store
            .retrieve(
                Partition::Internal,
                "",
                &no_filter(),
                &RetrieveOptions::bulk(100),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn bulk_fetch_respects_cap() {
        let store = store();
        for i in 0..5 {
            store
                .upsert(Partition::Internal, &format!("d{i}"), "short text", HashMap::new())
                .await
                .unwrap();
        }
        let hits = store
            .retrieve(Partition::Internal, "", &no_filter(), &RetrieveOptions::bulk(3))
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn filter_restricts_before_ranking() {
        let store = store();
        // Eight excluded documents that match the query far better than the
        // two included ones.
        for i in 0..8 {
            store
                .upsert(
                    Partition::Regulatory,
                    &format!("strong{i}"),
                    "breach report breach report breach report",
                    HashMap::new(),
                )
                .await
                .unwrap();
        }
        store
            .upsert(Partition::Regulatory, "weak1", "data retention periods", HashMap::new())
            .await
            .unwrap();
        store
            .upsert(Partition::Regulatory, "weak2", "consent withdrawal process", HashMap::new())
            .await
            .unwrap();

        let filter = DocumentSelection::new(["weak1", "weak2"]);
        let hits = store
            .retrieve(
                Partition::Regulatory,
                "breach report",
                &filter,
                &RetrieveOptions::default(),
            )
            .await
            .unwrap();

        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(
                hit.doc_id == "weak1" || hit.doc_id == "weak2",
                "excluded document {} leaked into results",
                hit.doc_id
            );
        }
    }

    #[tokio::test]
    async fn hybrid_ranks_relevant_first_with_bounded_scores() {
        let store = store();
        store
            .upsert(
                Partition::Regulatory,
                "gdpr",
                "personal data breach must be reported within 72 hours",
                HashMap::new(),
            )
            .await
            .unwrap();
        store
            .upsert(
                Partition::Regulatory,
                "fire_code",
                "fire extinguishers inspected annually",
                HashMap::new(),
            )
            .await
            .unwrap();

        let hits = store
            .retrieve(
                Partition::Regulatory,
                "report data breach",
                &no_filter(),
                &RetrieveOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(hits[0].doc_id, "gdpr");
        for hit in &hits {
            assert!((0.0..=1.0).contains(&hit.score), "score out of range: {}", hit.score);
        }
    }

    #[tokio::test]
    async fn hybrid_caps_at_rerank_top_n() {
        let store = store();
        for i in 0..10 {
            store
                .upsert(
                    Partition::Regulatory,
                    &format!("reg{i}"),
                    &format!("breach report rules variant {i}"),
                    HashMap::new(),
                )
                .await
                .unwrap();
        }
        let hits = store
            .retrieve(
                Partition::Regulatory,
                "breach report",
                &no_filter(),
                &RetrieveOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn empty_partition_yields_no_results() {
        let store = store();
        let hits = store
            .retrieve(
                Partition::Internal,
                "anything",
                &no_filter(),
                &RetrieveOptions::default(),
            )
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_document_is_ok() {
        let store = store();
        store.delete(Partition::Internal, "ghost").await.unwrap();
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Data-breach REPORT, within 24h!"),
            vec!["data", "breach", "report", "within", "24h"]
        );
    }
}
