//! Deterministic hashed-feature text embedding.
//!
//! Hashes words and character trigrams into a fixed number of buckets and
//! L2-normalizes the result. No model download, no network: texts sharing
//! vocabulary land near each other under cosine similarity, which is all the
//! dense channel needs. Swap in a real embedding backend by implementing
//! [`Embedder`] against it.

use std::hash::{DefaultHasher, Hash, Hasher};

use conforma_core::Embedder;
use tracing::info;

const TRIGRAM_WEIGHT: f32 = 0.5;

/// Hashed bag-of-words + character-trigram embedder.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    /// Create an embedder with the given dimensionality (minimum 16).
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(16);
        info!(dim, "hash embedder ready");
        Self { dim }
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];

        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[bucket(word, self.dim)] += 1.0;

            let chars: Vec<char> = word.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    v[bucket(&trigram, self.dim)] += TRIGRAM_WEIGHT;
                }
            }
        }

        normalize(&mut v);
        v
    }
}

fn bucket(feature: &str, dim: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    (hasher.finish() % dim as u64) as usize
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
