//! Shared data model for the compliance-analysis pipeline.

use serde::{Deserialize, Serialize, Serializer};

// ── Partitions and selections ──

/// One of the two logical document collections.
///
/// Every retrieval or storage operation targets exactly one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Internal company documents (policies, procedures).
    Internal,
    /// Regulatory documents (GDPR, HIPAA, and similar).
    Regulatory,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Internal => "internal",
            Partition::Regulatory => "regulatory",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Partition::Internal),
            "regulatory" => Ok(Partition::Regulatory),
            other => Err(format!("unknown partition: {other}")),
        }
    }
}

/// An ordered, de-duplicated set of document identifiers used as an
/// inclusion filter against one partition.
///
/// An empty selection means the dependent pipeline stage is skipped
/// entirely, never "search everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSelection(Vec<String>);

impl DocumentSelection {
    /// Build a selection, keeping first-occurrence order and dropping
    /// duplicates and empty ids.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            let id = id.into();
            if !id.is_empty() && seen.insert(id.clone()) {
                out.push(id);
            }
        }
        Self(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.0.iter().any(|id| id == doc_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DocumentSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// ── Search ──

/// How a retrieval ranks candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Embedding-similarity ranking only.
    Dense,
    /// Dense and sparse (lexical) channels merged by a weighted blend.
    Hybrid,
}

/// Parameters for one retrieval.
///
/// Scores returned under these options are store-defined. The in-memory
/// store blends per-channel min-max-normalized scores into [0, 1] within a
/// single query; scores are not comparable across queries or across stores.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub mode: SearchMode,
    /// Final result cap after blending/reranking.
    pub top_k: usize,
    /// Candidates taken from the dense channel before blending.
    pub dense_top_k: usize,
    /// Candidates taken from the sparse channel before blending.
    pub sparse_top_k: usize,
    /// Dense weight in the blend; sparse weight is `1 - alpha`.
    pub alpha: f32,
    pub rerank: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            top_k: 3,
            dense_top_k: 5,
            sparse_top_k: 5,
            alpha: 0.5,
            rerank: true,
        }
    }
}

impl RetrieveOptions {
    /// Options for bulk content fetch: dense mode, no rerank, capped at the
    /// store's per-query maximum.
    pub fn bulk(cap: usize) -> Self {
        Self {
            mode: SearchMode::Dense,
            top_k: cap,
            dense_top_k: cap,
            sparse_top_k: 0,
            alpha: 1.0,
            rerank: false,
        }
    }
}

/// One ranked hit from a retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct SearchExcerpt {
    pub text: String,
    pub score: f32,
    pub doc_id: String,
}

// ── Pipeline result ──

/// A single extracted obligation, verbatim from source text.
///
/// Created once per run by the requirement extractor, immutable thereafter,
/// discarded at end of run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub ordinal: usize,
    pub text: String,
}

// On the wire a requirement is just its text; the ordinal is its position.
impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// The compliance verdict material for one requirement: rendered regulatory
/// excerpts, the literal no-match sentinel, or an error message.
///
/// Appended exactly once per requirement, in extraction order; never mutated
/// after append.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceFinding {
    pub requirement: Requirement,
    pub compliance_info: String,
}

/// The accumulating record of one pipeline run.
///
/// Exactly one instance per run, owned by the orchestrator and cloned into
/// event snapshots; never shared across concurrent runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub internal_content: String,
    pub requirements: Vec<Requirement>,
    pub compliance_results: Vec<ComplianceFinding>,
}

/// One progress checkpoint: a human-readable status line plus a read-only
/// snapshot of the run so far.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub message: String,
    pub snapshot: PipelineResult,
}

// ── Chat ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior turn of the conversation, replayed ahead of the new message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_keeps_order_and_dedupes() {
        let sel = DocumentSelection::new(["gdpr", "hipaa", "gdpr", "", "sox"]);
        let ids: Vec<&str> = sel.iter().collect();
        assert_eq!(ids, vec!["gdpr", "hipaa", "sox"]);
        assert!(sel.contains("hipaa"));
        assert!(!sel.contains("pci"));
    }

    #[test]
    fn empty_selection() {
        let sel = DocumentSelection::default();
        assert!(sel.is_empty());
        assert_eq!(sel.len(), 0);
    }

    #[test]
    fn partition_roundtrip() {
        assert_eq!("internal".parse::<Partition>().unwrap(), Partition::Internal);
        assert_eq!(
            "regulatory".parse::<Partition>().unwrap(),
            Partition::Regulatory
        );
        assert!("other".parse::<Partition>().is_err());
        assert_eq!(Partition::Regulatory.to_string(), "regulatory");
    }

    #[test]
    fn partition_serde_snake_case() {
        let json = serde_json::to_string(&Partition::Internal).unwrap();
        assert_eq!(json, "\"internal\"");
        let parsed: Partition = serde_json::from_str("\"regulatory\"").unwrap();
        assert_eq!(parsed, Partition::Regulatory);
    }

    #[test]
    fn requirement_serializes_as_text() {
        let req = Requirement {
            ordinal: 0,
            text: "Report breaches within 24 hours".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, "\"Report breaches within 24 hours\"");
    }

    #[test]
    fn finding_wire_shape() {
        let finding = ComplianceFinding {
            requirement: Requirement {
                ordinal: 0,
                text: "Do X".into(),
            },
            compliance_info: "No matching regulations found.".into(),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["requirement"], "Do X");
        assert_eq!(json["compliance_info"], "No matching regulations found.");
    }

    #[test]
    fn chat_turn_roles() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "hi"}"#).unwrap();
        assert_eq!(turn.role, ChatRole::Assistant);
    }

    #[test]
    fn bulk_options() {
        let opts = RetrieveOptions::bulk(100);
        assert_eq!(opts.mode, SearchMode::Dense);
        assert_eq!(opts.top_k, 100);
        assert!(!opts.rerank);
    }
}
