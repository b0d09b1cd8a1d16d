//! Stub collaborators for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use conforma_core::{
    BackendError, ChatTurn, DocumentSelection, DocumentStore, FragmentStream, Partition,
    PipelineConfig, RetrieveOptions, SearchExcerpt, TextGenerator,
};

use crate::AnalysisContext;

/// Build a context around stub collaborators, returning handles for
/// post-run inspection.
pub fn ctx_with(
    store: StubStore,
    generator: StubGenerator,
) -> (AnalysisContext, Arc<StubStore>, Arc<StubGenerator>) {
    let store = Arc::new(store);
    let generator = Arc::new(generator);
    let ctx = AnalysisContext::new(
        store.clone(),
        generator.clone(),
        PipelineConfig::default(),
    );
    (ctx, store, generator)
}

/// Canned document store: bulk fetches return fixed chunks, ranked queries
/// are answered from a query-text map.
#[derive(Default)]
pub struct StubStore {
    bulk_chunks: Vec<String>,
    fail_bulk: bool,
    excerpts: HashMap<String, Vec<SearchExcerpt>>,
    failing_queries: HashSet<String>,
    bulk_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl StubStore {
    pub fn with_bulk(mut self, chunks: &[&str]) -> Self {
        self.bulk_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_failing_bulk(mut self) -> Self {
        self.fail_bulk = true;
        self
    }

    pub fn with_excerpts(mut self, query: &str, excerpts: Vec<SearchExcerpt>) -> Self {
        self.excerpts.insert(query.to_string(), excerpts);
        self
    }

    pub fn with_failing_query(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for StubStore {
    async fn retrieve(
        &self,
        _partition: Partition,
        query: &str,
        filter: &DocumentSelection,
        _options: &RetrieveOptions,
    ) -> Result<Vec<SearchExcerpt>, BackendError> {
        if query.is_empty() {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_bulk {
                return Err(BackendError::new("store unavailable"));
            }
            let doc_id = filter.iter().next().unwrap_or("doc").to_string();
            return Ok(self
                .bulk_chunks
                .iter()
                .map(|text| SearchExcerpt {
                    text: text.clone(),
                    score: 1.0,
                    doc_id: doc_id.clone(),
                })
                .collect());
        }

        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_queries.contains(query) {
            return Err(BackendError::new("query backend failed"));
        }
        Ok(self.excerpts.get(query).cloned().unwrap_or_default())
    }

    async fn list_documents(&self, _partition: Partition) -> Result<Vec<String>, BackendError> {
        Ok(Vec::new())
    }

    async fn upsert(
        &self,
        _partition: Partition,
        _doc_id: &str,
        _text: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn delete(&self, _partition: Partition, _doc_id: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// One recorded `stream_chat` invocation.
#[derive(Clone)]
pub struct ChatCall {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
}

/// Canned text generator recording every prompt it sees.
#[derive(Default)]
pub struct StubGenerator {
    completion: Option<String>,
    fail_completion: bool,
    stream_fragments: Vec<String>,
    fail_stream: bool,
    completion_prompts: Mutex<Vec<String>>,
    chat_calls: Mutex<Vec<ChatCall>>,
}

impl StubGenerator {
    pub fn with_completion(mut self, response: &str) -> Self {
        self.completion = Some(response.to_string());
        self
    }

    pub fn with_failing_completion(mut self) -> Self {
        self.fail_completion = true;
        self
    }

    pub fn with_stream(mut self, fragments: &[&str]) -> Self {
        self.stream_fragments = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_failing_stream(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    pub fn completion_prompts(&self) -> Vec<String> {
        self.completion_prompts.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> Vec<ChatCall> {
        self.chat_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        self.completion_prompts
            .lock()
            .unwrap()
            .push(prompt.to_string());
        if self.fail_completion {
            return Err(BackendError::new("generator unavailable"));
        }
        Ok(self.completion.clone().unwrap_or_default())
    }

    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<FragmentStream, BackendError> {
        self.chat_calls.lock().unwrap().push(ChatCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            message: message.to_string(),
        });
        if self.fail_stream {
            return Err(BackendError::new("stream refused"));
        }
        let fragments: Vec<Result<String, BackendError>> =
            self.stream_fragments.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(fragments).boxed())
    }
}
