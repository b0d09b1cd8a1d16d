use std::sync::Arc;

use conforma_core::{DocumentStore, PipelineConfig, TextGenerator};

/// Dependency-injected collaborators for one or more pipeline runs.
///
/// Constructed once at process start and shared; holds no cross-run mutable
/// state. Tests substitute stub collaborators.
#[derive(Clone)]
pub struct AnalysisContext {
    pub store: Arc<dyn DocumentStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub config: PipelineConfig,
}

impl AnalysisContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn TextGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }
}
