use std::sync::Arc;
use std::time::Duration;

use aula_index::{Embedder, IndexHandle};
use aula_llm::LlmProvider;

use crate::config::Config;
use crate::generator::Generator;
use crate::planner::Planner;
use crate::retriever::RetrieverTool;

/// Tunables shared by every pipeline component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub temperature: f32,
    pub max_retries: u32,
    pub embed_batch_size: usize,
    pub llm_timeout: Duration,
    pub embedding_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            temperature: config.llm.temperature,
            max_retries: config.generation.max_retries,
            embed_batch_size: config.index.embed_batch_size,
            llm_timeout: config.timeouts.llm(),
            embedding_timeout: config.timeouts.embedding(),
            request_timeout: config.timeouts.request(),
        }
    }
}

/// Owns the provider and the index handle. Components borrow it per request.
pub struct PipelineContext<P> {
    provider: Arc<P>,
    index: Arc<IndexHandle>,
    settings: PipelineSettings,
}

impl<P> Clone for PipelineContext<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            index: Arc::clone(&self.index),
            settings: self.settings,
        }
    }
}

impl<P: LlmProvider> PipelineContext<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, index: Arc<IndexHandle>, settings: PipelineSettings) -> Self {
        Self {
            provider,
            index,
            settings,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn embedder(&self) -> Embedder<'_, P> {
        Embedder::new(self.provider.as_ref(), self.settings.embedding_timeout)
            .with_batch_size(self.settings.embed_batch_size)
    }

    #[must_use]
    pub fn retriever(&self) -> RetrieverTool<'_, P> {
        RetrieverTool::new(self)
    }

    #[must_use]
    pub fn generator(&self) -> Generator<'_, P> {
        Generator::new(self)
    }

    #[must_use]
    pub fn planner(&self) -> Planner<'_, P> {
        Planner::new(self)
    }
}
