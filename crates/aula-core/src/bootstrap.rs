//! Wiring from [`Config`] to a ready pipeline.

use std::path::Path;
use std::sync::Arc;

use aula_index::corpus::CorpusLoader;
use aula_index::{Chunker, ChunkerConfig, IndexBuilder, IndexHandle, IndexReport};
use aula_llm::LlmProvider;
use aula_llm::any::AnyProvider;
use aula_llm::ollama::OllamaProvider;
use aula_llm::openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};
use crate::context::{PipelineContext, PipelineSettings};
use crate::error::PipelineError;

/// # Errors
///
/// Returns `PipelineError::Configuration` when the selected provider lacks credentials.
pub fn create_provider(config: &Config) -> Result<AnyProvider, PipelineError> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.llm.embedding_model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .ok_or_else(|| {
                    PipelineError::Configuration(
                        "AULA_OPENAI_API_KEY (or OPENAI_API_KEY) is required for the openai provider"
                            .into(),
                    )
                })?
                .expose()
                .to_owned();
            let mut provider = OpenAiProvider::new(
                api_key,
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                Some(config.llm.embedding_model.clone()),
            )
            .with_client(aula_llm::http::client_with_timeout(config.timeouts.llm()))
            .with_max_retries(config.llm.rate_limit_retries);
            if let Some(max_tokens) = config.llm.max_tokens {
                provider = provider.with_max_tokens(max_tokens);
            }
            Ok(AnyProvider::OpenAi(provider))
        }
    }
}

#[must_use]
pub fn index_handle(config: &Config) -> Arc<IndexHandle> {
    Arc::new(IndexHandle::new(&config.index.path, config.index.metric))
}

#[must_use]
pub fn build_context<P: LlmProvider>(config: &Config, provider: Arc<P>) -> PipelineContext<P> {
    PipelineContext::new(
        provider,
        index_handle(config),
        PipelineSettings::from_config(config),
    )
}

/// # Errors
///
/// Returns `PipelineError::Configuration` for invalid chunking settings.
pub fn index_builder(config: &Config) -> Result<IndexBuilder, PipelineError> {
    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: config.index.chunk_size,
        chunk_overlap: config.index.chunk_overlap,
    })?;
    Ok(IndexBuilder::new(chunker)
        .with_corpus_loader(CorpusLoader::with_max_file_size(config.index.max_file_size)))
}

/// Scan `corpus_dir` and replace the index behind `ctx`.
///
/// # Errors
///
/// Returns an error if the corpus cannot be read, embedded, or persisted.
pub async fn rebuild_index<P: LlmProvider>(
    ctx: &PipelineContext<P>,
    config: &Config,
    corpus_dir: &Path,
) -> Result<IndexReport, PipelineError> {
    let builder = index_builder(config)?;
    let (_, report) = builder
        .build_from_dir(&ctx.embedder(), ctx.index(), corpus_dir)
        .await?;
    tracing::info!(
        files = report.files_indexed,
        skipped = report.files_skipped,
        chunks = report.chunks,
        dimension = report.dimension,
        duration_ms = report.duration_ms,
        "index rebuilt"
    );
    Ok(report)
}
