use aula_index::SearchHit;
use aula_llm::provider::with_timeout;
use aula_llm::{ChatOptions, LlmProvider, Message};

use crate::context::PipelineContext;
use crate::error::PipelineError;

pub const TOOL_NAME: &str = "BuscarBNCC";

pub const TOOL_DESCRIPTION: &str = "Use esta ferramenta para procurar as habilidades da BNCC de acordo com o tema, conteúdo e público-alvo (ano/série).";

const QA_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

/// Chunks found for a query and the grounding text built from them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    pub hits: Vec<SearchHit>,
    pub text: String,
}

impl RetrievedContext {
    fn from_hits(hits: Vec<SearchHit>) -> Self {
        let text = hits
            .iter()
            .map(|h| h.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { hits, text }
    }
}

/// Answers curriculum questions from the indexed corpus.
pub struct RetrieverTool<'a, P> {
    ctx: &'a PipelineContext<P>,
}

impl<'a, P: LlmProvider> RetrieverTool<'a, P> {
    #[must_use]
    pub fn new(ctx: &'a PipelineContext<P>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        TOOL_NAME
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// The `top_k` chunks nearest to `query`.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound`/`IndexCorrupt` if the index cannot be loaded and
    /// `Retrieval` or `Timeout` if embedding the query fails.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, PipelineError> {
        let embedder = self.ctx.embedder();
        let index = self.ctx.index().current(&embedder).await?;
        let hits = index
            .search(&embedder, query, self.ctx.settings().top_k)
            .await?;
        tracing::info!(
            hits = hits.len(),
            best_distance = hits.first().map(|h| h.distance),
            "retrieved context"
        );
        Ok(RetrievedContext::from_hits(hits))
    }

    /// Answer `query` using only the retrieved context. An empty context still
    /// reaches the model, which is told to admit it does not know.
    ///
    /// # Errors
    ///
    /// Propagates retrieval failures, and maps a failing completion to `Retrieval`
    /// or `Timeout`.
    pub async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        let context = self.retrieve(query).await?;
        let messages = [
            Message::system(format!("{QA_SYSTEM_PROMPT}{}", context.text)),
            Message::user(query),
        ];
        let provider = self.ctx.provider();
        let settings = self.ctx.settings();
        with_timeout(
            provider.name(),
            settings.llm_timeout,
            provider.chat(&messages, &ChatOptions::with_temperature(settings.temperature)),
        )
        .await
        .map_err(PipelineError::retrieval)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aula_index::document::{Chunk, DocumentMetadata};
    use aula_index::index::IndexedChunk;
    use aula_index::{DistanceMetric, EmbeddingIndex, IndexHandle};
    use aula_llm::mock::MockProvider;

    use super::*;
    use crate::context::PipelineSettings;
    use crate::error::ErrorKind;

    fn entry(content: &str, index: usize, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk {
                content: content.into(),
                metadata: DocumentMetadata::new("bncc.txt", "text/plain"),
                chunk_index: index,
                offset: 0,
            },
            vector,
        }
    }

    async fn context_with(
        provider: MockProvider,
        entries: Vec<IndexedChunk>,
        top_k: usize,
    ) -> PipelineContext<MockProvider> {
        let handle = IndexHandle::new("/nonexistent/index.json", DistanceMetric::L2);
        handle
            .install(EmbeddingIndex::from_entries(entries, DistanceMetric::L2, "mock").unwrap())
            .await;
        let settings = PipelineSettings {
            top_k,
            ..PipelineSettings::default()
        };
        PipelineContext::new(Arc::new(provider), Arc::new(handle), settings)
    }

    fn axis(text: &str) -> Vec<f32> {
        if text.contains("geometria") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        }
    }

    #[tokio::test]
    async fn retrieve_returns_top_k_nearest() {
        let provider = MockProvider::default().with_embedder(axis);
        let ctx = context_with(
            provider,
            vec![
                entry("EF09MA19 volumes de prismas", 0, vec![0.0, 1.0]),
                entry("EF09MA17 geometria espacial", 1, vec![1.0, 0.0]),
                entry("EF06MA01 números naturais", 2, vec![0.2, 0.8]),
            ],
            2,
        )
        .await;

        let context = ctx.retriever().retrieve("geometria espacial").await.unwrap();
        assert_eq!(context.hits.len(), 2);
        assert_eq!(context.hits[0].chunk.content, "EF09MA17 geometria espacial");
        assert_eq!(context.hits[1].chunk.content, "EF06MA01 números naturais");
        assert_eq!(
            context.text,
            "EF09MA17 geometria espacial\n\nEF06MA01 números naturais"
        );
    }

    #[tokio::test]
    async fn answer_grounds_the_model_in_context() {
        let provider = MockProvider::with_responses(vec!["EF09MA17".into()]);
        let ctx = context_with(
            provider.clone(),
            vec![entry("EF09MA17 geometria espacial", 0, vec![0.0; 8])],
            4,
        )
        .await;

        let answer = ctx.retriever().answer("quais habilidades?").await.unwrap();
        assert_eq!(answer, "EF09MA17");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].messages[0].content.starts_with(QA_SYSTEM_PROMPT));
        assert!(calls[0].messages[0].content.ends_with("EF09MA17 geometria espacial"));
        assert_eq!(calls[0].prompt(), "quais habilidades?");
    }

    #[tokio::test]
    async fn empty_index_still_asks_the_model() {
        let provider = MockProvider::with_responses(vec!["não sei".into()]);
        let ctx = context_with(provider.clone(), Vec::new(), 4).await;

        let answer = ctx.retriever().answer("quais habilidades?").await.unwrap();
        assert_eq!(answer, "não sei");
        assert_eq!(provider.embed_count(), 0);
        assert_eq!(provider.calls()[0].messages[0].content, QA_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn failing_chat_is_retrieval_error() {
        let ctx = context_with(MockProvider::failing(), Vec::new(), 4).await;
        let err = ctx.retriever().answer("q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Retrieval);
    }

    #[test]
    fn tool_identity() {
        assert_eq!(TOOL_NAME, "BuscarBNCC");
        assert!(TOOL_DESCRIPTION.contains("BNCC"));
    }
}
