use std::time::Duration;

use aula_llm::LlmProvider;
use aula_llm::provider::with_timeout;

use crate::error::Result;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Borrowed embedding provider with a per-call timeout and batch size.
#[derive(Debug)]
pub struct Embedder<'a, P> {
    provider: &'a P,
    timeout: Duration,
    batch_size: usize,
}

impl<P> Clone for Embedder<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Embedder<'_, P> {}

impl<'a, P: LlmProvider> Embedder<'a, P> {
    #[must_use]
    pub fn new(provider: &'a P, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// # Errors
    ///
    /// Returns the provider error, or a timeout if the call exceeds the limit.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = with_timeout(self.provider.name(), self.timeout, self.provider.embed(text)).await?;
        Ok(vector)
    }

    /// Embed `texts` in batches, preserving order. Each batch gets its own timeout.
    ///
    /// # Errors
    ///
    /// Returns the first failing batch's error.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let mut out =
                with_timeout(self.provider.name(), self.timeout, self.provider.embed_batch(batch))
                    .await?;
            tracing::debug!(batch = i, size = out.len(), "embedded batch");
            vectors.append(&mut out);
        }
        Ok(vectors)
    }
}
