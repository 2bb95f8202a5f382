mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::Context;

use crate::secret::Secret;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// Read provider credentials from the environment.
    ///
    /// `AULA_OPENAI_API_KEY` wins over the conventional `OPENAI_API_KEY`.
    pub fn resolve_secrets(&mut self) {
        let key = std::env::var("AULA_OPENAI_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .map(Secret::new)
            .filter(|s| !s.is_empty());
        if key.is_some() {
            self.secrets.openai_api_key = key;
        }
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        aula_index::ChunkerConfig {
            chunk_size: self.index.chunk_size,
            chunk_overlap: self.index.chunk_overlap,
        }
        .validate()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            );
        }
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be at least 1");
        }
        if self.generation.max_retries > 1 {
            anyhow::bail!(
                "generation.max_retries must be 0 or 1, got {}",
                self.generation.max_retries
            );
        }
        if self.index.embed_batch_size == 0 {
            anyhow::bail!("index.embed_batch_size must be at least 1");
        }
        let t = &self.timeouts;
        if t.llm_seconds == 0 || t.embedding_seconds == 0 || t.request_seconds == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        if self.llm.embedding_model.trim().is_empty() {
            anyhow::bail!("llm.embedding_model must not be empty");
        }
        Ok(())
    }
}
