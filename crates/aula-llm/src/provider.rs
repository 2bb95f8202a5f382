use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request sampling options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChatOptions {
    /// `None` leaves the backend default in place.
    pub temperature: Option<f32>,
    /// Ask the backend to constrain output to a single JSON value where supported.
    pub json_output: bool,
}

impl ChatOptions {
    #[must_use]
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            json_output: false,
        }
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a single text into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider does not support embeddings or the call fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts, preserving input order.
    ///
    /// Backends with a native batch endpoint override this; the default embeds one by one.
    ///
    /// # Errors
    ///
    /// Returns the first embedding error encountered.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    fn supports_embeddings(&self) -> bool;

    fn name(&self) -> &str;

    /// Single-prompt completion at a fixed temperature.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`LlmProvider::chat`].
    fn complete(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> impl Future<Output = Result<String, LlmError>> + Send {
        async move {
            let messages = [Message::user(prompt)];
            self.chat(&messages, &ChatOptions::with_temperature(temperature))
                .await
        }
    }
}

/// Bound a provider call by `limit`, mapping expiry to [`LlmError::Timeout`].
///
/// # Errors
///
/// Returns `LlmError::Timeout` when the call does not finish in time, otherwise the call's own result.
pub async fn with_timeout<T, F>(provider: &str, limit: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(provider, timeout_secs = limit.as_secs(), "provider call timed out");
            Err(LlmError::Timeout {
                provider: provider.to_owned(),
                after: limit,
            })
        }
    }
}
