use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use aula_index::IndexError;
use aula_llm::LlmError;
use serde::Serialize;

/// Stable, caller-facing classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    InvalidRequest,
    IndexNotFound,
    IndexCorrupt,
    Retrieval,
    SchemaValidation,
    Generation,
    Timeout,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InvalidRequest => "invalid_request",
            Self::IndexNotFound => "index_not_found",
            Self::IndexCorrupt => "index_corrupt",
            Self::Retrieval => "retrieval",
            Self::SchemaValidation => "schema_validation",
            Self::Generation => "generation",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reason a model output was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path to the offending field, `$` for the root.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_violations(.violations))]
pub struct SchemaValidationError {
    pub violations: Vec<Violation>,
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no index has been built yet (expected at {})", .0.display())]
    IndexNotFound(PathBuf),

    #[error("index at {} is unusable: {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("model output did not match the lesson plan schema: {0}")]
    SchemaValidation(#[from] SchemaValidationError),

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("{stage} timed out after {}s", after.as_secs())]
    Timeout { stage: String, after: Duration },
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::IndexNotFound(_) => ErrorKind::IndexNotFound,
            Self::IndexCorrupt { .. } => ErrorKind::IndexCorrupt,
            Self::Retrieval(_) => ErrorKind::Retrieval,
            Self::SchemaValidation(_) => ErrorKind::SchemaValidation,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Wrap a provider error raised while generating, keeping timeouts distinct.
    pub(crate) fn generation(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { provider, after } => Self::Timeout {
                stage: format!("generation ({provider})"),
                after,
            },
            other => Self::Generation(other),
        }
    }

    /// Wrap a provider error raised while answering a retrieval query.
    pub(crate) fn retrieval(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { provider, after } => Self::Timeout {
                stage: format!("retrieval ({provider})"),
                after,
            },
            other => Self::Retrieval(Box::new(other)),
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(path) => Self::IndexNotFound(path),
            IndexError::Corrupt { path, reason } => Self::IndexCorrupt { path, reason },
            IndexError::InvalidChunking { .. } => Self::Configuration(err.to_string()),
            IndexError::Embedding(e) => Self::retrieval(e),
            other => Self::Retrieval(Box::new(other)),
        }
    }
}
