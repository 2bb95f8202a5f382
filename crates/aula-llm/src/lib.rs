//! Chat completion and embedding provider abstraction with OpenAI and Ollama backends.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
mod retry;

pub use error::LlmError;
pub use provider::{ChatOptions, LlmProvider, Message, Role};
