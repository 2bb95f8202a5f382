//! Corpus ingestion and the embedding index used for retrieval.
//!
//! Documents are split by [`chunker::Chunker`], embedded through an
//! [`embedder::Embedder`], and held in an [`index::EmbeddingIndex`] persisted as a
//! single checksummed file. [`handle::IndexHandle`] owns the process-wide current index.

pub mod chunker;
pub mod corpus;
pub mod document;
pub mod embedder;
pub mod error;
pub mod handle;
pub mod index;
mod store;

pub use chunker::{Chunker, ChunkerConfig};
pub use corpus::{CorpusLoader, IndexBuilder, IndexReport};
pub use embedder::Embedder;
pub use error::IndexError;
pub use handle::IndexHandle;
pub use index::{DistanceMetric, EmbeddingIndex, SearchHit};
pub use store::FORMAT_VERSION;
