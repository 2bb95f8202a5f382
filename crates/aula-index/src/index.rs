//! Exact nearest-neighbour index over chunk embeddings.

use std::path::{Path, PathBuf};

use aula_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::document::Chunk;
use crate::embedder::Embedder;
use crate::error::{IndexError, Result};
use crate::store::{self, FORMAT_VERSION, IndexFile, StoredChunk};

/// Path reported for errors raised on an index that has no file behind it.
const IN_MEMORY: &str = "<memory>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// `1 - cosine_similarity`; zero vectors are at distance 1 from everything.
    Cosine,
}

impl DistanceMetric {
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => {
                let mut dot = 0.0f32;
                let mut na = 0.0f32;
                let mut nb = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                let denom = na.sqrt() * nb.sqrt();
                if denom == 0.0 { 1.0 } else { 1.0 - dot / denom }
            }
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    entries: Vec<IndexedChunk>,
    dimension: usize,
    metric: DistanceMetric,
    embedding_provider: String,
}

impl EmbeddingIndex {
    /// Assemble an index from pre-computed entries.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Corrupt` if the vectors do not all share one dimension.
    pub fn from_entries(
        entries: Vec<IndexedChunk>,
        metric: DistanceMetric,
        embedding_provider: impl Into<String>,
    ) -> Result<Self> {
        let dimension = entries.first().map_or(0, |e| e.vector.len());
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(IndexError::Corrupt {
                path: PathBuf::from(IN_MEMORY),
                reason: format!(
                    "vector of length {} mixed with dimension {dimension}",
                    bad.vector.len()
                ),
            });
        }
        Ok(Self {
            entries,
            dimension,
            metric,
            embedding_provider: embedding_provider.into(),
        })
    }

    /// Embed every chunk and build the in-memory structure. Does not touch disk.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding call fails or the provider returns the wrong count.
    pub async fn embed_chunks<P: LlmProvider>(
        embedder: &Embedder<'_, P>,
        chunks: Vec<Chunk>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_all(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(aula_llm::LlmError::Other(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            ))));
        }
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect();
        Self::from_entries(entries, metric, embedder.provider_name())
    }

    /// Embed `chunks` and persist the result at `path`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or writing fails. On error the previous file is left intact.
    pub async fn build<P: LlmProvider>(
        embedder: &Embedder<'_, P>,
        chunks: Vec<Chunk>,
        metric: DistanceMetric,
        path: &Path,
    ) -> Result<Self> {
        let index = Self::embed_chunks(embedder, chunks, metric).await?;
        index.save(path).await?;
        tracing::info!(
            path = %path.display(),
            chunks = index.len(),
            dimension = index.dimension,
            "index built"
        );
        Ok(index)
    }

    /// # Errors
    ///
    /// Returns an error if serialisation or the atomic write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let chunks: Vec<StoredChunk> = self.entries.iter().map(StoredChunk::from).collect();
        let mut file = IndexFile {
            format_version: FORMAT_VERSION,
            metric: self.metric,
            dimension: self.dimension,
            embedding_provider: self.embedding_provider.clone(),
            created_at_unix: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            checksum: String::new(),
            chunks,
        };
        file.checksum = file.digest();
        store::write_atomic(path, &file).await
    }

    /// Load a persisted index and check it against the active provider.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotFound` when no index exists at `path`, and
    /// `IndexError::Corrupt` when the file is unreadable or its dimension differs
    /// from what the provider produces.
    pub async fn load<P: LlmProvider>(embedder: &Embedder<'_, P>, path: &Path) -> Result<Self> {
        let file = store::read(path).await?;

        if file.embedding_provider != embedder.provider_name() {
            tracing::warn!(
                stored = %file.embedding_provider,
                active = %embedder.provider_name(),
                "index was built with a different embedding provider"
            );
        }

        if !file.chunks.is_empty() {
            let sample = embedder.embed("dimension check").await?;
            if sample.len() != file.dimension {
                return Err(IndexError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!(
                        "index dimension {} does not match provider dimension {}",
                        file.dimension,
                        sample.len()
                    ),
                });
            }
        }

        let entries = file.chunks.into_iter().map(IndexedChunk::from).collect();
        let index = Self {
            entries,
            dimension: file.dimension,
            metric: file.metric,
            embedding_provider: file.embedding_provider,
        };
        tracing::info!(
            path = %path.display(),
            chunks = index.len(),
            dimension = index.dimension,
            "index loaded"
        );
        Ok(index)
    }

    /// Embed `query` and return the `k` closest chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the query dimension does not match.
    pub async fn search<P: LlmProvider>(
        &self,
        embedder: &Embedder<'_, P>,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let vector = embedder.embed(query).await?;
        self.nearest(&vector, k)
    }

    /// The `k` closest entries to `query`, ascending by distance. Equal distances
    /// keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Corrupt` if `query` has the wrong dimension.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::Corrupt {
                path: PathBuf::from(IN_MEMORY),
                reason: format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    self.dimension
                ),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.metric.distance(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn embedding_provider(&self) -> &str {
        &self.embedding_provider
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexedChunk> {
        self.entries.iter()
    }
}
