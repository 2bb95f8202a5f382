//! On-disk index format.
//!
//! The whole index lives in one JSON file. Writes go to a sibling temp file that is
//! renamed over the target, so readers never observe a partial file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, DocumentMetadata};
use crate::error::{IndexError, Result};
use crate::index::{DistanceMetric, IndexedChunk};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexFile {
    pub format_version: u32,
    pub metric: DistanceMetric,
    pub dimension: usize,
    pub embedding_provider: String,
    pub created_at_unix: u64,
    pub checksum: String,
    pub chunks: Vec<StoredChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredChunk {
    pub content: String,
    pub source: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
    pub chunk_index: usize,
    pub offset: usize,
    pub vector: Vec<f32>,
}

impl From<&IndexedChunk> for StoredChunk {
    fn from(entry: &IndexedChunk) -> Self {
        Self {
            content: entry.chunk.content.clone(),
            source: entry.chunk.metadata.source.clone(),
            content_type: entry.chunk.metadata.content_type.clone(),
            extra: entry.chunk.metadata.extra.clone(),
            chunk_index: entry.chunk.chunk_index,
            offset: entry.chunk.offset,
            vector: entry.vector.clone(),
        }
    }
}

impl From<StoredChunk> for IndexedChunk {
    fn from(stored: StoredChunk) -> Self {
        Self {
            chunk: Chunk {
                content: stored.content,
                metadata: DocumentMetadata {
                    source: stored.source,
                    content_type: stored.content_type,
                    extra: stored.extra,
                },
                chunk_index: stored.chunk_index,
                offset: stored.offset,
            },
            vector: stored.vector,
        }
    }
}

impl IndexFile {
    /// blake3 digest over every field except `checksum`.
    pub(crate) fn digest(&self) -> String {
        fn text(hasher: &mut blake3::Hasher, s: &str) {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.format_version.to_le_bytes());
        text(
            &mut hasher,
            match self.metric {
                DistanceMetric::L2 => "l2",
                DistanceMetric::Cosine => "cosine",
            },
        );
        hasher.update(&(self.dimension as u64).to_le_bytes());
        text(&mut hasher, &self.embedding_provider);
        hasher.update(&self.created_at_unix.to_le_bytes());
        hasher.update(&(self.chunks.len() as u64).to_le_bytes());
        for chunk in &self.chunks {
            text(&mut hasher, &chunk.content);
            text(&mut hasher, &chunk.source);
            text(&mut hasher, &chunk.content_type);
            let mut extra: Vec<_> = chunk.extra.iter().collect();
            extra.sort();
            hasher.update(&(extra.len() as u64).to_le_bytes());
            for (key, value) in extra {
                text(&mut hasher, key);
                text(&mut hasher, value);
            }
            hasher.update(&(chunk.chunk_index as u64).to_le_bytes());
            hasher.update(&(chunk.offset as u64).to_le_bytes());
            hasher.update(&(chunk.vector.len() as u64).to_le_bytes());
            for v in &chunk.vector {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) async fn write_atomic(path: &Path, file: &IndexFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(file)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "index file written");
    Ok(())
}

/// Read and verify an index file.
pub(crate) async fn read(path: &Path) -> Result<IndexFile> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| IndexError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let file: IndexFile =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("unreadable: {e}")))?;

    if file.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            file.format_version
        )));
    }
    if file.digest() != file.checksum {
        return Err(corrupt("checksum mismatch".into()));
    }
    if let Some(bad) = file.chunks.iter().find(|c| c.vector.len() != file.dimension) {
        return Err(corrupt(format!(
            "vector of length {} in a {}-dimensional index",
            bad.vector.len(),
            file.dimension
        )));
    }
    Ok(file)
}
