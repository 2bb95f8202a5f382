use std::path::{Path, PathBuf};
use std::sync::Arc;

use aula_llm::LlmProvider;
use tokio::sync::{Mutex, RwLock};

use crate::document::Chunk;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::index::{DistanceMetric, EmbeddingIndex};

/// Process-wide holder of the current index.
///
/// Readers clone the inner `Arc` and keep using it even if a rebuild swaps in a
/// new index meanwhile. Rebuilds are serialised, and so are first loads; neither
/// holds the slot lock while reading disk or embedding.
#[derive(Debug)]
pub struct IndexHandle {
    path: PathBuf,
    metric: DistanceMetric,
    current: RwLock<Option<Arc<EmbeddingIndex>>>,
    build_lock: Mutex<()>,
    load_lock: Mutex<()>,
}

impl IndexHandle {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, metric: DistanceMetric) -> Self {
        Self {
            path: path.into(),
            metric,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
            load_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// The current index, loading it from disk on first use.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotFound` or `IndexError::Corrupt` from the first load.
    /// A failed load is not cached; the next call tries again.
    pub async fn current<P: LlmProvider>(&self, embedder: &Embedder<'_, P>) -> Result<Arc<EmbeddingIndex>> {
        if let Some(index) = self.current.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let _loading = self.load_lock.lock().await;
        if let Some(index) = self.current.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }
        let loaded = Arc::new(EmbeddingIndex::load(embedder, &self.path).await?);

        // A rebuild may have installed a newer index while this one was loading.
        let mut slot = self.current.write().await;
        Ok(Arc::clone(slot.get_or_insert(loaded)))
    }

    /// Build a fresh index from `chunks`, persist it, then make it current.
    ///
    /// Searches keep running against the previous index until the swap.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or persisting fails; the previous index stays current.
    pub async fn rebuild<P: LlmProvider>(
        &self,
        embedder: &Embedder<'_, P>,
        chunks: Vec<Chunk>,
    ) -> Result<Arc<EmbeddingIndex>> {
        let _guard = self.build_lock.lock().await;
        let index = Arc::new(EmbeddingIndex::build(embedder, chunks, self.metric, &self.path).await?);
        *self.current.write().await = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Make `index` current without touching disk.
    pub async fn install(&self, index: EmbeddingIndex) -> Arc<EmbeddingIndex> {
        let index = Arc::new(index);
        *self.current.write().await = Some(Arc::clone(&index));
        index
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aula_llm::mock::MockProvider;

    use super::*;
    use crate::document::DocumentMetadata;
    use crate::error::IndexError;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.into(),
            metadata: DocumentMetadata::new("bncc.txt", "text/plain"),
            chunk_index: 0,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn current_without_file_is_not_found_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let handle = IndexHandle::new(dir.path().join("index.json"), DistanceMetric::L2);
        let mock = MockProvider::default();
        let embedder = Embedder::new(&mock, Duration::from_secs(1));

        assert!(matches!(
            handle.current(&embedder).await,
            Err(IndexError::NotFound(_))
        ));
        assert!(!handle.is_loaded().await);
    }

    #[tokio::test]
    async fn current_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mock = MockProvider::default();
        let embedder = Embedder::new(&mock, Duration::from_secs(1));
        EmbeddingIndex::build(&embedder, vec![chunk("a")], DistanceMetric::L2, &path)
            .await
            .unwrap();

        let handle = IndexHandle::new(&path, DistanceMetric::L2);
        let first = handle.current(&embedder).await.unwrap();
        let embeds_after_first = mock.embed_count();
        let second = handle.current(&embedder).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mock.embed_count(), embeds_after_first);
    }

    #[tokio::test]
    async fn readers_are_not_blocked_during_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mock = MockProvider::default();
        let embedder = Embedder::new(&mock, Duration::from_secs(1));
        EmbeddingIndex::build(&embedder, vec![chunk("a")], DistanceMetric::L2, &path)
            .await
            .unwrap();

        let slow = mock.clone().with_embed_delay(300);
        let slow_embedder = Embedder::new(&slow, Duration::from_secs(5));
        let handle = IndexHandle::new(&path, DistanceMetric::L2);

        let (loaded, observed) = tokio::join!(handle.current(&slow_embedder), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::time::timeout(Duration::from_millis(100), handle.is_loaded()).await
        });

        assert!(loaded.is_ok());
        assert!(matches!(observed, Ok(false)));
        assert!(handle.is_loaded().await);
    }

    #[tokio::test]
    async fn concurrent_first_loads_share_one_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mock = MockProvider::default();
        let embedder = Embedder::new(&mock, Duration::from_secs(1));
        EmbeddingIndex::build(&embedder, vec![chunk("a")], DistanceMetric::L2, &path)
            .await
            .unwrap();
        let embeds_before = mock.embed_count();

        let slow = mock.clone().with_embed_delay(100);
        let slow_embedder = Embedder::new(&slow, Duration::from_secs(5));
        let handle = IndexHandle::new(&path, DistanceMetric::L2);

        let (a, b) = tokio::join!(handle.current(&slow_embedder), handle.current(&slow_embedder));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(mock.embed_count(), embeds_before + 1);
    }

    #[tokio::test]
    async fn rebuild_swaps_but_old_arc_survives() {
        let dir = tempfile::tempdir().unwrap();
        let handle = IndexHandle::new(dir.path().join("index.json"), DistanceMetric::L2);
        let mock = MockProvider::default();
        let embedder = Embedder::new(&mock, Duration::from_secs(1));

        let old = handle.rebuild(&embedder, vec![chunk("a")]).await.unwrap();
        let new = handle
            .rebuild(&embedder, vec![chunk("b"), chunk("c")])
            .await
            .unwrap();

        assert_eq!(old.len(), 1);
        assert_eq!(new.len(), 2);
        assert!(Arc::ptr_eq(&handle.current(&embedder).await.unwrap(), &new));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let handle = IndexHandle::new(dir.path().join("index.json"), DistanceMetric::L2);
        let good = MockProvider::default();
        let embedder = Embedder::new(&good, Duration::from_secs(1));
        let before = handle.rebuild(&embedder, vec![chunk("a")]).await.unwrap();

        let bad = MockProvider::default().with_failing_embed();
        let failing = Embedder::new(&bad, Duration::from_secs(1));
        assert!(handle.rebuild(&failing, vec![chunk("b")]).await.is_err());

        assert!(Arc::ptr_eq(&handle.current(&embedder).await.unwrap(), &before));
    }
}
