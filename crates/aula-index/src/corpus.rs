//! Corpus ingestion: walk → load → chunk → embed → persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aula_llm::LlmProvider;

use crate::chunker::Chunker;
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, TextLoader};
use crate::embedder::Embedder;
use crate::error::Result;
use crate::handle::IndexHandle;
use crate::index::EmbeddingIndex;

/// Summary of an ingestion run.
#[derive(Debug, Default, serde::Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Documents found under a corpus directory.
#[derive(Debug, Default)]
pub struct CorpusScan {
    pub documents: Vec<Document>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub errors: Vec<String>,
}

/// Maps file extensions to loaders.
pub struct CorpusLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for CorpusLoader {
    fn default() -> Self {
        Self::with_max_file_size(DEFAULT_MAX_FILE_SIZE)
    }
}

impl CorpusLoader {
    /// Every built-in loader, each rejecting files above `max_file_size` bytes.
    #[must_use]
    pub fn with_max_file_size(max_file_size: u64) -> Self {
        #[cfg_attr(not(feature = "pdf"), allow(unused_mut))]
        let mut loaders: Vec<Box<dyn DocumentLoader>> =
            vec![Box::new(TextLoader { max_file_size })];
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(crate::document::PdfLoader { max_file_size }));
        Self { loaders }
    }

    #[must_use]
    pub fn new(loaders: Vec<Box<dyn DocumentLoader>>) -> Self {
        Self { loaders }
    }

    /// Loader registered for `path`, if any.
    #[must_use]
    pub fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        self.loaders
            .iter()
            .find(|l| l.supports(path))
            .map(|l| &**l)
    }

    /// Load every supported file under `dir`, in path order.
    ///
    /// Files without a loader are skipped. Files that fail to load are recorded in
    /// `errors` and the scan continues.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` does not exist or is not a directory.
    pub async fn scan(&self, dir: &Path) -> Result<CorpusScan> {
        let meta = tokio::fs::metadata(dir).await.map_err(DocumentError::Io)?;
        if !meta.is_dir() {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", dir.display()),
            ))
            .into());
        }

        let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(dir)
            .hidden(true)
            .git_ignore(true)
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .collect();
        files.sort();

        let mut scan = CorpusScan::default();
        for path in &files {
            scan.files_scanned += 1;
            let Some(loader) = self.loader_for(path) else {
                tracing::debug!(file = %path.display(), "no loader, skipping");
                scan.files_skipped += 1;
                continue;
            };
            match loader.load(path).await {
                Ok(mut docs) => scan.documents.append(&mut docs),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to load document");
                    scan.errors.push(format!("{}: {e}", path.display()));
                }
            }
        }
        Ok(scan)
    }
}

/// Ingests a corpus directory into an [`IndexHandle`].
pub struct IndexBuilder {
    chunker: Chunker,
    corpus: CorpusLoader,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(chunker: Chunker) -> Self {
        Self {
            chunker,
            corpus: CorpusLoader::default(),
        }
    }

    #[must_use]
    pub fn with_corpus_loader(mut self, corpus: CorpusLoader) -> Self {
        self.corpus = corpus;
        self
    }

    /// Scan `dir`, chunk every document, and rebuild the index behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unreadable, embedding fails, or the
    /// index cannot be written.
    pub async fn build_from_dir<P: LlmProvider>(
        &self,
        embedder: &Embedder<'_, P>,
        handle: &IndexHandle,
        dir: &Path,
    ) -> Result<(Arc<EmbeddingIndex>, IndexReport)> {
        let start = std::time::Instant::now();
        let scan = self.corpus.scan(dir).await?;

        let files_indexed = scan.documents.len();
        if scan.files_scanned > 0 && files_indexed == 0 {
            tracing::warn!(
                dir = %dir.display(),
                files = scan.files_scanned,
                "no document loaded from the corpus"
            );
        }
        let chunks = self.chunker.split_all(&scan.documents);
        tracing::info!(
            files = scan.files_scanned,
            documents = files_indexed,
            chunks = chunks.len(),
            "corpus chunked"
        );

        let index = handle.rebuild(embedder, chunks).await?;

        let report = IndexReport {
            files_scanned: scan.files_scanned,
            files_indexed,
            files_skipped: scan.files_skipped,
            chunks: index.len(),
            dimension: index.dimension(),
            errors: scan.errors,
            duration_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        };
        Ok((index, report))
    }
}
