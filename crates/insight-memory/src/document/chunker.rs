use std::path::{Path, PathBuf};

use super::loader::PdfLoader;
use super::splitter::{SplitterConfig, TextSplitter};
use super::types::Chunk;
use super::{DocumentError, DocumentLoader};

/// Pages with fewer trimmed characters than this are treated as covers or blanks.
pub const DEFAULT_MIN_PAGE_CHARS: usize = 100;

/// Counters for one chunking run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkingReport {
    pub documents_found: usize,
    pub documents_failed: usize,
    pub pages_kept: usize,
    pub pages_discarded: usize,
    pub chunks: usize,
}

/// Loads every supported file in a directory and splits its pages into chunks.
pub struct DirectoryChunker {
    loader: Box<dyn DocumentLoader>,
    splitter: TextSplitter,
    min_page_chars: usize,
}

impl DirectoryChunker {
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidArgument` for an invalid splitter configuration.
    pub fn new(
        loader: impl DocumentLoader + 'static,
        config: SplitterConfig,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            loader: Box::new(loader),
            splitter: TextSplitter::new(config)?,
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
        })
    }

    #[must_use]
    pub fn with_min_page_chars(mut self, min_page_chars: usize) -> Self {
        self.min_page_chars = min_page_chars;
        self
    }

    /// Chunk every supported document in `dir`, in sorted path order.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Io` if `dir` cannot be listed. Failures of
    /// individual documents are logged and skipped.
    pub async fn chunk_directory(&self, dir: &Path) -> Result<Vec<Chunk>, DocumentError> {
        self.chunk_directory_with_report(dir)
            .await
            .map(|(chunks, _)| chunks)
    }

    /// Like [`Self::chunk_directory`], also returning the run counters.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Io` if `dir` cannot be listed.
    pub async fn chunk_directory_with_report(
        &self,
        dir: &Path,
    ) -> Result<(Vec<Chunk>, ChunkingReport), DocumentError> {
        let paths = self.discover(dir).await?;
        let mut report = ChunkingReport {
            documents_found: paths.len(),
            ..ChunkingReport::default()
        };

        if paths.is_empty() {
            tracing::warn!(
                dir = %dir.display(),
                extensions = ?self.loader.supported_extensions(),
                "no documents found"
            );
            return Ok((Vec::new(), report));
        }

        let mut chunks = Vec::new();
        for path in &paths {
            let pages = match self.loader.load(path).await {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
                    report.documents_failed += 1;
                    continue;
                }
            };

            let before = chunks.len();
            for page in &pages {
                if page.content.chars().count() < self.min_page_chars {
                    report.pages_discarded += 1;
                    continue;
                }
                report.pages_kept += 1;
                chunks.extend(self.splitter.split(page));
            }
            tracing::debug!(
                path = %path.display(),
                pages = pages.len(),
                chunks = chunks.len() - before,
                "document chunked"
            );
        }

        report.chunks = chunks.len();
        tracing::info!(
            documents = report.documents_found,
            failed = report.documents_failed,
            pages_kept = report.pages_kept,
            pages_discarded = report.pages_discarded,
            chunks = report.chunks,
            "chunking complete"
        );
        Ok((chunks, report))
    }

    async fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
        let supported = self.loader.supported_extensions();
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| supported.iter().any(|s| s.eq_ignore_ascii_case(ext)));
            if matches {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Chunk every PDF in `dir` with the default page threshold.
///
/// # Errors
///
/// Returns `DocumentError::InvalidArgument` for invalid sizes and
/// `DocumentError::Io` if `dir` cannot be listed.
pub async fn chunk_documents(
    dir: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, DocumentError> {
    DirectoryChunker::new(
        PdfLoader::default(),
        SplitterConfig {
            chunk_size,
            chunk_overlap,
        },
    )?
    .chunk_directory(dir)
    .await
}
