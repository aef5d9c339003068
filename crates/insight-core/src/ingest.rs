//! Offline ingestion job: chunk the document directory, embed in batches,
//! build the index, and persist it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use insight_llm::Embedder;
use insight_memory::document::{
    ChunkingReport, DirectoryChunker, DocumentError, DocumentLoader, PdfLoader, SplitterConfig,
};
use insight_memory::{BatchError, BatchReport, EmbeddingBatcher, VectorIndex, VectorIndexError};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Index(#[from] VectorIndexError),

    #[error("no chunks produced from {}", .0.display())]
    NoChunks(PathBuf),

    #[error("every embedding batch failed, index not written")]
    NothingEmbedded,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub chunking: ChunkingReport,
    pub batches: BatchReport,
    pub indexed: usize,
    pub index_path: PathBuf,
    pub elapsed: Duration,
}

/// Ingest every PDF in the configured documents directory.
///
/// # Errors
///
/// See [`run_ingestion_with_loader`].
pub async fn run_ingestion<E: Embedder>(
    config: &Config,
    embedder: &E,
) -> Result<IngestReport, IngestError> {
    run_ingestion_with_loader(config, PdfLoader::default(), embedder).await
}

/// Ingest the configured documents directory with an explicit loader.
///
/// # Errors
///
/// Returns `NoChunks` when nothing survives chunking, `NothingEmbedded` when
/// every batch fails, and the underlying error when the directory cannot be
/// read or the index cannot be written.
pub async fn run_ingestion_with_loader<E, L>(
    config: &Config,
    loader: L,
    embedder: &E,
) -> Result<IngestReport, IngestError>
where
    E: Embedder,
    L: DocumentLoader + 'static,
{
    let started = Instant::now();
    let ingest = &config.ingest;
    tracing::info!(
        dir = %ingest.documents_dir.display(),
        chunk_size = ingest.chunk_size,
        chunk_overlap = ingest.chunk_overlap,
        batch_size = ingest.batch_size,
        provider = embedder.name(),
        "starting ingestion"
    );

    let chunker = DirectoryChunker::new(
        loader,
        SplitterConfig {
            chunk_size: ingest.chunk_size,
            chunk_overlap: ingest.chunk_overlap,
        },
    )?
    .with_min_page_chars(ingest.min_page_chars);
    let (chunks, chunking) = chunker
        .chunk_directory_with_report(&ingest.documents_dir)
        .await?;
    if chunks.is_empty() {
        return Err(IngestError::NoChunks(ingest.documents_dir.clone()));
    }

    let outcome = EmbeddingBatcher::new(ingest.batch_size)?
        .with_cooldown(Duration::from_secs(ingest.cooldown_secs))
        .with_max_retries(ingest.max_retries)
        .with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .embed_all(chunks, embedder)
        .await;
    if outcome.embedded.is_empty() {
        return Err(IngestError::NothingEmbedded);
    }

    let indexed = outcome.embedded.len();
    let index =
        VectorIndex::build(outcome.embedded)?.with_embedding_model(embedder.embedding_model());
    index.save(&config.index.path)?;

    let report = IngestReport {
        chunking,
        batches: outcome.report,
        indexed,
        index_path: config.index.path.clone(),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        indexed,
        dropped = report.batches.dropped_chunks,
        path = %report.index_path.display(),
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "ingestion complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use insight_llm::mock::MockProvider;
    use insight_memory::document::TextLoader;

    use super::*;

    fn config(docs: &std::path::Path, index: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.ingest.documents_dir = docs.to_path_buf();
        config.ingest.chunk_size = 200;
        config.ingest.chunk_overlap = 40;
        config.ingest.batch_size = 3;
        config.ingest.cooldown_secs = 0;
        config.index.path = index.to_path_buf();
        config
    }

    fn write_docs(dir: &std::path::Path) {
        let body = "O Copom elevou a taxa Selic e sinalizou cautela diante da inflação. ".repeat(12);
        std::fs::write(dir.join("rpm.txt"), format!("Capa\x0c{body}")).unwrap();
    }

    #[tokio::test]
    async fn builds_and_saves_index() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_docs(docs.path());
        let index_path = out.path().join("faiss_index");

        let mock = MockProvider::default();
        let report = run_ingestion_with_loader(
            &config(docs.path(), &index_path),
            TextLoader::default(),
            &mock,
        )
        .await
        .unwrap();

        assert_eq!(report.chunking.pages_discarded, 1);
        assert_eq!(report.indexed, report.chunking.chunks);
        assert_eq!(report.batches.dropped_chunks, 0);

        let index = VectorIndex::load(&index_path).unwrap();
        assert_eq!(index.len(), report.indexed);
        assert_eq!(index.embedding_model(), Some("mock-embedding"));
    }

    #[tokio::test]
    async fn empty_directory_is_no_chunks() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let index_path = out.path().join("faiss_index");

        let result =
            run_ingestion(&config(docs.path(), &index_path), &MockProvider::default()).await;

        assert!(matches!(result, Err(IngestError::NoChunks(_))));
        assert!(!index_path.exists());
    }

    #[tokio::test]
    async fn all_batches_failing_writes_nothing() {
        let docs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_docs(docs.path());
        let index_path = out.path().join("faiss_index");

        let mock = MockProvider::default().with_embed_failures(usize::MAX);
        let result = run_ingestion_with_loader(
            &config(docs.path(), &index_path),
            TextLoader::default(),
            &mock,
        )
        .await;

        assert!(matches!(result, Err(IngestError::NothingEmbedded)));
        assert!(!index_path.exists());
    }

    #[tokio::test]
    async fn invalid_overlap_rejected_before_reading() {
        let docs = tempfile::tempdir().unwrap();
        let mut config = config(docs.path(), &docs.path().join("idx"));
        config.ingest.chunk_overlap = config.ingest.chunk_size;

        let result = run_ingestion(&config, &MockProvider::default()).await;
        assert!(matches!(
            result,
            Err(IngestError::Document(DocumentError::InvalidArgument(_)))
        ));
    }

    #[tokio::test]
    async fn missing_documents_dir_is_document_error() {
        let out = tempfile::tempdir().unwrap();
        let config = config(&out.path().join("dados_rpm"), &out.path().join("idx"));
        let result = run_ingestion(&config, &MockProvider::default()).await;
        assert!(matches!(result, Err(IngestError::Document(DocumentError::Io(_)))));
    }
}
