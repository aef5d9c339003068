//! Batched embedding with a cooldown-and-retry policy.
//!
//! A batch that keeps failing is dropped and ingestion continues with the
//! rest, so one bad request cannot abort a long ingestion run.

use std::time::Duration;

use insight_llm::{Embedder, LlmError};

use crate::document::Chunk;
use crate::vector_index::EmbeddedChunk;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Counters for one `embed_all` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batches: usize,
    pub retries: usize,
    pub failed_batches: usize,
    pub dropped_chunks: usize,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Surviving chunks paired with their vectors, in input order.
    pub embedded: Vec<EmbeddedChunk>,
    pub report: BatchReport,
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),
    #[error("expected {expected} vectors, got {actual}")]
    Count { expected: usize, actual: usize },
    #[error("expected dimension {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("vector {0} has a non-finite component")]
    NonFinite(usize),
}

#[derive(Debug, Clone)]
pub struct EmbeddingBatcher {
    batch_size: usize,
    cooldown: Duration,
    max_retries: u32,
    timeout: Duration,
}

impl EmbeddingBatcher {
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// # Errors
    ///
    /// Returns `BatchError::InvalidArgument` if `batch_size` is zero.
    pub fn new(batch_size: usize) -> Result<Self, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::InvalidArgument(
                "batch_size must be greater than zero".into(),
            ));
        }
        Ok(Self {
            batch_size,
            cooldown: Self::DEFAULT_COOLDOWN,
            max_retries: 1,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Wait between a failed attempt and its retry.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Upper bound for a single `embed_documents` call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Embed `chunks` in consecutive batches of `batch_size`.
    ///
    /// The first successful batch fixes the vector dimension; later batches
    /// returning another dimension count as failed attempts.
    pub async fn embed_all<E: Embedder>(&self, chunks: Vec<Chunk>, embedder: &E) -> BatchOutcome {
        let total = chunks.len();
        let mut report = BatchReport::default();
        let mut embedded = Vec::with_capacity(total);
        let mut dimension: Option<usize> = None;

        let mut remaining = chunks.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<Chunk> = remaining.by_ref().take(self.batch_size).collect();
            report.batches += 1;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let mut attempt = 0;
            let vectors = loop {
                match self.attempt(embedder, &texts, dimension).await {
                    Ok(vectors) => break Some(vectors),
                    Err(e) if attempt < self.max_retries => {
                        attempt += 1;
                        report.retries += 1;
                        tracing::warn!(
                            batch = report.batches,
                            attempt,
                            cooldown_secs = self.cooldown.as_secs(),
                            error = %e,
                            "embedding batch failed, retrying after cooldown"
                        );
                        tokio::time::sleep(self.cooldown).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            batch = report.batches,
                            chunks = batch.len(),
                            error = %e,
                            "embedding batch failed, dropping its chunks"
                        );
                        break None;
                    }
                }
            };

            match vectors {
                Some(vectors) => {
                    if let Some(first) = vectors.first() {
                        dimension.get_or_insert(first.len());
                    }
                    embedded.extend(
                        batch
                            .into_iter()
                            .zip(vectors)
                            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector }),
                    );
                    tracing::debug!(
                        batch = report.batches,
                        embedded = embedded.len(),
                        total,
                        "batch embedded"
                    );
                }
                None => {
                    report.failed_batches += 1;
                    report.dropped_chunks += batch.len();
                }
            }
        }

        tracing::info!(
            batches = report.batches,
            retries = report.retries,
            failed_batches = report.failed_batches,
            dropped_chunks = report.dropped_chunks,
            embedded = embedded.len(),
            "embedding complete"
        );
        BatchOutcome { embedded, report }
    }

    async fn attempt<E: Embedder>(
        &self,
        embedder: &E,
        texts: &[String],
        dimension: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, AttemptError> {
        let vectors = tokio::time::timeout(self.timeout, embedder.embed_documents(texts))
            .await
            .map_err(|_| AttemptError::Timeout(self.timeout))??;

        if vectors.len() != texts.len() {
            return Err(AttemptError::Count {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        let expected = dimension.or_else(|| vectors.first().map(Vec::len)).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.is_empty() || v.len() != expected) {
            return Err(AttemptError::Dimension {
                expected,
                actual: bad.len(),
            });
        }
        if let Some(i) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(AttemptError::NonFinite(i));
        }
        Ok(vectors)
    }
}
