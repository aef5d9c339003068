//! Retrieval-augmented answering: embed the question, retrieve context,
//! complete the grounded prompt, and flag refusals.

use std::sync::Arc;
use std::time::Duration;

use insight_llm::{CompletionModel, Embedder};
use insight_memory::{Chunk, VectorIndex};

use crate::config::AnswerConfig;
use crate::prompt::{build_prompt, is_refusal};

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("completion failed: {0}")]
    CompletionFailure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEnvelope {
    pub answer_text: String,
    /// Retrieved chunks in descending relevance; empty when not grounded.
    pub sources: Vec<Chunk>,
    pub is_grounded: bool,
}

/// Answers questions against a shared, read-only index.
///
/// Holds no per-question state, so one instance can serve concurrent callers.
pub struct Answerer<E, C> {
    embedder: E,
    completion: C,
    index: Arc<VectorIndex>,
    config: AnswerConfig,
}

impl<E: Embedder, C: CompletionModel> Answerer<E, C> {
    #[must_use]
    pub fn new(
        embedder: E,
        completion: C,
        index: Arc<VectorIndex>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            embedder,
            completion,
            index,
            config,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank question, `RetrievalFailure` if the
    /// question cannot be embedded or searched, and `CompletionFailure` if the
    /// model call fails or times out.
    pub async fn answer(&self, question: &str) -> Result<AnswerEnvelope, AnswerError> {
        if question.trim().is_empty() {
            return Err(AnswerError::InvalidArgument(
                "question must not be empty".into(),
            ));
        }
        let timeout = self.timeout();

        let query = tokio::time::timeout(timeout, self.embedder.embed_query(question))
            .await
            .map_err(|_| {
                AnswerError::RetrievalFailure(format!("query embedding timed out after {timeout:?}"))
            })?
            .map_err(|e| AnswerError::RetrievalFailure(e.to_string()))?;

        let hits = self
            .index
            .search(&query, self.config.top_k)
            .map_err(|e| AnswerError::RetrievalFailure(e.to_string()))?;
        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "context retrieved"
        );
        let context: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();

        let prompt = build_prompt(&context, question);
        let answer_text = tokio::time::timeout(timeout, self.completion.complete(&prompt))
            .await
            .map_err(|_| {
                AnswerError::CompletionFailure(format!("completion timed out after {timeout:?}"))
            })?
            .map_err(|e| AnswerError::CompletionFailure(e.to_string()))?;

        let is_grounded = !is_refusal(&answer_text, &self.config.refusal_markers);
        tracing::info!(
            grounded = is_grounded,
            sources = if is_grounded { context.len() } else { 0 },
            "question answered"
        );
        Ok(AnswerEnvelope {
            answer_text,
            sources: if is_grounded { context } else { Vec::new() },
            is_grounded,
        })
    }
}
