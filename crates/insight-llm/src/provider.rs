use std::future::Future;
use std::sync::Arc;

use crate::error::LlmError;

/// Turns text into fixed-dimensionality vectors.
///
/// Implementations must be deterministic for identical input within one
/// ingestion run, and every vector they return for one model must share the
/// same dimensionality.
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts.
    ///
    /// The returned vectors are aligned 1:1 with `texts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable, rate limited, or returns
    /// a malformed response.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single search query.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or returns no vector.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Identifier of the embedding model, recorded in persisted indexes.
    fn embedding_model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Turns a prompt into generated text.
pub trait CompletionModel: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}

impl<T: Embedder> Embedder for Arc<T> {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.as_ref().embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.as_ref().embed_query(text).await
    }

    fn embedding_model(&self) -> &str {
        self.as_ref().embedding_model()
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }
}

impl<T: CompletionModel> CompletionModel for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.as_ref().complete(prompt).await
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }
}
