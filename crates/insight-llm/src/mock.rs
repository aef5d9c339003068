//! Deterministic in-process provider for tests and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{CompletionModel, Embedder};

/// Embeds text as a normalized hashed bag of words and answers from a script.
///
/// Clones share their scripted state, so a clone handed to the code under test
/// can be inspected from the test afterwards.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    embed_failures: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub dimension: usize,
    pub fail_completion: bool,
    /// Milliseconds to sleep before every call.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            embed_failures: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            dimension: 64,
            fail_completion: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_completion: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Make the next `n` embedding calls fail.
    #[must_use]
    pub fn with_embed_failures(self, n: usize) -> Self {
        self.embed_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Number of embedding calls made so far, failed ones included.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Prompts received by `complete`, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Deterministic embedding: lowercase alphanumeric tokens hashed into
    /// `dimension` buckets, then L2-normalized.
    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension.max(1)];
        let buckets = vector.len() as u64;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            #[expect(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % buckets) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    async fn pause(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn take_embed_failure(&self) -> bool {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embed_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Embedder for MockProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.pause().await;
        if self.take_embed_failure() {
            return Err(LlmError::Unavailable);
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.pause().await;
        if self.take_embed_failure() {
            return Err(LlmError::Unavailable);
        }
        Ok(self.vector_for(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn embedding_model(&self) -> &str {
        "mock-embedding"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

impl CompletionModel for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.pause().await;
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if self.fail_completion {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
