#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

use crate::error::LlmError;
use crate::provider::{CompletionModel, Embedder};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Ollama($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Runtime-selected backend. Each variant serves as both embedder and completion model.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Ollama(OllamaProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Check backend reachability where the backend offers a cheap request for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is known to be unreachable.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        match self {
            Self::Ollama(p) => p.health_check().await,
            Self::OpenAi(_) => Ok(()),
            #[cfg(feature = "mock")]
            Self::Mock(_) => Ok(()),
        }
    }
}

impl Embedder for AnyProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_provider!(self, |p| p.embed_documents(texts).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_provider!(self, |p| p.embed_query(text).await)
    }

    fn embedding_model(&self) -> &str {
        delegate_provider!(self, |p| p.embedding_model())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| Embedder::name(p))
    }
}

impl CompletionModel for AnyProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.complete(prompt).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| CompletionModel::name(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_variant_delegates_names() {
        let p = AnyProvider::Ollama(OllamaProvider::new(
            "http://localhost:11434",
            "llama3".into(),
            "nomic-embed-text".into(),
        ));
        assert_eq!(Embedder::name(&p), "ollama");
        assert_eq!(CompletionModel::name(&p), "ollama");
        assert_eq!(p.embedding_model(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn openai_health_check_is_noop() {
        let p = AnyProvider::OpenAi(
            OpenAiProvider::new("k".into(), "http://127.0.0.1:1".into(), "m".into(), 1, None)
                .unwrap(),
        );
        assert!(p.health_check().await.is_ok());
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn mock_variant_embeds_and_completes() {
        let p = AnyProvider::Mock(MockProvider::with_responses(vec!["resposta".into()]));
        let v = p.embed_query("selic").await.unwrap();
        assert_eq!(v.len(), 64);
        assert_eq!(p.complete("prompt").await.unwrap(), "resposta");
    }
}
