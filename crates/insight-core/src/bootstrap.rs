//! Provider construction and index loading for the binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use insight_llm::any::AnyProvider;
use insight_llm::ollama::OllamaProvider;
use insight_llm::openai::{ApiFlavor, OpenAiProvider};
use insight_memory::{VectorIndex, VectorIndexError};

use crate::answer::Answerer;
use crate::config::{Config, ProviderKind};

/// Build the configured backend. It serves as both embedder and completion model.
///
/// # Errors
///
/// Returns an error if a required credential is missing, the HTTP client
/// cannot be built, or the `mock` provider is requested without the feature.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::OpenAi | ProviderKind::Azure => {
            let api_key = config
                .secrets
                .api_key
                .as_ref()
                .context("INSIGHT_API_KEY (or AZURE_OPENAI_API_KEY) must be set")?;
            let client =
                insight_llm::http::default_client(Duration::from_secs(llm.timeout_secs))?;
            let mut provider = OpenAiProvider::new(
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                Some(llm.embedding_model.clone()),
            )?
            .with_client(client);
            if llm.provider == ProviderKind::Azure {
                provider = provider.with_flavor(ApiFlavor::Azure {
                    api_version: llm.api_version.clone(),
                });
            }
            Ok(AnyProvider::OpenAi(provider))
        }
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        ))),
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyProvider::Mock(insight_llm::mock::MockProvider::default())),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => bail!("the mock provider requires building with the `mock` feature"),
    }
}

/// Build the configured backend and fail early if it cannot be reached.
///
/// # Errors
///
/// Returns the `create_provider` errors, or an error naming the backend and
/// its URL when the reachability check fails.
pub async fn connect_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let provider = create_provider(config)?;
    provider.health_check().await.with_context(|| {
        format!(
            "{} backend at {} is unreachable",
            config.llm.provider, config.llm.base_url
        )
    })?;
    tracing::info!(provider = %config.llm.provider, "provider ready");
    Ok(provider)
}

/// Load the persisted index named by the configuration.
///
/// # Errors
///
/// Returns the index error unchanged so callers can tell a missing index
/// from a corrupt one.
pub fn load_index(config: &Config) -> Result<Arc<VectorIndex>, VectorIndexError> {
    let index = VectorIndex::load(&config.index.path)?;
    tracing::info!(
        path = %config.index.path.display(),
        entries = index.len(),
        dimension = index.dimension(),
        "index loaded"
    );
    Ok(Arc::new(index))
}

/// Answerer using one provider for both embedding and completion.
///
/// # Errors
///
/// Returns an error if the index embedding model differs from the configured one.
pub fn build_answerer(
    config: &Config,
    provider: AnyProvider,
    index: Arc<VectorIndex>,
) -> anyhow::Result<Answerer<AnyProvider, AnyProvider>> {
    use insight_llm::Embedder;

    if let Some(model) = index.embedding_model()
        && model != provider.embedding_model()
    {
        bail!(
            "index was built with embedding model `{model}` but `{}` is configured; re-run `insight ingest`",
            provider.embedding_model()
        );
    }
    Ok(Answerer::new(
        provider.clone(),
        provider,
        index,
        config.answer.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use insight_llm::Embedder;

    use super::*;
    use crate::secret::Secret;

    #[test]
    fn openai_requires_api_key() {
        let config = Config::default();
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("INSIGHT_API_KEY"));
    }

    #[test]
    fn azure_provider_built_with_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Azure;
        config.llm.base_url = "https://bcb.openai.azure.com".into();
        config.secrets.api_key = Some(Secret::new("k"));

        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::OpenAi(_)));
        assert_eq!(provider.embedding_model(), "text-embedding-3-small");
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Ollama;
        config.llm.base_url = "http://localhost:11434".into();
        let provider = create_provider(&config).unwrap();
        assert_eq!(Embedder::name(&provider), "ollama");
    }

    #[cfg(feature = "mock")]
    #[test]
    fn mock_provider_selectable() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Mock;
        assert!(matches!(create_provider(&config).unwrap(), AnyProvider::Mock(_)));
    }

    #[tokio::test]
    async fn unreachable_ollama_fails_before_any_work() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Ollama;
        config.llm.base_url = "http://127.0.0.1:1".into();
        let err = connect_provider(&config).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("ollama backend at http://127.0.0.1:1 is unreachable"));
    }

    #[tokio::test]
    async fn openai_connects_without_health_check() {
        let mut config = Config::default();
        config.secrets.api_key = Some(Secret::new("k"));
        let provider = connect_provider(&config).await.unwrap();
        assert!(matches!(provider, AnyProvider::OpenAi(_)));
    }

    #[test]
    fn missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.index.path = dir.path().join("faiss_index");
        assert!(matches!(
            load_index(&config),
            Err(VectorIndexError::NotFound(_))
        ));
    }

    #[test]
    fn embedding_model_mismatch_rejected() {
        use insight_memory::EmbeddedChunk;
        use insight_memory::document::{Chunk, DocumentMetadata};

        let page = DocumentMetadata {
            source: "a.pdf".into(),
            content_type: "application/pdf".into(),
            page_number: 1,
        };
        let index = VectorIndex::build(vec![EmbeddedChunk {
            chunk: Chunk::new("x".into(), &page, 0),
            vector: vec![1.0],
        }])
        .unwrap()
        .with_embedding_model("text-embedding-ada-002");

        let provider = AnyProvider::Mock(insight_llm::mock::MockProvider::default());
        let err = build_answerer(&Config::default(), provider, Arc::new(index))
            .err()
            .unwrap();
        assert!(err.to_string().contains("text-embedding-ada-002"));
    }
}
