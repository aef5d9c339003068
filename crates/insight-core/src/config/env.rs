use super::{Config, ProviderKind};
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_azure_env();
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
    }

    /// The `AZURE_OPENAI_*` variables select the Azure backend when an endpoint is set.
    fn apply_azure_env(&mut self) {
        if let Ok(v) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            self.llm.provider = ProviderKind::Azure;
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("AZURE_OPENAI_CHAT_DEPLOYMENT_NAME") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = v;
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("INSIGHT_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid INSIGHT_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("INSIGHT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("INSIGHT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("INSIGHT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("INSIGHT_LLM_API_VERSION") {
            self.llm.api_version = v;
        }
        if let Ok(v) = std::env::var("INSIGHT_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("INSIGHT_DOCUMENTS_DIR") {
            self.ingest.documents_dir = v.into();
        }
        if let Ok(v) = std::env::var("INSIGHT_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_size = n;
        }
        if let Ok(v) = std::env::var("INSIGHT_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("INSIGHT_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.batch_size = n;
        }
        if let Ok(v) = std::env::var("INSIGHT_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("INSIGHT_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.answer.top_k = k;
        }
    }

    /// `INSIGHT_API_KEY` wins over `AZURE_OPENAI_API_KEY`.
    pub(crate) fn resolve_secrets(&mut self) {
        let key = std::env::var("INSIGHT_API_KEY")
            .or_else(|_| std::env::var("AZURE_OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());
        self.secrets.api_key = key.map(Secret::new);
    }
}
