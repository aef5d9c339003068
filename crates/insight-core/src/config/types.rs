use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding and completion backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Azure,
    Ollama,
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_api_version() -> String {
    "2024-02-01".into()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// API root. For Azure this is the resource endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat model, or chat deployment name for Azure.
    #[serde(default = "default_model")]
    pub model: String,
    /// Embedding model, or embedding deployment name for Azure.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound for one embedding call during ingestion.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./dados_rpm")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    250
}

fn default_batch_size() -> usize {
    25
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

fn default_min_page_chars() -> usize {
    insight_memory::document::chunker::DEFAULT_MIN_PAGE_CHARS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_page_chars")]
    pub min_page_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            cooldown_secs: default_cooldown_secs(),
            max_retries: default_max_retries(),
            min_page_chars: default_min_page_chars(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("faiss_index")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_answer_timeout_secs() -> u64 {
    60
}

fn default_refusal_markers() -> Vec<String> {
    crate::prompt::DEFAULT_REFUSAL_MARKERS
        .iter()
        .map(|m| (*m).to_owned())
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Applied separately to the query embedding and to the completion.
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_refusal_markers")]
    pub refusal_markers: Vec<String>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            timeout_secs: default_answer_timeout_secs(),
            refusal_markers: default_refusal_markers(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
}
