#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("provider unavailable")]
    Unavailable,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{provider} returned {actual} embeddings for {expected} inputs")]
    BatchSizeMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("{provider} API request failed (status {status})")]
    Api { provider: String, status: u16 },

    #[error("{0}")]
    Other(String),
}
