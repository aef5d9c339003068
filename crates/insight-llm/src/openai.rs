use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{CompletionModel, Embedder};
use crate::retry::{RetryPolicy, send_with_retry};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Wire dialect of the OpenAI API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `api.openai.com` and compatible servers: bearer auth, model named in the body.
    OpenAi,
    /// Azure OpenAI: `api-key` header, deployment in the path, `api-version` query.
    Azure { api_version: String },
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    max_tokens: u32,
    flavor: ApiFlavor,
    retry: RetryPolicy,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .field("flavor", &self.flavor)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_key,
            base_url,
            model,
            embedding_model,
            max_tokens,
            flavor: ApiFlavor::OpenAi,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    fn label(&self) -> &'static str {
        match self.flavor {
            ApiFlavor::OpenAi => "openai",
            ApiFlavor::Azure { .. } => "azure",
        }
    }

    /// `deployment` is only used by the Azure flavor, where each model is a deployment.
    fn endpoint(&self, deployment: &str, operation: &str) -> String {
        match &self.flavor {
            ApiFlavor::OpenAi => format!("{}/{operation}", self.base_url),
            ApiFlavor::Azure { api_version } => format!(
                "{}/openai/deployments/{deployment}/{operation}?api-version={api_version}",
                self.base_url
            ),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.flavor {
            ApiFlavor::OpenAi => request.bearer_auth(&self.api_key),
            ApiFlavor::Azure { .. } => request.header("api-key", &self.api_key),
        }
    }

    async fn post_json<B>(&self, url: &str, body: &B) -> Result<String, LlmError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let response = send_with_retry(self.label(), &self.retry, || {
            self.authorize(self.client.post(url)).json(body).send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(provider = self.label(), %status, body = %text, "API request failed");
            return Err(LlmError::Api {
                provider: self.label().to_owned(),
                status: status.as_u16(),
            });
        }

        Ok(text)
    }

    async fn request_embeddings(&self, input: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or_else(|| LlmError::EmbedUnsupported {
                provider: self.label().to_owned(),
            })?;

        if input.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint(model, "embeddings");
        let text = self.post_json(&url, &EmbeddingRequest { input, model }).await?;
        let mut data = serde_json::from_str::<EmbeddingResponse>(&text)?.data;

        if data.len() != input.len() {
            return Err(LlmError::BatchSizeMismatch {
                provider: self.label().to_owned(),
                expected: input.len(),
                actual: data.len(),
            });
        }

        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.request_embeddings(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.request_embeddings(&[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.label().to_owned(),
            })
    }

    fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.label()
    }
}

impl CompletionModel for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = self.endpoint(&self.model, "chat/completions");
        let body = ChatRequest {
            model: &self.model,
            messages: &[ApiMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let text = self.post_json(&url, &body).await?;
        let resp: ChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.label().to_owned(),
            })
    }

    fn name(&self) -> &str {
        self.label()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
