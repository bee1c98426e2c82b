//! OpenAI-compatible HTTP client (DeepInfra by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::debug;

use super::payload::{self, Completion, CompletionRequest};
use super::traits::CompletionProvider;
use crate::stream::ByteStream;
use crate::{HermodError, Result};

/// Default base URL (the `/chat/completions` path is appended).
pub const DEFAULT_BASE_URL: &str = "https://api.deepinfra.com/v1/openai";

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// The client carries no request timeout of its own; the gateway bounds
/// every call.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl OpenAiCompatClient {
    /// Create a client for the default endpoint.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HermodError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            HermodError::Configuration("upstream API key is not configured".to_string())
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        debug!(model = %request.model, stream = request.stream, "upstream request");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;
        handle_response_errors(response).await
    }
}

/// Map a non-2xx response to [`HermodError::Api`], keeping a short excerpt
/// of the upstream message for the logs.
async fn handle_response_errors(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").map(payload::error_message))
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect());

    Err(HermodError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.to_string()
        } else {
            message
        },
    })
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        payload::parse_completion(&body, &request.model)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<ByteStream> {
        let response = self.send(request).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| HermodError::Stream(e.to_string())));
        Ok(Box::pin(stream))
    }
}
