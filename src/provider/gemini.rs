//! Native Gemini backend (API key authentication).
//!
//! The request and response types in `content` already follow the Gemini
//! wire shape, so this client serializes them directly; the only work here
//! is URL construction, the HTTP exchange, and error classification.

use async_trait::async_trait;
use futures_util::{stream, TryStreamExt};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::content::{
    CountTokensResponse, EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
};
use crate::error::Error;
use crate::provider::openai::{classify_failure, truncate_excerpt};
use crate::provider::{ContentGenerator, ContentStream};
use crate::Result;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const VERTEX_API_URL: &str = "https://aiplatform.googleapis.com/v1/publishers/google/models";

/// Gemini API client using API key authentication.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    vertex_ai: bool,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key. The vertex flag routes
    /// calls through the Vertex AI express endpoint instead.
    pub fn new(api_key: &str, model: &str, vertex_ai: bool) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            vertex_ai,
            client: Client::new(),
        }
    }

    fn build_url(&self, method: &str) -> String {
        let base = if self.vertex_ai {
            VERTEX_API_URL
        } else {
            GEMINI_API_URL
        };
        format!("{}/{}:{}?key={}", base, self.model, method, self.api_key)
    }

    /// POST a body to an API method and return the raw response text on
    /// success. Transport failures are Network errors; non-success
    /// statuses are classified from the body.
    async fn post<B: serde::Serialize>(&self, url: &str, body: &B) -> Result<String> {
        debug!(model = %self.model, vertex = self.vertex_ai, "sending Gemini request");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini request failed");
            return Err(classify_failure(status.as_u16(), &text));
        }
        Ok(text)
    }

    fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        serde_json::from_str(text)
            .map_err(|e| Error::MalformedResponse(format!("{e}: {}", truncate_excerpt(text))))
    }

    /// Generate a complete response.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let text = self
            .post(&self.build_url("generateContent"), request)
            .await?;
        Self::parse(&text)
    }

    /// Generate incrementally over the SSE endpoint. Each `data:` line is
    /// one response chunk.
    pub async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<ContentStream> {
        let url = format!("{}&alt=sse", self.build_url("streamGenerateContent"));

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;
            warn!(status = status.as_u16(), "Gemini stream request failed");
            return Err(classify_failure(status.as_u16(), &text));
        }

        let bytes = response.bytes_stream();
        let chunks = stream::try_unfold(
            (bytes, Vec::new()),
            |(mut bytes, mut buffer)| async move {
                loop {
                    // Drain complete lines before pulling more bytes.
                    if let Some(chunk) = next_sse_chunk(&mut buffer) {
                        return chunk.map(|chunk| Some((chunk, (bytes, buffer))));
                    }

                    match bytes.try_next().await {
                        Ok(Some(data)) => buffer.extend_from_slice(&data),
                        Ok(None) => return Ok(None),
                        Err(e) => return Err(Error::Network(e.to_string())),
                    }
                }
            },
        );

        Ok(Box::pin(chunks))
    }

    /// Count the tokens the request contents would consume.
    pub async fn count_tokens(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<CountTokensResponse> {
        let body = json!({ "contents": request.contents });
        let text = self.post(&self.build_url("countTokens"), &body).await?;
        Self::parse(&text)
    }

    /// Embed the first content turn of the request.
    pub async fn embed_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<EmbedContentResponse> {
        let content = request.contents.first().cloned().unwrap_or_default();
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": content,
        });
        let text = self.post(&self.build_url("embedContent"), &body).await?;
        Self::parse(&text)
    }
}

/// Pull the next `data:` payload line out of the buffer, returning `None`
/// when no complete line remains.
///
/// The buffer holds raw bytes because network chunks arrive at arbitrary
/// byte boundaries; a multibyte UTF-8 character split across two chunks is
/// only whole once its line is complete, so decoding happens per line, not
/// per chunk. Blank keep-alive lines and non-`data:` lines are skipped.
fn next_sse_chunk(buffer: &mut Vec<u8>) -> Option<Result<GenerateContentResponse>> {
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let text = match std::str::from_utf8(&line[..line.len() - 1]) {
            Ok(text) => text.trim(),
            Err(e) => {
                return Some(Err(Error::MalformedResponse(format!("stream chunk: {e}"))));
            }
        };

        let Some(data) = text.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }

        return Some(serde_json::from_str(data).map_err(|e| {
            Error::MalformedResponse(format!("stream chunk: {e}: {}", truncate_excerpt(data)))
        }));
    }
    None
}

/// Pass-through adapter exposing the native client through the shared
/// contract. Every operation forwards verbatim; no translation happens
/// here.
#[derive(Debug)]
pub struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        self.client.generate_content(&request).await
    }

    async fn generate_content_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ContentStream> {
        self.client.generate_content_stream(&request).await
    }

    async fn count_tokens(&self, request: GenerateContentRequest) -> Result<CountTokensResponse> {
        self.client.count_tokens(&request).await
    }

    async fn embed_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<EmbedContentResponse> {
        self.client.embed_content(&request).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
