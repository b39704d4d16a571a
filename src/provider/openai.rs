//! OpenAI-compatible backend.
//!
//! Translates the vendor-neutral request into the chat-completions or
//! legacy-completions wire shape, performs the HTTP exchange, and
//! translates the response back. Works against any endpoint that accepts
//! either shape (OpenAI, OpenRouter, local proxies, vLLM, Ollama, ...).
//!
//! Non-conformances, by design:
//! - `count_tokens` returns a fixed zero without a network call.
//! - `embed_content` always fails.
//! - "Streaming" yields the single complete response, so time-to-first-token
//!   equals time-to-completion.

use async_trait::async_trait;
use futures_util::stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::OpenAiCompatConfig;
use crate::content::{
    Candidate, Content, CountTokensResponse, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse, Part, Role, UsageMetadata,
};
use crate::error::Error;
use crate::provider::{ContentGenerator, ContentStream};
use crate::Result;

/// Diagnostic excerpts are bounded to this many characters.
const EXCERPT_LIMIT: usize = 200;

/// Content generator for OpenAI-compatible HTTP endpoints.
#[derive(Debug)]
pub struct OpenAiCompatGenerator {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatGenerator {
    /// Create a generator from provider configuration. The configuration
    /// is stored immutably for the generator's lifetime.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL {}: {e}", config.base_url)))?;

        let mut builder = Client::builder();
        if let Some(ref proxy) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Endpoint format detection, evaluated per call.
    fn is_chat_endpoint(&self) -> bool {
        self.config.base_url.contains("chat/completions")
    }

    /// Newline-joined text parts of a turn.
    fn content_text(content: &Content) -> String {
        content
            .parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Map a turn to a chat message. Role `model` becomes `assistant`;
    /// a role-less turn with parts is treated as a user turn; anything
    /// else is serialized to JSON and wrapped as a user turn so no input
    /// is ever dropped.
    fn to_chat_message(content: &Content) -> Value {
        match content.role {
            Some(Role::Model) => json!({
                "role": "assistant",
                "content": Self::content_text(content),
            }),
            Some(Role::User) => json!({
                "role": "user",
                "content": Self::content_text(content),
            }),
            None if !content.parts.is_empty() => json!({
                "role": "user",
                "content": Self::content_text(content),
            }),
            None => json!({
                "role": "user",
                "content": serde_json::to_string(content).unwrap_or_default(),
            }),
        }
    }

    /// Build the outbound body for the configured endpoint format.
    /// Sampling params are included only when the caller supplied them.
    fn build_request_body(&self, request: &GenerateContentRequest) -> Value {
        let mut body = if self.is_chat_endpoint() {
            let messages: Vec<Value> =
                request.contents.iter().map(Self::to_chat_message).collect();
            json!({
                "model": self.config.model,
                "messages": messages,
            })
        } else {
            let prompt = request
                .contents
                .iter()
                .map(Self::content_text)
                .collect::<Vec<_>>()
                .join("\n\n");
            json!({
                "model": self.config.model,
                "prompt": prompt,
            })
        };

        if let Some(ref config) = request.generation_config {
            if let Some(temperature) = config.temperature {
                body["temperature"] = json!(temperature);
            }
            if let Some(max_tokens) = config.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = config.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(ref stop) = config.stop_sequences {
                body["stop"] = json!(stop);
            }
        }

        body
    }

    /// Compose request headers. Static headers are applied first; the
    /// key-derived auth header is applied last and wins on collision.
    /// Without an API key no auth header is added at all.
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        if let Some(ref key) = self.config.api_key {
            let url = &self.config.base_url;
            if url.contains("openai.com") || url.contains("openrouter.ai") {
                let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
                headers.insert(AUTHORIZATION, bearer);
            } else {
                let value = HeaderValue::from_str(key)
                    .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
                headers.insert(HeaderName::from_static("x-api-key"), value);
            }
        }

        Ok(headers)
    }

    /// POST the body and classify the outcome: transport failures are
    /// Network errors, non-success statuses are Api errors, non-JSON
    /// success bodies are MalformedResponse errors. No retry here; the
    /// caller owns retry policy.
    async fn exchange(&self, body: &Value) -> Result<Value> {
        debug!(
            endpoint = %self.config.base_url,
            chat = self.is_chat_endpoint(),
            "sending generation request"
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .headers(self.build_headers()?)
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
            warn!(status = status.as_u16(), "generation request failed");
            return Err(classify_failure(status.as_u16(), &text));
        }

        parse_success_body(&text)
    }

    /// Translate the wire response back to the vendor-neutral shape.
    /// An absent or empty `choices` array yields an empty candidate list,
    /// not an error.
    fn translate_response(raw: &Value, chat: bool) -> GenerateContentResponse {
        let mut candidates = Vec::new();
        if let Some(choice) = raw.get("choices").and_then(|c| c.get(0)) {
            let text = if chat {
                choice
                    .pointer("/message/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
            } else {
                choice
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
            };
            candidates.push(Candidate {
                content: Content::model(text),
                finish_reason: choice
                    .get("finish_reason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        let usage_metadata = raw.get("usage").map(|usage| UsageMetadata {
            prompt_token_count: read_count(usage, "prompt_tokens"),
            candidates_token_count: read_count(usage, "completion_tokens"),
            total_token_count: read_count(usage, "total_tokens"),
        });

        GenerateContentResponse {
            candidates,
            usage_metadata,
        }
    }
}

#[async_trait]
impl ContentGenerator for OpenAiCompatGenerator {
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let body = self.build_request_body(&request);
        let raw = self.exchange(&body).await?;
        Ok(Self::translate_response(&raw, self.is_chat_endpoint()))
    }

    async fn generate_content_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ContentStream> {
        // Simulated: the full exchange completes before the single
        // element is yielded.
        let response = self.generate_content(request).await?;
        let once =
            stream::once(async move { Ok::<GenerateContentResponse, Error>(response) });
        Ok(Box::pin(once))
    }

    /// Placeholder: this backend family exposes no token-counting API, so
    /// a fixed zero is returned without a network call.
    async fn count_tokens(&self, _request: GenerateContentRequest) -> Result<CountTokensResponse> {
        Ok(CountTokensResponse { total_tokens: 0 })
    }

    async fn embed_content(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<EmbedContentResponse> {
        Err(Error::Unsupported(
            "embedContent is not available for the openai-compatible provider".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

fn read_count(usage: &Value, key: &str) -> Option<u32> {
    usage.get(key).and_then(Value::as_u64).map(|v| v as u32)
}

/// Bound a diagnostic excerpt to [`EXCERPT_LIMIT`] characters, with an
/// explicit ellipsis marker when truncated.
pub(crate) fn truncate_excerpt(body: &str) -> String {
    if body.chars().count() > EXCERPT_LIMIT {
        let head: String = body.chars().take(EXCERPT_LIMIT).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

/// Classify a non-success response body: a JSON body is carried parsed,
/// anything else as a truncated raw excerpt.
pub(crate) fn classify_failure(status: u16, body: &str) -> Error {
    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => Error::Api {
            status,
            body: parsed.to_string(),
        },
        Err(_) => Error::Api {
            status,
            body: truncate_excerpt(body),
        },
    }
}

/// Parse a success body, distinguishing "does not look like JSON" from
/// "looks like JSON but fails to parse".
pub(crate) fn parse_success_body(body: &str) -> Result<Value> {
    let trimmed = body.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Err(Error::MalformedResponse(format!(
            "expected JSON, got: {}",
            truncate_excerpt(body)
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("{e}: {}", truncate_excerpt(body))))
}
