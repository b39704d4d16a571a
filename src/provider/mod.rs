//! Provider abstraction layer.
//!
//! This module provides:
//! - [`ContentGenerator`] trait for swappable content-generation backends
//! - [`create_content_generator`] for config-driven backend selection
//! - Concrete implementations: native Gemini, OpenAI-compatible
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `anthropic.rs`)
//! 2. Implement the `ContentGenerator` trait
//! 3. Wire it into [`create_content_generator`]
//! 4. Add config fields in `config.rs`

pub mod gemini;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::config::{AuthType, ContentGeneratorConfig};
use crate::content::{
    CountTokensResponse, EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
};
use crate::error::Error;
use crate::Result;

pub use gemini::{GeminiClient, GeminiGenerator};
pub use openai::OpenAiCompatGenerator;

/// Lazy sequence of generation responses.
///
/// For the native backend this carries incremental chunks. For the
/// OpenAI-compatible backend it is finite with exactly one element (the
/// complete response), so time-to-first-token equals time-to-completion.
/// Each call produces a fresh sequence; sequences are not restartable.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Content generator trait — swappable backend abstraction.
///
/// The sole surface callers depend on; adapter internals stay private.
/// Implementations hold no mutable state across calls, so concurrent calls
/// are independent.
#[async_trait]
pub trait ContentGenerator: Send + Sync + std::fmt::Debug {
    /// Generate a complete response for the request.
    async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Generate a lazy sequence of responses.
    async fn generate_content_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ContentStream>;

    /// Count the tokens the request would consume.
    async fn count_tokens(&self, request: GenerateContentRequest) -> Result<CountTokensResponse>;

    /// Embed the request content.
    async fn embed_content(&self, request: GenerateContentRequest)
        -> Result<EmbedContentResponse>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

/// Builds the Code Assist-backed generator used by `oauth-personal` and
/// `cloud-shell` sessions. Implemented outside this crate; the factory
/// returns its result directly.
pub trait CodeAssistFactory: Send + Sync {
    fn create(&self, auth_type: AuthType, session_id: &str) -> Result<Box<dyn ContentGenerator>>;
}

/// Create a content generator from configuration.
///
/// Selection runs once per session and again only on explicit
/// reconfiguration. The generic triple (base URL + API key + model) takes
/// precedence over every vendor auth type; otherwise the auth type decides.
/// An unresolvable selection is a synchronous [`Error::Config`].
pub fn create_content_generator(
    config: &ContentGeneratorConfig,
    session_id: &str,
    code_assist: Option<&dyn CodeAssistFactory>,
) -> Result<Box<dyn ContentGenerator>> {
    if let Some(compat) = config.openai_compat() {
        let generator = OpenAiCompatGenerator::new(compat)?;
        return Ok(Box::new(generator));
    }

    match config.auth_type {
        AuthType::OauthPersonal | AuthType::CloudShell => match code_assist {
            Some(factory) => factory.create(config.auth_type, session_id),
            None => Err(Error::Config(format!(
                "Auth type {} requires a Code Assist factory",
                config.auth_type
            ))),
        },
        AuthType::GeminiApiKey | AuthType::VertexAi => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                Error::Config(format!("Auth type {} requires an API key", config.auth_type))
            })?;
            let vertex = config.vertex_ai || config.auth_type == AuthType::VertexAi;
            let client = GeminiClient::new(api_key, config.effective_model(), vertex);
            Ok(Box::new(GeminiGenerator::new(client)))
        }
        AuthType::MultiLlmGeneric => Err(Error::Config(format!(
            "Auth type {} requires base URL, API key and model",
            config.auth_type
        ))),
    }
}

/// Fake content generator for testing.
#[cfg(test)]
#[derive(Debug)]
pub struct FakeGenerator {
    responses: std::sync::Mutex<std::collections::VecDeque<GenerateContentResponse>>,
}

#[cfg(test)]
impl FakeGenerator {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: std::sync::Mutex::new(
                responses
                    .iter()
                    .map(|text| GenerateContentResponse::from_text(*text))
                    .collect(),
            ),
        }
    }

    fn pop(&self) -> Result<GenerateContentResponse> {
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .ok_or_else(|| Error::Other("No more fake responses".to_string()))
    }
}

#[cfg(test)]
#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_content(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        self.pop()
    }

    async fn generate_content_stream(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<ContentStream> {
        let response = self.pop()?;
        let once = futures_util::stream::once(async move {
            Ok::<GenerateContentResponse, Error>(response)
        });
        Ok(Box::pin(once))
    }

    async fn count_tokens(&self, _request: GenerateContentRequest) -> Result<CountTokensResponse> {
        Ok(CountTokensResponse { total_tokens: 42 })
    }

    async fn embed_content(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<EmbedContentResponse> {
        Ok(EmbedContentResponse {
            embedding: crate::content::Embedding {
                values: vec![0.0, 1.0],
            },
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_text;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_fake_generator_queue() {
        let generator = FakeGenerator::new(vec!["Hello!", "World!"]);

        let first = generator
            .generate_content(GenerateContentRequest::from_text("hi"))
            .await
            .unwrap();
        assert_eq!(extract_text(&first).as_deref(), Some("Hello!"));

        let second = generator
            .generate_content(GenerateContentRequest::from_text("hi"))
            .await
            .unwrap();
        assert_eq!(extract_text(&second).as_deref(), Some("World!"));
    }

    #[tokio::test]
    async fn test_fake_generator_stream_is_one_shot() {
        let generator = FakeGenerator::new(vec!["chunk"]);
        let mut stream = generator
            .generate_content_stream(GenerateContentRequest::from_text("hi"))
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(extract_text(&first).as_deref(), Some("chunk"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_factory_generic_triple_wins() {
        let mut config = ContentGeneratorConfig::new(AuthType::GeminiApiKey);
        config.api_key = Some("vendor-key".to_string());
        config.generic_base_url = Some("http://localhost:8080/v1/chat/completions".to_string());
        config.generic_api_key = Some("generic-key".to_string());
        config.generic_model = Some("llama3".to_string());

        let generator = create_content_generator(&config, "session", None).unwrap();
        assert_eq!(generator.name(), "openai-compatible");
    }

    #[test]
    fn test_factory_vendor_api_key() {
        let mut config = ContentGeneratorConfig::new(AuthType::GeminiApiKey);
        config.api_key = Some("vendor-key".to_string());
        // Partial generic triple falls through to vendor resolution.
        config.generic_base_url = Some("http://localhost:8080".to_string());

        let generator = create_content_generator(&config, "session", None).unwrap();
        assert_eq!(generator.name(), "gemini");
    }

    #[test]
    fn test_factory_missing_api_key() {
        let config = ContentGeneratorConfig::new(AuthType::GeminiApiKey);
        let err = create_content_generator(&config, "session", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("gemini-api-key"));
    }

    #[test]
    fn test_factory_oauth_without_collaborator() {
        let config = ContentGeneratorConfig::new(AuthType::OauthPersonal);
        let err = create_content_generator(&config, "session", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("oauth-personal"));
    }

    #[test]
    fn test_factory_generic_without_triple() {
        let config = ContentGeneratorConfig::new(AuthType::MultiLlmGeneric);
        let err = create_content_generator(&config, "session", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("multi-llm-generic"));
    }
}
