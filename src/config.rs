//! Session configuration for provider selection.
//!
//! A [`ContentGeneratorConfig`] is built once at session start (from the
//! environment or by an external settings loader) and stays immutable for
//! the session. Reconfiguration replaces it wholesale and re-runs provider
//! selection; nothing here is mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Model used by vendor auth modes when the caller specifies none.
/// Generic mode always uses the caller-supplied model string verbatim.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// How the session authenticates to a backend. Exactly one is active per
/// session; it drives which adapter the factory builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    OauthPersonal,
    GeminiApiKey,
    VertexAi,
    CloudShell,
    MultiLlmGeneric,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::OauthPersonal => "oauth-personal",
            AuthType::GeminiApiKey => "gemini-api-key",
            AuthType::VertexAi => "vertex-ai",
            AuthType::CloudShell => "cloud-shell",
            AuthType::MultiLlmGeneric => "multi-llm-generic",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the OpenAI-compatible adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    /// Full endpoint URL. A URL containing `chat/completions` selects the
    /// chat wire format; anything else the legacy completion format.
    pub base_url: String,

    /// Absent means unauthenticated: no auth header is sent at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    /// Static headers merged into every request. The derived auth header
    /// is applied after these and wins on collision.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Outbound proxy URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

/// Session-level provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentGeneratorConfig {
    pub auth_type: AuthType,

    /// Model for vendor modes; falls back to [`DEFAULT_GEMINI_MODEL`].
    #[serde(default)]
    pub model: Option<String>,

    /// Vendor API key (Gemini API key or Vertex express key).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Route the native client through the Vertex AI endpoint.
    #[serde(default)]
    pub vertex_ai: bool,

    /// Outbound proxy URL, applied to the generic adapter.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Generic-provider triple. Generic mode activates only when all three
    /// of base URL, API key and model are present; partial presence falls
    /// through to vendor auth resolution.
    #[serde(default)]
    pub generic_base_url: Option<String>,
    #[serde(default)]
    pub generic_api_key: Option<String>,
    #[serde(default)]
    pub generic_model: Option<String>,

    /// Static headers for the generic adapter.
    #[serde(default)]
    pub generic_headers: HashMap<String, String>,
}

impl ContentGeneratorConfig {
    pub fn new(auth_type: AuthType) -> Self {
        Self {
            auth_type,
            model: None,
            api_key: None,
            vertex_ai: false,
            proxy: None,
            generic_base_url: None,
            generic_api_key: None,
            generic_model: None,
            generic_headers: HashMap::new(),
        }
    }

    /// Resolve from environment variables.
    ///
    /// `LLM_BASE_URL` / `LLM_API_KEY` / `LLM_MODEL` supply the generic
    /// triple; `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and
    /// `GOOGLE_GENAI_USE_VERTEXAI` supply the vendor settings.
    pub fn from_env(auth_type: AuthType) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            auth_type,
            model: env("GEMINI_MODEL"),
            api_key: env("GEMINI_API_KEY").or_else(|| env("GOOGLE_API_KEY")),
            vertex_ai: env("GOOGLE_GENAI_USE_VERTEXAI")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            proxy: env("HTTPS_PROXY").or_else(|| env("https_proxy")),
            generic_base_url: env("LLM_BASE_URL"),
            generic_api_key: env("LLM_API_KEY"),
            generic_model: env("LLM_MODEL"),
            generic_headers: HashMap::new(),
        }
    }

    /// The generic adapter configuration, if generic mode is active.
    /// All-or-nothing: any missing member of the triple disables it.
    pub fn openai_compat(&self) -> Option<OpenAiCompatConfig> {
        match (
            &self.generic_base_url,
            &self.generic_api_key,
            &self.generic_model,
        ) {
            (Some(base_url), Some(api_key), Some(model)) => Some(OpenAiCompatConfig {
                base_url: base_url.clone(),
                api_key: Some(api_key.clone()),
                model: model.clone(),
                headers: self.generic_headers.clone(),
                proxy: self.proxy.clone(),
            }),
            _ => None,
        }
    }

    /// Effective model for vendor modes.
    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_serde_kebab_case() {
        let json = serde_json::to_string(&AuthType::GeminiApiKey).unwrap();
        assert_eq!(json, "\"gemini-api-key\"");
        let parsed: AuthType = serde_json::from_str("\"multi-llm-generic\"").unwrap();
        assert_eq!(parsed, AuthType::MultiLlmGeneric);
    }

    #[test]
    fn test_openai_compat_requires_full_triple() {
        let mut config = ContentGeneratorConfig::new(AuthType::MultiLlmGeneric);
        config.generic_base_url = Some("http://localhost:8080/v1/chat/completions".to_string());
        config.generic_model = Some("llama3".to_string());
        // Missing key: falls through to vendor resolution.
        assert!(config.openai_compat().is_none());

        config.generic_api_key = Some("sk-test".to_string());
        let compat = config.openai_compat().unwrap();
        assert_eq!(compat.model, "llama3");
        assert_eq!(compat.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_effective_model_default() {
        let config = ContentGeneratorConfig::new(AuthType::GeminiApiKey);
        assert_eq!(config.effective_model(), DEFAULT_GEMINI_MODEL);

        let mut named = config.clone();
        named.model = Some("gemini-2.5-flash".to_string());
        assert_eq!(named.effective_model(), "gemini-2.5-flash");
    }
}
