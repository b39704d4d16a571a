//! Vendor-neutral content types shared by every backend.
//!
//! The wire shape follows the Gemini API (camelCase field names), which is
//! also the neutral shape callers build requests in. The OpenAI-compatible
//! adapter translates to and from its own wire format; the native backend
//! serializes these types directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a content turn. A turn with no role is "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message-like unit of conversation input or output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a single-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a single-text model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a turn with explicit parts.
    pub fn with_parts(role: Option<Role>, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }
}

/// Atomic content unit within a turn.
///
/// Serialized untagged, so parts round-trip as `{"text": ...}`,
/// `{"functionCall": {...}}`, or any other structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    Data(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Part::FunctionCall {
            function_call: FunctionCall {
                name: name.into(),
                args,
            },
        }
    }

    /// Text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

/// Sampling parameters. Unsupplied fields are omitted on the wire, never
/// defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// A generation request: ordered content turns plus optional sampling
/// configuration. Turn order is preserved as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            generation_config: None,
        }
    }

    /// A bare string input is a single user turn with one text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Content::user(text)])
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

/// One alternative generated output. This system produces at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage reported by the backend. Absent when not reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u32>,
}

/// A generation response. Callers must tolerate an empty candidate list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Build a single-candidate response with one model text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Content::model(text),
                finish_reason: None,
            }],
            usage_metadata: None,
        }
    }
}

/// Result of a token count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountTokensResponse {
    pub total_tokens: u32,
}

/// Result of an embedding call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedContentResponse {
    pub embedding: Embedding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_text_is_single_user_turn() {
        let request = GenerateContentRequest::from_text("Hello");
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role, Some(Role::User));
        assert_eq!(request.contents[0].parts, vec![Part::text("Hello")]);
    }

    #[test]
    fn test_part_wire_shape() {
        let text = serde_json::to_value(Part::text("hi")).unwrap();
        assert_eq!(text, json!({"text": "hi"}));

        let call = serde_json::to_value(Part::function_call("ls", json!({"path": "."}))).unwrap();
        assert_eq!(
            call,
            json!({"functionCall": {"name": "ls", "args": {"path": "."}}})
        );
    }

    #[test]
    fn test_part_deserializes_by_shape() {
        let part: Part = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(part, Part::text("hi"));

        let part: Part =
            serde_json::from_value(json!({"functionCall": {"name": "f", "args": {}}})).unwrap();
        assert!(matches!(part, Part::FunctionCall { .. }));

        // Anything else is carried as opaque structured data.
        let part: Part = serde_json::from_value(json!({"inlineData": {"mimeType": "x"}})).unwrap();
        assert!(matches!(part, Part::Data(_)));
    }

    #[test]
    fn test_generation_config_omits_unset_fields() {
        let config = GenerationConfig {
            temperature: Some(0.2),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({"temperature": 0.2}));
    }

    #[test]
    fn test_response_camel_case_round_trip() {
        let raw = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}],
            "usageMetadata": {"promptTokenCount": 3, "totalTokenCount": 5}
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.candidates.len(), 1);
        let usage = response.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, Some(3));
        assert_eq!(usage.candidates_token_count, None);
        assert_eq!(usage.total_token_count, Some(5));
    }

    #[test]
    fn test_empty_candidates_tolerated() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.candidates.is_empty());
        assert!(response.usage_metadata.is_none());
    }
}
