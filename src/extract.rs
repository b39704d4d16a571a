//! Helpers for pulling text and function-call data out of a generation
//! response.
//!
//! These are total functions: they never fail, they only return `None`
//! when the response carries nothing of the requested kind. An absent
//! result is distinct from an empty string.

use crate::content::{FunctionCall, GenerateContentResponse, Part};

/// Concatenated text of every text part in the first candidate, in order.
///
/// A response whose text is wrapped in a fenced code block has the fence
/// markers stripped. Returns `None` when the first candidate has no text
/// parts at all.
pub fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    text_from_parts(&response.candidates.first()?.content.parts)
}

/// Text extraction over a bare parts sequence.
pub fn text_from_parts(parts: &[Part]) -> Option<String> {
    let texts: Vec<&str> = parts.iter().filter_map(Part::as_text).collect();
    if texts.is_empty() {
        return None;
    }
    Some(strip_code_fence(&texts.concat()))
}

/// Every function-call payload in the first candidate, in order. Returns
/// `None` when there are no function-call parts.
pub fn extract_function_calls(response: &GenerateContentResponse) -> Option<Vec<FunctionCall>> {
    function_calls_from_parts(&response.candidates.first()?.content.parts)
}

/// Function-call extraction over a bare parts sequence.
pub fn function_calls_from_parts(parts: &[Part]) -> Option<Vec<FunctionCall>> {
    let calls: Vec<FunctionCall> = parts
        .iter()
        .filter_map(|part| match part {
            Part::FunctionCall { function_call } => Some(function_call.clone()),
            _ => None,
        })
        .collect();
    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

/// Text and serialized function calls joined by a newline when both are
/// present; whichever one alone otherwise; `None` when neither exists.
pub fn extract_structured_response(response: &GenerateContentResponse) -> Option<String> {
    let text = extract_text(response);
    let calls = extract_function_calls(response)
        .and_then(|calls| serde_json::to_string(&calls).ok());

    match (text, calls) {
        (Some(text), Some(calls)) => Some(format!("{text}\n{calls}")),
        (Some(text), None) => Some(text),
        (None, Some(calls)) => Some(calls),
        (None, None) => None,
    }
}

/// Strip a surrounding fenced code block: a first-line open fence (with an
/// optional language tag) and a trailing newline-plus-fence.
fn strip_code_fence(text: &str) -> String {
    if text.starts_with("```") && text.ends_with("\n```") {
        let without_close = &text[..text.len() - 4];
        if let Some(newline) = without_close.find('\n') {
            return without_close[newline + 1..].to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Candidate, Content, Role};
    use serde_json::json;

    fn response_with_parts(parts: Vec<Part>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content::with_parts(Some(Role::Model), parts),
                finish_reason: None,
            }],
            usage_metadata: None,
        }
    }

    #[test]
    fn test_extract_text_concatenates_in_order() {
        let response = response_with_parts(vec![
            Part::text("Hello "),
            Part::function_call("tool", json!({})),
            Part::text("world"),
        ]);
        assert_eq!(extract_text(&response).as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_extract_text_absent_without_text_parts() {
        let response = response_with_parts(vec![Part::function_call("tool", json!({}))]);
        assert_eq!(extract_text(&response), None);

        let empty = GenerateContentResponse::default();
        assert_eq!(extract_text(&empty), None);
    }

    #[test]
    fn test_extract_text_empty_string_is_present() {
        // An empty text part yields Some(""), not None.
        let response = response_with_parts(vec![Part::text("")]);
        assert_eq!(extract_text(&response).as_deref(), Some(""));
    }

    #[test]
    fn test_strip_code_fence_with_language_tag() {
        let response = response_with_parts(vec![Part::text("```json\n{\"a\": 1}\n```")]);
        assert_eq!(extract_text(&response).as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_strip_code_fence_without_tag() {
        let response = response_with_parts(vec![Part::text("```\ncode\n```")]);
        assert_eq!(extract_text(&response).as_deref(), Some("code"));
    }

    #[test]
    fn test_unfenced_text_untouched() {
        let response = response_with_parts(vec![Part::text("plain ``` text")]);
        assert_eq!(extract_text(&response).as_deref(), Some("plain ``` text"));
    }

    #[test]
    fn test_extract_function_calls() {
        let response = response_with_parts(vec![
            Part::function_call("first", json!({"n": 1})),
            Part::text("between"),
            Part::function_call("second", json!({"n": 2})),
        ]);
        let calls = extract_function_calls(&response).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[1].name, "second");
    }

    #[test]
    fn test_extract_function_calls_absent() {
        let response = response_with_parts(vec![Part::text("no calls")]);
        assert_eq!(extract_function_calls(&response), None);
    }

    #[test]
    fn test_structured_response_both() {
        let response = response_with_parts(vec![
            Part::text("answer"),
            Part::function_call("tool", json!({})),
        ]);
        let structured = extract_structured_response(&response).unwrap();
        let (text, calls) = structured.split_once('\n').unwrap();
        assert_eq!(text, "answer");
        assert!(calls.contains("\"tool\""));
    }

    #[test]
    fn test_structured_response_single_and_none() {
        let text_only = response_with_parts(vec![Part::text("just text")]);
        assert_eq!(
            extract_structured_response(&text_only).as_deref(),
            Some("just text")
        );

        let calls_only = response_with_parts(vec![Part::function_call("f", json!({}))]);
        assert!(extract_structured_response(&calls_only)
            .unwrap()
            .starts_with('['));

        let neither = GenerateContentResponse::default();
        assert_eq!(extract_structured_response(&neither), None);
    }
}
