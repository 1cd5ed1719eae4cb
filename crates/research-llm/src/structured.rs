//! Strict parsing of structured answers
//!
//! The reasoning service is asked to answer with a single JSON object. The
//! answer is accepted when, after removing at most one surrounding markdown
//! code fence, the whole text is that object and it deserializes into the
//! expected type. Anything else (prose around the JSON, truncated JSON, a
//! JSON array) is a [`research_core::Error::Parse`], and callers substitute
//! their documented default.

use research_core::{Error, Result};
use serde::de::DeserializeOwned;

/// Parse a structured answer into `T`
///
/// `expected` names the payload in the error message.
///
/// # Example
///
/// ```
/// use research_llm::parse_structured;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Verdict { recommendation: String }
///
/// let v: Verdict = parse_structured("```json\n{\"recommendation\": \"BUY\"}\n```", "verdict").unwrap();
/// assert_eq!(v.recommendation, "BUY");
/// assert!(parse_structured::<Verdict>("Sure! {\"recommendation\": \"BUY\"}", "verdict").is_err());
/// ```
pub fn parse_structured<T: DeserializeOwned>(text: &str, expected: &str) -> Result<T> {
    let body = strip_code_fence(text.trim());
    if !body.starts_with('{') {
        return Err(Error::parse(expected, "answer is not a JSON object"));
    }
    serde_json::from_str(body).map_err(|e| Error::parse(expected, e.to_string()))
}

/// Remove one surrounding ``` fence (with an optional language tag)
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };

    match inner.split_once('\n') {
        Some((tag, body)) if !tag.contains('{') => body.trim(),
        _ => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        summary: String,
        score: u8,
    }

    #[test]
    fn test_plain_object() {
        let p: Payload = parse_structured(r#" {"summary": "ok", "score": 7} "#, "payload").unwrap();
        assert_eq!(p.score, 7);
    }

    #[test]
    fn test_fenced_object() {
        let text = "```json\n{\"summary\": \"ok\", \"score\": 3}\n```";
        let p: Payload = parse_structured(text, "payload").unwrap();
        assert_eq!(p.summary, "ok");

        let text = "```{\"summary\": \"ok\", \"score\": 4}```";
        let p: Payload = parse_structured(text, "payload").unwrap();
        assert_eq!(p.score, 4);
    }

    #[test]
    fn test_rejects_prose_and_partial_json() {
        let cases = [
            "Here is my analysis: {\"summary\": \"ok\", \"score\": 7}",
            "{\"summary\": \"ok\", \"score\": 7",
            "{\"summary\": \"ok\"}",
            "[{\"summary\": \"ok\", \"score\": 7}]",
            "",
            "I could not find anything.",
        ];
        for text in cases {
            let err = parse_structured::<Payload>(text, "payload").unwrap_err();
            assert!(matches!(err, Error::Parse { .. }), "{text:?} should not parse");
        }
    }

    #[test]
    fn test_rejects_out_of_range_types() {
        let err = parse_structured::<Payload>(r#"{"summary": "ok", "score": 700}"#, "payload");
        assert!(err.is_err());
    }
}
