//! Parsing of the language model's reply into an [`EnhancedDeck`].
//!
//! Models often wrap the requested JSON in a markdown code fence even when
//! asked not to. A single surrounding fence is unwrapped; anything else that
//! is not a JSON object of the expected shape is a malformed response.

use crate::{EnhancedDeck, Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Matches a reply that is entirely one fenced block, optionally tagged `json`.
static CODE_FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap()
});

/// Strip one surrounding markdown fence, if present.
fn unwrap_code_fence(text: &str) -> &str {
    match CODE_FENCE_REGEX.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text,
    }
}

impl EnhancedDeck {
    /// Parse the raw text returned by the model.
    pub fn from_reply(reply: &str) -> Result<Self> {
        let body = unwrap_code_fence(reply.trim());
        serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"{"title":"Deck","slides":[{"heading":"One","bullet_points":["a","b"],"chart_type":"bar"}]}"#;

    #[test]
    fn test_parses_plain_json() {
        let deck = EnhancedDeck::from_reply(PLAIN).unwrap();
        assert_eq!(deck.title.as_deref(), Some("Deck"));
        assert_eq!(deck.slides[0].bullet_points, vec!["a", "b"]);
        assert_eq!(deck.slides[0].chart_label(), Some("bar"));
    }

    #[test]
    fn test_unwraps_json_fence() {
        let reply = format!("```json\n{PLAIN}\n```");
        let deck = EnhancedDeck::from_reply(&reply).unwrap();
        assert_eq!(deck.slides.len(), 1);
    }

    #[test]
    fn test_unwraps_untagged_fence() {
        let reply = format!("  ```\n{PLAIN}\n```  ");
        assert!(EnhancedDeck::from_reply(&reply).is_ok());
    }

    #[test]
    fn test_commentary_is_malformed() {
        let reply = format!("Here is your improved deck:\n{PLAIN}");
        assert!(matches!(
            EnhancedDeck::from_reply(&reply),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let err = EnhancedDeck::from_reply(r#"{"title": "Deck", "slides": ["#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        assert!(EnhancedDeck::from_reply("[1, 2, 3]").is_err());
        assert!(EnhancedDeck::from_reply(r#"{"slides": [{"bullet_points": "x"}]}"#).is_err());
    }
}
