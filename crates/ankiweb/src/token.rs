//! Anti-forgery token extraction.
//!
//! AnkiWeb embeds a fresh CSRF token in every form page. The login page
//! carries it as a hidden input, the card editor assigns it from inline
//! script, so each page gets its own extractor.

use std::fmt;

use regex_lite::Regex;

use crate::error::{Error, Result};

/// Locates a token inside a response body.
///
/// Implement this to swap the matching strategy (a DOM query, a JSON
/// field) without touching the client.
pub trait TokenExtractor: fmt::Debug + Send + Sync {
    /// Return the token embedded in `body`.
    fn extract(&self, body: &str) -> Result<String>;
}

/// Extracts a token with a regular expression whose first capture group is
/// the token value.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    name: String,
    pattern: Regex,
}

impl PatternExtractor {
    /// Create an extractor from a pattern with a single capture group.
    ///
    /// Returns [`Error::Config`] when the pattern does not compile.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid token pattern: {}", e)))?;

        Ok(Self {
            name: name.into(),
            pattern,
        })
    }

    /// The hidden `csrf_token` input of the login form.
    pub fn login_form() -> Self {
        Self::literal("login csrf_token", r#"name="csrf_token" value="([^"]+)"#)
    }

    /// The `editor.csrf_token2` assignment in the card editor script.
    pub fn editor_script() -> Self {
        Self::literal("editor csrf_token2", r"editor\.csrf_token2 = '([^']+)';")
    }

    fn literal(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: Regex::new(pattern).expect("builtin token pattern"),
        }
    }

    /// The name used in [`Error::TokenNotFound`].
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TokenExtractor for PatternExtractor {
    fn extract(&self, body: &str) -> Result<String> {
        let mut candidates: Vec<&str> = self
            .pattern
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        match candidates.as_slice() {
            [token] => Ok((*token).to_string()),
            other => Err(Error::TokenNotFound {
                token: self.name.clone(),
                matches: other.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <form method="post">
          <input type="hidden" name="csrf_token" value="a1b2c3.d4">
          <input name="username">
        </form>"#;

    const EDITOR_PAGE: &str = r#"
        <script>
          editor.csrf_token2 = 'tok-987';
          editor.init();
        </script>"#;

    #[test]
    fn test_login_token() {
        let token = PatternExtractor::login_form().extract(LOGIN_PAGE).unwrap();
        assert_eq!(token, "a1b2c3.d4");
    }

    #[test]
    fn test_editor_token() {
        let token = PatternExtractor::editor_script()
            .extract(EDITOR_PAGE)
            .unwrap();
        assert_eq!(token, "tok-987");
    }

    #[test]
    fn test_patterns_do_not_cross_match() {
        assert!(PatternExtractor::login_form().extract(EDITOR_PAGE).is_err());
        assert!(PatternExtractor::editor_script().extract(LOGIN_PAGE).is_err());
    }

    #[test]
    fn test_missing_token() {
        let err = PatternExtractor::login_form()
            .extract("<html></html>")
            .unwrap_err();
        assert!(matches!(err, Error::TokenNotFound { matches: 0, .. }));
    }

    #[test]
    fn test_ambiguous_token() {
        let body = r#"name="csrf_token" value="one" ... name="csrf_token" value="two""#;
        let err = PatternExtractor::login_form().extract(body).unwrap_err();
        assert!(matches!(err, Error::TokenNotFound { matches: 2, .. }));
    }

    #[test]
    fn test_repeated_identical_token() {
        let body = r#"name="csrf_token" value="same" name="csrf_token" value="same""#;
        let token = PatternExtractor::login_form().extract(body).unwrap();
        assert_eq!(token, "same");
    }

    #[test]
    fn test_custom_pattern() {
        let extractor = PatternExtractor::new("meta", r#"<meta name="token" content="(\w+)">"#)
            .unwrap();
        assert_eq!(extractor.name(), "meta");
        let token = extractor
            .extract(r#"<meta name="token" content="xyz">"#)
            .unwrap();
        assert_eq!(token, "xyz");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PatternExtractor::new("bad", "(unclosed"),
            Err(Error::Config(_))
        ));
    }
}
