//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse load-balancer style path patterns
//! - Match request paths against a pattern
//!
//! # Design Decisions
//! - `*` matches any run of characters (including none), `?` exactly one
//! - A pattern without wildcards is an exact match
//! - Path matching is case-sensitive
//! - No regex to guarantee linear-ish matching

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest pattern accepted, mirroring load balancer rule limits.
pub const MAX_PATTERN_LEN: usize = 128;

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("path pattern is empty")]
    Empty,
    #[error("path pattern `{0}` must start with `/` or `*`")]
    NotAbsolute(String),
    #[error("path pattern exceeds {MAX_PATTERN_LEN} characters")]
    TooLong,
    #[error("path pattern `{pattern}` contains invalid character {ch:?}")]
    InvalidChar { pattern: String, ch: char },
}

/// A compiled path pattern such as `/home*` or `/_next/*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
}

impl PathPattern {
    /// Parse and validate a pattern.
    pub fn parse(raw: impl Into<String>) -> Result<Self, PatternError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw.len() > MAX_PATTERN_LEN {
            return Err(PatternError::TooLong);
        }
        if !raw.starts_with('/') && !raw.starts_with('*') {
            return Err(PatternError::NotAbsolute(raw));
        }
        if let Some(ch) = raw
            .chars()
            .find(|c| !c.is_ascii_graphic() || matches!(c, '#' | '<' | '>' | '\\' | '{' | '}'))
        {
            return Err(PatternError::InvalidChar { pattern: raw, ch });
        }
        Ok(Self { raw })
    }

    /// Pattern matching every path.
    pub fn any() -> Self {
        Self { raw: "*".to_string() }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern has no wildcards.
    pub fn is_exact(&self) -> bool {
        !self.raw.contains(['*', '?'])
    }

    /// Literal text before the first wildcard.
    pub fn literal_prefix(&self) -> &str {
        match self.raw.find(['*', '?']) {
            Some(idx) => &self.raw[..idx],
            None => &self.raw,
        }
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        glob_match(self.raw.as_bytes(), path.as_bytes())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.raw
    }
}

/// Iterative wildcard match with single-star backtracking.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            // Let the last star absorb one more byte and retry.
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_prefix_wildcard() {
        let home = pattern("/home*");
        assert!(home.matches("/home"));
        assert!(home.matches("/home/anything"));
        assert!(home.matches("/homepage"));
        assert!(!home.matches("/product/home"));
        assert!(!home.matches("/Home"));
    }

    #[test]
    fn test_directory_wildcard() {
        let next = pattern("/_next/*");
        assert!(next.matches("/_next/static/app.js"));
        assert!(next.matches("/_next/"));
        assert!(!next.matches("/_next"));
    }

    #[test]
    fn test_exact_and_single_char() {
        let exact = pattern("/health");
        assert!(exact.is_exact());
        assert!(exact.matches("/health"));
        assert!(!exact.matches("/healthz"));

        let single = pattern("/v?/items");
        assert!(single.matches("/v1/items"));
        assert!(!single.matches("/v10/items"));
    }

    #[test]
    fn test_inner_wildcard_backtracks() {
        let p = pattern("/a*b*c");
        assert!(p.matches("/aXbYc"));
        assert!(p.matches("/abbbc"));
        assert!(!p.matches("/aXbY"));
        assert!(pattern("*").matches("/anything/at/all"));
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(pattern("/public/*").literal_prefix(), "/public/");
        assert_eq!(pattern("/home*").literal_prefix(), "/home");
        assert_eq!(pattern("*").literal_prefix(), "");
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(PathPattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(PathPattern::parse("home*"), Err(PatternError::NotAbsolute(_))));
        assert!(matches!(PathPattern::parse("/with space"), Err(PatternError::InvalidChar { .. })));
        assert_eq!(PathPattern::parse(format!("/{}", "a".repeat(200))), Err(PatternError::TooLong));
    }
}
