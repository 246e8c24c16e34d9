//! Keys whose values must never leave the process.
//!
//! A blacklist entry is either an exact key or a regular expression. The
//! default blacklist matches any key containing `password` or `secret`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Replacement emitted for blacklisted values.
pub const FILTERED: &str = "[Filtered]";

static DEFAULT_PATTERNS: Lazy<Vec<KeyPattern>> = Lazy::new(|| {
    ["password", "secret"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .map(KeyPattern::Regex)
        .collect()
});

/// One blacklist entry.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Matches a key that is exactly equal to the string
    Exact(String),
    /// Matches any key the expression finds a match in
    Regex(Regex),
}

impl KeyPattern {
    /// Create an exact-match pattern.
    pub fn exact(key: impl Into<String>) -> Self {
        KeyPattern::Exact(key.into())
    }

    /// Compile a regular-expression pattern.
    ///
    /// # Errors
    /// Returns the regex compilation error if `pattern` is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(KeyPattern::Regex)
    }

    /// Check whether `key` is matched by this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

/// Parses `/expr/` as a regular expression and anything else as an exact key.
impl FromStr for KeyPattern {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('/').and_then(|rest| rest.strip_suffix('/')) {
            Some(expr) if !expr.is_empty() => KeyPattern::regex(expr),
            _ => Ok(KeyPattern::exact(s)),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(key) => f.write_str(key),
            KeyPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Ordered set of key patterns.
#[derive(Debug, Clone)]
pub struct KeyBlacklist {
    patterns: Vec<KeyPattern>,
}

impl KeyBlacklist {
    /// Create a blacklist from explicit patterns.
    pub fn new(patterns: Vec<KeyPattern>) -> Self {
        Self { patterns }
    }

    /// A blacklist that matches nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Check whether a key must be filtered.
    pub fn is_blacklisted(&self, key: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(key))
    }

    /// Add a pattern.
    pub fn push(&mut self, pattern: KeyPattern) {
        self.patterns.push(pattern);
    }

    /// The configured patterns in order.
    pub fn patterns(&self) -> &[KeyPattern] {
        &self.patterns
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if no pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for KeyBlacklist {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS.clone())
    }
}

impl FromIterator<KeyPattern> for KeyBlacklist {
    fn from_iter<I: IntoIterator<Item = KeyPattern>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blacklist_matches_substrings() {
        let blacklist = KeyBlacklist::default();
        assert_eq!(blacklist.len(), 2);
        assert!(blacklist.is_blacklisted("password"));
        assert!(blacklist.is_blacklisted("user_password_hash"));
        assert!(blacklist.is_blacklisted("client_secret"));
        assert!(!blacklist.is_blacklisted("username"));
    }

    #[test]
    fn test_exact_pattern_requires_full_match() {
        let blacklist = KeyBlacklist::new(vec![KeyPattern::exact("token")]);
        assert!(blacklist.is_blacklisted("token"));
        assert!(!blacklist.is_blacklisted("token_type"));
    }

    #[test]
    fn test_parse_slash_delimited_as_regex() {
        let pattern: KeyPattern = "/^api_.*key$/".parse().unwrap();
        assert!(matches!(pattern, KeyPattern::Regex(_)));
        assert!(pattern.matches("api_private_key"));
        assert!(!pattern.matches("my_api_key_id"));
    }

    #[test]
    fn test_parse_plain_string_as_exact() {
        let pattern: KeyPattern = "cookie".parse().unwrap();
        assert!(matches!(pattern, KeyPattern::Exact(_)));
        assert_eq!(pattern.to_string(), "cookie");

        let lone_slash: KeyPattern = "/".parse().unwrap();
        assert!(matches!(lone_slash, KeyPattern::Exact(_)));
    }

    #[test]
    fn test_parse_invalid_regex() {
        assert!("/(unclosed/".parse::<KeyPattern>().is_err());
    }

    #[test]
    fn test_empty_blacklist() {
        let blacklist = KeyBlacklist::empty();
        assert!(blacklist.is_empty());
        assert!(!blacklist.is_blacklisted("password"));
    }
}
