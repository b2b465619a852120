//! Key namespacing.
//!
//! Every key the facade touches lives under one prefix so that several
//! applications can share a keyspace without colliding.

/// Prefix applied to keys when none is configured.
pub const DEFAULT_PREFIX: &str = "chaoyue:";

/// A fixed key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Create a prefix. An empty prefix leaves keys untouched.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// The prefix itself.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full store key for `key`.
    pub fn apply(&self, key: &str) -> String {
        format!("{}{key}", self.0)
    }

    /// Full store keys for several keys.
    pub fn apply_all<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        keys.iter().map(|k| self.apply(k.as_ref())).collect()
    }

    /// Pattern matching `pattern` inside the namespace.
    ///
    /// Glob metacharacters in the prefix are escaped so they match
    /// literally.
    pub fn pattern(&self, pattern: &str) -> String {
        let mut full = String::with_capacity(self.0.len() + pattern.len());
        for c in self.0.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                full.push('\\');
            }
            full.push(c);
        }
        full.push_str(pattern);
        full
    }

    /// Caller-facing key for a full store key.
    ///
    /// Returns `None` for keys outside the namespace.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key.strip_prefix(self.0.as_str())
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        let prefix = KeyPrefix::default();
        assert_eq!(prefix.apply("user:42"), "chaoyue:user:42");
    }

    #[test]
    fn test_strip_round_trip() {
        let prefix = KeyPrefix::default();
        assert_eq!(prefix.strip("chaoyue:user:42"), Some("user:42"));
        assert_eq!(prefix.strip("other:user:42"), None);
    }

    #[test]
    fn test_pattern_escapes_prefix() {
        let prefix = KeyPrefix::new("app[1]:");
        assert_eq!(prefix.pattern("user:*"), r"app\[1\]:user:*");
        assert_eq!(KeyPrefix::default().pattern("*"), "chaoyue:*");
    }

    #[test]
    fn test_empty_prefix() {
        let prefix = KeyPrefix::new("");
        assert_eq!(prefix.apply("k"), "k");
        assert_eq!(prefix.strip("k"), Some("k"));
    }
}
