//! Bundle-id matching with optional trailing `*` wildcards.

/// Case-insensitive set of bundle patterns. `com.foo.*` matches any id
/// starting with `com.foo.`; anything else must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMatcher {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl BundleMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().to_lowercase();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_suffix('*') {
                Some(prefix) => matcher.prefixes.push(prefix.to_string()),
                None => matcher.exact.push(pattern),
            }
        }
        matcher
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    pub fn matches(&self, bundle_id: &str) -> bool {
        let id = bundle_id.trim().to_lowercase();
        if id.is_empty() {
            return false;
        }
        self.exact.iter().any(|e| *e == id) || self.prefixes.iter().any(|p| id.starts_with(p.as_str()))
    }
}
