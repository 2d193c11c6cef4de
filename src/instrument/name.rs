use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One or several instrument segment names, `*` matches any sequence of characters
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum InstrumentName {
    Single(String),
    Many(Vec<String>),
}

impl InstrumentName {
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }

    /// Check if `name` matches any of the patterns
    pub fn matches(&self, name: &str) -> bool {
        self.patterns()
            .iter()
            .any(|pattern| wildcard_match(pattern, name))
    }
}

impl fmt::Display for InstrumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&itertools::join(self.patterns(), ", "))
    }
}

impl From<&str> for InstrumentName {
    fn from(name: &str) -> Self {
        Self::Single(name.to_owned())
    }
}

impl From<String> for InstrumentName {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl From<Vec<String>> for InstrumentName {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl From<&[&str]> for InstrumentName {
    fn from(names: &[&str]) -> Self {
        Self::Many(names.iter().map(|&name| name.to_owned()).collect())
    }
}

/// Glob matching with `*` as the only special character
pub(super) fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    // split always yields at least one part
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<_> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        assert!(wildcard_match("spitzer.irs.sl.1", "spitzer.irs.sl.1"));
        assert!(!wildcard_match("spitzer.irs.sl", "spitzer.irs.sl.1"));
        assert!(wildcard_match("spitzer.irs.*", "spitzer.irs.sl.1"));
        assert!(wildcard_match("*.ch1.*", "jwst.miri.mrs.ch1.short"));
        assert!(!wildcard_match("*.ch1.*", "jwst.miri.mrs.ch2.short"));
        assert!(wildcard_match("jwst.*.long", "jwst.miri.mrs.ch3.long"));
        assert!(!wildcard_match("a*a", "a"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn untagged_serde() {
        let single: InstrumentName = serde_json::from_str(r#""spitzer.irs.*""#).unwrap();
        assert_eq!(single, InstrumentName::from("spitzer.irs.*"));
        let many: InstrumentName = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(many, InstrumentName::from(&["a", "b"][..]));
        assert_eq!(many.to_string(), "a, b");
        assert!(many.matches("b"));
        assert!(!many.matches("c"));
    }
}
