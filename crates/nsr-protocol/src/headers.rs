//! Header multimap.
//!
//! Keys may repeat; writes append and never overwrite.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered header multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

impl Headers {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`, keeping any existing values.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Replace every value for `key` with a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key`, in insertion order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove every value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(key)
    }

    /// Iterate over `(key, values)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.append(key, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_every_value() {
        let mut headers = Headers::new();
        headers.append("accept", "json");
        headers.append("accept", "msgpack");

        assert_eq!(headers.get("accept"), Some("json"));
        assert_eq!(headers.get_all("accept"), ["json", "msgpack"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_set_replaces() {
        let mut headers: Headers = [("a", "1"), ("a", "2")].into_iter().collect();
        headers.set("a", "3");
        assert_eq!(headers.get_all("a"), ["3"]);
    }

    #[test]
    fn test_missing_key() {
        let headers = Headers::new();
        assert!(headers.get("missing").is_none());
        assert!(headers.get_all("missing").is_empty());
        assert!(headers.is_empty());
    }
}
