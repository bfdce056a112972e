//! Ordered string tags attached to samples
//!
//! Keys are normalized on insert (trimmed, lower-cased); empty keys are
//! dropped. Iteration order is the key order, so two samples with the same
//! tags always render identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known tag keys
pub mod keys {
    pub const ENDPOINT: &str = "endpoint";
    pub const EVENT_TYPE: &str = "event_type";
    pub const OPERATION: &str = "operation";
    pub const METHOD: &str = "method";
    pub const STATUS_CODE: &str = "status_code";
    pub const EVENT_SOURCE: &str = "event_source";
    pub const NETWORK: &str = "network";
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const QUEUE_SIZE: &str = "queue_size";
}

/// Ordered mapping of tag key to tag value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Normalize a key the way `insert` does
    pub fn normalize_key(key: &str) -> String {
        key.trim().to_ascii_lowercase()
    }

    /// Insert a tag, returning the previous value for that key.
    ///
    /// Keys that are empty after normalization are ignored.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        let key = Self::normalize_key(key.as_ref());
        if key.is_empty() {
            return None;
        }
        self.0.insert(key, value.into())
    }

    /// Insert only if the key is not already present
    pub fn insert_default(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = Self::normalize_key(key.as_ref());
        if key.is_empty() {
            return;
        }
        self.0.entry(key).or_insert_with(|| value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(value) => Some(value.as_str()),
            None => self.0.get(&Self::normalize_key(key)).map(String::as_str),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; values in `other` win
    pub fn extend(&mut self, other: Tags) {
        self.0.extend(other.0);
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl From<BTreeMap<String, String>> for Tags {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Tags> for BTreeMap<String, String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}
