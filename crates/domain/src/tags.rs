//! Insertion-ordered tag maps.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// String key/value labels attached to a request or a timer.
///
/// Keys are unique. Iteration follows insertion order, and overwriting an
/// existing key keeps its original position. Equality ignores order: two
/// maps are equal when they hold the same pairs.
#[derive(Debug, Clone, Default)]
pub struct TagMap {
    entries: Vec<(Box<str>, Box<str>)>,
}

impl TagMap {
    /// Create an empty tag map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or overwrite a tag, returning the previous value.
    pub fn insert(&mut self, key: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Option<Box<str>> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => self
                .entries
                .get_mut(index)
                .map(|entry| std::mem::replace(&mut entry.1, value)),
            None => {
                self.entries.push((key, value));
                None
            },
        }
    }

    /// Look up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_ref() == key)
            .map(|(_, value)| value.as_ref())
    }

    /// Remove a tag, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Box<str>> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns true when the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_ref(), value.as_ref()))
    }

    /// Shallow merge: incoming keys overwrite, new keys are appended.
    pub fn merge(&mut self, incoming: Self) {
        for (key, value) in incoming.entries {
            self.insert(key, value);
        }
    }

    /// Remove every tag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Order-independent identity of the tag set: pairs sorted by key.
    #[must_use]
    pub fn canonical_key(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self.iter().collect();
        pairs.sort_unstable();
        pairs
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name.as_ref() == key)
    }
}

impl PartialEq for TagMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for TagMap {}

impl<K, V> FromIterator<(K, V)> for TagMap
where
    K: Into<Box<str>>,
    V: Into<Box<str>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for TagMap
where
    K: Into<Box<str>>,
    V: Into<Box<str>>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for TagMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
