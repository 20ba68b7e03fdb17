//! Ordered, unique key sequences with O(1) key -> index lookup

use fnv::FnvHashMap;
use std::fmt;

use crate::error::{MatrixError, MatrixResult};

/// An immutable ordered sequence of unique keys
#[derive(Clone, Default)]
pub struct KeyIndex {
    keys: Vec<String>,
    lookup: FnvHashMap<String, usize>,
}

impl KeyIndex {
    /// Build an index, rejecting duplicate keys
    pub fn new<I, S>(keys: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let mut lookup = FnvHashMap::default();
        lookup.reserve(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if lookup.insert(key.clone(), i).is_some() {
                return Err(MatrixError::consistency(format!("duplicate key '{}'", key)));
            }
        }
        Ok(Self { keys, lookup })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup.contains_key(key)
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(String::as_str)
    }

    /// Same keys in the same order
    pub fn same_sequence<S: AsRef<str>>(&self, other: &[S]) -> bool {
        self.keys.len() == other.len()
            && self.keys.iter().zip(other).all(|(a, b)| a == b.as_ref())
    }
}

impl PartialEq for KeyIndex {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl Eq for KeyIndex {}

impl fmt::Debug for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let index = KeyIndex::new(["r1", "r2", "r3"]).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.index_of("r2"), Some(1));
        assert_eq!(index.index_of("r9"), None);
        assert_eq!(index.key(2), Some("r3"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = KeyIndex::new(["a", "b", "a"]).unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn test_same_sequence_is_order_sensitive() {
        let index = KeyIndex::new(["x", "y"]).unwrap();
        assert!(index.same_sequence(&["x", "y"]));
        assert!(!index.same_sequence(&["y", "x"]));
        assert!(!index.same_sequence(&["x"]));
    }
}
