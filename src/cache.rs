use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::marker;
use crate::segmenter;

/// Canonical identity of one verse: book code plus chapter and verse numbers.
///
/// Chapter/verse 0 addresses book-introduction material that precedes the
/// first real chapter or verse marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseKey {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
            verse,
        }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

// Sequential traversal orders by (chapter, verse); the book only breaks ties
// between caches that were merged, which does not happen in practice.
impl Ord for VerseKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.chapter, self.verse, &self.book).cmp(&(other.chapter, other.verse, &other.book))
    }
}

impl PartialOrd for VerseKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Insertion-ordered map from verse key to its verbatim document segment.
///
/// Rebuilt wholesale from the document text; there is no partial
/// invalidation. Iteration yields entries in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerseCache {
    entries: Vec<(VerseKey, String)>,
    index: HashMap<VerseKey, usize>,
}

impl VerseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment. A key that is already present is a conflict, not an
    /// overwrite: the new content is concatenated onto the existing entry and
    /// a diagnostic is emitted, since duplicates indicate irregular input.
    pub fn put(&mut self, key: VerseKey, segment: String) {
        if let Some(&i) = self.index.get(&key) {
            warn!(key = %key, "duplicate verse key, merging segments");
            self.entries[i].1.push_str(&segment);
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, segment));
    }

    pub fn get(&self, key: &VerseKey) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, key: &VerseKey) -> bool {
        self.index.contains_key(key)
    }

    /// Clear and fully repopulate from the document text.
    pub fn rebuild(&mut self, book: &str, text: &str) {
        self.entries.clear();
        self.index.clear();
        let lines = marker::parse_document(text);
        segmenter::segment_into(book, &lines, self);
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&VerseKey, &str)> {
        self.entries.iter().map(|(k, s)| (k, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let a = VerseKey::new("GEN", 1, 9);
        let b = VerseKey::new("GEN", 1, 10);
        let c = VerseKey::new("GEN", 2, 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, VerseKey::new("GEN", 1, 9));
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = VerseCache::new();
        cache.put(VerseKey::new("GEN", 1, 1), "\\v 1 First\n".to_string());
        assert_eq!(
            cache.get(&VerseKey::new("GEN", 1, 1)),
            Some("\\v 1 First\n")
        );
        assert_eq!(cache.get(&VerseKey::new("GEN", 1, 2)), None);
    }

    #[test]
    fn test_duplicate_key_concatenates() {
        let mut cache = VerseCache::new();
        let key = VerseKey::new("GEN", 1, 5);
        cache.put(key.clone(), "\\v 5 First text\n".to_string());
        cache.put(key.clone(), "\\v 5 Second text\n".to_string());
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&key),
            Some("\\v 5 First text\n\\v 5 Second text\n")
        );
    }

    #[test]
    fn test_iteration_in_document_order() {
        let mut cache = VerseCache::new();
        cache.put(VerseKey::new("GEN", 0, 1), "\\id GEN\n".to_string());
        cache.put(VerseKey::new("GEN", 1, 0), "\\c 1\n".to_string());
        cache.put(VerseKey::new("GEN", 1, 1), "\\v 1 Text\n".to_string());
        let keys: Vec<&VerseKey> = cache.iter().map(|(k, _)| k).collect();
        assert_eq!(keys[0].verse, 1);
        assert_eq!(keys[1].chapter, 1);
        assert_eq!(keys[2].verse, 1);
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut cache = VerseCache::new();
        cache.put(VerseKey::new("GEN", 9, 9), "stale\n".to_string());
        cache.rebuild("GEN", "\\c 1\n\\v 1 Fresh\n");
        assert!(!cache.contains(&VerseKey::new("GEN", 9, 9)));
        assert!(cache.contains(&VerseKey::new("GEN", 1, 1)));
    }
}
