use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::cache::VerseCache;

/// Per-book chapter and verse counts.
///
/// `verses_by_chapter` is indexed by chapter number; index 0 holds the count
/// of book-introduction segments that precede chapter 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookCounts {
    pub chapters: u32,
    pub verses_by_chapter: Vec<u32>,
}

/// Chapter-count / verse-count lookup keyed by book code.
///
/// Loaded from a JSON data file, or derived from a populated cache so the
/// window assembler always has bounds covering the material actually
/// present. Missing books or chapters yield `None`, which callers treat as
/// a zero-length range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Versification {
    books: HashMap<String, BookCounts>,
}

impl Versification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Derive counts from the keys present in a cache: the chapter count is
    /// the highest chapter number seen, the verse count per chapter the
    /// highest verse number seen in it.
    pub fn from_cache(cache: &VerseCache) -> Self {
        let mut books: HashMap<String, BookCounts> = HashMap::new();
        for (key, _) in cache.iter() {
            let counts = books.entry(key.book.clone()).or_default();
            counts.chapters = counts.chapters.max(key.chapter);
            let idx = key.chapter as usize;
            if counts.verses_by_chapter.len() <= idx {
                counts.verses_by_chapter.resize(idx + 1, 0);
            }
            counts.verses_by_chapter[idx] = counts.verses_by_chapter[idx].max(key.verse);
        }
        Self { books }
    }

    /// Widen these counts with another set, taking the maximum per book and
    /// chapter. Merging a data file over cache-derived counts extends the
    /// assembler's range without ever dropping material the cache holds.
    pub fn merge(&mut self, other: Versification) {
        for (book, counts) in other.books {
            let entry = self.books.entry(book).or_default();
            entry.chapters = entry.chapters.max(counts.chapters);
            if entry.verses_by_chapter.len() < counts.verses_by_chapter.len() {
                entry.verses_by_chapter.resize(counts.verses_by_chapter.len(), 0);
            }
            for (i, n) in counts.verses_by_chapter.into_iter().enumerate() {
                entry.verses_by_chapter[i] = entry.verses_by_chapter[i].max(n);
            }
        }
    }

    pub fn chapter_count(&self, book: &str) -> Option<u32> {
        self.books.get(book).map(|b| b.chapters)
    }

    pub fn verse_count(&self, book: &str, chapter: u32) -> Option<u32> {
        self.books
            .get(book)?
            .verses_by_chapter
            .get(chapter as usize)
            .copied()
    }
}
