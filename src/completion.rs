use std::collections::HashMap;
use tokio::task::JoinSet;
use tracing::debug;

use crate::marker::{parse_document, ParsedLine};

/// Payload transforms keyed by marker code, applied before word counting.
/// Footnote/cross-reference apparatus is dropped; numbered markers shed
/// their leading numeral; everything else passes through.
static PAYLOAD_TRANSFORMS: &[(&str, fn(&str) -> String)] = &[
    ("f", drop_payload),
    ("fe", drop_payload),
    ("x", drop_payload),
    ("r", drop_payload),
    ("id", drop_payload),
    ("c", drop_payload),
    ("v", strip_leading_number),
];

fn drop_payload(_payload: &str) -> String {
    String::new()
}

fn strip_leading_number(payload: &str) -> String {
    let rest = payload.trim_start_matches(|c: char| c.is_ascii_digit());
    // A versification suffix letter rides on the numeral ("12b").
    let rest = if rest.len() != payload.len() {
        rest.trim_start_matches(|c: char| c.is_ascii_alphabetic())
    } else {
        rest
    };
    rest.trim_start().to_string()
}

fn transform_payload(marker: &str, payload: &str) -> String {
    match PAYLOAD_TRANSFORMS.iter().find(|(code, _)| *code == marker) {
        Some((_, transform)) => transform(payload),
        None => payload.to_string(),
    }
}

/// Case-insensitive word-frequency index over document text, for prefix
/// completion while editing.
#[derive(Debug, Clone, Default)]
pub struct WordIndex {
    counts: HashMap<String, u32>,
}

impl WordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every word of a document, markers stripped.
    pub fn add_document(&mut self, text: &str) {
        for line in parse_document(text) {
            self.add_line(&line);
        }
    }

    fn add_line(&mut self, line: &ParsedLine) {
        let text = match &line.marker {
            Some(code) => transform_payload(code, &line.payload),
            None => line.raw.trim_end_matches(['\n', '\r']).to_string(),
        };
        for word in text
            .split(|c: char| !c.is_alphabetic() && c != '\'')
            .filter(|w| w.len() > 1)
        {
            *self.counts.entry(word.to_lowercase()).or_insert(0) += 1;
        }
    }

    fn merge(&mut self, other: WordIndex) {
        for (word, n) in other.counts {
            *self.counts.entry(word).or_insert(0) += n;
        }
    }

    pub fn count(&self, word: &str) -> u32 {
        self.counts.get(&word.to_lowercase()).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Completion candidates for a prefix, most frequent first, ties broken
    /// alphabetically.
    pub fn complete(&self, prefix: &str, limit: usize) -> Vec<(String, u32)> {
        let prefix = prefix.to_lowercase();
        let mut matches: Vec<(String, u32)> = self
            .counts
            .iter()
            .filter(|(word, _)| word.starts_with(&prefix))
            .map(|(word, &n)| (word.clone(), n))
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        matches.truncate(limit);
        matches
    }
}

/// Build one index over several book texts, scanning books in parallel
/// tasks. The scan works on owned snapshots of the document text and never
/// touches any verse cache.
pub async fn scan_books(books: Vec<(String, String)>) -> WordIndex {
    let mut tasks = JoinSet::new();
    for (book, text) in books {
        tasks.spawn(async move {
            let mut index = WordIndex::new();
            index.add_document(&text);
            debug!(book, words = index.len(), "word scan finished");
            index
        });
    }

    let mut merged = WordIndex::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(index) = result {
            merged.merge(index);
        }
    }
    merged
}
