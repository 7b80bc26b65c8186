use crate::cache::VerseKey;
use crate::marker::{leading_number, MarkerKind, ParsedLine};

/// One section of a book: the inclusive verse-key range it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub start: VerseKey,
    pub end: VerseKey,
}

/// Section bounds derived from heading markers.
///
/// A section starts at the first verse at or after a heading marker and ends
/// just before the next section starts (or at the last verse of the book).
/// Verses before the first heading belong to no section.
#[derive(Debug, Clone, Default)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    /// Build the map with one ordered pass over the parsed lines.
    pub fn build(book: &str, lines: &[ParsedLine]) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        let mut chapter: u32 = 0;
        let mut last_verse: Option<VerseKey> = None;
        let mut pending_heading = false;

        for line in lines {
            match line.kind() {
                Some(MarkerKind::Chapter) => {
                    if let Some(n) = leading_number(&line.payload) {
                        chapter = n;
                    }
                }
                Some(MarkerKind::Verse) => {
                    if let Some(n) = leading_number(&line.payload) {
                        let key = VerseKey::new(book, chapter, n);
                        if pending_heading {
                            if let (Some(open), Some(prev)) =
                                (sections.last_mut(), last_verse.clone())
                            {
                                open.end = prev;
                            }
                            sections.push(Section {
                                start: key.clone(),
                                end: key.clone(),
                            });
                            pending_heading = false;
                        }
                        last_verse = Some(key);
                    }
                }
                Some(MarkerKind::Heading) => pending_heading = true,
                _ => {}
            }
        }

        if let (Some(open), Some(last)) = (sections.last_mut(), last_verse) {
            open.end = last;
        }

        Self { sections }
    }

    /// Inclusive bounds of the section containing `key`, if any.
    pub fn bounds(&self, key: &VerseKey) -> Option<(VerseKey, VerseKey)> {
        self.sections
            .iter()
            .find(|s| s.start <= *key && *key <= s.end)
            .map(|s| (s.start.clone(), s.end.clone()))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
