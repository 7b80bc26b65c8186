use tracing::debug;

use crate::cache::{VerseCache, VerseKey};
use crate::marker::{leading_number, MarkerKind, ParsedLine};

/// Partition a parsed document into verse segments, in document order,
/// writing each into the cache.
///
/// Running counters start at chapter 0 / verse 0 (book-introduction
/// material). A section heading (optionally followed by a cross-reference
/// line and/or an empty paragraph marker) that immediately precedes a verse
/// marker is reattached to the following verse: the pending segment is
/// flushed early so the heading sequence accumulates into the next key. The
/// same applies to a bare empty paragraph marker directly before a verse
/// marker. At most one early flush can be open at a time; a second
/// qualifying pattern before the next verse marker merges into the already
/// open segment.
pub fn segment_into(book: &str, lines: &[ParsedLine], cache: &mut VerseCache) {
    let mut chapter: u32 = 0;
    let mut verse: u32 = 0;
    let mut buffer = String::new();
    let mut started_early = false;

    for (i, line) in lines.iter().enumerate() {
        let kind = line.kind();

        if kind == Some(MarkerKind::Chapter) {
            if let Some(n) = leading_number(&line.payload) {
                flush(cache, book, chapter, verse, &mut buffer);
                chapter = n;
                verse = 0;
                started_early = false;
                buffer.push_str(&line.raw);
                continue;
            }
            // Unparseable chapter numeral: counters stay put, keep the line.
            buffer.push_str(&line.raw);
            continue;
        }

        if kind == Some(MarkerKind::Verse) {
            if let Some(n) = leading_number(&line.payload) {
                if !buffer.is_empty() && !started_early {
                    flush(cache, book, chapter, verse, &mut buffer);
                }
                verse = n;
                started_early = false;
                buffer.push_str(&line.raw);
                continue;
            }
            buffer.push_str(&line.raw);
            continue;
        }

        // Before the first chapter marker, each marker line is book-level
        // metadata and starts its own segment; continuation lines below it
        // stay in that segment rather than conflicting with it.
        if chapter == 0 && line.marker.is_some() {
            flush(cache, book, chapter, verse, &mut buffer);
            verse += 1;
            buffer.push_str(&line.raw);
            continue;
        }

        if kind == Some(MarkerKind::Heading) && verse_follows_heading(lines, i) {
            if !started_early {
                flush(cache, book, chapter, verse, &mut buffer);
                started_early = true;
                debug!(chapter, verse, "heading reattached to following verse");
            }
            buffer.push_str(&line.raw);
            continue;
        }

        if line.is_empty_paragraph() && next_is_verse(lines, i + 1) {
            if !started_early {
                flush(cache, book, chapter, verse, &mut buffer);
                started_early = true;
            }
            buffer.push_str(&line.raw);
            continue;
        }

        buffer.push_str(&line.raw);
    }

    flush(cache, book, chapter, verse, &mut buffer);
}

fn flush(cache: &mut VerseCache, book: &str, chapter: u32, verse: u32, buffer: &mut String) {
    if buffer.is_empty() {
        return;
    }
    cache.put(VerseKey::new(book, chapter, verse), std::mem::take(buffer));
}

/// Look ahead (at most 3 lines) for `{[cross-reference,] [empty paragraph,]
/// verse-marker}` after the heading at `i`.
fn verse_follows_heading(lines: &[ParsedLine], i: usize) -> bool {
    let mut j = i + 1;
    if matches!(lines.get(j).and_then(|l| l.kind()), Some(MarkerKind::CrossReference)) {
        j += 1;
    }
    if lines.get(j).is_some_and(|l| l.is_empty_paragraph()) {
        j += 1;
    }
    j <= i + 3 && next_is_verse(lines, j)
}

fn next_is_verse(lines: &[ParsedLine], j: usize) -> bool {
    matches!(lines.get(j).and_then(|l| l.kind()), Some(MarkerKind::Verse))
}
