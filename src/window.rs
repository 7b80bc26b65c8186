use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cache::{VerseCache, VerseKey};
use crate::marker;
use crate::sections::SectionMap;
use crate::versification::Versification;

/// Scope of the document shown in the active edit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewGranularity {
    /// The target verse plus its immediate neighbors.
    VerseWithContext,
    Verse,
    Section,
    Chapter,
    Book,
}

impl fmt::Display for ViewGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewGranularity::VerseWithContext => "context",
            ViewGranularity::Verse => "verse",
            ViewGranularity::Section => "section",
            ViewGranularity::Chapter => "chapter",
            ViewGranularity::Book => "book",
        };
        f.write_str(name)
    }
}

impl FromStr for ViewGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "context" => Ok(ViewGranularity::VerseWithContext),
            "verse" => Ok(ViewGranularity::Verse),
            "section" => Ok(ViewGranularity::Section),
            "chapter" => Ok(ViewGranularity::Chapter),
            "book" => Ok(ViewGranularity::Book),
            other => Err(format!("unknown view granularity: {other}")),
        }
    }
}

/// Line/column position relative to the start of the displayed buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorHint {
    pub line: usize,
    pub column: usize,
}

/// Three-way partition of the document around the displayed window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewWindow {
    pub before: String,
    pub displayed: String,
    pub after: String,
    pub cursor: CursorHint,
}

/// Partition the cache into before/displayed/after around `target`.
///
/// Every (chapter, verse) pair in the book's valid range is fetched (absent
/// keys contribute nothing) and classified exactly once, so concatenating
/// the three buffers reconstructs the full book. Missing versification data
/// degrades to empty buffers rather than failing.
pub fn assemble(
    cache: &VerseCache,
    target: &VerseKey,
    granularity: ViewGranularity,
    versification: &Versification,
    sections: &SectionMap,
) -> ViewWindow {
    let book = target.book.as_str();
    let bounds = displayed_bounds(cache, target, granularity, versification, sections);

    // Cursor anchor: the verse the cursor should land in. With the by-verse
    // bridged fallback that is the verse actually shown, not the target.
    let anchor = match (&bounds, granularity) {
        (Some((lo, _)), ViewGranularity::Verse) => lo.clone(),
        _ => target.clone(),
    };

    let mut window = ViewWindow::default();
    let mut displayed_lines = 0usize;
    let mut anchor_offset: Option<usize> = None;
    let mut anchor_segment = String::new();

    let Some(chapters) = versification.chapter_count(book) else {
        return window;
    };

    for c in 0..=chapters {
        let Some(verses) = versification.verse_count(book, c) else {
            continue;
        };
        for v in 0..=verses {
            let key = VerseKey::new(book, c, v);
            let Some(segment) = cache.get(&key) else {
                continue;
            };
            match &bounds {
                Some((lo, hi)) if *lo <= key && key <= *hi => {
                    if key == anchor {
                        anchor_offset = Some(displayed_lines);
                        anchor_segment = segment.to_string();
                    }
                    displayed_lines += segment.matches('\n').count();
                    window.displayed.push_str(segment);
                }
                Some((lo, _)) if key < *lo => window.before.push_str(segment),
                Some(_) => window.after.push_str(segment),
                None => {
                    if key < *target {
                        window.before.push_str(segment);
                    } else {
                        window.after.push_str(segment);
                    }
                }
            }
        }
    }

    window.cursor = cursor_hint(anchor_offset, &anchor_segment);
    window
}

fn displayed_bounds(
    cache: &VerseCache,
    target: &VerseKey,
    granularity: ViewGranularity,
    versification: &Versification,
    sections: &SectionMap,
) -> Option<(VerseKey, VerseKey)> {
    let book = target.book.as_str();
    match granularity {
        ViewGranularity::Book => Some((
            VerseKey::new(book, 0, 0),
            VerseKey::new(book, u32::MAX, u32::MAX),
        )),
        ViewGranularity::Chapter => Some((
            VerseKey::new(book, target.chapter, 0),
            VerseKey::new(book, target.chapter, u32::MAX),
        )),
        ViewGranularity::Section => sections.bounds(target),
        ViewGranularity::Verse => {
            let shown = bridged_verse(cache, target)?;
            Some((shown.clone(), shown))
        }
        ViewGranularity::VerseWithContext => {
            // Narrower window at the chapter's first verses: verse 0 is the
            // chapter's own marker material, not a context verse.
            let lo = if target.verse > 1 {
                target.verse - 1
            } else {
                target.verse
            };
            let hi = target.verse.saturating_add(1);
            Some((
                VerseKey::new(book, target.chapter, lo),
                VerseKey::new(book, target.chapter, hi),
            ))
        }
    }
}

/// The target verse if present, otherwise the nearest lower verse in the
/// same chapter that has a segment (a bridged verse merged into its
/// predecessor).
fn bridged_verse(cache: &VerseCache, target: &VerseKey) -> Option<VerseKey> {
    (0..=target.verse)
        .rev()
        .map(|v| VerseKey::new(target.book.as_str(), target.chapter, v))
        .find(|k| cache.contains(k))
}

/// End of the first line of the anchor segment; if that line is a bare
/// paragraph marker, the end of the second line instead, so the cursor lands
/// in real text. Columns count characters, not bytes.
fn cursor_hint(anchor_offset: Option<usize>, anchor_segment: &str) -> CursorHint {
    let Some(offset) = anchor_offset else {
        return CursorHint::default();
    };
    if anchor_segment.is_empty() {
        return CursorHint {
            line: offset,
            column: 0,
        };
    }

    let lines = marker::parse_document(anchor_segment);
    let (line_idx, raw) = if lines[0].is_empty_paragraph() && lines.len() > 1 {
        (offset + 1, lines[1].raw.as_str())
    } else {
        (offset, lines[0].raw.as_str())
    };
    CursorHint {
        line: line_idx,
        column: raw.trim_end_matches(['\n', '\r']).chars().count(),
    }
}
