use serde::{Deserialize, Serialize};

/// Escape token that introduces a marker keyword at the start of a line.
pub const ESCAPE: char = '\\';

/// Structural role of a marker keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    Chapter,
    Verse,
    Heading,
    CrossReference,
    Paragraph,
    Other,
}

/// Classify a marker keyword (without its escape token).
pub fn classify(keyword: &str) -> MarkerKind {
    match keyword {
        "c" => MarkerKind::Chapter,
        "v" => MarkerKind::Verse,
        "s" | "s1" | "s2" | "s3" | "ms" | "ms1" => MarkerKind::Heading,
        "r" => MarkerKind::CrossReference,
        "p" | "m" | "b" | "q" | "q1" | "q2" | "nb" => MarkerKind::Paragraph,
        _ => MarkerKind::Other,
    }
}

/// One line of the document, classified.
///
/// `raw` keeps the line verbatim, including its line terminator, so segments
/// assembled from parsed lines reconstruct the source byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub raw: String,
    pub marker: Option<String>,
    pub payload: String,
}

impl ParsedLine {
    pub fn kind(&self) -> Option<MarkerKind> {
        self.marker.as_deref().map(classify)
    }

    /// A paragraph-class marker line carrying no payload text.
    pub fn is_empty_paragraph(&self) -> bool {
        self.kind() == Some(MarkerKind::Paragraph) && self.payload.trim().is_empty()
    }
}

/// Split a document into parsed lines.
///
/// The result is a random-access vector: the segmenter looks ahead a few
/// lines to spot heading/verse patterns, so a single-pass stream is not
/// enough. Concatenating every `raw` field reproduces the input exactly.
pub fn parse_document(text: &str) -> Vec<ParsedLine> {
    text.split_inclusive('\n').map(parse_line).collect()
}

fn parse_line(raw: &str) -> ParsedLine {
    let content = raw.trim_end_matches(['\n', '\r']);

    if !content.starts_with(ESCAPE) {
        return ParsedLine {
            raw: raw.to_string(),
            marker: None,
            payload: String::new(),
        };
    }

    let body = &content[ESCAPE.len_utf8()..];
    let (keyword, payload) = match body.find(' ') {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (body, ""),
    };

    // A lone escape token is not a marker line.
    if keyword.is_empty() {
        return ParsedLine {
            raw: raw.to_string(),
            marker: None,
            payload: String::new(),
        };
    }

    ParsedLine {
        raw: raw.to_string(),
        marker: Some(keyword.to_string()),
        payload: payload.to_string(),
    }
}

/// Parse the leading digit run of a chapter/verse payload.
///
/// Versification suffixes are tolerated: `"12b"` parses as 12. A payload
/// with no leading digits yields `None`, and callers leave their running
/// counters unchanged.
pub fn leading_number(payload: &str) -> Option<u32> {
    let digits: String = payload.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_marker_line() {
        let line = parse_line("\\v 12 In the beginning\n");
        assert_eq!(line.marker.as_deref(), Some("v"));
        assert_eq!(line.payload, "12 In the beginning");
        assert_eq!(line.kind(), Some(MarkerKind::Verse));
    }

    #[test]
    fn test_parse_continuation_line() {
        let line = parse_line("and the earth was without form\n");
        assert_eq!(line.marker, None);
        assert_eq!(line.payload, "");
        assert_eq!(line.kind(), None);
    }

    #[test]
    fn test_bare_marker_has_empty_payload() {
        let line = parse_line("\\p\n");
        assert_eq!(line.marker.as_deref(), Some("p"));
        assert_eq!(line.payload, "");
        assert!(line.is_empty_paragraph());
    }

    #[test]
    fn test_paragraph_with_text_is_not_empty() {
        let line = parse_line("\\p continued text\n");
        assert!(!line.is_empty_paragraph());
    }

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("c"), MarkerKind::Chapter);
        assert_eq!(classify("s1"), MarkerKind::Heading);
        assert_eq!(classify("r"), MarkerKind::CrossReference);
        assert_eq!(classify("q2"), MarkerKind::Paragraph);
        assert_eq!(classify("mt"), MarkerKind::Other);
        assert_eq!(classify("id"), MarkerKind::Other);
    }

    #[test]
    fn test_round_trip_raw_lines() {
        let text = "\\id GEN\n\\c 1\n\\p\n\\v 1 First verse\nwrapped line\n\\v 2 Second";
        let lines = parse_document(text);
        let rebuilt: String = lines.iter().map(|l| l.raw.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_crlf_preserved() {
        let text = "\\c 1\r\n\\v 1 Text\r\n";
        let lines = parse_document(text);
        assert_eq!(lines[0].marker.as_deref(), Some("c"));
        assert_eq!(lines[0].payload, "1");
        let rebuilt: String = lines.iter().map(|l| l.raw.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("12 text"), Some(12));
        assert_eq!(leading_number("12b text"), Some(12));
        assert_eq!(leading_number("text"), None);
        assert_eq!(leading_number(""), None);
    }
}
