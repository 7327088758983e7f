//! Tagged spans and the predicates used to compare them.
//!
//! Offsets are inclusive on both ends: a span covering `"cat"` at the start
//! of a document has `start == 0` and `end == 2`.

use std::borrow::Cow;
use std::cmp::Ordering;

/// A tagged interval of a document's text, as reported by one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    /// Identifier of the document this span belongs to
    pub doc_id: String,

    /// Paragraph number column (carried through to exports)
    pub paragraph: String,

    /// Sentence number column (carried through to exports)
    pub sentence: String,

    /// First offset covered by the span
    pub start: usize,

    /// Last offset covered by the span (inclusive)
    pub end: usize,

    /// Literal text the source claims occupies `[start, end]`, as raw bytes
    pub text: Vec<u8>,

    /// Type label, compared case-insensitively
    pub span_type: String,

    /// Name of the source that produced this span
    pub source: String,

    /// External identifiers, accumulated across duplicate detections
    pub serials: Vec<String>,
}

impl Span {
    /// Create a span with empty paragraph/sentence columns and no serials
    pub fn new(
        doc_id: impl Into<String>,
        start: usize,
        end: usize,
        text: impl Into<Vec<u8>>,
        span_type: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            start,
            end,
            text: text.into(),
            span_type: span_type.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Add a serial identifier
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serials.push(serial.into());
        self
    }

    /// Text for reports and logs; bytes that are not UTF-8 become U+FFFD
    pub fn display_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// True iff both spans cover exactly the same offsets
    pub fn span_matches(&self, other: &Span) -> bool {
        self.start == other.start && self.end == other.end
    }

    /// True iff the type labels are equal ignoring case
    pub fn type_matches(&self, other: &Span) -> bool {
        self.span_type
            .chars()
            .flat_map(char::to_lowercase)
            .eq(other.span_type.chars().flat_map(char::to_lowercase))
    }

    /// Same offsets and same type
    pub fn exact_match(&self, other: &Span) -> bool {
        self.span_matches(other) && self.type_matches(other)
    }

    /// True iff the closed intervals intersect; adjacent spans do not overlap
    pub fn overlaps(&self, other: &Span) -> bool {
        !(self.end < other.start || other.end < self.start)
    }

    /// Intersecting offsets and same type
    pub fn overlap_match(&self, other: &Span) -> bool {
        self.overlaps(other) && self.type_matches(other)
    }

    /// Positional order: start ascending, end descending, then type.
    ///
    /// The type comparison is only a fixed tie-break.
    pub fn cmp_position(&self, other: &Span) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| other.end.cmp(&self.end))
            .then_with(|| self.span_type.cmp(&other.span_type))
    }

    /// Key under which duplicate detections are merged
    pub fn dedup_key(&self) -> (usize, usize, &str) {
        (self.start, self.end, &self.span_type)
    }

    /// Combine a duplicate detection into this span.
    ///
    /// The result keeps this span's fields and appends the other's serials.
    pub fn merge(mut self, other: Span) -> Span {
        self.serials.extend(other.serials);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, span_type: &str) -> Span {
        Span::new("doc", start, end, "x", span_type, "a")
    }

    #[test]
    fn test_exact_match_requires_offsets_and_type() {
        assert!(span(0, 2, "Animal").exact_match(&span(0, 2, "animal")));
        assert!(!span(0, 2, "Animal").exact_match(&span(0, 3, "Animal")));
        assert!(!span(0, 2, "Animal").exact_match(&span(0, 2, "Plant")));
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        assert!(!span(0, 4, "T").overlaps(&span(5, 9, "T")));
        assert!(!span(5, 9, "T").overlaps(&span(0, 4, "T")));
        assert!(span(0, 5, "T").overlaps(&span(5, 9, "T")));
        assert!(span(3, 3, "T").overlaps(&span(0, 9, "T")));
    }

    #[test]
    fn test_overlap_match_needs_type() {
        assert!(span(0, 5, "Animal").overlap_match(&span(0, 2, "ANIMAL")));
        assert!(!span(0, 5, "Animal").overlap_match(&span(0, 2, "Plant")));
    }

    #[test]
    fn test_position_ordering() {
        let mut spans = vec![span(4, 6, "A"), span(0, 2, "B"), span(0, 5, "B"), span(0, 5, "A")];
        spans.sort_by(|a, b| a.cmp_position(b));

        let keys: Vec<_> = spans.iter().map(|s| s.dedup_key()).collect();
        assert_eq!(keys, vec![(0, 5, "A"), (0, 5, "B"), (0, 2, "B"), (4, 6, "A")]);
    }

    #[test]
    fn test_merge_appends_serials() {
        let first = span(0, 2, "A").with_serial("s1");
        let second = span(0, 2, "A").with_serial("s2").with_serial("s3");

        let merged = first.merge(second);
        assert_eq!(merged.serials, vec!["s1", "s2", "s3"]);
        assert_eq!(merged.dedup_key(), (0, 2, "A"));
    }
}
