//! Sweep-line span matching for one document and one pair of sources.
//!
//! Instead of comparing every span of one source with every span of the
//! other, span boundaries are sorted and swept left to right while a set of
//! currently open spans is maintained. A span is compared only with the
//! spans that are open when it starts, i.e. with the spans it overlaps.
//!
//! Spans close at `end + 1` and closes sort before opens at the same offset,
//! so adjacent spans such as `[0, 4]` and `[5, 9]` are never open together.
//!
//! Spans of the same type that overlap without matching are listed in the
//! overlap table of the `(source1, source2)` direction only, keyed
//! `"text1\ttext2"`. Overlapping spans of different types are not listed.

use tracing::trace;

use super::stats::Stats;
use crate::domain::{Direction, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Close,
    Open,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    offset: usize,
    boundary: Boundary,
    id: usize,
}

/// Set of open span ids with O(1) insertion and swap-remove.
struct OpenSet {
    members: Vec<usize>,
    positions: Vec<Option<usize>>,
}

impl OpenSet {
    fn with_capacity(n: usize) -> Self {
        Self {
            members: Vec::new(),
            positions: vec![None; n],
        }
    }

    fn insert(&mut self, id: usize) {
        self.positions[id] = Some(self.members.len());
        self.members.push(id);
    }

    fn remove(&mut self, id: usize) {
        let Some(pos) = self.positions[id].take() else {
            return;
        };
        self.members.swap_remove(pos);
        if let Some(&moved) = self.members.get(pos) {
            self.positions[moved] = Some(pos);
        }
    }

    fn members(&self) -> &[usize] {
        &self.members
    }
}

/// Compare the spans of two sources over one document.
///
/// Returns local statistics holding both directions of the pair. With
/// `overlap` disabled only exact matches count as true positives; with it
/// enabled overlapping spans of the same type count too. Every span left
/// unmatched is a false negative for its own source and a false positive for
/// the other.
pub fn compare_document_spans(
    doc_id: &str,
    source1: &str,
    source2: &str,
    spans1: &[Span],
    spans2: &[Span],
    overlap: bool,
) -> Stats {
    let forward = Direction::new(source1, source2);
    let backward = forward.reversed();
    let mut stats = Stats::for_pair(source1, source2);

    let n1 = spans1.len();
    let total = n1 + spans2.len();
    let span_of = |id: usize| if id < n1 { &spans1[id] } else { &spans2[id - n1] };

    let mut events = Vec::with_capacity(2 * total);
    for id in 0..total {
        let span = span_of(id);
        events.push(Event {
            offset: span.start,
            boundary: Boundary::Open,
            id,
        });
        events.push(Event {
            offset: span.end.saturating_add(1),
            boundary: Boundary::Close,
            id,
        });
    }
    events.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then(a.boundary.cmp(&b.boundary))
            .then_with(|| span_of(a.id).cmp_position(span_of(b.id)))
            .then(a.id.cmp(&b.id))
    });

    let mut open = OpenSet::with_capacity(total);
    let mut matched = vec![false; total];

    for event in &events {
        match event.boundary {
            Boundary::Open => {
                let x = event.id;
                for &y in open.members() {
                    if (x < n1) == (y < n1) {
                        continue;
                    }
                    let (i1, i2) = if x < n1 { (x, y) } else { (y, x) };
                    let (s1, s2) = (span_of(i1), span_of(i2));

                    if s1.exact_match(s2) || (overlap && s1.overlap_match(s2)) {
                        matched[i1] = true;
                        matched[i2] = true;
                        stats.add_true_positive(&forward, &s1.display_text());
                        stats.add_true_positive(&backward, &s2.display_text());
                    } else if s1.overlap_match(s2) {
                        stats.add_overlap(&forward, &s1.display_text(), &s2.display_text());
                    }
                }
                open.insert(x);
            }
            Boundary::Close => open.remove(event.id),
        }
    }

    for (s1, _) in spans1.iter().zip(&matched[..n1]).filter(|(_, m)| !**m) {
        stats.add_false_positive(&backward, &s1.display_text());
        stats.add_false_negative(&forward, &s1.display_text());
    }
    for (s2, _) in spans2.iter().zip(&matched[n1..]).filter(|(_, m)| !**m) {
        stats.add_false_positive(&forward, &s2.display_text());
        stats.add_false_negative(&backward, &s2.display_text());
    }

    trace!(
        doc_id,
        source1,
        source2,
        true_positives = stats.true_positives(&forward),
        "compared document spans"
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(start: usize, end: usize, text: &str, span_type: &str) -> Span {
        Span::new("doc", start, end, text, span_type, "A")
    }

    fn b(start: usize, end: usize, text: &str, span_type: &str) -> Span {
        Span::new("doc", start, end, text, span_type, "B")
    }

    fn ab() -> Direction {
        Direction::new("A", "B")
    }

    fn ba() -> Direction {
        Direction::new("B", "A")
    }

    #[test]
    fn test_identical_spans_match() {
        let stats = compare_document_spans(
            "doc",
            "A",
            "B",
            &[a(0, 2, "cat", "Animal")],
            &[b(0, 2, "cat", "Animal")],
            false,
        );

        assert_eq!(stats.true_positives(&ab()), 1);
        assert_eq!(stats.false_positives(&ab()), 0);
        assert_eq!(stats.false_negatives(&ab()), 0);
        assert_eq!(stats.precision(&ab()), 1.0);
        assert_eq!(stats.recall(&ab()), 1.0);
        assert_eq!(stats.f1(&ab()), 1.0);
    }

    #[test]
    fn test_missing_span_is_false_negative_and_false_positive() {
        let stats =
            compare_document_spans("doc", "A", "B", &[a(0, 2, "cat", "Animal")], &[], false);

        assert_eq!(stats.false_negatives(&ab()), 1);
        assert_eq!(stats.false_positives(&ba()), 1);
        assert_eq!(stats.true_positives(&ab()), 0);
        assert_eq!(stats.recall(&ab()), 0.0);
        assert_eq!(
            stats.counts(&ab()).unwrap().false_negative_texts.get("cat"),
            1
        );
    }

    #[test]
    fn test_overlap_matching_toggle() {
        let spans1 = [a(0, 5, "catdog", "Animal")];
        let spans2 = [b(0, 2, "cat", "Animal")];

        let exact = compare_document_spans("doc", "A", "B", &spans1, &spans2, false);
        assert_eq!(exact.true_positives(&ab()), 0);
        assert_eq!(exact.false_negatives(&ab()), 1);
        assert_eq!(exact.false_positives(&ab()), 1);
        assert_eq!(
            exact.counts(&ab()).unwrap().overlaps.get("catdog\tcat"),
            1
        );
        assert!(exact.counts(&ba()).unwrap().overlaps.is_empty());

        let loose = compare_document_spans("doc", "A", "B", &spans1, &spans2, true);
        assert_eq!(loose.true_positives(&ab()), 1);
        assert_eq!(loose.true_positives(&ba()), 1);
        assert_eq!(loose.false_negatives(&ab()), 0);
        assert_eq!(loose.false_positives(&ab()), 0);
        assert_eq!(loose.counts(&ab()).unwrap().matched.get("catdog"), 1);
        assert_eq!(loose.counts(&ba()).unwrap().matched.get("cat"), 1);
    }

    #[test]
    fn test_adjacent_spans_never_compared() {
        let stats = compare_document_spans(
            "doc",
            "A",
            "B",
            &[a(0, 4, "abcde", "T")],
            &[b(5, 9, "fghij", "T")],
            true,
        );

        assert_eq!(stats.true_positives(&ab()), 0);
        assert!(stats.counts(&ab()).unwrap().overlaps.is_empty());
        assert_eq!(stats.false_negatives(&ab()), 1);
        assert_eq!(stats.false_positives(&ab()), 1);
    }

    #[test]
    fn test_same_source_spans_not_compared() {
        let stats = compare_document_spans(
            "doc",
            "A",
            "B",
            &[a(0, 5, "catdog", "T"), a(0, 5, "catdog", "T"), a(0, 2, "cat", "T")],
            &[],
            true,
        );

        assert_eq!(stats.true_positives(&ab()), 0);
        assert_eq!(stats.false_negatives(&ab()), 3);
        assert!(stats.counts(&ab()).unwrap().overlaps.is_empty());
    }

    #[test]
    fn test_type_mismatch_is_not_an_overlap() {
        let stats = compare_document_spans(
            "doc",
            "A",
            "B",
            &[a(0, 2, "cat", "Animal")],
            &[b(0, 2, "cat", "Plant")],
            true,
        );

        assert_eq!(stats.true_positives(&ab()), 0);
        assert_eq!(stats.false_negatives(&ab()), 1);
        assert_eq!(stats.false_positives(&ab()), 1);
        assert!(stats.counts(&ab()).unwrap().overlaps.is_empty());
        assert!(stats.counts(&ba()).unwrap().overlaps.is_empty());
    }

    #[test]
    fn test_swapped_sources_mirror_directions() {
        let spans1 = [
            a(0, 2, "cat", "Animal"),
            a(4, 9, "dog eel", "Animal"),
            a(11, 13, "cow", "Animal"),
            a(15, 17, "ant", "Insect"),
        ];
        let spans2 = [
            b(0, 2, "cat", "animal"),
            b(4, 6, "dog", "Animal"),
            b(8, 9, "el", "Animal"),
            b(15, 17, "ant", "Plant"),
            b(19, 21, "bee", "Insect"),
        ];

        for overlap in [false, true] {
            let forward = compare_document_spans("doc", "A", "B", &spans1, &spans2, overlap);
            let swapped = compare_document_spans("doc", "B", "A", &spans2, &spans1, overlap);

            for direction in [ab(), ba()] {
                let f = forward.counts(&direction).unwrap();
                let s = swapped.counts(&direction).unwrap();
                assert_eq!(f.true_positives, s.true_positives);
                assert_eq!(f.false_positives, s.false_positives);
                assert_eq!(f.false_negatives, s.false_negatives);
                assert_eq!(f.matched, s.matched);
                assert_eq!(f.false_positive_texts, s.false_positive_texts);
                assert_eq!(f.false_negative_texts, s.false_negative_texts);
            }
            assert_eq!(
                forward.true_positives(&ab()),
                forward.true_positives(&ba())
            );
        }
    }

    #[test]
    fn test_one_span_matches_several() {
        let stats = compare_document_spans(
            "doc",
            "A",
            "B",
            &[a(0, 10, "cat and dog", "Animal")],
            &[b(0, 2, "cat", "Animal"), b(8, 10, "dog", "Animal")],
            true,
        );

        assert_eq!(stats.true_positives(&ab()), 2);
        assert_eq!(stats.true_positives(&ba()), 2);
        assert_eq!(stats.false_negatives(&ab()), 0);
        assert_eq!(stats.false_positives(&ab()), 0);
    }

    #[test]
    fn test_open_set_swap_remove() {
        let mut open = OpenSet::with_capacity(4);
        open.insert(0);
        open.insert(1);
        open.insert(2);
        open.remove(0);
        assert_eq!(open.members(), &[2, 1]);
        open.remove(1);
        assert_eq!(open.members(), &[2]);
        open.remove(1);
        open.insert(3);
        assert_eq!(open.members(), &[2, 3]);
    }
}
