//! Pairwise agreement statistics.
//!
//! Counters are kept per [`Direction`]: for `(gold, predicted)` a span of the
//! gold source with no counterpart is a false negative, a span of the
//! predicted source with no counterpart is a false positive.
//!
//! Statistics for one document are built locally by the matcher and folded
//! into the run-wide aggregate with [`Stats::merge`]. Long runs bound memory
//! with [`Stats::trim`], which drops rare texts from the frequency tables.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::domain::Direction;

/// Text frequency counts that remember first-insertion order.
///
/// Ties in [`FrequencyTable::most_common`] are broken by insertion order,
/// which keeps reports deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `key`
    pub fn add(&mut self, key: &str, count: u64) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += count,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), count));
            }
        }
    }

    /// Count for `key` (0 if absent)
    pub fn get(&self, key: &str) -> u64 {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest count in the table
    pub fn max_count(&self) -> Option<u64> {
        self.entries.iter().map(|(_, v)| *v).max()
    }

    /// Top `n` entries by count, ties in insertion order
    pub fn most_common(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Add every entry of `other` into this table
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (key, count) in other.iter() {
            self.add(key, count);
        }
    }

    /// Keep entries for which `keep(count)` holds; returns the number removed
    fn retain_counts(&mut self, keep: impl Fn(u64) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, v)| keep(*v));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.index = self
                .entries
                .iter()
                .enumerate()
                .map(|(i, (k, _))| (k.clone(), i))
                .collect();
        }
        removed
    }
}

/// The four frequency tables kept per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Matched,
    FalsePositive,
    FalseNegative,
    Overlap,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Matched,
        TableKind::FalsePositive,
        TableKind::FalseNegative,
        TableKind::Overlap,
    ];

    /// Label used in the results report
    pub fn label(&self) -> &'static str {
        match self {
            TableKind::Matched => "TP",
            TableKind::FalsePositive => "FP",
            TableKind::FalseNegative => "FN",
            TableKind::Overlap => "OVERLAP",
        }
    }
}

/// Precision, recall and F1 for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Counters and text tables for one direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub matched: FrequencyTable,
    pub false_positive_texts: FrequencyTable,
    pub false_negative_texts: FrequencyTable,
    pub overlaps: FrequencyTable,
}

impl PairCounts {
    pub fn table(&self, kind: TableKind) -> &FrequencyTable {
        match kind {
            TableKind::Matched => &self.matched,
            TableKind::FalsePositive => &self.false_positive_texts,
            TableKind::FalseNegative => &self.false_negative_texts,
            TableKind::Overlap => &self.overlaps,
        }
    }

    fn tables_mut(&mut self) -> [&mut FrequencyTable; 4] {
        [
            &mut self.matched,
            &mut self.false_positive_texts,
            &mut self.false_negative_texts,
            &mut self.overlaps,
        ]
    }

    /// TP + FP + FN
    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.false_negatives
    }

    /// Undefined ratios are reported as zero
    pub fn metrics(&self) -> Metrics {
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        );
        let recall = ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        );
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Metrics {
            precision,
            recall,
            f1,
        }
    }

    fn merge(&mut self, other: &PairCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.matched.merge(&other.matched);
        self.false_positive_texts.merge(&other.false_positive_texts);
        self.false_negative_texts.merge(&other.false_negative_texts);
        self.overlaps.merge(&other.overlaps);
    }
}

/// Outcome of a [`Stats::trim`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    /// Entries removed
    pub trimmed: usize,
    /// Entries examined
    pub total: usize,
}

/// Agreement statistics for a set of sources, keyed by direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    directions: BTreeMap<Direction, PairCounts>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics with both directions of `(first, second)` present and zeroed
    pub fn for_pair(first: &str, second: &str) -> Self {
        let forward = Direction::new(first, second);
        let backward = forward.reversed();
        let mut stats = Self::new();
        stats.directions.insert(forward, PairCounts::default());
        stats.directions.insert(backward, PairCounts::default());
        stats
    }

    fn entry(&mut self, direction: &Direction) -> &mut PairCounts {
        self.directions.entry(direction.clone()).or_default()
    }

    pub fn add_true_positive(&mut self, direction: &Direction, text: &str) {
        let counts = self.entry(direction);
        counts.true_positives += 1;
        counts.matched.add(text, 1);
    }

    pub fn add_false_positive(&mut self, direction: &Direction, text: &str) {
        let counts = self.entry(direction);
        counts.false_positives += 1;
        counts.false_positive_texts.add(text, 1);
    }

    pub fn add_false_negative(&mut self, direction: &Direction, text: &str) {
        let counts = self.entry(direction);
        counts.false_negatives += 1;
        counts.false_negative_texts.add(text, 1);
    }

    /// Record an overlap that did not count as a match; keyed by `"gold\tpredicted"` text
    pub fn add_overlap(&mut self, direction: &Direction, gold_text: &str, predicted_text: &str) {
        let key = format!("{}\t{}", gold_text, predicted_text);
        self.entry(direction).overlaps.add(&key, 1);
    }

    /// Add every counter of `other` into this aggregate
    pub fn merge(&mut self, other: &Stats) {
        for (direction, counts) in &other.directions {
            self.entry(direction).merge(counts);
        }
    }

    /// Directions present, in sorted order
    pub fn directions(&self) -> impl Iterator<Item = &Direction> {
        self.directions.keys()
    }

    pub fn counts(&self, direction: &Direction) -> Option<&PairCounts> {
        self.directions.get(direction)
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn true_positives(&self, direction: &Direction) -> u64 {
        self.counts(direction).map_or(0, |c| c.true_positives)
    }

    pub fn false_positives(&self, direction: &Direction) -> u64 {
        self.counts(direction).map_or(0, |c| c.false_positives)
    }

    pub fn false_negatives(&self, direction: &Direction) -> u64 {
        self.counts(direction).map_or(0, |c| c.false_negatives)
    }

    pub fn total(&self, direction: &Direction) -> u64 {
        self.counts(direction).map_or(0, PairCounts::total)
    }

    pub fn metrics(&self, direction: &Direction) -> Metrics {
        self.counts(direction)
            .map(PairCounts::metrics)
            .unwrap_or_default()
    }

    pub fn precision(&self, direction: &Direction) -> f64 {
        self.metrics(direction).precision
    }

    pub fn recall(&self, direction: &Direction) -> f64 {
        self.metrics(direction).recall
    }

    pub fn f1(&self, direction: &Direction) -> f64 {
        self.metrics(direction).f1
    }

    /// Distinct texts across the matched, FP and FN tables, in first-seen order
    pub fn unique_texts(&self, direction: &Direction) -> Vec<&str> {
        let Some(counts) = self.counts(direction) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        counts
            .matched
            .keys()
            .chain(counts.false_positive_texts.keys())
            .chain(counts.false_negative_texts.keys())
            .filter(|text| seen.insert(*text))
            .collect()
    }

    /// Top `n` entries of one table for a direction
    pub fn most_common(&self, direction: &Direction, kind: TableKind, n: usize) -> Vec<(&str, u64)> {
        self.counts(direction)
            .map(|c| c.table(kind).most_common(n))
            .unwrap_or_default()
    }

    /// Drop rare texts to bound memory.
    ///
    /// In every table, entries with `count * ratio < max_count` are removed.
    /// Scalar counters are untouched. Lossy: trimmed counts cannot be
    /// recovered by later merges.
    pub fn trim(&mut self, ratio: u64) -> TrimReport {
        let mut report = TrimReport::default();
        for counts in self.directions.values_mut() {
            for table in counts.tables_mut() {
                let Some(max_count) = table.max_count() else {
                    continue;
                };
                report.total += table.len();
                report.trimmed += table.retain_counts(|v| v.saturating_mul(ratio) >= max_count);
            }
        }

        let share = if report.total == 0 {
            0.0
        } else {
            100.0 * report.trimmed as f64 / report.total as f64
        };
        info!(
            trimmed = report.trimmed,
            total = report.total,
            "trimmed {}/{} ({:.1}%)",
            report.trimmed,
            report.total,
            share
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab() -> Direction {
        Direction::new("a", "b")
    }

    #[test]
    fn test_most_common_ties_keep_insertion_order() {
        let mut table = FrequencyTable::new();
        table.add("zebra", 1);
        table.add("apple", 2);
        table.add("mango", 1);
        table.add("zebra", 1);

        assert_eq!(
            table.most_common(10),
            vec![("zebra", 2), ("apple", 2), ("mango", 1)]
        );
        assert_eq!(table.most_common(1), vec![("zebra", 2)]);
    }

    #[test]
    fn test_metrics_zero_when_undefined() {
        let stats = Stats::for_pair("a", "b");
        assert_eq!(stats.metrics(&ab()), Metrics::default());
        assert_eq!(stats.metrics(&Direction::new("x", "y")), Metrics::default());
    }

    #[test]
    fn test_metrics_values() {
        let mut stats = Stats::new();
        for _ in 0..3 {
            stats.add_true_positive(&ab(), "cat");
        }
        stats.add_false_positive(&ab(), "dog");
        stats.add_false_negative(&ab(), "eel");
        stats.add_false_negative(&ab(), "eel");
        stats.add_false_negative(&ab(), "eel");

        assert_eq!(stats.total(&ab()), 7);
        assert!((stats.precision(&ab()) - 0.75).abs() < 1e-12);
        assert!((stats.recall(&ab()) - 0.5).abs() < 1e-12);
        assert!((stats.f1(&ab()) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_merge_adds_counters_and_tables() {
        let mut global = Stats::new();
        let mut local = Stats::for_pair("a", "b");
        local.add_true_positive(&ab(), "cat");
        local.add_overlap(&ab(), "cat", "cats");

        global.merge(&local);
        global.merge(&local);

        assert_eq!(global.true_positives(&ab()), 2);
        let counts = global.counts(&ab()).unwrap();
        assert_eq!(counts.matched.get("cat"), 2);
        assert_eq!(counts.overlaps.get("cat\tcats"), 2);
        assert_eq!(global.directions().count(), 2);
    }

    #[test]
    fn test_unique_texts_spans_tables() {
        let mut stats = Stats::new();
        stats.add_true_positive(&ab(), "cat");
        stats.add_false_positive(&ab(), "dog");
        stats.add_false_negative(&ab(), "cat");
        stats.add_overlap(&ab(), "eel", "eels");

        assert_eq!(stats.unique_texts(&ab()), vec!["cat", "dog"]);
    }

    #[test]
    fn test_trim_drops_long_tail() {
        let mut stats = Stats::new();
        for _ in 0..100 {
            stats.add_true_positive(&ab(), "common");
        }
        for _ in 0..10 {
            stats.add_true_positive(&ab(), "medium");
        }
        stats.add_true_positive(&ab(), "rare");
        stats.add_false_positive(&ab(), "alone");

        let report = stats.trim(10);
        assert_eq!(report, TrimReport { trimmed: 1, total: 4 });

        let counts = stats.counts(&ab()).unwrap();
        assert_eq!(counts.matched.get("rare"), 0);
        assert_eq!(counts.matched.get("medium"), 10);
        assert_eq!(counts.false_positive_texts.get("alone"), 1);
        // scalar counters are not affected
        assert_eq!(stats.true_positives(&ab()), 111);
    }

    #[test]
    fn test_trim_with_decreasing_ratios() {
        let ba = Direction::new("b", "a");
        let mut stats = Stats::new();
        for i in 1..=60u64 {
            let text = format!("t{}", i);
            let repeat = (i * i) % 97 + 1;
            for _ in 0..repeat {
                stats.add_true_positive(&ab(), &text);
                stats.add_false_positive(&ab(), &text);
                stats.add_overlap(&ba, &text, "x");
            }
            for _ in 0..(i % 7 + 1) {
                stats.add_false_negative(&ab(), &text);
                stats.add_false_negative(&ba, &text);
            }
        }

        let sizes = |stats: &Stats| -> Vec<usize> {
            stats
                .directions()
                .flat_map(|d| {
                    let counts = stats.counts(d).unwrap();
                    TableKind::ALL.map(|kind| counts.table(kind).len())
                })
                .collect()
        };

        let mut previous = sizes(&stats);
        for ratio in [1000, 50, 20, 7, 3, 2, 1] {
            stats.trim(ratio);

            for direction in stats.directions() {
                let counts = stats.counts(direction).unwrap();
                for kind in TableKind::ALL {
                    let table = counts.table(kind);
                    let Some(max) = table.max_count() else {
                        continue;
                    };
                    for (text, count) in table.iter() {
                        assert!(
                            count * ratio >= max,
                            "{} {} {}: {} * {} < {}",
                            direction,
                            kind.label(),
                            text,
                            count,
                            ratio,
                            max
                        );
                    }
                }
            }

            let current = sizes(&stats);
            assert_eq!(current.len(), previous.len());
            assert!(current.iter().zip(&previous).all(|(now, before)| now <= before));
            previous = current;
        }

        // ratio 1 keeps only the entries tied with the maximum
        let counts = stats.counts(&ab()).unwrap();
        assert!(counts.matched.iter().all(|(_, count)| count == 97));
        assert!(counts.false_negative_texts.iter().all(|(_, count)| count == 7));
    }

    #[test]
    fn test_trim_on_empty_stats() {
        let mut stats = Stats::for_pair("a", "b");
        assert_eq!(stats.trim(10_000), TrimReport::default());
    }
}
