//! Selection of documents worth exporting for manual review.
//!
//! A document is interesting when it has enough annotations, some variety in
//! the annotated texts, and partial (neither perfect nor poor) agreement
//! between sources.

use serde::{Deserialize, Serialize};

use super::stats::Stats;

/// Thresholds for [`SelectionPolicy::evaluate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Minimum TP + FP + FN
    pub min_annotations: u64,

    /// Minimum number of distinct lower-cased texts
    pub min_unique_texts: usize,

    /// Minimum annotations per 100 offset units of text
    pub min_density: f64,

    /// Documents with F1 at or above this agree too well to be interesting
    pub max_f1: f64,

    /// Documents with F1 at or below this agree too little to be useful examples
    pub min_f1: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            min_annotations: 1,
            min_unique_texts: 2,
            min_density: 1.0,
            max_f1: 1.0,
            min_f1: 0.5,
        }
    }
}

/// Why a document was not selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    NoStatistics,
    TooFewAnnotations,
    TooFewUniqueTexts,
    LowDensity,
    PerfectAgreement,
    LowAgreement,
}

impl Exclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exclusion::NoStatistics => "no_statistics",
            Exclusion::TooFewAnnotations => "too_few_annotations",
            Exclusion::TooFewUniqueTexts => "too_few_unique_texts",
            Exclusion::LowDensity => "low_density",
            Exclusion::PerfectAgreement => "perfect_agreement",
            Exclusion::LowAgreement => "low_agreement",
        }
    }
}

/// Verdict for one document and one compared pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected,
    Excluded(Exclusion),
}

impl Selection {
    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected)
    }
}

impl SelectionPolicy {
    /// Judge one document from the statistics of one compared pair.
    ///
    /// Only the first direction in sorted order is considered; with more than
    /// two sources this is an arbitrary but fixed choice.
    pub fn evaluate(&self, doc_stats: &Stats, text_len: usize) -> Selection {
        let Some(direction) = doc_stats.directions().next() else {
            return Selection::Excluded(Exclusion::NoStatistics);
        };

        let total = doc_stats.total(direction);
        if total < self.min_annotations {
            return Selection::Excluded(Exclusion::TooFewAnnotations);
        }

        let mut unique: Vec<String> = doc_stats
            .unique_texts(direction)
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() < self.min_unique_texts {
            return Selection::Excluded(Exclusion::TooFewUniqueTexts);
        }

        if text_len == 0 || 100.0 * total as f64 / (text_len as f64) < self.min_density {
            return Selection::Excluded(Exclusion::LowDensity);
        }

        let f1 = doc_stats.f1(direction);
        if f1 >= self.max_f1 {
            return Selection::Excluded(Exclusion::PerfectAgreement);
        }
        if f1 <= self.min_f1 {
            return Selection::Excluded(Exclusion::LowAgreement);
        }

        Selection::Selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;

    fn stats(tp: &[&str], fp: &[&str], fn_: &[&str]) -> Stats {
        let ab = Direction::new("a", "b");
        let mut stats = Stats::for_pair("a", "b");
        for t in tp {
            stats.add_true_positive(&ab, t);
        }
        for t in fp {
            stats.add_false_positive(&ab, t);
        }
        for t in fn_ {
            stats.add_false_negative(&ab, t);
        }
        stats
    }

    #[test]
    fn test_selects_partial_agreement() {
        // P = 2/3, R = 1, F1 = 0.8
        let doc = stats(&["cat", "dog"], &["eel"], &[]);
        assert_eq!(SelectionPolicy::default().evaluate(&doc, 100), Selection::Selected);
    }

    #[test]
    fn test_exclusions() {
        let policy = SelectionPolicy::default();

        assert_eq!(
            policy.evaluate(&Stats::new(), 100),
            Selection::Excluded(Exclusion::NoStatistics)
        );
        assert_eq!(
            policy.evaluate(&stats(&[], &[], &[]), 100),
            Selection::Excluded(Exclusion::TooFewAnnotations)
        );
        assert_eq!(
            policy.evaluate(&stats(&["Cat"], &["cat"], &[]), 100),
            Selection::Excluded(Exclusion::TooFewUniqueTexts)
        );
        assert_eq!(
            policy.evaluate(&stats(&["cat", "dog"], &["eel"], &[]), 301),
            Selection::Excluded(Exclusion::LowDensity)
        );
        assert_eq!(
            policy.evaluate(&stats(&["cat", "dog"], &[], &[]), 100),
            Selection::Excluded(Exclusion::PerfectAgreement)
        );
        assert_eq!(
            policy.evaluate(&stats(&["cat"], &["dog"], &["eel"]), 100),
            Selection::Excluded(Exclusion::LowAgreement)
        );
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let policy = SelectionPolicy {
            min_f1: 0.0,
            ..Default::default()
        };
        // F1 = 0.5 passes once the lower bound is relaxed
        assert!(policy
            .evaluate(&stats(&["cat"], &["dog"], &["eel"]), 100)
            .is_selected());
    }
}
