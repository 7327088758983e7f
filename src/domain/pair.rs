//! Source pairs and comparison directions.

use std::fmt;

use serde::Serialize;

/// An ordered `(gold, predicted)` pair of source names.
///
/// Precision and recall depend on the direction, so both `(a, b)` and
/// `(b, a)` are tracked for every compared pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Direction {
    pub gold: String,
    pub predicted: String,
}

impl Direction {
    pub fn new(gold: impl Into<String>, predicted: impl Into<String>) -> Self {
        Self {
            gold: gold.into(),
            predicted: predicted.into(),
        }
    }

    /// The same pair with roles swapped
    pub fn reversed(&self) -> Self {
        Self {
            gold: self.predicted.clone(),
            predicted: self.gold.clone(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GOLD: {}, PRED: {}", self.gold, self.predicted)
    }
}

/// Index pairs `(i, j)` with `i < j` for every unordered pair of `n` sources
pub fn source_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_order_and_display() {
        let ab = Direction::new("a", "b");
        let ba = ab.reversed();
        assert!(ab < ba);
        assert_eq!(ba.reversed(), ab);
        assert_eq!(ab.to_string(), "GOLD: a, PRED: b");
    }

    #[test]
    fn test_source_pairs() {
        let pairs: Vec<_> = source_pairs(3).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(source_pairs(1).count(), 0);
    }
}
