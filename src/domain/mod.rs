//! Domain types for span comparison.
//!
//! This module contains the core data structures:
//! - Document: Corpus records and offset-unit aware text indexing
//! - Span: Tagged intervals and their comparison predicates
//! - Direction: Ordered (gold, predicted) source pairs

pub mod document;
pub mod pair;
pub mod span;

// Re-export commonly used types
pub use document::{Document, OffsetUnit, TextIndex};
pub use pair::{source_pairs, Direction};
pub use span::Span;
