//! tagcompare - Pairwise agreement statistics between annotation sources
//!
//! Compares two or more independently produced sets of tagged text spans
//! over a shared document corpus and reports, for every pair of sources,
//! true/false positive and false negative counts, precision, recall, F1 and
//! frequency tables of the matching and mismatching texts.
//!
//! # Architecture
//!
//! Documents and span files are streamed in parallel, one document at a time:
//! - Spans are validated against the document text, filtered and deduplicated
//! - Every pair of sources is matched with a sweep over span boundaries
//! - Per-document statistics are merged into a run-wide aggregate
//! - Documents with partial agreement are sampled into an export
//!
//! # Modules
//!
//! - `adapters`: Record formats, streaming readers, export writer
//! - `core`: Matching, statistics, selection, reporting, the run driver
//! - `domain`: Data structures (Document, Span, Direction)
//! - `config`: Config file discovery and settings resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Compare two taggers
//! tagcompare compare --names gold,pred docs.tsv gold.tsv pred.tsv
//!
//! # Check a tag file against the documents
//! tagcompare check docs.tsv tags.tsv
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{DocumentReader, DocumentSource, Exporter, SpanReader, SpanSource};
pub use config::{ConfigError, Settings};
pub use core::{Comparison, ComparisonOptions, RunSummary, Stats};
pub use domain::{Direction, Document, OffsetUnit, Span};
