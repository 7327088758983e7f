//! Core comparison logic.
//!
//! This module contains:
//! - Matcher: sweep-line span matching for one document and source pair
//! - Stats: pairwise counters, frequency tables, merge and trim
//! - Preprocess: validation, type filtering and deduplication
//! - Selection/Sampler: which documents go to the export
//! - Report: text report and JSON summary
//! - Comparison: the per-document driver with checkpoints
//! - Check: span file consistency check

pub mod check;
pub mod comparison;
pub mod matcher;
pub mod preprocess;
pub mod report;
pub mod sampler;
pub mod selection;
pub mod stats;

// Re-export commonly used types
pub use check::{check_spans, CheckReport};
pub use comparison::{Comparison, ComparisonOptions, DocumentOutcome, RunSummary};
pub use matcher::compare_document_spans;
pub use preprocess::{deduplicate_spans, validate_spans, Preprocessor, TypeFilter};
pub use report::{render_report, render_summary, ReportWriter, DEFAULT_TOP_N};
pub use sampler::ExportSampler;
pub use selection::{Exclusion, Selection, SelectionPolicy};
pub use stats::{FrequencyTable, Metrics, PairCounts, Stats, TableKind, TrimReport};
