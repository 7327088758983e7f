//! Per-document span preprocessing: validation, type filtering and
//! deduplication.
//!
//! All steps preserve the order in which spans were read and never fail;
//! rejected spans are logged and counted.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::{OffsetUnit, Span, TextIndex};

/// Drop spans whose recorded text differs from the document text at their offsets
pub fn validate_spans(doc_id: &str, index: &TextIndex<'_>, spans: Vec<Span>) -> Vec<Span> {
    spans
        .into_iter()
        .filter(|span| match index.slice(span.start, span.end) {
            Some(bytes) if bytes == span.text.as_slice() => true,
            Some(bytes) => {
                warn!(
                    doc_id,
                    start = span.start,
                    end = span.end,
                    "text mismatch in {}: \"{}\" vs \"{}\"",
                    doc_id,
                    String::from_utf8_lossy(bytes),
                    span.display_text()
                );
                false
            }
            None => {
                warn!(
                    doc_id,
                    start = span.start,
                    end = span.end,
                    text_len = index.len(),
                    "span \"{}\" in {} lies outside the document text",
                    span.display_text(),
                    doc_id
                );
                false
            }
        })
        .collect()
}

/// Optional case-insensitive allow-list of span types
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    allowed: Option<HashSet<String>>,
}

impl TypeFilter {
    /// A filter that keeps every span
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// A filter that keeps spans whose lower-cased type is among `types`
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: Some(types.into_iter().map(|t| t.as_ref().to_lowercase()).collect()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn allows(&self, span_type: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.contains(&span_type.to_lowercase()),
        }
    }

    pub fn apply(&self, spans: Vec<Span>) -> Vec<Span> {
        if !self.is_active() {
            return spans;
        }
        spans.into_iter().filter(|s| self.allows(&s.span_type)).collect()
    }
}

/// Merge spans sharing `(start, end, type)` into their first occurrence.
///
/// Output order is the first-appearance order of the kept spans; later
/// duplicates contribute their serials.
pub fn deduplicate_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut first_seen: HashMap<(usize, usize, String), usize> = HashMap::new();
    let mut deduped: Vec<Span> = Vec::with_capacity(spans.len());

    for span in spans {
        let key = (span.start, span.end, span.span_type.clone());
        match first_seen.get(&key) {
            Some(&i) => {
                let kept = std::mem::take(&mut deduped[i]);
                deduped[i] = kept.merge(span);
            }
            None => {
                first_seen.insert(key, deduped.len());
                deduped.push(span);
            }
        }
    }

    deduped
}

/// Spans of one source for one document after preprocessing
#[derive(Debug, Clone, Default)]
pub struct PreparedSpans {
    pub spans: Vec<Span>,
    /// Dropped because their text did not match the document
    pub mismatched: usize,
    /// Dropped by the type filter
    pub filtered: usize,
    /// Merged into an earlier identical span
    pub merged: usize,
}

/// Validation, filtering and deduplication with run-wide settings
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    pub unit: OffsetUnit,
    pub filter: TypeFilter,
}

impl Preprocessor {
    pub fn new(unit: OffsetUnit, filter: TypeFilter) -> Self {
        Self { unit, filter }
    }

    pub fn prepare(&self, doc_id: &str, index: &TextIndex<'_>, spans: Vec<Span>) -> PreparedSpans {
        let read = spans.len();
        let validated = validate_spans(doc_id, index, spans);
        let valid = validated.len();
        let filtered = self.filter.apply(validated);
        let kept = filtered.len();
        let spans = deduplicate_spans(filtered);

        PreparedSpans {
            mismatched: read - valid,
            filtered: valid - kept,
            merged: kept - spans.len(),
            spans,
        }
    }
}
