//! Consistency check of one span file against its documents.

use std::fmt;

use anyhow::Result;
use tokio::io::AsyncBufRead;
use tracing::warn;

use crate::adapters::{DocumentEntry, DocumentSource, SpanReader, SpanSource};
use crate::domain::{OffsetUnit, TextIndex};

/// Outcome of [`check_spans`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Spans compared against document text
    pub spans: usize,
    /// Spans whose text differs from the document (or lies outside it)
    pub mismatches: usize,
    /// Span lines that failed to parse
    pub malformed: usize,
    /// Span lines were left over after the last document
    pub extra_lines: bool,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches == 0 && self.malformed == 0 && !self.extra_lines
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extra_lines {
            writeln!(f, "ERROR: extra lines after the last document")?;
        }
        if self.mismatches > 0 || self.malformed > 0 {
            write!(
                f,
                "Checked {} spans, found {} errors and {} mismatches",
                self.spans, self.malformed, self.mismatches
            )
        } else {
            write!(f, "OK, checked {} spans", self.spans)
        }
    }
}

/// Verify that every span's text is found in its document at its offsets
pub async fn check_spans<D, R>(
    documents: &mut D,
    spans: &mut SpanReader<R>,
    unit: OffsetUnit,
) -> Result<CheckReport>
where
    D: DocumentSource + ?Sized,
    R: AsyncBufRead + Unpin + Send,
{
    let mut report = CheckReport::default();
    let hint = match unit {
        OffsetUnit::Byte => "consider --char-offsets?",
        OffsetUnit::Char => "byte offsets?",
    };

    while let Some(entry) = documents.next_document().await? {
        let doc = match entry {
            DocumentEntry::Document(doc) => doc,
            DocumentEntry::Malformed { id } => {
                spans.document_spans(&id).await?;
                continue;
            }
        };

        let index = TextIndex::new(&doc.text, unit);
        for span in spans.document_spans(&doc.id).await? {
            report.spans += 1;
            match index.slice(span.start, span.end) {
                Some(bytes) if bytes == span.text.as_slice() => {}
                found => {
                    report.mismatches += 1;
                    warn!(
                        doc_id = %doc.id,
                        start = span.start,
                        end = span.end,
                        "text mismatch in {} ({}): \"{}\" vs \"{}\"",
                        doc.id,
                        hint,
                        found.map(String::from_utf8_lossy).unwrap_or_default(),
                        span.display_text()
                    );
                }
            }
        }
    }

    report.extra_lines = spans.pending_document().await?.is_some();
    report.malformed = spans.malformed();
    Ok(report)
}
