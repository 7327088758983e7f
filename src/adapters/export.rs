//! Export of selected documents and their spans in the input record formats.

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::tsv::{format_document, format_span_lines};
use crate::domain::{Document, Span};

/// Writes a document stream and a span stream side by side
pub struct Exporter<W> {
    documents: W,
    tags: W,
    documents_written: u64,
    spans_written: u64,
}

impl<W: AsyncWrite + Unpin + Send> Exporter<W> {
    pub fn new(documents: W, tags: W) -> Self {
        Self {
            documents,
            tags,
            documents_written: 0,
            spans_written: 0,
        }
    }

    /// Append one document record and the span records that go with it
    pub async fn write_document<'a, I>(&mut self, doc: &Document, spans: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Span>,
    {
        let mut record = format_document(doc);
        record.push(b'\n');
        self.documents
            .write_all(&record)
            .await
            .context("Failed to write exported document")?;

        let mut lines = Vec::new();
        for span in spans {
            for line in format_span_lines(span) {
                lines.extend_from_slice(&line);
                lines.push(b'\n');
            }
            self.spans_written += 1;
        }
        self.tags
            .write_all(&lines)
            .await
            .context("Failed to write exported spans")?;

        self.documents_written += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.documents
            .flush()
            .await
            .context("Failed to flush exported documents")?;
        self.tags
            .flush()
            .await
            .context("Failed to flush exported spans")?;
        Ok(())
    }

    pub fn documents_written(&self) -> u64 {
        self.documents_written
    }

    pub fn spans_written(&self) -> u64 {
        self.spans_written
    }

    /// Consume the exporter, returning the document and span sinks
    pub fn into_inner(self) -> (W, W) {
        (self.documents, self.tags)
    }
}
