//! Streaming readers for document and span records.
//!
//! Both readers pull one line at a time from any [`AsyncBufRead`], so corpora
//! with millions of documents are never loaded whole. Lines are kept as raw
//! bytes; malformed lines are logged with their origin and line number,
//! counted, and skipped.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use super::tsv::{leading_id, parse_document_line, parse_span_line};
use crate::domain::{Document, Span};

/// One entry of a document stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEntry {
    /// A parsed document
    Document(Document),

    /// A record that failed to parse but whose id could be recovered
    Malformed { id: String },
}

/// Pull interface over a corpus of documents
#[async_trait]
pub trait DocumentSource: Send {
    /// Next entry, or `None` at end of input
    async fn next_document(&mut self) -> Result<Option<DocumentEntry>>;

    /// Number of malformed records skipped so far
    fn malformed(&self) -> usize {
        0
    }
}

/// Pull interface over one source's spans, segmented by document id
#[async_trait]
pub trait SpanSource: Send {
    /// Display name of the source
    fn name(&self) -> &str;

    /// All spans of `doc_id` at the current position, advancing past them.
    ///
    /// Returns an empty list without consuming input when the next record
    /// belongs to another document.
    async fn document_spans(&mut self, doc_id: &str) -> Result<Vec<Span>>;

    /// Number of malformed records skipped so far
    fn malformed(&self) -> usize {
        0
    }
}

/// Line reader that tracks line numbers
struct LineReader<R> {
    inner: R,
    origin: String,
    line_number: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> LineReader<R> {
    fn new(inner: R, origin: String) -> Self {
        Self {
            inner,
            origin,
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Next line without its terminating newline
    async fn next_line(&mut self) -> Result<Option<&[u8]>> {
        self.buf.clear();
        let read = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .await
            .with_context(|| format!("Failed to read {}", self.origin))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some(&self.buf))
    }
}

/// Reads document records
pub struct DocumentReader<R> {
    lines: LineReader<R>,
    malformed: usize,
}

impl<R: AsyncBufRead + Unpin + Send> DocumentReader<R> {
    /// `origin` names the input in diagnostics (usually its path)
    pub fn new(inner: R, origin: impl Into<String>) -> Self {
        Self {
            lines: LineReader::new(inner, origin.into()),
            malformed: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> DocumentSource for DocumentReader<R> {
    async fn next_document(&mut self) -> Result<Option<DocumentEntry>> {
        while let Some(line) = self.lines.next_line().await? {
            match parse_document_line(line) {
                Ok(doc) => return Ok(Some(DocumentEntry::Document(doc))),
                Err(err) => {
                    let id = leading_id(line);
                    self.malformed += 1;
                    warn!(
                        origin = %self.lines.origin,
                        line = self.lines.line_number,
                        "failed to parse document record: {}",
                        err
                    );
                    if let Some(id) = id {
                        return Ok(Some(DocumentEntry::Malformed { id }));
                    }
                }
            }
        }
        Ok(None)
    }

    fn malformed(&self) -> usize {
        self.malformed
    }
}

/// Reads span records of one source with a one-record lookahead
pub struct SpanReader<R> {
    name: String,
    lines: LineReader<R>,
    type_names: HashMap<String, String>,
    lookahead: Option<Span>,
    exhausted: bool,
    spans_read: usize,
    malformed: usize,
}

impl<R: AsyncBufRead + Unpin + Send> SpanReader<R> {
    /// `name` is attached to every span as its source
    pub fn new(inner: R, origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: LineReader::new(inner, origin.into()),
            type_names: HashMap::new(),
            lookahead: None,
            exhausted: false,
            spans_read: 0,
            malformed: 0,
        }
    }

    /// Map raw type fields to display names while reading
    pub fn with_type_names(mut self, type_names: HashMap<String, String>) -> Self {
        self.type_names = type_names;
        self
    }

    /// Parsed spans handed out or pending so far
    pub fn spans_read(&self) -> usize {
        self.spans_read
    }

    /// Document id of the next unconsumed span, after reading ahead
    pub async fn pending_document(&mut self) -> Result<Option<&str>> {
        self.fill().await?;
        Ok(self.lookahead.as_ref().map(|s| s.doc_id.as_str()))
    }

    async fn fill(&mut self) -> Result<()> {
        while self.lookahead.is_none() && !self.exhausted {
            let Some(line) = self.lines.next_line().await? else {
                self.exhausted = true;
                break;
            };
            match parse_span_line(line, &self.name, &self.type_names) {
                Ok(span) => {
                    self.spans_read += 1;
                    self.lookahead = Some(span);
                }
                Err(err) => {
                    self.malformed += 1;
                    warn!(
                        origin = %self.lines.origin,
                        line = self.lines.line_number,
                        "failed to parse span record: {}",
                        err
                    );
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SpanSource for SpanReader<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn document_spans(&mut self, doc_id: &str) -> Result<Vec<Span>> {
        let mut spans = Vec::new();
        loop {
            self.fill().await?;
            match self.lookahead.take() {
                Some(span) if span.doc_id == doc_id => spans.push(span),
                other => {
                    self.lookahead = other;
                    return Ok(spans);
                }
            }
        }
    }

    fn malformed(&self) -> usize {
        self.malformed
    }
}
