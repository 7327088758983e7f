//! Tab-separated record formats for documents and spans.
//!
//! Document records have six fields:
//! `doc_id, other_ids, authors, forum, year, text`, where the text escapes
//! backslash as `\\` and tab as `\t`.
//!
//! Span records have eight fields:
//! `doc_id, paragraph, sentence, start, end, text, type, serial`.
//!
//! Text and metadata columns are carried as raw bytes, so input that is not
//! valid UTF-8 keeps its byte offsets and is exported unchanged.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{Document, Span};

pub const DOCUMENT_FIELDS: usize = 6;
pub const SPAN_FIELDS: usize = 8;

/// A record that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected {expected} tab-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("missing document id")]
    MissingId,

    #[error("invalid {field} offset: {value:?}")]
    InvalidOffset { field: &'static str, value: String },

    #[error("span end {end} precedes start {start}")]
    InvertedSpan { start: usize, end: usize },
}

/// Resolve `\\` and `\t` escapes; any other backslash is kept literally
pub fn unescape_text(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\\' {
            match bytes.peek() {
                Some(b'\\') => {
                    out.push(b'\\');
                    bytes.next();
                }
                Some(b't') => {
                    out.push(b'\t');
                    bytes.next();
                }
                _ => out.push(b),
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Inverse of [`unescape_text`]
pub fn escape_text(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for &b in text {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\t' => out.extend_from_slice(b"\\t"),
            _ => out.push(b),
        }
    }
    out
}

/// Identifier, type and serial fields are decoded leniently
fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

/// First tab-separated field of a line, if non-empty
pub fn leading_id(line: &[u8]) -> Option<String> {
    line.split(|&b| b == b'\t')
        .next()
        .filter(|id| !id.is_empty())
        .map(decode)
}

fn split_fields(line: &[u8], expected: usize) -> Result<Vec<&[u8]>, RecordError> {
    let fields: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
    if fields.len() != expected {
        return Err(RecordError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    if fields[0].is_empty() {
        return Err(RecordError::MissingId);
    }
    Ok(fields)
}

/// Join fields with tabs
fn join_fields(fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(b'\t');
        }
        out.extend_from_slice(field);
    }
    out
}

pub fn parse_document_line(line: &[u8]) -> Result<Document, RecordError> {
    let fields = split_fields(line, DOCUMENT_FIELDS)?;
    Ok(Document {
        id: decode(fields[0]),
        other_ids: fields[1].to_vec(),
        authors: fields[2].to_vec(),
        forum: fields[3].to_vec(),
        year: fields[4].to_vec(),
        text: unescape_text(fields[5]),
    })
}

/// Document record without the trailing newline
pub fn format_document(doc: &Document) -> Vec<u8> {
    join_fields(&[
        doc.id.as_bytes(),
        &doc.other_ids,
        &doc.authors,
        &doc.forum,
        &doc.year,
        &escape_text(&doc.text),
    ])
}

fn parse_offset(field: &'static str, value: &[u8]) -> Result<usize, RecordError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| RecordError::InvalidOffset {
            field,
            value: decode(value),
        })
}

/// Parse a span line, attributing it to `source`.
///
/// Types found in `type_names` are replaced by their display name. The span
/// text is kept as raw bytes.
pub fn parse_span_line(
    line: &[u8],
    source: &str,
    type_names: &HashMap<String, String>,
) -> Result<Span, RecordError> {
    let fields = split_fields(line, SPAN_FIELDS)?;
    let start = parse_offset("start", fields[3])?;
    let end = parse_offset("end", fields[4])?;
    if end < start {
        return Err(RecordError::InvertedSpan { start, end });
    }

    let raw_type = decode(fields[6]);
    let span_type = type_names.get(&raw_type).cloned().unwrap_or(raw_type);

    Ok(Span {
        doc_id: decode(fields[0]),
        paragraph: decode(fields[1]),
        sentence: decode(fields[2]),
        start,
        end,
        text: fields[5].to_vec(),
        span_type,
        source: source.to_string(),
        serials: vec![decode(fields[7])],
    })
}

/// Span record lines without trailing newlines, one per serial (a span
/// without serials gives one line)
pub fn format_span_lines(span: &Span) -> Vec<Vec<u8>> {
    let start = span.start.to_string();
    let end = span.end.to_string();
    let line = |serial: &str| {
        join_fields(&[
            span.doc_id.as_bytes(),
            span.paragraph.as_bytes(),
            span.sentence.as_bytes(),
            start.as_bytes(),
            end.as_bytes(),
            &span.text,
            span.span_type.as_bytes(),
            serial.as_bytes(),
        ])
    };

    if span.serials.is_empty() {
        vec![line("")]
    } else {
        span.serials.iter().map(|s| line(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_text(br"Title\tAbstract"), b"Title\tAbstract");
        assert_eq!(unescape_text(br"a\\tb"), br"a\tb");
        assert_eq!(unescape_text(br"50\% off\"), br"50\% off\");
        assert_eq!(escape_text(b"a\\b\tc"), br"a\\b\tc");
        assert_eq!(unescape_text(&escape_text(b"x\\\t\\t")), b"x\\\t\\t");
        assert_eq!(unescape_text(b"\xe9\\t\xff"), b"\xe9\t\xff");
    }

    #[test]
    fn test_parse_document_line() {
        let line = b"123\tPMC9\tSmith J\tNature\t2001\tTitle\\tBody";
        let doc = parse_document_line(line).unwrap();
        assert_eq!(doc.id, "123");
        assert_eq!(doc.year, b"2001");
        assert_eq!(doc.text, b"Title\tBody");
        assert_eq!(format_document(&doc), line);

        assert_eq!(
            parse_document_line(b"123\tonly\tthree"),
            Err(RecordError::FieldCount {
                expected: 6,
                found: 3
            })
        );
        assert_eq!(parse_document_line(b"\t\t\t\t\ttext"), Err(RecordError::MissingId));
    }

    #[test]
    fn test_parse_span_line() {
        let names = HashMap::from([("-2".to_string(), "Organism".to_string())]);
        let span = parse_span_line(b"123\t1\t2\t0\t2\tcat\t-2\t9685", "tagger", &names).unwrap();
        assert_eq!(span.doc_id, "123");
        assert_eq!((span.start, span.end), (0, 2));
        assert_eq!(span.span_type, "Organism");
        assert_eq!(span.source, "tagger");
        assert_eq!(span.serials, vec!["9685"]);

        let span = parse_span_line(b"123\t1\t2\t0\t2\tcat\tAnimal\t1", "t", &HashMap::new()).unwrap();
        assert_eq!(span.span_type, "Animal");
    }

    #[test]
    fn test_parse_span_line_errors() {
        let names = HashMap::new();
        assert_eq!(
            parse_span_line(b"1\t1\t1\tx\t2\tcat\tT\ts", "t", &names),
            Err(RecordError::InvalidOffset {
                field: "start",
                value: "x".to_string()
            })
        );
        assert_eq!(
            parse_span_line(b"1\t1\t1\t5\t2\tcat\tT\ts", "t", &names),
            Err(RecordError::InvertedSpan { start: 5, end: 2 })
        );
        assert!(matches!(
            parse_span_line(b"1\t1\t1\t-1\t2\tcat\tT\ts", "t", &names),
            Err(RecordError::InvalidOffset { .. })
        ));
    }

    #[test]
    fn test_format_span_lines_one_per_serial() {
        let span = Span::new("9", 0, 2, "cat", "Animal", "a")
            .with_serial("s1")
            .with_serial("s2");
        assert_eq!(
            format_span_lines(&span),
            vec![
                b"9\t\t\t0\t2\tcat\tAnimal\ts1".to_vec(),
                b"9\t\t\t0\t2\tcat\tAnimal\ts2".to_vec()
            ]
        );

        let bare = Span::new("9", 0, 2, "cat", "Animal", "a");
        assert_eq!(format_span_lines(&bare), vec![b"9\t\t\t0\t2\tcat\tAnimal\t".to_vec()]);
    }

    #[test]
    fn test_non_utf8_fields_kept_as_bytes() {
        let line = b"d1\t\t\xc9mile\t\t\t\xe9 cat";
        let doc = parse_document_line(line).unwrap();
        assert_eq!(doc.authors, b"\xc9mile");
        assert_eq!(doc.text, b"\xe9 cat");
        assert_eq!(format_document(&doc), line);

        let span = parse_span_line(b"d1\t\t\t0\t4\t\xe9 cat\tT\t1", "a", &HashMap::new()).unwrap();
        assert_eq!(span.text, b"\xe9 cat");
        assert_eq!(span.display_text(), "\u{fffd} cat");
        assert_eq!(format_span_lines(&span), vec![b"d1\t\t\t0\t4\t\xe9 cat\tT\t1".to_vec()]);

        assert!(matches!(
            parse_span_line(b"d1\t\t\t\xff\t4\tcat\tT\t1", "a", &HashMap::new()),
            Err(RecordError::InvalidOffset { field: "start", .. })
        ));
        assert_eq!(leading_id(b"d\xff1\tx").as_deref(), Some("d\u{fffd}1"));
    }
}
