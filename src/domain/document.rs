//! Corpus documents and offset-unit aware text indexing.

use serde::{Deserialize, Serialize};

/// A document record from the corpus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Corpus-wide identifier
    pub id: String,

    /// Secondary identifiers column (passed through)
    pub other_ids: Vec<u8>,

    /// Authors column (passed through)
    pub authors: Vec<u8>,

    /// Publication venue column (passed through)
    pub forum: Vec<u8>,

    /// Year column (passed through)
    pub year: Vec<u8>,

    /// Unescaped document text, as raw bytes so byte offsets stay exact
    /// even when the input is not valid UTF-8
    pub text: Vec<u8>,
}

impl Document {
    /// Create a document with empty metadata columns
    pub fn new(id: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Unit in which span offsets index the document text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    /// Offsets count UTF-8 bytes
    #[default]
    Byte,

    /// Offsets count Unicode scalar values
    Char,
}

impl OffsetUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetUnit::Byte => "byte",
            OffsetUnit::Char => "char",
        }
    }
}

/// Document text indexed in one offset unit.
///
/// Character mode precomputes the byte position of every character so that
/// each lookup is constant time. A byte that is not part of valid UTF-8
/// counts as one character.
#[derive(Debug, Clone)]
pub struct TextIndex<'a> {
    text: &'a [u8],
    char_starts: Option<Vec<usize>>,
}

/// Byte position of every character, followed by the text length
fn char_starts(text: &[u8]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(text.len() + 1);
    let mut offset = 0;
    while offset < text.len() {
        let rest = &text[offset..];
        let valid = match std::str::from_utf8(rest) {
            Ok(valid) => valid,
            Err(err) => {
                let (valid, _) = rest.split_at(err.valid_up_to());
                // valid_up_to marks a UTF-8 boundary
                std::str::from_utf8(valid).unwrap_or_default()
            }
        };
        starts.extend(valid.char_indices().map(|(i, _)| offset + i));
        offset += valid.len();
        if offset < text.len() {
            starts.push(offset);
            offset += 1;
        }
    }
    starts.push(text.len());
    starts
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a [u8], unit: OffsetUnit) -> Self {
        let char_starts = match unit {
            OffsetUnit::Byte => None,
            OffsetUnit::Char => Some(char_starts(text)),
        };
        Self { text, char_starts }
    }

    /// Length of the text in the index's unit
    pub fn len(&self) -> usize {
        match &self.char_starts {
            None => self.text.len(),
            Some(starts) => starts.len() - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Bytes covered by the inclusive range `[start, end]`, if it lies within the text
    pub fn slice(&self, start: usize, end: usize) -> Option<&'a [u8]> {
        if end < start {
            return None;
        }
        let text: &'a [u8] = self.text;
        match &self.char_starts {
            None => text.get(start..=end),
            Some(starts) => {
                let from = *starts.get(start)?;
                let to = *starts.get(end.checked_add(1)?)?;
                text.get(from..to)
            }
        }
    }
}
