//! Per-message record and its one-line summary.

use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::charset::DisplayCharset;
use crate::parser::{encoded_word, header};

/// Shown when a message has no `From:` field, or an empty one.
pub const NO_SENDER: &[u8] = b"<no sender>";
/// Shown when a message has no `Subject:` field.
pub const NO_SUBJECT: &[u8] = b"<no subject>";
/// Shown when the `Subject:` field is present but empty.
pub const EMPTY_SUBJECT: &[u8] = b"<empty subject>";

/// Headers of interest for a single message, still raw.
///
/// `from` and `subject` are the unfolded field values; `None` means the
/// field did not appear in the header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRecord {
    /// Offset of the `From ` separator line.
    pub head: usize,
    /// Offset of the first body byte, just past the blank line.
    pub body: usize,
    pub from: Option<Vec<u8>>,
    pub subject: Option<Vec<u8>>,
}

impl MessageRecord {
    pub fn new(head: usize, body: usize) -> Self {
        Self {
            head,
            body,
            from: None,
            subject: None,
        }
    }

    /// Both fields have been captured; the rest of the headers can be skipped.
    pub fn is_complete(&self) -> bool {
        self.from.is_some() && self.subject.is_some()
    }

    /// Decode both fields for display, substituting placeholders.
    pub fn summarize(&self, display: DisplayCharset) -> SummaryLine {
        let from = match self.from.as_deref().map(header::unmangle_from) {
            Some(sender) if !sender.is_empty() => encoded_word::decode(&sender, display),
            _ => NO_SENDER.to_vec(),
        };
        let subject = match self.subject.as_deref() {
            None => NO_SUBJECT.to_vec(),
            Some([]) => EMPTY_SUBJECT.to_vec(),
            Some(raw) => encoded_word::decode(raw, display),
        };
        SummaryLine { from, subject }
    }
}

/// Display-ready sender and subject, encoded in the display charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub from: Vec<u8>,
    pub subject: Vec<u8>,
}

impl SummaryLine {
    /// Terminal columns taken by the sender.
    pub fn from_width(&self, display: DisplayCharset) -> usize {
        match display {
            DisplayCharset::Utf8 => String::from_utf8_lossy(&self.from).width(),
            DisplayCharset::Latin9 => self.from.len(),
        }
    }

    /// Write `sender<padding>  subject\n`, padding the sender to `width` columns.
    pub fn write_to(
        &self,
        out: &mut dyn Write,
        width: usize,
        display: DisplayCharset,
    ) -> std::io::Result<()> {
        let padding = width.saturating_sub(self.from_width(display));
        out.write_all(&self.from)?;
        write!(out, "{:padding$}  ", "")?;
        out.write_all(&self.subject)?;
        out.write_all(b"\n")
    }
}
