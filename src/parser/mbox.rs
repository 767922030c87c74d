//! Memory-mapped MBOX scanner.
//!
//! The whole mailbox is mapped read-only and walked in place: message
//! starts are found with a substring search, header blocks are sliced out
//! of the map, and only the `From:` and `Subject:` values are ever copied.
//! Pages already scanned are handed back to the kernel every so often so
//! resident memory stays flat for mailboxes of any size.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use memchr::{memchr_iter, memmem};
use memmap2::Mmap;
use tracing::{debug, trace, warn};

use crate::charset::DisplayCharset;
use crate::error::{FrmError, Result};
use crate::model::summary::MessageRecord;
use crate::parser::header;

/// Marker that opens every message.
const SEPARATOR: &[u8] = b"From ";

/// UTF-8 byte order mark, tolerated at the very start of the file.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Default distance between two paging hints (1 MB).
pub const DEFAULT_RECYCLE_THRESHOLD: usize = 1024 * 1024;

/// Default chunk size for the backward search in last-only mode (64 KB).
pub const DEFAULT_SWEEP_CHUNK_SIZE: usize = 64 * 1024;

/// Default width of the sender column.
pub const DEFAULT_FROM_WIDTH: usize = 22;

/// How a mailbox is scanned and its summaries printed.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of leading messages not to print.
    pub skip: usize,
    /// Print only the last message.
    pub last_only: bool,
    /// Charset of the terminal.
    pub charset: DisplayCharset,
    /// Minimum width of the sender column.
    pub from_width: usize,
    /// Bytes scanned between two paging hints.
    pub recycle_threshold: usize,
    /// Chunk size of the backward search in last-only mode.
    pub sweep_chunk_size: usize,
    /// Map the file; when false the file is read into memory instead.
    pub use_mmap: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            last_only: false,
            charset: DisplayCharset::default(),
            from_width: DEFAULT_FROM_WIDTH,
            recycle_threshold: DEFAULT_RECYCLE_THRESHOLD,
            sweep_chunk_size: DEFAULT_SWEEP_CHUNK_SIZE,
            use_mmap: true,
        }
    }
}

/// Counters for one scanned mailbox.
///
/// When the backward sweep answers a last-only scan, only the last message
/// is examined and `messages_found` is at most 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Valid messages seen (header block terminated by a blank line).
    pub messages_found: usize,
    /// Summary lines written.
    pub messages_emitted: usize,
}

/// Read-only bytes of a mailbox file.
pub enum MailboxImage {
    /// Memory-mapped file.
    Mapped(Mmap),
    /// File contents read into memory, used when mapping is unavailable.
    Buffered(Vec<u8>),
}

impl MailboxImage {
    /// Open a mailbox, mapping it when `use_mmap` is set and mapping works.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FrmError::io(path, e))?;
        let len = file.metadata().map_err(|e| FrmError::io(path, e))?.len();

        if len == 0 {
            return Ok(Self::Buffered(Vec::new()));
        }

        if use_mmap {
            // SAFETY: the map is read-only and dropped before this scan ends.
            // A mailbox truncated underneath us by another process may fault;
            // that is the usual contract for mapped mail spools.
            match unsafe { Mmap::map(&file) } {
                Ok(map) => {
                    debug!(path = %path.display(), size = len, "Mapped mailbox");
                    return Ok(Self::Mapped(map));
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "mmap unavailable, reading file");
                }
            }
        }

        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        (&file)
            .read_to_end(&mut buf)
            .map_err(|e| FrmError::io(path, e))?;
        Ok(Self::Buffered(buf))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => &map[..],
            Self::Buffered(buf) => &buf[..],
        }
    }

    /// Tell the kernel the map will be read front to back.
    #[cfg(unix)]
    fn advise_sequential(&self) {
        if let Self::Mapped(map) = self {
            if let Err(e) = map.advise(memmap2::Advice::Sequential) {
                debug!(error = %e, "madvise(SEQUENTIAL) failed");
            }
        }
    }

    #[cfg(not(unix))]
    fn advise_sequential(&self) {}

    /// Let the kernel drop resident pages of `[start, end)`.
    ///
    /// Content is unaffected; the pages are read back from the file if
    /// touched again. No-op for buffered images.
    #[cfg(unix)]
    fn release(&self, start: usize, end: usize) {
        if let Self::Mapped(map) = self {
            // SAFETY: the mapping is a private read-only file mapping, so
            // MADV_DONTNEED only discards clean page-cache references and
            // later reads see the same file bytes.
            let advised = unsafe {
                map.unchecked_advise_range(memmap2::UncheckedAdvice::DontNeed, start, end - start)
            };
            if let Err(e) = advised {
                warn!(start, end, error = %e, "madvise(DONTNEED) failed");
            }
        }
    }

    #[cfg(not(unix))]
    fn release(&self, _start: usize, _end: usize) {}
}

impl From<Vec<u8>> for MailboxImage {
    fn from(buf: Vec<u8>) -> Self {
        Self::Buffered(buf)
    }
}

/// Walks one mailbox image and writes a summary line per message.
pub struct Scanner<'a> {
    image: &'a MailboxImage,
    options: &'a ScanOptions,
    /// Everything before this offset has already been released.
    released: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(image: &'a MailboxImage, options: &'a ScanOptions) -> Self {
        Self {
            image,
            options,
            released: 0,
        }
    }

    /// Scan the whole image, writing summary lines to `out`.
    pub fn scan(&mut self, out: &mut dyn Write) -> Result<ScanReport> {
        let image = self.image;
        let data = image.as_bytes();
        let mut report = ScanReport::default();
        if data.is_empty() {
            return Ok(report);
        }

        if self.options.last_only && self.options.skip == 0 {
            if let Some(record) = self.sweep_last(data) {
                report.messages_found = 1;
                self.emit(&record, out, &mut report)?;
                return Ok(report);
            }
            debug!("Backward sweep found no message, scanning from the start");
        }

        self.image.advise_sequential();
        let mut skip = self.options.skip;
        let mut last: Option<MessageRecord> = None;
        let mut start = find_message_start(data, 0);

        while let Some(head) = start {
            let next = find_message_start(data, head + 1);
            let limit = next.unwrap_or(data.len());

            match read_message(data, head, limit) {
                Some(record) => {
                    report.messages_found += 1;
                    if skip > 0 {
                        skip -= 1;
                    } else if self.options.last_only {
                        last = Some(record);
                    } else {
                        self.emit(&record, out, &mut report)?;
                    }
                }
                None => trace!(offset = head, "Message without end of headers, skipping"),
            }

            self.recycle(limit);
            start = next;
        }

        if let Some(record) = last {
            self.emit(&record, out, &mut report)?;
        }

        debug!(
            found = report.messages_found,
            emitted = report.messages_emitted,
            "Scan complete"
        );
        Ok(report)
    }

    /// Find the last valid message by searching backwards from the end.
    fn sweep_last(&self, data: &[u8]) -> Option<MessageRecord> {
        let mut before = data.len();
        while let Some(head) = rfind_message_start(data, before, self.options.sweep_chunk_size) {
            if let Some(record) = read_message(data, head, before) {
                debug!(offset = head, "Last message found by backward sweep");
                return Some(record);
            }
            trace!(offset = head, "Message without end of headers, skipping");
            before = head;
        }
        None
    }

    fn emit(
        &self,
        record: &MessageRecord,
        out: &mut dyn Write,
        report: &mut ScanReport,
    ) -> Result<()> {
        record
            .summarize(self.options.charset)
            .write_to(out, self.options.from_width, self.options.charset)?;
        report.messages_emitted += 1;
        Ok(())
    }

    /// Release scanned pages once enough of them have piled up.
    fn recycle(&mut self, pos: usize) {
        if pos - self.released > self.options.recycle_threshold {
            trace!(start = self.released, end = pos, "Releasing scanned pages");
            self.image.release(self.released, pos);
            self.released = pos;
        }
    }
}

/// Scan one mailbox file.
pub fn scan_path(
    path: impl AsRef<Path>,
    options: &ScanOptions,
    out: &mut dyn Write,
) -> Result<ScanReport> {
    let path = path.as_ref();
    let image = MailboxImage::open(path, options.use_mmap)?;
    debug!(path = %path.display(), size = image.as_bytes().len(), "Scanning mailbox");
    Scanner::new(&image, options).scan(out)
}

/// Scan several mailboxes one after another and return the exit status.
///
/// A mailbox that cannot be opened is passed to `on_error` and makes the
/// status 1, but the remaining mailboxes are still scanned.
pub fn scan_all(
    paths: &[impl AsRef<Path>],
    options: &ScanOptions,
    out: &mut dyn Write,
    on_error: &mut dyn FnMut(&FrmError),
) -> i32 {
    let mut status = 0;
    for path in paths {
        if let Err(e) = scan_path(path, options, out) {
            on_error(&e);
            status = 1;
        }
    }
    status
}

/// Read the header block of the message starting at `head`.
///
/// `limit` is where the next message starts (or the end of the image).
/// `None` if the headers are not closed by a blank line before `limit`.
fn read_message(data: &[u8], head: usize, limit: usize) -> Option<MessageRecord> {
    let (header_end, body) = find_header_end(&data[..limit], head)?;
    let block = &data[head..header_end];
    let mut record = MessageRecord::new(head, body);

    for start in field_starts(block) {
        let field = &block[start..];
        if record.from.is_none() && header::field_name_is(field, b"from:") {
            record.from = Some(header::read_header(field));
        } else if record.subject.is_none() && header::field_name_is(field, b"subject:") {
            record.subject = Some(header::read_header(field));
        }
        if record.is_complete() {
            break;
        }
    }

    Some(record)
}

/// Whether offset `pos` is the first byte of a line.
///
/// That is the start of the file (after an optional BOM), right after a
/// `\n`, or right after `\n\r`.
fn is_line_start(data: &[u8], pos: usize) -> bool {
    match pos {
        0 => true,
        3 if data.starts_with(BOM) => true,
        _ => data[pos - 1] == b'\n' || (pos >= 2 && &data[pos - 2..pos] == b"\n\r"),
    }
}

/// Find the next message separator at or after `from`.
///
/// A `From ` in the middle of a line is not a separator; the search then
/// resumes one byte past it.
pub fn find_message_start(data: &[u8], from: usize) -> Option<usize> {
    let finder = memmem::Finder::new(SEPARATOR);
    let mut pos = from;
    while pos < data.len() {
        let candidate = pos + finder.find(&data[pos..])?;
        if is_line_start(data, candidate) {
            return Some(candidate);
        }
        pos = candidate + 1;
    }
    None
}

/// Find the last message separator starting before `before`.
///
/// The image is searched backwards `chunk` bytes at a time, so the last
/// message of a large mailbox is found without reading the rest of it.
pub fn rfind_message_start(data: &[u8], before: usize, chunk: usize) -> Option<usize> {
    let finder = memmem::FinderRev::new(SEPARATOR);
    let chunk = chunk.max(SEPARATOR.len());
    let mut end = before.min(data.len());

    while end > 0 {
        let start = end.saturating_sub(chunk);
        // Let a separator straddle the chunk end, but never start at or after `end`.
        let mut window_end = (end + SEPARATOR.len() - 1).min(before).min(data.len());
        while let Some(rel) = finder.rfind(&data[start..window_end]) {
            let candidate = start + rel;
            if is_line_start(data, candidate) {
                return Some(candidate);
            }
            window_end = candidate + SEPARATOR.len() - 1;
        }
        end = start;
    }
    None
}

/// Find the blank line closing the header block of the message at `head`.
///
/// Returns `(header_end, body_start)`: the block is `data[head..header_end]`
/// and the body begins at `body_start`. Accepts `\n\n`, `\n\r\n`, and any
/// mix of the two line endings.
pub fn find_header_end(data: &[u8], head: usize) -> Option<(usize, usize)> {
    let region = &data[head..];
    memchr_iter(b'\n', region).find_map(|i| match region.get(i + 1..) {
        Some([b'\n', ..]) => Some((head + i + 1, head + i + 2)),
        Some([b'\r', b'\n', ..]) => Some((head + i + 1, head + i + 3)),
        _ => None,
    })
}

/// Offsets of the lines in a header block that start a field.
///
/// Continuation lines (leading space or tab) belong to the field above
/// and are skipped.
fn field_starts(block: &[u8]) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0)
        .chain(memchr_iter(b'\n', block).map(|i| i + 1))
        .filter(move |&start| {
            block
                .get(start)
                .is_some_and(|&b| b != b' ' && b != b'\t')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_bytes(data: &[u8], options: &ScanOptions) -> (String, ScanReport) {
        let image = MailboxImage::from(data.to_vec());
        let mut out = Vec::new();
        let report = Scanner::new(&image, options).scan(&mut out).unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    #[test]
    fn test_find_message_start_at_line_boundaries() {
        let data = b"From a\nbody\nFrom b\n";
        assert_eq!(find_message_start(data, 0), Some(0));
        assert_eq!(find_message_start(data, 1), Some(12));
        assert_eq!(find_message_start(data, 13), None);
    }

    #[test]
    fn test_find_message_start_rejects_mid_line() {
        let data = b"x\nsaid From bob\nFrom real\n";
        assert_eq!(find_message_start(data, 0), Some(16));
    }

    #[test]
    fn test_find_message_start_after_false_match_on_same_line() {
        // The false match is skipped by one byte, not by a whole line
        let data = b"aFrom \nFrom x\n";
        assert_eq!(find_message_start(data, 0), Some(7));
    }

    #[test]
    fn test_find_message_start_crlf_and_bom() {
        assert_eq!(find_message_start(b"x\r\nFrom a\r\n", 0), Some(3));
        assert_eq!(find_message_start(b"x\n\rFrom a\n", 0), Some(3));
        assert_eq!(find_message_start(b"\xEF\xBB\xBFFrom a\n", 0), Some(3));
    }

    #[test]
    fn test_escaped_from_is_not_a_separator() {
        assert_eq!(find_message_start(b"x\n>From a\n", 0), None);
        assert_eq!(find_message_start(b"x\nfrom a\n", 0), None);
    }

    #[test]
    fn test_rfind_message_start() {
        let data = b"From a\n\nbody From x\nFrom b\n\nbody\n";
        assert_eq!(rfind_message_start(data, data.len(), 4), Some(20));
        assert_eq!(rfind_message_start(data, 20, 4), Some(0));
        assert_eq!(rfind_message_start(data, 0, 4), None);
        assert_eq!(rfind_message_start(b"no separators\n", 14, 64), None);
    }

    #[test]
    fn test_rfind_message_start_across_chunk_boundary() {
        let mut data = b"From a\n\n".to_vec();
        data.extend(std::iter::repeat_n(b'x', 97));
        data.extend(b"\nFrom b\n\n");
        let expected = data.len() - 8;
        for chunk in [1, 3, 5, 7, 16, 100] {
            assert_eq!(
                rfind_message_start(&data, data.len(), chunk),
                Some(expected),
                "chunk size {chunk}"
            );
        }
    }

    #[test]
    fn test_find_header_end() {
        let data = b"From a\nSubject: x\n\nbody\n";
        assert_eq!(find_header_end(data, 0), Some((18, 19)));
        let crlf = b"From a\r\nSubject: x\r\n\r\nbody\r\n";
        assert_eq!(find_header_end(crlf, 0), Some((20, 22)));
        assert_eq!(find_header_end(b"From a\nSubject: x\n", 0), None);
    }

    #[test]
    fn test_field_starts_skip_continuations() {
        let block = b"From a\nSubject: one\n two\nFrom: b\n";
        let starts: Vec<usize> = field_starts(block).collect();
        assert_eq!(starts, vec![0, 7, 25]);
    }

    #[test]
    fn test_scan_every_message() {
        let data = b"From a@x Mon Jan  1 00:00:00 2024\nFrom: a@x\nSubject: hi\n\nbody\n\
From b@x Mon Jan  1 00:00:00 2024\nSubject: second\nFrom: Bee <b@x>\n\nbody\n";
        let (out, report) = scan_bytes(data, &ScanOptions::default());
        assert_eq!(
            out,
            "a@x                     hi\nBee                     second\n"
        );
        assert_eq!(report.messages_found, 2);
        assert_eq!(report.messages_emitted, 2);
    }

    #[test]
    fn test_scan_first_header_wins() {
        let data = b"From x\nSubject: one\nSubject: two\nFrom: a\n\n";
        let (out, _) = scan_bytes(data, &ScanOptions::default());
        assert!(out.ends_with("  one\n"), "{out:?}");
    }

    #[test]
    fn test_scan_blank_continuation_inside_subject() {
        let data = b"From x\nSubject: one\n \n two\nFrom: a\n\n";
        let (out, report) = scan_bytes(data, &ScanOptions::default());
        assert_eq!(report.messages_emitted, 1);
        assert!(out.starts_with("a "), "{out:?}");
        assert!(out.ends_with("  one two\n"), "{out:?}");
    }

    #[test]
    fn test_scan_skip_and_last_only() {
        let data = b"From 1\nSubject: one\n\nFrom 2\nSubject: two\n\nFrom 3\nSubject: three\n\n";
        let skip = ScanOptions {
            skip: 2,
            ..ScanOptions::default()
        };
        let (out, report) = scan_bytes(data, &skip);
        assert!(out.ends_with("three\n"));
        assert_eq!(report.messages_emitted, 1);

        let last = ScanOptions {
            last_only: true,
            ..ScanOptions::default()
        };
        let (out, report) = scan_bytes(data, &last);
        assert_eq!(out, "<no sender>             three\n");
        assert_eq!(report.messages_emitted, 1);

        let too_many = ScanOptions {
            skip: 5,
            last_only: true,
            ..ScanOptions::default()
        };
        let (out, report) = scan_bytes(data, &too_many);
        assert_eq!(out, "");
        assert_eq!(report.messages_found, 3);
    }

    #[test]
    fn test_truncated_last_message_is_dropped() {
        let data = b"From 1\nSubject: one\n\nbody\nFrom 2\nSubject: cut";
        let (out, report) = scan_bytes(data, &ScanOptions::default());
        assert_eq!(report.messages_found, 1);
        assert!(out.ends_with("one\n"));

        // Last-only falls back to the previous complete message
        let last = ScanOptions {
            last_only: true,
            ..ScanOptions::default()
        };
        let (out, _) = scan_bytes(data, &last);
        assert!(out.ends_with("one\n"), "{out:?}");
    }

    #[test]
    fn test_message_without_blank_line_before_next_is_skipped() {
        let data = b"From 1\nSubject: one\nFrom 2\nSubject: two\n\nbody\n";
        let (out, report) = scan_bytes(data, &ScanOptions::default());
        assert_eq!(report.messages_found, 1);
        assert!(out.ends_with("two\n"));
    }

    #[test]
    fn test_open_mapped_and_buffered() {
        use std::io::Write as _;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"From a\nSubject: s\n\n").unwrap();
        file.flush().unwrap();

        let mapped = MailboxImage::open(file.path(), true).unwrap();
        let buffered = MailboxImage::open(file.path(), false).unwrap();
        assert!(matches!(buffered, MailboxImage::Buffered(_)));
        assert_eq!(mapped.as_bytes(), buffered.as_bytes());
        assert_eq!(mapped.as_bytes(), b"From a\nSubject: s\n\n");
    }

    #[test]
    fn test_open_empty_and_missing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let image = MailboxImage::open(file.path(), true).unwrap();
        assert!(image.as_bytes().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let missing = MailboxImage::open(dir.path().join("nope"), true);
        assert!(matches!(missing, Err(FrmError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_image() {
        let (out, report) = scan_bytes(b"", &ScanOptions::default());
        assert_eq!(out, "");
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn test_recycle_threshold_does_not_change_output() {
        let mut data = Vec::new();
        for i in 0..50 {
            data.extend(format!("From {i}\nSubject: s{i}\n\n{}\n", "x".repeat(100)).bytes());
        }
        let tiny = ScanOptions {
            recycle_threshold: 16,
            ..ScanOptions::default()
        };
        assert_eq!(
            scan_bytes(&data, &tiny),
            scan_bytes(&data, &ScanOptions::default())
        );
    }
}
