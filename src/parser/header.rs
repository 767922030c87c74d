//! RFC 822 header fields: name matching, unfolding, and sender cleanup.
//!
//! Everything here works on raw bytes. Header values are only turned into
//! display text by [`crate::parser::encoded_word::decode`].

use memchr::{memchr, memmem};

/// Whether the header line at the start of `line` is the field `name`.
///
/// `name` includes the colon (`b"subject:"`) and is compared
/// case-insensitively.
pub fn field_name_is(line: &[u8], name: &[u8]) -> bool {
    line.get(..name.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
}

/// Read one folded header field into a single-line value.
///
/// `field` starts at the field name and may run to the end of the header
/// block; the field ends at the first following line that does not begin
/// with whitespace. The name and colon are removed, each continuation line
/// is joined with a single space, and whitespace at both ends is trimmed.
///
/// No space is inserted where a line ending in `?=` is continued by one
/// starting with `=?`, so folded encoded-words stay adjacent. A
/// continuation line holding only whitespace adds nothing.
///
/// A field with nothing after the colon gives an empty value.
pub fn read_header(field: &[u8]) -> Vec<u8> {
    let (first, mut rest) = split_line(field);
    let Some(colon) = memchr(b':', first) else {
        return Vec::new();
    };

    let mut value = first[colon + 1..].trim_ascii().to_vec();

    while !rest.is_empty() {
        let (line, next) = split_line(rest);
        if !line.first().is_some_and(|&b| is_wsp(b)) {
            break;
        }
        rest = next;
        let content = line.trim_ascii();
        if content.is_empty() {
            continue;
        }
        let joins_words = value.ends_with(b"?=") && content.starts_with(b"=?");
        if !value.is_empty() && !joins_words {
            value.push(b' ');
        }
        value.extend_from_slice(content);
    }

    value
}

/// Reduce a raw `From:` value to the part worth showing.
///
/// - `Name <addr>` keeps `Name`
/// - `addr (Name)` keeps `Name`
/// - a value wrapped in `<...>` or `"..."` loses the wrapper
///
/// If nothing is left, the address inside `<...>` is used, or failing that
/// the whole value.
pub fn unmangle_from(value: &[u8]) -> Vec<u8> {
    let value = value.trim_ascii();

    let mut name = if let Some(pos) = memmem::find(value, b" <") {
        &value[..pos]
    } else if let Some(pos) = memmem::find(value, b" (") {
        let comment = &value[pos + 2..];
        match memchr(b')', comment) {
            Some(end) => &comment[..end],
            None => comment,
        }
    } else {
        value
    };

    name = name.trim_ascii();
    if let [open, inner @ .., close] = name {
        if (*open == b'<' && *close == b'>') || (*open == b'"' && *close == b'"') {
            name = inner.trim_ascii();
        }
    }

    if !name.is_empty() {
        return name.to_vec();
    }
    angle_address(value).unwrap_or(value).to_vec()
}

/// Content of the last `<...>` pair in `value`, if non-empty.
fn angle_address(value: &[u8]) -> Option<&[u8]> {
    let start = value.iter().rposition(|&b| b == b'<')?;
    let len = memchr(b'>', &value[start + 1..])?;
    let addr = value[start + 1..start + 1 + len].trim_ascii();
    (!addr.is_empty()).then_some(addr)
}

/// Split off the first physical line, without its `\n`.
fn split_line(bytes: &[u8]) -> (&[u8], &[u8]) {
    match memchr(b'\n', bytes) {
        Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
        None => (bytes, &[]),
    }
}

fn is_wsp(b: u8) -> bool {
    b == b' ' || b == b'\t'
}
