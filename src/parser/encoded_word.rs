//! RFC 2047 encoded-word decoding.
//!
//! Every `=?charset?Q|B?payload?=` token in a header value is replaced by
//! its decoded payload, converted to the display charset. Decoding never
//! fails: broken tokens are left as they are.

use memchr::{memchr, memmem};
use tracing::trace;

use crate::charset::{self, DisplayCharset};

/// Text returned when there is no value to decode at all.
pub const NULL_TEXT: &[u8] = b"(null)";

/// One parsed `=?charset?encoding?payload?=` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedWord<'a> {
    pub charset: &'a [u8],
    pub encoding: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> EncodedWord<'a> {
    /// Parse a token at the start of `input`, which must begin with `=?`.
    ///
    /// Returns the token and the number of bytes it spans, closing `?=`
    /// included. `None` if any delimiter is missing.
    pub fn parse(input: &'a [u8]) -> Option<(Self, usize)> {
        let after_start = input.strip_prefix(b"=?")?;

        let charset_end = memchr(b'?', after_start)?;
        let charset = &after_start[..charset_end];

        let rest = &after_start[charset_end + 1..];
        let encoding_end = memchr(b'?', rest)?;
        let encoding = &rest[..encoding_end];

        let rest = &rest[encoding_end + 1..];
        let payload_end = memmem::find(rest, b"?=")?;
        let payload = &rest[..payload_end];

        let consumed = 2 + charset_end + 1 + encoding_end + 1 + payload_end + 2;
        Some((
            Self {
                charset,
                encoding,
                payload,
            },
            consumed,
        ))
    }

    /// Decode the payload into raw bytes in the declared charset.
    ///
    /// `None` for encodings other than `Q` and `B`.
    pub fn decode_payload(&self) -> Option<Vec<u8>> {
        match self.encoding {
            [b'Q' | b'q'] => Some(decode_q(self.payload)),
            [b'B' | b'b'] => Some(decode_b(self.payload)),
            _ => None,
        }
    }
}

/// Decode every encoded-word in `text` for display in `display`.
///
/// Text outside tokens is copied verbatim, including the whitespace
/// between two tokens. An unterminated token ends decoding and is copied
/// with everything after it. A token with an unknown encoding is copied
/// literally and scanning resumes after it.
///
/// # Examples
///
/// ```
/// use mboxfrm::charset::DisplayCharset;
/// use mboxfrm::parser::encoded_word::decode;
///
/// let text = decode(b"=?UTF-8?Q?Caf=C3=A9?=", DisplayCharset::Utf8);
/// assert_eq!(text, "Café".as_bytes());
/// ```
pub fn decode(text: &[u8], display: DisplayCharset) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = memmem::find(rest, b"=?") {
        out.extend_from_slice(&rest[..start]);
        let token = &rest[start..];

        let Some((word, consumed)) = EncodedWord::parse(token) else {
            trace!("unterminated encoded-word, leaving tail undecoded");
            out.extend_from_slice(token);
            return out;
        };

        match word.decode_payload() {
            Some(bytes) => {
                out.extend(charset::transcode(word.charset, bytes, display));
            }
            None => {
                trace!(
                    encoding = %String::from_utf8_lossy(word.encoding),
                    "unsupported encoded-word encoding"
                );
                out.extend_from_slice(&token[..consumed]);
            }
        }
        rest = &token[consumed..];
    }

    out.extend_from_slice(rest);
    out
}

/// Like [`decode`], but a missing value decodes to `(null)`.
pub fn decode_optional(text: Option<&[u8]>, display: DisplayCharset) -> Vec<u8> {
    match text {
        Some(text) => decode(text, display),
        None => NULL_TEXT.to_vec(),
    }
}

/// Q encoding: `_` is a space, `=XY` a hex byte.
///
/// An `=` not followed by two hex digits becomes `?`, and the two bytes
/// after it are dropped along with it.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        match payload[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = payload.get(i + 1..i + 3).and_then(|pair| {
                    Some((hex_value(pair[0])? << 4) | hex_value(pair[1])?)
                });
                out.push(hex.unwrap_or(b'?'));
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Base64, four characters into three bytes.
///
/// A trailing partial group is ignored. `=` padding shortens the last
/// group; any other byte outside the alphabet counts as zero.
fn decode_b(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() / 4 * 3);
    for quad in payload.chunks_exact(4) {
        let bits = quad
            .iter()
            .fold(0u32, |acc, &c| (acc << 6) | u32::from(b64_value(c)));
        let bytes = [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8];
        let len = match (quad[2], quad[3]) {
            (b'=', b'=') => 1,
            (_, b'=') => 2,
            _ => 3,
        };
        out.extend_from_slice(&bytes[..len]);
    }
    out
}

fn b64_value(c: u8) -> u8 {
    match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => 0,
    }
}
