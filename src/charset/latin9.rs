//! Conversion between UTF-8 and the single-byte legacy charset.
//!
//! Bytes `0x00..=0xFF` map straight to the code points of the same value,
//! except `0xA4`, which is the Euro sign (U+20AC) as in ISO-8859-15.

/// Legacy byte holding the Euro sign.
pub const EURO: u8 = 0xA4;

/// UTF-8 encoding of U+20AC.
const EURO_UTF8: [u8; 3] = [0xE2, 0x82, 0xAC];

/// Widen legacy bytes to UTF-8.
pub fn legacy_to_utf8(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            EURO => out.extend_from_slice(&EURO_UTF8),
            0x80..=0xFF => {
                out.push(0xC0 | (b >> 6));
                out.push(0x80 | (b & 0x3F));
            }
            _ => out.push(b),
        }
    }
    out
}

/// Narrow UTF-8 to legacy bytes, one byte per code point.
///
/// Code points without a legacy byte become `?`. U+00A4 is among them,
/// since its byte is taken by the Euro sign; it is the one code point up
/// to U+00FF that does not map to its own value. A sequence cut short by the
/// end of input yields a single `?` and ends the conversion.
pub fn utf8_to_legacy(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    while let Some(&lead) = rest.first() {
        let width = sequence_width(lead);
        if width == 1 {
            out.push(lead);
            rest = &rest[1..];
            continue;
        }
        let Some(seq) = rest.get(..width) else {
            out.push(b'?');
            break;
        };
        let code_point = seq[1..]
            .iter()
            .fold(u32::from(lead & (0x7F >> width)), |cp, &c| {
                (cp << 6) | u32::from(c & 0x3F)
            });
        out.push(legacy_byte(code_point));
        rest = &rest[width..];
    }
    out
}

/// Length of the UTF-8 sequence announced by a leading byte.
///
/// Stray continuation bytes count as single bytes and pass through as-is.
fn sequence_width(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

fn legacy_byte(code_point: u32) -> u8 {
    match code_point {
        0x20AC => EURO,
        0xA4 => b'?',
        0..=0xFF => code_point as u8,
        _ => b'?',
    }
}
