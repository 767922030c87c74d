//! Display charset handling.
//!
//! The terminal either speaks UTF-8 or a single-byte Latin-9 style charset.
//! Which one is decided once at startup from the locale and then passed
//! down the scan unchanged.

pub mod latin9;

/// The charset summary lines are written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayCharset {
    /// UTF-8 terminal (default)
    #[default]
    Utf8,
    /// Single-byte legacy terminal with the Euro sign at `0xA4`
    Latin9,
}

impl DisplayCharset {
    /// Classify a locale string such as `fi_FI.UTF-8`, `en_US.utf8@euro`
    /// or `C`.
    ///
    /// Only the codeset after the `.` matters. Anything without a UTF-8
    /// codeset, including `C` and `POSIX`, is treated as the legacy charset.
    pub fn from_locale_value(value: &str) -> Self {
        let codeset = value
            .split_once('.')
            .map(|(_, rest)| rest.split('@').next().unwrap_or(""))
            .unwrap_or("");
        if codeset.eq_ignore_ascii_case("utf-8") || codeset.eq_ignore_ascii_case("utf8") {
            Self::Utf8
        } else {
            Self::Latin9
        }
    }

    /// Detect the charset from `LC_ALL`, `LC_CTYPE` and `LANG`, in that order.
    pub fn from_locale() -> Self {
        ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.is_empty())
            .map(|v| Self::from_locale_value(&v))
            .unwrap_or(Self::Latin9)
    }
}

/// Whether a MIME charset label names UTF-8 (`UTF-8`, `utf8`, ...).
pub fn is_utf8_label(label: &[u8]) -> bool {
    encoding_rs::Encoding::for_label(label) == Some(encoding_rs::UTF_8)
}

/// Convert bytes declared in `source_charset` for display in `display`.
///
/// UTF-8 text shown on a legacy terminal is squeezed down to single bytes;
/// any other charset shown on a UTF-8 terminal is assumed to be the legacy
/// charset and widened. Everything else passes through untouched.
pub fn transcode(source_charset: &[u8], bytes: Vec<u8>, display: DisplayCharset) -> Vec<u8> {
    match (is_utf8_label(source_charset), display) {
        (true, DisplayCharset::Latin9) => latin9::utf8_to_legacy(&bytes),
        (false, DisplayCharset::Utf8) => latin9::legacy_to_utf8(&bytes),
        _ => bytes,
    }
}
