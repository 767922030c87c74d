//! Centralized error types for mboxfrm.
//!
//! Only access failures surface as errors. Malformed messages, broken
//! encoded-words and unknown encodings are recovered from locally by the
//! scanner and decoder and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxfrm library.
#[derive(Error, Debug)]
pub enum FrmError {
    /// I/O error with the associated file path.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mailbox file does not exist.
    #[error("{0}: No such file or directory")]
    FileNotFound(PathBuf),

    /// The mailbox file exists but cannot be read.
    #[error("{0}: Permission denied")]
    PermissionDenied(PathBuf),

    /// No mailbox path was given and none could be found in the environment.
    #[error("no mailbox given and MAIL is not set")]
    NoMailbox,
}

/// Convenience alias for `Result<T, FrmError>`.
pub type Result<T> = std::result::Result<T, FrmError>;

impl FrmError {
    /// Create an access error from a path and an `io::Error`.
    ///
    /// `NotFound` and `PermissionDenied` get their own variants so callers
    /// can report them the way `open(2)` would.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}

/// Allow `?` on `std::io::Error` when writing the summary output, where no
/// mailbox path is involved.
impl From<std::io::Error> for FrmError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stdout>"),
            source,
        }
    }
}
