//! `mboxfrm` prints one line per message in an MBOX file, naming who sent
//! it and what it is about.
//!
//! This crate provides the scanner that walks a memory-mapped mailbox, the
//! header unfolding and RFC 2047 decoding for `From:` and `Subject:`, and
//! the UTF-8 / Latin-9 conversion used for terminal output.

pub mod charset;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
