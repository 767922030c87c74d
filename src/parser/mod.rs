//! Mailbox parsing: MBOX scanning, header unfolding, and encoded-word decoding.

pub mod encoded_word;
pub mod header;
pub mod mbox;
