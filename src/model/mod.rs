//! Data models: the per-message record and its display summary.

pub mod summary;
