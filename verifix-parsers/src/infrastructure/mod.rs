//! Shared parsing support and per-tool parsers

pub mod archive;
pub mod diagnostics;
pub mod json;
pub mod parsers;
