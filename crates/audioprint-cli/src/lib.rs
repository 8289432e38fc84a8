//! Shared helpers for the audioprint command-line tools

pub mod output;
