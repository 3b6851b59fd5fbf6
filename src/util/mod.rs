//! Shared utilities (hex formatting and parsing, key/value dump files).

pub mod hex;
pub mod kvdump;
