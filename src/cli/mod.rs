//! CLI subcommand implementations for the `idbx` binary.
//!
//! The `idbx` binary inspects Chromium IndexedDB backing stores through text
//! dumps of their LevelDB key/value pairs. CLI argument parsing uses clap
//! derive macros, with the top-level [`app::Cli`] struct and
//! [`app::Commands`] enum defined in [`app`] and shared between `main.rs` and
//! `build.rs` (for man page generation) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct holding
//! the parsed arguments and a `pub fn execute(opts, writer) -> Result<(), IdbError>`
//! entry point. The `writer: &mut dyn Write` parameter allows output to be
//! captured in tests or redirected to a file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `idbx scan` | [`scan`] | Rebuild databases, object stores and records from a dump |
//! | `idbx key` | [`key`] | Classify and describe one encoded key |
//! | `idbx value` | [`value`] | Decode one structured clone value |
//! | `idbx compare` | [`compare`] | Order two keys with `idb_cmp1` |
//! | `idbx check-order` | [`check_order`] | Report ordering inversions in a dump |
//!
//! # Common patterns
//!
//! - **`--json`**: every subcommand supports structured JSON output via
//!   `#[derive(Serialize)]` structs and `serde_json`.
//! - **`--int-order` / `--host-order`** (global): byte order overrides that
//!   end up in a [`CodecConfig`].
//! - **`--color`** (global): control colored terminal output (`auto`,
//!   `always`, `never`).
//! - **`--output` / `-o`** (global): redirect output to a file instead of stdout.
//!
//! Progress bars (via [`indicatif`]) are displayed while `scan` decodes large
//! dumps. The `wprintln!` and `wprint!` macros wrap `writeln!`/`write!` to
//! convert `io::Error` into `IdbError`.

pub mod app;
pub mod check_order;
pub mod compare;
pub mod key;
pub mod scan;
pub mod value;

/// Write a line to the given writer, converting io::Error to IdbError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to IdbError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use std::io::Write;

use chrono::DateTime;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::indexeddb::coding::{CodecConfig, Endianness};
use crate::IdbError;

/// Map the CLI byte order flag onto the codec's [`Endianness`].
pub fn endianness(order: app::ByteOrder) -> Endianness {
    match order {
        app::ByteOrder::Little => Endianness::Little,
        app::ByteOrder::Big => Endianness::Big,
    }
}

/// Build a [`CodecConfig`] from the global byte order flags.
pub fn codec_config(int_order: app::ByteOrder, host_order: app::ByteOrder) -> CodecConfig {
    CodecConfig {
        int_order: endianness(int_order),
        host_order: endianness(host_order),
    }
}

/// Create a styled progress bar for iterating over dump entries.
pub(crate) fn create_progress_bar(count: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(count);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
            unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Render milliseconds since the epoch as an RFC 3339 UTC timestamp.
pub(crate) fn format_millis(millis: f64) -> String {
    if !millis.is_finite() {
        return "Invalid Date".to_string();
    }
    match DateTime::from_timestamp_millis(millis as i64) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// Pretty-print `value` as JSON onto `writer`.
pub(crate) fn write_json<T: Serialize>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), IdbError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))?;
    wprintln!(writer, "{}", json)
}
