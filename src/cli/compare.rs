use std::cmp::Ordering;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{write_json, wprintln};
use crate::indexeddb::coding::CodecConfig;
use crate::indexeddb::comparator::Comparator;
use crate::indexeddb::keys::ParsedKey;
use crate::util::hex::parse_hex;
use crate::IdbError;

/// Options for the compare subcommand.
pub struct CompareOptions {
    pub a: String,
    pub b: String,
    pub json: bool,
    pub config: CodecConfig,
}

#[derive(Serialize)]
struct CompareJson {
    comparator: &'static str,
    a: String,
    b: String,
    ordering: &'static str,
}

fn ordering_name(ord: Ordering) -> &'static str {
    match ord {
        Ordering::Less => "less",
        Ordering::Equal => "equal",
        Ordering::Greater => "greater",
    }
}

fn describe(bytes: &[u8], config: CodecConfig) -> String {
    match ParsedKey::decode(bytes, config) {
        Ok(k) => k.to_string(),
        Err(e) => format!("<undecodable: {}>", e),
    }
}

/// Order two keys with `idb_cmp1`.
///
/// Keys the comparator cannot decode are an error rather than a byte-order
/// fallback, since the answer would not match what LevelDB sees.
pub fn execute(opts: &CompareOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let a = parse_hex(&opts.a)?;
    let b = parse_hex(&opts.b)?;
    let cmp = Comparator::new(opts.config);
    let ord = cmp.try_compare(&a, &b)?;

    if opts.json {
        return write_json(
            writer,
            &CompareJson {
                comparator: cmp.name(),
                a: describe(&a, opts.config),
                b: describe(&b, opts.config),
                ordering: ordering_name(ord),
            },
        );
    }

    let symbol = match ord {
        Ordering::Less => "<".green(),
        Ordering::Equal => "=".cyan(),
        Ordering::Greater => ">".yellow(),
    };
    wprintln!(writer, "A: {}", describe(&a, opts.config))?;
    wprintln!(writer, "B: {}", describe(&b, opts.config))?;
    wprintln!(writer, "{}: A {} B ({})", cmp.name(), symbol, ordering_name(ord))?;
    Ok(())
}
