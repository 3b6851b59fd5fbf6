use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{format_millis, write_json, wprintln};
use crate::clone::blink::{decode_ssv, DecodedValue};
use crate::clone::value::Value;
use crate::indexeddb::coding::{CodecConfig, Reader};
use crate::util::hex::{hex_dump, parse_hex};
use crate::IdbError;

/// Options for the value subcommand.
pub struct ValueOptions {
    pub hex: String,
    pub record: bool,
    pub dump: bool,
    pub json: bool,
    pub config: CodecConfig,
}

#[derive(Serialize)]
struct ValueJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    record_version: Option<u64>,
    #[serde(flatten)]
    decoded: DecodedValue,
}

/// Decode one serialized script value and print it.
///
/// With `--record` the bytes are treated as an object store record: a
/// version varint precedes the serialized value.
pub fn execute(opts: &ValueOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let bytes = parse_hex(&opts.hex)?;
    let mut r = Reader::with_config(&bytes, opts.config);
    let record_version = if opts.record {
        Some(r.read_varint()?)
    } else {
        None
    };
    let decoded = decode_ssv(r.rest(), opts.config)?;

    if opts.json {
        return write_json(
            writer,
            &ValueJson {
                record_version,
                decoded,
            },
        );
    }

    wprintln!(writer, "{}", "ENVELOPE".bold())?;
    if let Some(v) = record_version {
        wprintln!(writer, "Record Version: {}", v)?;
    }
    wprintln!(writer, "Wire Version: {}", decoded.wire_version)?;
    wprintln!(writer, "V8 Version: {}", decoded.v8_version)?;
    if decoded.byte_swapped {
        wprintln!(writer, "Byte Order: {}", "swapped pairs".yellow())?;
    }
    wprintln!(writer)?;
    wprintln!(writer, "{}", "VALUE".bold())?;
    wprintln!(writer, "{}", decoded.value)?;

    let mut dates: Vec<(u32, f64)> = decoded
        .value
        .identities()
        .into_iter()
        .filter_map(|(id, v)| match v {
            Value::Date { millis, .. } => Some((id, *millis)),
            _ => None,
        })
        .collect();
    dates.sort_by_key(|(id, _)| *id);
    for (id, millis) in dates {
        wprintln!(writer, "  Date #{}: {}", id, format_millis(millis))?;
    }

    if opts.dump {
        wprintln!(writer)?;
        wprintln!(writer, "{}", "BYTES".bold())?;
        wprintln!(writer, "{}", hex_dump(&bytes, 0))?;
    }
    Ok(())
}
