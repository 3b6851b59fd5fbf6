use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{write_json, wprintln};
use crate::indexeddb::coding::{CodecConfig, Reader};
use crate::indexeddb::key_prefix::{KeyPrefix, KeyType};
use crate::indexeddb::keys::ParsedKey;
use crate::util::hex::{format_bytes, hex_dump, parse_hex};
use crate::IdbError;

/// Options for the key subcommand.
pub struct KeyOptions {
    pub hex: String,
    pub json: bool,
    pub config: CodecConfig,
}

#[derive(Serialize)]
struct KeyJson {
    hex: String,
    prefix: KeyPrefix,
    key_type: KeyType,
    description: String,
    key: ParsedKey,
}

/// Decode one backing store key and describe it.
///
/// The prefix is printed even when the suffix fails to decode, so a damaged
/// key still shows which database and object store it belongs to.
pub fn execute(opts: &KeyOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let bytes = parse_hex(&opts.hex)?;
    let mut r = Reader::with_config(&bytes, opts.config);
    let prefix = KeyPrefix::decode(&mut r)?;
    let prefix_len = r.position();
    let parsed = ParsedKey::decode_suffix(prefix, &mut r);

    if opts.json {
        let key = parsed?;
        return write_json(
            writer,
            &KeyJson {
                hex: format_bytes(&bytes),
                prefix,
                key_type: prefix.key_type(),
                description: key.to_string(),
                key,
            },
        );
    }

    wprintln!(writer, "{}", "KEY PREFIX".bold())?;
    wprintln!(writer, "Database ID: {}", prefix.database_id)?;
    wprintln!(writer, "Object Store ID: {}", prefix.object_store_id)?;
    wprintln!(writer, "Index ID: {}", prefix.index_id)?;
    wprintln!(writer, "Type: {}", prefix.key_type())?;
    wprintln!(writer, "Prefix Length: {} bytes", prefix_len)?;
    wprintln!(writer)?;

    let key = match parsed {
        Ok(k) => k,
        Err(e) => {
            wprintln!(writer, "Suffix: {} {}", "UNDECODABLE".red(), e)?;
            return Err(e);
        }
    };
    wprintln!(writer, "{}", "DESCRIPTION".bold())?;
    wprintln!(writer, "{}", key)?;
    if r.remaining() > 0 {
        wprintln!(
            writer,
            "{} {} trailing byte(s) after the key",
            "Warning:".yellow(),
            r.remaining()
        )?;
    }
    wprintln!(writer)?;
    wprintln!(writer, "{}", "BYTES".bold())?;
    wprintln!(writer, "{}", hex_dump(&bytes, 0))?;
    Ok(())
}
