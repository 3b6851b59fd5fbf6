//! Text dumps of LevelDB key/value pairs.
//!
//! A dump has one pair per line: the key in hex, whitespace, then the value
//! in hex. The value may be omitted for an empty value. Blank lines and
//! lines starting with `#` are ignored.

use std::path::Path;

use crate::util::hex::parse_hex;
use crate::IdbError;

/// One pair from a dump, with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub line: usize,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Parse dump text.
pub fn parse_dump(text: &str) -> Result<Vec<KvPair>, IdbError> {
    let mut pairs = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let key = fields.next().unwrap_or_default();
        let value = fields.next().unwrap_or_default();
        if fields.next().is_some() {
            return Err(IdbError::Parse(format!(
                "line {}: expected '<hex key> <hex value>'",
                i + 1
            )));
        }
        let located = |e: IdbError| IdbError::Parse(format!("line {}: {}", i + 1, e));
        pairs.push(KvPair {
            line: i + 1,
            key: parse_hex(key).map_err(located)?,
            value: parse_hex(value).map_err(located)?,
        });
    }
    Ok(pairs)
}

/// Read and parse a dump file.
pub fn read_dump(path: &Path) -> Result<Vec<KvPair>, IdbError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| IdbError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_dump(&text)
}
