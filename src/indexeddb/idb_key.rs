//! IndexedDB keys and key paths.
//!
//! [`IndexedDbKey`] is the value every record and index entry is keyed by.
//! Its encoding is a type byte followed by a type-specific payload:
//!
//! | Byte | Type | Payload |
//! |------|------|---------|
//! | 0 | Null | none |
//! | 1 | String | StringWithLength |
//! | 2 | Date | double (ms since epoch) |
//! | 3 | Number | double |
//! | 4 | Array | VarInt count, then that many keys |
//! | 5 | Min | none |
//! | 6 | Binary | Binary |
//!
//! Keys of different types order by type: `Min < Null < Number < Date <
//! String < Binary < Array`. Both sentinels sort below every real key.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::indexeddb::coding::{
    encode_binary, encode_double, encode_string_with_length, encode_varint, Endianness,
    Reader,
};
use crate::indexeddb::constants::*;
use crate::IdbError;

/// Deepest array nesting accepted when decoding a key.
pub const MAX_KEY_DEPTH: usize = 2000;

/// A decoded IndexedDB key.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum IndexedDbKey {
    Null,
    String(String),
    Date(f64),
    Number(f64),
    Array(Vec<IndexedDbKey>),
    Min,
    Binary(Vec<u8>),
}

impl IndexedDbKey {
    /// The on-disk type byte of this key.
    pub fn type_byte(&self) -> u8 {
        match self {
            IndexedDbKey::Null => INDEXED_DB_KEY_NULL_TYPE_BYTE,
            IndexedDbKey::String(_) => INDEXED_DB_KEY_STRING_TYPE_BYTE,
            IndexedDbKey::Date(_) => INDEXED_DB_KEY_DATE_TYPE_BYTE,
            IndexedDbKey::Number(_) => INDEXED_DB_KEY_NUMBER_TYPE_BYTE,
            IndexedDbKey::Array(_) => INDEXED_DB_KEY_ARRAY_TYPE_BYTE,
            IndexedDbKey::Min => INDEXED_DB_KEY_MIN_KEY_TYPE_BYTE,
            IndexedDbKey::Binary(_) => INDEXED_DB_KEY_BINARY_TYPE_BYTE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            IndexedDbKey::Null => "Null",
            IndexedDbKey::String(_) => "String",
            IndexedDbKey::Date(_) => "Date",
            IndexedDbKey::Number(_) => "Number",
            IndexedDbKey::Array(_) => "Array",
            IndexedDbKey::Min => "Min",
            IndexedDbKey::Binary(_) => "Binary",
        }
    }

    /// Position of this key's type in the cross-type ordering.
    fn type_rank(&self) -> u8 {
        match self {
            IndexedDbKey::Min => 0,
            IndexedDbKey::Null => 1,
            IndexedDbKey::Number(_) => 2,
            IndexedDbKey::Date(_) => 3,
            IndexedDbKey::String(_) => 4,
            IndexedDbKey::Binary(_) => 5,
            IndexedDbKey::Array(_) => 6,
        }
    }

    /// Decode one key, leaving the cursor untouched on failure.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, IdbError> {
        reader.atomically(|r| decode_key(r, 0))
    }

    /// Decode a key that must span the whole of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IdbError> {
        let mut reader = Reader::new(data);
        let key = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(IdbError::LengthMismatch {
                context: "IndexedDB key",
                declared: reader.position() as u64,
                actual: data.len() as u64,
            });
        }
        Ok(key)
    }

    /// Append the encoding of this key, writing doubles in `order`.
    pub fn encode_into(&self, order: Endianness, out: &mut Vec<u8>) {
        out.push(self.type_byte());
        match self {
            IndexedDbKey::Null | IndexedDbKey::Min => {}
            IndexedDbKey::String(s) => encode_string_with_length(s, out),
            IndexedDbKey::Date(v) | IndexedDbKey::Number(v) => encode_double(*v, order, out),
            IndexedDbKey::Array(items) => {
                encode_varint(items.len() as u64, out);
                for item in items {
                    item.encode_into(order, out);
                }
            }
            IndexedDbKey::Binary(b) => encode_binary(b, out),
        }
    }

    /// Encode with little-endian doubles.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(Endianness::Little, &mut out);
        out
    }
}

fn decode_key(r: &mut Reader<'_>, depth: usize) -> Result<IndexedDbKey, IdbError> {
    if depth > MAX_KEY_DEPTH {
        return Err(IdbError::Parse(format!(
            "key array nesting exceeds {}",
            MAX_KEY_DEPTH
        )));
    }
    let offset = r.position();
    let tag = r.read_u8()?;
    match tag {
        INDEXED_DB_KEY_NULL_TYPE_BYTE => Ok(IndexedDbKey::Null),
        INDEXED_DB_KEY_MIN_KEY_TYPE_BYTE => Ok(IndexedDbKey::Min),
        INDEXED_DB_KEY_STRING_TYPE_BYTE => r.read_string_with_length().map(IndexedDbKey::String),
        INDEXED_DB_KEY_DATE_TYPE_BYTE => r.read_double().map(IndexedDbKey::Date),
        INDEXED_DB_KEY_NUMBER_TYPE_BYTE => r.read_double().map(IndexedDbKey::Number),
        INDEXED_DB_KEY_BINARY_TYPE_BYTE => r.read_binary().map(|b| IndexedDbKey::Binary(b.to_vec())),
        INDEXED_DB_KEY_ARRAY_TYPE_BYTE => {
            let count = r.read_varint()?;
            // Every element takes at least one byte.
            if count > r.remaining() as u64 {
                return Err(IdbError::LengthMismatch {
                    context: "IndexedDB key array",
                    declared: count,
                    actual: r.remaining() as u64,
                });
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_key(r, depth + 1)?);
            }
            Ok(IndexedDbKey::Array(items))
        }
        _ => Err(IdbError::MalformedTag {
            tag,
            offset,
            context: "IndexedDB key type",
        }),
    }
}

fn compare_doubles(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl Ord for IndexedDbKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use IndexedDbKey::*;
        match (self, other) {
            (Null, Null) | (Min, Min) => Ordering::Equal,
            (String(a), String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Date(a), Date(b)) | (Number(a), Number(b)) => compare_doubles(*a, *b),
            (Binary(a), Binary(b)) => a.cmp(b),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for IndexedDbKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexedDbKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexedDbKey {}

impl fmt::Display for IndexedDbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexedDbKey::Null => write!(f, "Null"),
            IndexedDbKey::Min => write!(f, "Min"),
            IndexedDbKey::String(s) => write!(f, "String({:?})", s),
            IndexedDbKey::Date(v) => write!(f, "Date({})", v),
            IndexedDbKey::Number(v) => write!(f, "Number({})", v),
            IndexedDbKey::Binary(b) => {
                write!(f, "Binary({})", crate::util::hex::format_bytes(b))
            }
            IndexedDbKey::Array(items) => {
                write!(f, "Array[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// How an object store or index derives keys from record values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum IndexedDbKeyPath {
    Null,
    String(String),
    Array(Vec<String>),
}

impl IndexedDbKeyPath {
    /// Decode a key path occupying the rest of the reader.
    ///
    /// Values that do not start with the `00 00` marker are legacy key paths
    /// stored as a bare UTF-16BE string.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, IdbError> {
        reader.atomically(|r| {
            let rest = r.rest();
            if rest.len() < 3
                || rest[0] != INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_1
                || rest[1] != INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_2
            {
                return r.read_string().map(IndexedDbKeyPath::String);
            }
            r.read_bytes(2)?;
            let offset = r.position();
            match r.read_u8()? {
                INDEXED_DB_KEY_PATH_NULL_TYPE_BYTE => Ok(IndexedDbKeyPath::Null),
                INDEXED_DB_KEY_PATH_STRING_TYPE_BYTE => {
                    r.read_string_with_length().map(IndexedDbKeyPath::String)
                }
                INDEXED_DB_KEY_PATH_ARRAY_TYPE_BYTE => {
                    let count = r.read_varint()?;
                    if count > r.remaining() as u64 {
                        return Err(IdbError::LengthMismatch {
                            context: "key path array",
                            declared: count,
                            actual: r.remaining() as u64,
                        });
                    }
                    let mut items = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        items.push(r.read_string_with_length()?);
                    }
                    Ok(IndexedDbKeyPath::Array(items))
                }
                tag => Err(IdbError::MalformedTag {
                    tag,
                    offset,
                    context: "key path type",
                }),
            }
        })
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_1);
        out.push(INDEXED_DB_KEY_PATH_TYPE_CODED_BYTE_2);
        match self {
            IndexedDbKeyPath::Null => out.push(INDEXED_DB_KEY_PATH_NULL_TYPE_BYTE),
            IndexedDbKeyPath::String(s) => {
                out.push(INDEXED_DB_KEY_PATH_STRING_TYPE_BYTE);
                encode_string_with_length(s, out);
            }
            IndexedDbKeyPath::Array(items) => {
                out.push(INDEXED_DB_KEY_PATH_ARRAY_TYPE_BYTE);
                encode_varint(items.len() as u64, out);
                for item in items {
                    encode_string_with_length(item, out);
                }
            }
        }
    }
}

impl fmt::Display for IndexedDbKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexedDbKeyPath::Null => write!(f, "null"),
            IndexedDbKeyPath::String(s) => write!(f, "{:?}", s),
            IndexedDbKeyPath::Array(items) => write!(f, "{:?}", items),
        }
    }
}
