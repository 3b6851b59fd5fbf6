//! Primitive byte-level codec.
//!
//! Every other layer of the crate is built on the [`Reader`] cursor defined
//! here and on the matching `encode_*` functions. Reads are atomic: a failed
//! read returns an error and leaves the cursor where it was.
//!
//! | Encoding | Layout |
//! |----------|--------|
//! | VarInt | base-128, least significant group first, high bit = continuation |
//! | Zig-zag | `n >= 0 -> 2n`, `n < 0 -> -2n - 1`, then VarInt |
//! | Double | 8 bytes IEEE-754 in [`CodecConfig::host_order`] |
//! | Int | 1-8 bytes in [`CodecConfig::int_order`], minimal width |
//! | StringWithLength | VarInt code unit count, then UTF-16BE code units |
//! | String | UTF-16BE code units filling the rest of the buffer |
//! | Binary | VarInt byte count, then raw bytes |

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;

use crate::IdbError;

/// Maximum number of bytes a 64-bit varint may occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Byte order of a fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Endianness {
    /// Least significant byte first (Chrome on every shipping platform).
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl Endianness {
    pub fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endianness::Little => LittleEndian::read_f64(buf),
            Endianness::Big => BigEndian::read_f64(buf),
        }
    }

    pub fn write_f64(self, buf: &mut [u8], value: f64) {
        match self {
            Endianness::Little => LittleEndian::write_f64(buf, value),
            Endianness::Big => BigEndian::write_f64(buf, value),
        }
    }

    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Endianness::Little => LittleEndian::write_u16(buf, value),
            Endianness::Big => BigEndian::write_u16(buf, value),
        }
    }

    /// Read an unsigned integer of `buf.len()` bytes (1 to 8).
    pub fn read_uint(self, buf: &[u8]) -> u64 {
        match self {
            Endianness::Little => LittleEndian::read_uint(buf, buf.len()),
            Endianness::Big => BigEndian::read_uint(buf, buf.len()),
        }
    }

    /// Write `value` into all of `buf` (1 to 8 bytes).
    pub fn write_uint(self, buf: &mut [u8], value: u64) {
        let n = buf.len();
        match self {
            Endianness::Little => LittleEndian::write_uint(buf, value, n),
            Endianness::Big => BigEndian::write_uint(buf, value, n),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Little => "little-endian",
            Endianness::Big => "big-endian",
        }
    }
}

/// Byte order settings for fields whose endianness was chosen by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CodecConfig {
    /// Fixed-width "Int" fields: key prefix ids and integer metadata values.
    pub int_order: Endianness,
    /// Host-native fields: doubles and two-byte V8 string code units.
    pub host_order: Endianness,
}

/// Cursor over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    config: CodecConfig,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, CodecConfig::default())
    }

    pub fn with_config(data: &'a [u8], config: CodecConfig) -> Self {
        Reader {
            data,
            pos: 0,
            config,
        }
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The unread part of the buffer, without consuming it.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn ensure(&self, needed: usize) -> Result<(), IdbError> {
        if self.remaining() < needed {
            return Err(IdbError::TruncatedInput {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Run `f`, rewinding the cursor if it fails.
    pub fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, IdbError>,
    ) -> Result<T, IdbError> {
        let start = self.pos;
        let result = f(self);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    pub fn peek_u8(&self) -> Result<u8, IdbError> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8, IdbError> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], IdbError> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consume and return everything left in the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Decode an unsigned base-128 varint.
    pub fn read_varint(&mut self) -> Result<u64, IdbError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        let mut i = self.pos;
        loop {
            let Some(&byte) = self.data.get(i) else {
                return Err(IdbError::TruncatedInput {
                    offset: self.pos,
                    needed: i - self.pos + 1,
                    available: self.remaining(),
                });
            };
            let group = u64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && group > 1) {
                return Err(IdbError::Parse(format!(
                    "varint at offset {} overflows 64 bits",
                    self.pos
                )));
            }
            value |= group << shift;
            i += 1;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        self.pos = i;
        Ok(value)
    }

    /// Decode a varint that must fit in 32 bits.
    pub fn read_varint_u32(&mut self) -> Result<u32, IdbError> {
        self.atomically(|r| {
            let offset = r.pos;
            let v = r.read_varint()?;
            u32::try_from(v).map_err(|_| {
                IdbError::Parse(format!("varint {} at offset {} exceeds 32 bits", v, offset))
            })
        })
    }

    /// Decode a zig-zag encoded signed varint.
    pub fn read_zigzag(&mut self) -> Result<i64, IdbError> {
        self.read_varint().map(zigzag_decode)
    }

    /// Decode an 8-byte IEEE-754 double in the configured host order.
    pub fn read_double(&mut self) -> Result<f64, IdbError> {
        let bytes = self.read_bytes(8)?;
        Ok(self.config.host_order.read_f64(bytes))
    }

    /// Decode a `width`-byte unsigned integer in the configured int order.
    pub fn read_fixed_uint(&mut self, width: usize) -> Result<u64, IdbError> {
        if width == 0 || width > 8 {
            return Err(IdbError::Parse(format!(
                "fixed integer width {} out of range 1..=8",
                width
            )));
        }
        let bytes = self.read_bytes(width)?;
        Ok(self.config.int_order.read_uint(bytes))
    }

    /// Decode an "Int" that fills the rest of the buffer (empty means 0).
    pub fn read_int(&mut self) -> Result<u64, IdbError> {
        match self.remaining() {
            0 => Ok(0),
            n if n <= 8 => self.read_fixed_uint(n),
            n => Err(IdbError::LengthMismatch {
                context: "fixed integer",
                declared: 8,
                actual: n as u64,
            }),
        }
    }

    /// Decode a one-byte boolean (any non-zero byte is `true`).
    pub fn read_bool(&mut self) -> Result<bool, IdbError> {
        self.read_u8().map(|b| b != 0)
    }

    /// Decode a length-prefixed UTF-16BE string as raw code units.
    pub fn read_utf16_with_length(&mut self) -> Result<Vec<u16>, IdbError> {
        self.atomically(|r| {
            let count = r.read_varint()?;
            let byte_len = count
                .checked_mul(2)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or(IdbError::LengthMismatch {
                    context: "string with length",
                    declared: count,
                    actual: r.remaining() as u64 / 2,
                })?;
            let bytes = r.read_bytes(byte_len)?;
            Ok(utf16be_units(bytes))
        })
    }

    /// Decode a length-prefixed UTF-16BE string.
    pub fn read_string_with_length(&mut self) -> Result<String, IdbError> {
        self.read_utf16_with_length()
            .map(|units| String::from_utf16_lossy(&units))
    }

    /// Decode a UTF-16BE string that fills the rest of the buffer.
    pub fn read_string(&mut self) -> Result<String, IdbError> {
        if self.remaining() % 2 != 0 {
            return Err(IdbError::LengthMismatch {
                context: "UTF-16BE string",
                declared: self.remaining() as u64,
                actual: (self.remaining() - 1) as u64,
            });
        }
        let units = utf16be_units(self.read_rest());
        Ok(String::from_utf16_lossy(&units))
    }

    /// Decode a length-prefixed byte string.
    pub fn read_binary(&mut self) -> Result<&'a [u8], IdbError> {
        self.atomically(|r| {
            let len = r.read_varint()?;
            let len = usize::try_from(len).map_err(|_| IdbError::LengthMismatch {
                context: "binary",
                declared: len,
                actual: r.remaining() as u64,
            })?;
            r.read_bytes(len)
        })
    }
}

fn utf16be_units(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(BigEndian::read_u16).collect()
}

/// Map a signed value onto the unsigned zig-zag space.
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes [`encode_varint`] emits for `value`.
pub fn varint_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

/// Minimal byte width of `value` as a fixed-width integer (1 for 0).
pub fn minimal_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn encode_zigzag(value: i64, out: &mut Vec<u8>) {
    encode_varint(zigzag_encode(value), out);
}

pub fn encode_double(value: f64, order: Endianness, out: &mut Vec<u8>) {
    let mut buf = [0u8; 8];
    order.write_f64(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Emit `value` as exactly `width` bytes.
pub fn encode_fixed_uint(value: u64, width: usize, order: Endianness, out: &mut Vec<u8>) {
    let mut buf = [0u8; 8];
    order.write_uint(&mut buf[..width], value);
    out.extend_from_slice(&buf[..width]);
}

/// Emit `value` as an "Int" of minimal width.
pub fn encode_int(value: u64, order: Endianness, out: &mut Vec<u8>) {
    encode_fixed_uint(value, minimal_width(value), order, out);
}

pub fn encode_bool(value: bool, out: &mut Vec<u8>) {
    out.push(u8::from(value));
}

/// Emit a UTF-16BE string without a length prefix.
pub fn encode_string(value: &str, out: &mut Vec<u8>) {
    for unit in value.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
}

pub fn encode_string_with_length(value: &str, out: &mut Vec<u8>) {
    encode_varint(value.encode_utf16().count() as u64, out);
    encode_string(value, out);
}

pub fn encode_binary(value: &[u8], out: &mut Vec<u8>) {
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}
