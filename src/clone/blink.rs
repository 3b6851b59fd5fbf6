//! Blink serialized script values.
//!
//! IndexedDB record values are Blink `SerializedScriptValue`s: an optional
//! Blink envelope (`0xFF <wire version>`, plus a trailer offset from wire
//! version 21), then a V8 payload whose host objects are Blink DOM objects.
//!
//! Payloads written by some older builds are stored as host-order 16-bit
//! units and have their bytes swapped in pairs; [`is_byte_swapped`] detects
//! those before decoding.

use std::borrow::Cow;

use serde::Serialize;
use tracing::debug;

use crate::clone::delegate::CloneDelegate;
use crate::clone::deserializer::Deserializer;
use crate::clone::host::{read_dom_object, write_dom_object, HostObject};
use crate::clone::serializer::Serializer;
use crate::clone::tags::SerializationTag;
use crate::clone::value::Value;
use crate::clone::version::{
    FormatGates, LATEST_V8_VERSION, LATEST_WIRE_VERSION, MIN_VERSION_FOR_SEPARATE_ENVELOPE,
};
use crate::indexeddb::coding::{encode_varint, CodecConfig, Endianness, Reader};
use crate::IdbError;

/// Tag introducing the trailer location (offset u64, size u32).
pub const TRAILER_OFFSET_TAG: u8 = 0xFE;
const TRAILER_OFFSET_LEN: usize = 8 + 4;
/// Wire version the byte-swap heuristic was tuned against.
const SWAP_HEURISTIC_VERSION: u8 = 35;

/// Detect a payload stored with its bytes swapped in pairs.
///
/// Short payloads, and payloads that do not start with a recognizable
/// version tag, are treated as swapped.
pub fn is_byte_swapped(data: &[u8]) -> bool {
    let version_tag = SerializationTag::Version.as_u8();
    if data.len() < 4 {
        return true;
    }
    if data[0] == version_tag {
        // A real version byte stays below the heuristic limit.
        return data[1] >= SWAP_HEURISTIC_VERSION;
    }
    if data[1] == version_tag {
        return data[0] != version_tag;
    }
    true
}

/// Swap each pair of bytes. An odd trailing byte is kept as is.
pub fn swap_pairs(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

/// Blink wire version read from a separate envelope, and the bytes it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub wire_version: u32,
    pub header_len: usize,
}

/// Read the Blink envelope, if the payload has one.
///
/// Versions below 16 share their header with V8, so no envelope is
/// consumed and `None` is returned.
pub fn read_envelope(data: &[u8]) -> Result<Option<Envelope>, IdbError> {
    let mut r = Reader::new(data);
    if r.peek_u8().ok() != Some(SerializationTag::Version.as_u8()) {
        return Ok(None);
    }
    r.read_u8()?;
    let version = r.read_varint_u32()?;
    if version < MIN_VERSION_FOR_SEPARATE_ENVELOPE {
        return Ok(None);
    }
    if version > LATEST_WIRE_VERSION {
        return Err(IdbError::UnsupportedVersion {
            what: "Blink wire format",
            version: u64::from(version),
            supported: u64::from(LATEST_WIRE_VERSION),
        });
    }
    let gates = FormatGates::new(0, version);
    if gates.trailer_offset && r.peek_u8().ok() == Some(TRAILER_OFFSET_TAG) {
        r.read_u8()?;
        r.read_bytes(TRAILER_OFFSET_LEN)?;
    }
    Ok(Some(Envelope {
        wire_version: version,
        header_len: r.position(),
    }))
}

/// Delegate that decodes Blink DOM objects and resolves transferred or
/// shared buffers from the tables it holds.
#[derive(Debug, Clone, Default)]
pub struct BlinkDelegate {
    pub shared_buffers: Vec<Vec<u8>>,
    pub transferred_buffers: Vec<Vec<u8>>,
    pub wasm_modules: Vec<(Vec<u8>, Vec<u8>)>,
}

fn lookup<T: Clone>(table: &[T], id: u32, kind: &'static str) -> Result<T, IdbError> {
    table
        .get(id as usize)
        .cloned()
        .ok_or(IdbError::UnresolvedReference {
            kind,
            id: u64::from(id),
        })
}

impl CloneDelegate for BlinkDelegate {
    fn read_host_object(
        &mut self,
        reader: &mut Reader<'_>,
        gates: &FormatGates,
    ) -> Result<HostObject, IdbError> {
        read_dom_object(reader, gates)
    }

    fn write_host_object(
        &mut self,
        object: &HostObject,
        out: &mut Vec<u8>,
        gates: &FormatGates,
    ) -> Result<(), IdbError> {
        write_dom_object(object, gates, Endianness::Little, out)
    }

    fn shared_array_buffer(&mut self, clone_id: u32) -> Result<Vec<u8>, IdbError> {
        lookup(&self.shared_buffers, clone_id, "shared array buffer")
    }

    fn transferred_array_buffer(&mut self, transfer_id: u32) -> Result<Vec<u8>, IdbError> {
        lookup(&self.transferred_buffers, transfer_id, "transferred array buffer")
    }

    fn wasm_module(&mut self, transfer_id: u32) -> Result<(Vec<u8>, Vec<u8>), IdbError> {
        lookup(&self.wasm_modules, transfer_id, "wasm module")
    }
}

/// A decoded record value with the versions it was written at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedValue {
    pub wire_version: u32,
    pub v8_version: u32,
    pub byte_swapped: bool,
    pub value: Value,
}

/// Decode a serialized script value with the default [`BlinkDelegate`].
pub fn decode_ssv(data: &[u8], config: CodecConfig) -> Result<DecodedValue, IdbError> {
    decode_ssv_with(data, config, &mut BlinkDelegate::default())
}

pub fn decode_ssv_with(
    data: &[u8],
    config: CodecConfig,
    delegate: &mut dyn CloneDelegate,
) -> Result<DecodedValue, IdbError> {
    let byte_swapped = is_byte_swapped(data);
    let bytes: Cow<'_, [u8]> = if byte_swapped {
        debug!(len = data.len(), "value is byte-swapped");
        Cow::Owned(swap_pairs(data))
    } else {
        Cow::Borrowed(data)
    };

    let envelope = read_envelope(&bytes)?;
    let payload = match envelope {
        Some(e) => &bytes[e.header_len..],
        None => &bytes[..],
    };
    let mut de = Deserializer::new(payload, config, delegate);
    if let Some(e) = envelope {
        de.set_wire_version(e.wire_version);
    }
    let v8_version = de.read_header()?;
    let value = de.read_value()?;
    Ok(DecodedValue {
        wire_version: envelope.map_or(v8_version, |e| e.wire_version),
        v8_version,
        byte_swapped,
        value,
    })
}

/// Encode a value as a serialized script value at the latest versions.
pub fn encode_ssv(value: &Value) -> Result<Vec<u8>, IdbError> {
    encode_ssv_with(
        value,
        LATEST_WIRE_VERSION,
        LATEST_V8_VERSION,
        &mut BlinkDelegate::default(),
    )
}

/// Encode with explicit versions. Wire versions below 16 share the V8
/// header and must equal `v8_version`.
pub fn encode_ssv_with(
    value: &Value,
    wire_version: u32,
    v8_version: u32,
    delegate: &mut dyn CloneDelegate,
) -> Result<Vec<u8>, IdbError> {
    if wire_version > LATEST_WIRE_VERSION {
        return Err(IdbError::UnsupportedVersion {
            what: "Blink wire format",
            version: u64::from(wire_version),
            supported: u64::from(LATEST_WIRE_VERSION),
        });
    }
    let separate = wire_version >= MIN_VERSION_FOR_SEPARATE_ENVELOPE;
    if !separate && wire_version != v8_version {
        return Err(IdbError::Argument(format!(
            "wire version {} has no envelope of its own and must match V8 version {}",
            wire_version, v8_version
        )));
    }
    let mut s = Serializer::new()
        .with_version(v8_version)?
        .with_wire_version(wire_version)
        .with_delegate(delegate);
    if separate {
        let mut envelope = vec![SerializationTag::Version.as_u8()];
        encode_varint(u64::from(wire_version), &mut envelope);
        if s.gates().trailer_offset {
            envelope.push(TRAILER_OFFSET_TAG);
            envelope.extend_from_slice(&[0u8; TRAILER_OFFSET_LEN]);
        }
        s.write_raw_bytes(&envelope);
    }
    s.write_header();
    s.write_value(value)?;
    Ok(s.finish())
}
