//! V8 structured clone serializer.
//!
//! The inverse of [`Deserializer`](crate::clone::deserializer::Deserializer):
//! writes a version header and one [`Value`]. Object ids in the input are
//! treated as identities only. The output renumbers them in write order, and
//! any identity met a second time is written as an object reference instead
//! of being serialized again.

use std::collections::HashMap;

use crate::clone::delegate::CloneDelegate;
use crate::clone::tags::{error_tag, SerializationTag, WASM_RAW_BYTES_TAG};
use crate::clone::value::{
    BigInt, BufferOrigin, ErrorPrototype, JsString, ObjectId, StringEncoding, Value,
};
use crate::clone::version::{FormatGates, LATEST_V8_VERSION, V8_HOLE_TAG_VERSION};
use crate::indexeddb::coding::{
    encode_double, encode_varint, encode_zigzag, varint_len, CodecConfig,
};
use crate::IdbError;

/// Oldest version this serializer writes; version 0 is read-only.
pub const MIN_WRITE_VERSION: u32 = 1;

pub struct Serializer<'d> {
    out: Vec<u8>,
    gates: FormatGates,
    config: CodecConfig,
    id_map: HashMap<ObjectId, ObjectId>,
    next_id: ObjectId,
    delegate: Option<&'d mut dyn CloneDelegate>,
}

impl Default for Serializer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> Serializer<'d> {
    pub fn new() -> Self {
        Serializer {
            out: Vec::new(),
            gates: FormatGates::default(),
            config: CodecConfig::default(),
            id_map: HashMap::new(),
            next_id: 1,
            delegate: None,
        }
    }

    /// Write an older V8 version.
    pub fn with_version(mut self, version: u32) -> Result<Self, IdbError> {
        if version > LATEST_V8_VERSION {
            return Err(IdbError::UnsupportedVersion {
                what: "V8 serializer",
                version: u64::from(version),
                supported: u64::from(LATEST_V8_VERSION),
            });
        }
        if version < MIN_WRITE_VERSION {
            return Err(IdbError::Argument(
                "the headerless version 0 layout cannot be written".into(),
            ));
        }
        self.gates = FormatGates::new(version, self.gates.wire_version);
        Ok(self)
    }

    /// Wire version passed to the delegate for host objects.
    pub fn with_wire_version(mut self, wire_version: u32) -> Self {
        self.gates = self.gates.with_wire_version(wire_version);
        self
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_delegate(mut self, delegate: &'d mut dyn CloneDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn gates(&self) -> &FormatGates {
        &self.gates
    }

    /// Append bytes ahead of the V8 payload (an outer envelope).
    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    pub fn write_header(&mut self) {
        self.write_tag(SerializationTag::Version);
        encode_varint(u64::from(self.gates.v8_version), &mut self.out);
    }

    pub fn write_value(&mut self, value: &Value) -> Result<(), IdbError> {
        self.write_object(value)
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    fn write_tag(&mut self, tag: SerializationTag) {
        self.out.push(tag.as_u8());
    }

    fn varint(&mut self, v: u64) {
        encode_varint(v, &mut self.out);
    }

    /// Assign the next write-order id to `source`, or report the id it
    /// already has.
    fn assign_id(&mut self, source: ObjectId) -> Option<ObjectId> {
        if source != 0 {
            if let Some(&existing) = self.id_map.get(&source) {
                return Some(existing);
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        if source != 0 {
            self.id_map.insert(source, id);
        }
        None
    }

    fn write_reference(&mut self, id: ObjectId) {
        self.write_tag(SerializationTag::ObjectReference);
        self.varint(u64::from(id));
    }

    fn write_object(&mut self, value: &Value) -> Result<(), IdbError> {
        use SerializationTag as T;

        // Views are preceded by their buffer, which takes its id first.
        if let Value::ArrayBufferView { id, buffer, .. } = value {
            if *id != 0 {
                if let Some(&existing) = self.id_map.get(id) {
                    self.write_reference(existing);
                    return Ok(());
                }
            }
            return self.write_array_buffer_view(value, buffer);
        }

        if let Some(source) = value.id() {
            if let Some(existing) = self.assign_id(source) {
                self.write_reference(existing);
                return Ok(());
            }
        }

        match value {
            Value::Undefined => self.write_tag(T::Undefined),
            Value::Null => self.write_tag(T::Null),
            Value::Bool(true) => self.write_tag(T::True),
            Value::Bool(false) => self.write_tag(T::False),
            Value::Int32(n) => {
                self.write_tag(T::Int32);
                encode_zigzag(i64::from(*n), &mut self.out);
            }
            Value::Uint32(n) => {
                self.write_tag(T::Uint32);
                self.varint(u64::from(*n));
            }
            Value::Double(n) => {
                self.write_tag(T::Double);
                encode_double(*n, self.config.host_order, &mut self.out);
            }
            Value::BigInt(b) => {
                self.write_tag(T::BigInt);
                self.write_bigint(b)?;
            }
            Value::String(s) => self.write_string(s)?,
            Value::ObjectRef(source) => {
                let id = self
                    .id_map
                    .get(source)
                    .copied()
                    .ok_or(IdbError::UnresolvedReference {
                        kind: "object",
                        id: u64::from(*source),
                    })?;
                self.write_reference(id);
            }
            Value::Object { properties, .. } => {
                self.write_tag(T::BeginJsObject);
                self.write_properties(properties)?;
                self.write_tag(T::EndJsObject);
                self.varint(properties.len() as u64);
            }
            Value::SparseArray {
                length, properties, ..
            } => {
                self.write_tag(T::BeginSparseJsArray);
                self.varint(u64::from(*length));
                self.write_properties(properties)?;
                self.write_tag(T::EndSparseJsArray);
                self.varint(properties.len() as u64);
                self.varint(u64::from(*length));
            }
            Value::DenseArray {
                elements,
                properties,
                ..
            } => {
                self.write_tag(T::BeginDenseJsArray);
                self.varint(elements.len() as u64);
                for element in elements {
                    match element {
                        Some(v) => self.write_object(v)?,
                        None if self.gates.v8_version < V8_HOLE_TAG_VERSION => {
                            self.write_tag(T::Undefined)
                        }
                        None => self.write_tag(T::TheHole),
                    }
                }
                self.write_properties(properties)?;
                self.write_tag(T::EndDenseJsArray);
                self.varint(properties.len() as u64);
                self.varint(elements.len() as u64);
            }
            Value::Date { millis, .. } => {
                self.write_tag(T::Date);
                encode_double(*millis, self.config.host_order, &mut self.out);
            }
            Value::BooleanObject { value, .. } => {
                self.write_tag(if *value { T::TrueObject } else { T::FalseObject })
            }
            Value::NumberObject { value, .. } => {
                self.write_tag(T::NumberObject);
                encode_double(*value, self.config.host_order, &mut self.out);
            }
            Value::BigIntObject { value, .. } => {
                self.write_tag(T::BigIntObject);
                self.write_bigint(value)?;
            }
            Value::StringObject { value, .. } => {
                self.write_tag(T::StringObject);
                self.write_string_payload(value)?;
            }
            Value::RegExp { pattern, flags, .. } => {
                self.write_tag(T::RegExp);
                self.write_string_payload(pattern)?;
                self.varint(u64::from(*flags));
            }
            Value::Map { entries, .. } => {
                self.write_tag(T::BeginJsMap);
                for (k, v) in entries {
                    self.write_object(k)?;
                    self.write_object(v)?;
                }
                self.write_tag(T::EndJsMap);
                self.varint(2 * entries.len() as u64);
            }
            Value::Set { elements, .. } => {
                self.write_tag(T::BeginJsSet);
                for e in elements {
                    self.write_object(e)?;
                }
                self.write_tag(T::EndJsSet);
                self.varint(elements.len() as u64);
            }
            Value::ArrayBuffer { origin, bytes, .. } => match origin {
                BufferOrigin::Inline => {
                    self.write_tag(T::ArrayBuffer);
                    self.varint(bytes.len() as u64);
                    self.out.extend_from_slice(bytes);
                }
                BufferOrigin::Shared { clone_id } => {
                    self.write_tag(T::SharedArrayBuffer);
                    self.varint(u64::from(*clone_id));
                }
                BufferOrigin::Transferred { transfer_id } => {
                    self.write_tag(T::ArrayBufferTransfer);
                    self.varint(u64::from(*transfer_id));
                }
            },
            Value::WasmModule {
                transfer_id,
                wire_bytes,
                compiled_bytes,
                ..
            } => match transfer_id {
                Some(t) => {
                    self.write_tag(T::WasmModuleTransfer);
                    self.varint(u64::from(*t));
                }
                None => {
                    self.write_tag(T::WasmModule);
                    self.out.push(WASM_RAW_BYTES_TAG);
                    self.varint(wire_bytes.len() as u64);
                    self.out.extend_from_slice(wire_bytes);
                    self.varint(compiled_bytes.len() as u64);
                    self.out.extend_from_slice(compiled_bytes);
                }
            },
            Value::WasmMemory {
                maximum_pages,
                buffer,
                ..
            } => {
                if !matches!(
                    buffer.as_ref(),
                    Value::ArrayBuffer {
                        origin: BufferOrigin::Shared { .. },
                        ..
                    }
                ) {
                    return Err(IdbError::Argument(
                        "wasm memory must wrap an inline shared array buffer".into(),
                    ));
                }
                self.write_tag(T::WasmMemoryTransfer);
                encode_zigzag(i64::from(*maximum_pages), &mut self.out);
                self.write_object(buffer)?;
            }
            Value::Error {
                prototype,
                message,
                stack,
                cause,
                ..
            } => {
                self.write_tag(T::Error);
                if let Some(tag) = prototype_tag(*prototype) {
                    self.varint(u64::from(tag));
                }
                if let Some(m) = message {
                    self.varint(u64::from(error_tag::MESSAGE));
                    self.write_string_payload(m)?;
                }
                if let Some(s) = stack {
                    self.varint(u64::from(error_tag::STACK));
                    self.write_string_payload(s)?;
                }
                if let Some(c) = cause {
                    self.varint(u64::from(error_tag::CAUSE));
                    self.write_object(c)?;
                }
                self.varint(u64::from(error_tag::END));
            }
            Value::HostObject { object, .. } => {
                if self.gates.explicit_host_object_tag {
                    self.write_tag(T::HostObject);
                }
                let gates = self.gates;
                let delegate = self.delegate.as_deref_mut().ok_or_else(|| {
                    IdbError::Argument(format!(
                        "cannot serialize host object {} without a delegate",
                        object.kind()
                    ))
                })?;
                delegate.write_host_object(object, &mut self.out, &gates)?;
            }
            Value::ArrayBufferView { buffer, .. } => {
                return self.write_array_buffer_view(value, buffer)
            }
        }
        Ok(())
    }

    fn write_array_buffer_view(&mut self, view: &Value, buffer: &Value) -> Result<(), IdbError> {
        let Value::ArrayBufferView {
            id,
            kind,
            byte_offset,
            byte_length,
            flags,
            ..
        } = view
        else {
            return Err(IdbError::Argument("not an array buffer view".into()));
        };
        let buffer_len = match buffer {
            Value::ArrayBuffer { bytes, .. } => Some(bytes.len() as u64),
            Value::ObjectRef(_) => None,
            other => {
                return Err(IdbError::Argument(format!(
                    "array buffer view backed by a {}",
                    other.type_name()
                )))
            }
        };
        let end = u64::from(*byte_offset) + u64::from(*byte_length);
        if let Some(len) = buffer_len {
            if end > len {
                return Err(IdbError::LengthMismatch {
                    context: "array buffer view range",
                    declared: end,
                    actual: len,
                });
            }
        }
        self.write_object(buffer)?;
        self.assign_id(*id);
        self.write_tag(SerializationTag::ArrayBufferView);
        self.out.push(kind.as_u8());
        self.varint(u64::from(*byte_offset));
        self.varint(u64::from(*byte_length));
        if self.gates.view_flags {
            self.varint(u64::from(*flags));
        }
        Ok(())
    }

    fn write_properties(&mut self, properties: &[(Value, Value)]) -> Result<(), IdbError> {
        for (k, v) in properties {
            if !matches!(
                k,
                Value::String(_) | Value::Int32(_) | Value::Uint32(_) | Value::Double(_)
            ) {
                return Err(IdbError::Argument(format!(
                    "property key must be a string or number, not {}",
                    k.type_name()
                )));
            }
            self.write_object(k)?;
            self.write_object(v)?;
        }
        Ok(())
    }

    fn write_bigint(&mut self, b: &BigInt) -> Result<(), IdbError> {
        if b.byte_length() != b.digits.len() as u64 {
            return Err(IdbError::LengthMismatch {
                context: "bigint digits",
                declared: b.byte_length(),
                actual: b.digits.len() as u64,
            });
        }
        self.varint(b.bitfield);
        self.out.extend_from_slice(&b.digits);
        Ok(())
    }

    fn write_string(&mut self, s: &JsString) -> Result<(), IdbError> {
        match s.encoding {
            StringEncoding::Utf8 => {
                self.write_tag(SerializationTag::Utf8String);
                self.varint(s.text.len() as u64);
                self.out.extend_from_slice(s.text.as_bytes());
            }
            StringEncoding::Latin1 => {
                let bytes = s
                    .text
                    .chars()
                    .map(|c| u8::try_from(u32::from(c)))
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| {
                        IdbError::Argument(format!("{:?} does not fit a one-byte string", s.text))
                    })?;
                self.write_tag(SerializationTag::OneByteString);
                self.varint(bytes.len() as u64);
                self.out.extend_from_slice(&bytes);
            }
            StringEncoding::TwoByte => {
                let order = self.config.host_order;
                let mut bytes = Vec::with_capacity(s.text.len() * 2);
                for unit in s.text.encode_utf16() {
                    let mut buf = [0u8; 2];
                    order.write_u16(&mut buf, unit);
                    bytes.extend_from_slice(&buf);
                }
                // Two-byte payloads start on an even offset.
                if (self.out.len() + 1 + varint_len(bytes.len() as u64)) % 2 != 0 {
                    self.write_tag(SerializationTag::Padding);
                }
                self.write_tag(SerializationTag::TwoByteString);
                self.varint(bytes.len() as u64);
                self.out.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn write_string_payload(&mut self, s: &JsString) -> Result<(), IdbError> {
        if self.gates.string_payload_is_object {
            self.write_string(s)
        } else {
            self.varint(s.text.len() as u64);
            self.out.extend_from_slice(s.text.as_bytes());
            Ok(())
        }
    }
}

fn prototype_tag(prototype: ErrorPrototype) -> Option<u8> {
    match prototype {
        ErrorPrototype::Error => None,
        ErrorPrototype::EvalError => Some(error_tag::EVAL_ERROR_PROTOTYPE),
        ErrorPrototype::RangeError => Some(error_tag::RANGE_ERROR_PROTOTYPE),
        ErrorPrototype::ReferenceError => Some(error_tag::REFERENCE_ERROR_PROTOTYPE),
        ErrorPrototype::SyntaxError => Some(error_tag::SYNTAX_ERROR_PROTOTYPE),
        ErrorPrototype::TypeError => Some(error_tag::TYPE_ERROR_PROTOTYPE),
        ErrorPrototype::UriError => Some(error_tag::URI_ERROR_PROTOTYPE),
    }
}

/// Serialize `value` with a header at the latest version and no delegate.
pub fn serialize(value: &Value) -> Result<Vec<u8>, IdbError> {
    let mut s = Serializer::new();
    s.write_header();
    s.write_value(value)?;
    Ok(s.finish())
}
