//! V8 structured clone deserializer.
//!
//! Reads the optional version header, then one value. Payloads with version
//! 0 (no header) use the legacy whole-buffer layout, where containers are
//! closed by end tags that pop their members off a value stack.
//!
//! Object ids are allocated in the same order V8 allocates them, so an
//! [`ObjectReference`](SerializationTag::ObjectReference) in the payload
//! decodes to a [`Value::ObjectRef`] carrying the id of the right object.

use std::collections::HashMap;

use crate::clone::delegate::{CloneDelegate, NoDelegate};
use crate::clone::tags::{error_tag, SerializationTag, ViewKind, WASM_RAW_BYTES_TAG};
use crate::clone::value::{
    BigInt, BufferOrigin, ErrorPrototype, JsString, ObjectId, StringEncoding, Value,
};
use crate::clone::version::{FormatGates, LATEST_V8_VERSION};
use crate::indexeddb::coding::{CodecConfig, Reader};
use crate::IdbError;

/// Nesting limit for containers; deeper payloads are rejected.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// What an allocated object id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
    ArrayBuffer { byte_length: usize },
    Other,
}

pub struct Deserializer<'a, 'd> {
    reader: Reader<'a>,
    gates: FormatGates,
    wire_version: Option<u32>,
    next_id: ObjectId,
    identities: HashMap<ObjectId, Identity>,
    delegate: &'d mut dyn CloneDelegate,
    depth: usize,
}

impl<'a, 'd> Deserializer<'a, 'd> {
    pub fn new(data: &'a [u8], config: CodecConfig, delegate: &'d mut dyn CloneDelegate) -> Self {
        Deserializer {
            reader: Reader::with_config(data, config),
            gates: FormatGates::v8(0),
            wire_version: None,
            next_id: 1,
            identities: HashMap::new(),
            delegate,
            depth: 0,
        }
    }

    /// Set the Blink wire version host objects are decoded against. Without
    /// it, the wire version follows the V8 version.
    pub fn set_wire_version(&mut self, wire_version: u32) {
        self.wire_version = Some(wire_version);
        self.gates = self.gates.with_wire_version(wire_version);
    }

    pub fn gates(&self) -> &FormatGates {
        &self.gates
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Consume the `0xFF <varint version>` header if present.
    ///
    /// Returns the V8 version, 0 when the header is absent.
    pub fn read_header(&mut self) -> Result<u32, IdbError> {
        let version = if self.reader.peek_u8().ok() == Some(SerializationTag::Version.as_u8()) {
            self.reader.atomically(|r| {
                r.read_u8()?;
                r.read_varint_u32()
            })?
        } else {
            0
        };
        if version > LATEST_V8_VERSION {
            return Err(IdbError::UnsupportedVersion {
                what: "V8 serializer",
                version: u64::from(version),
                supported: u64::from(LATEST_V8_VERSION),
            });
        }
        let wire = self.wire_version.unwrap_or(version);
        self.gates = FormatGates::new(version, wire);
        Ok(version)
    }

    /// Read the payload's value.
    pub fn read_value(&mut self) -> Result<Value, IdbError> {
        if self.gates.legacy_whole_buffer {
            self.read_legacy()
        } else {
            self.read_object()
        }
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn register(&mut self, id: ObjectId, identity: Identity) {
        self.identities.insert(id, identity);
    }

    /// Skip padding and return the next tag byte without consuming it.
    fn peek_tag(&mut self) -> Result<u8, IdbError> {
        loop {
            let b = self.reader.peek_u8()?;
            if b != SerializationTag::Padding.as_u8() {
                return Ok(b);
            }
            self.reader.read_u8()?;
        }
    }

    fn read_tag(&mut self) -> Result<u8, IdbError> {
        self.peek_tag()?;
        self.reader.read_u8()
    }

    fn expect_tag(&mut self, tag: SerializationTag, context: &'static str) -> Result<(), IdbError> {
        let offset = self.reader.position();
        let b = self.read_tag()?;
        if b != tag.as_u8() {
            return Err(IdbError::MalformedTag {
                tag: b,
                offset,
                context,
            });
        }
        Ok(())
    }

    fn is_array_buffer(&self, value: &Value) -> Option<usize> {
        match value {
            Value::ArrayBuffer { bytes, .. } => Some(bytes.len()),
            Value::ObjectRef(id) => match self.identities.get(id) {
                Some(Identity::ArrayBuffer { byte_length }) => Some(*byte_length),
                _ => None,
            },
            _ => None,
        }
    }

    fn read_object(&mut self) -> Result<Value, IdbError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(IdbError::Parse(format!(
                "values nested deeper than {} at offset {}",
                MAX_NESTING_DEPTH,
                self.reader.position()
            )));
        }
        self.depth += 1;
        let result = self.read_object_internal();
        self.depth -= 1;
        let value = result?;

        // A view is written right after the buffer it looks into.
        if let Some(buffer_len) = self.is_array_buffer(&value) {
            if matches!(self.peek_tag(), Ok(b) if b == SerializationTag::ArrayBufferView.as_u8()) {
                self.reader.read_u8()?;
                return self.read_array_buffer_view(value, buffer_len);
            }
        }
        Ok(value)
    }

    fn read_object_internal(&mut self) -> Result<Value, IdbError> {
        let byte = self.peek_tag()?;
        let offset = self.reader.position();
        let Some(tag) = SerializationTag::from_u8(byte).filter(|t| is_value_tag(*t)) else {
            return self.read_unknown_tag(byte, offset);
        };
        self.reader.read_u8()?;

        use SerializationTag as T;
        match tag {
            T::VerifyObjectCount => {
                // Obsolete object count check.
                self.reader.read_varint_u32()?;
                self.read_object()
            }
            T::Undefined => Ok(Value::Undefined),
            T::Null => Ok(Value::Null),
            T::True => Ok(Value::Bool(true)),
            T::False => Ok(Value::Bool(false)),
            T::Int32 => self.read_int32().map(Value::Int32),
            T::Uint32 => self.reader.read_varint_u32().map(Value::Uint32),
            T::Double => self.reader.read_double().map(Value::Double),
            T::BigInt => self.read_bigint().map(Value::BigInt),
            T::Utf8String => self.read_utf8_string().map(Value::String),
            T::OneByteString => self.read_one_byte_string().map(Value::String),
            T::TwoByteString => self.read_two_byte_string().map(Value::String),
            T::ObjectReference => {
                let id = self.reader.read_varint_u32()?;
                if !self.identities.contains_key(&id) {
                    return Err(IdbError::UnresolvedReference {
                        kind: "object",
                        id: u64::from(id),
                    });
                }
                Ok(Value::ObjectRef(id))
            }
            T::BeginJsObject => self.read_js_object(),
            T::BeginSparseJsArray => self.read_sparse_array(),
            T::BeginDenseJsArray => self.read_dense_array(),
            T::Date => {
                let id = self.allocate_id();
                let millis = self.reader.read_double()?;
                self.register(id, Identity::Other);
                Ok(Value::Date { id, millis })
            }
            T::TrueObject | T::FalseObject => {
                let id = self.allocate_id();
                self.register(id, Identity::Other);
                Ok(Value::BooleanObject {
                    id,
                    value: tag == T::TrueObject,
                })
            }
            T::NumberObject => {
                let id = self.allocate_id();
                let value = self.reader.read_double()?;
                self.register(id, Identity::Other);
                Ok(Value::NumberObject { id, value })
            }
            T::BigIntObject => {
                let id = self.allocate_id();
                let value = self.read_bigint()?;
                self.register(id, Identity::Other);
                Ok(Value::BigIntObject { id, value })
            }
            T::StringObject => {
                let id = self.allocate_id();
                let value = self.read_string_payload()?;
                self.register(id, Identity::Other);
                Ok(Value::StringObject { id, value })
            }
            T::RegExp => {
                let id = self.allocate_id();
                let pattern = self.read_string_payload()?;
                let flags = self.reader.read_varint_u32()?;
                self.register(id, Identity::Other);
                Ok(Value::RegExp { id, pattern, flags })
            }
            T::BeginJsMap => self.read_map(),
            T::BeginJsSet => self.read_set(),
            T::ArrayBuffer => self.read_inline_array_buffer(),
            T::ArrayBufferTransfer => {
                let id = self.allocate_id();
                let transfer_id = self.reader.read_varint_u32()?;
                let bytes = self.delegate.transferred_array_buffer(transfer_id)?;
                self.register(
                    id,
                    Identity::ArrayBuffer {
                        byte_length: bytes.len(),
                    },
                );
                Ok(Value::ArrayBuffer {
                    id,
                    origin: BufferOrigin::Transferred { transfer_id },
                    bytes,
                })
            }
            T::SharedArrayBuffer => self.read_shared_array_buffer(),
            T::WasmModule => self.read_wasm_module(),
            T::WasmModuleTransfer => {
                let transfer_id = self.reader.read_varint_u32()?;
                let (wire_bytes, compiled_bytes) = self.delegate.wasm_module(transfer_id)?;
                let id = self.allocate_id();
                self.register(id, Identity::Other);
                Ok(Value::WasmModule {
                    id,
                    transfer_id: Some(transfer_id),
                    wire_bytes,
                    compiled_bytes,
                })
            }
            T::WasmMemoryTransfer => self.read_wasm_memory(),
            T::HostObject => self.read_host_object(),
            T::Error => self.read_error(),
            T::Version
            | T::Padding
            | T::TheHole
            | T::EndJsObject
            | T::EndSparseJsArray
            | T::EndDenseJsArray
            | T::EndJsMap
            | T::EndJsSet
            | T::ArrayBufferView => Err(IdbError::MalformedTag {
                tag: byte,
                offset,
                context: "tag not valid at the start of a value",
            }),
        }
    }

    /// Before host objects had their own tag, any unknown tag belonged to the host.
    fn read_unknown_tag(&mut self, byte: u8, offset: usize) -> Result<Value, IdbError> {
        if self.gates.explicit_host_object_tag {
            return Err(IdbError::MalformedTag {
                tag: byte,
                offset,
                context: "unknown value tag",
            });
        }
        self.read_host_object()
    }

    fn read_host_object(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        let object = self
            .delegate
            .read_host_object(&mut self.reader, &self.gates)?;
        self.register(id, Identity::Other);
        Ok(Value::HostObject { id, object })
    }

    fn read_int32(&mut self) -> Result<i32, IdbError> {
        let offset = self.reader.position();
        let v = self.reader.read_zigzag()?;
        i32::try_from(v)
            .map_err(|_| IdbError::Parse(format!("int32 {} at offset {} out of range", v, offset)))
    }

    /// Read a varint byte count that must fit in the remaining input.
    fn read_length(&mut self) -> Result<usize, IdbError> {
        let len = self.reader.read_varint_u32()? as usize;
        if len > self.reader.remaining() {
            return Err(IdbError::TruncatedInput {
                offset: self.reader.position(),
                needed: len,
                available: self.reader.remaining(),
            });
        }
        Ok(len)
    }

    fn read_bigint(&mut self) -> Result<BigInt, IdbError> {
        let bitfield = self.reader.read_varint()?;
        let shell = BigInt {
            bitfield,
            digits: Vec::new(),
        };
        let len = usize::try_from(shell.byte_length()).map_err(|_| IdbError::LengthMismatch {
            context: "bigint digits",
            declared: shell.byte_length(),
            actual: self.reader.remaining() as u64,
        })?;
        let digits = self.reader.read_bytes(len)?.to_vec();
        Ok(BigInt { bitfield, digits })
    }

    fn read_utf8_string(&mut self) -> Result<JsString, IdbError> {
        let len = self.read_length()?;
        let bytes = self.reader.read_bytes(len)?;
        Ok(JsString {
            encoding: StringEncoding::Utf8,
            text: String::from_utf8_lossy(bytes).into_owned(),
        })
    }

    fn read_one_byte_string(&mut self) -> Result<JsString, IdbError> {
        let len = self.read_length()?;
        let bytes = self.reader.read_bytes(len)?;
        Ok(JsString {
            encoding: StringEncoding::Latin1,
            text: bytes.iter().map(|&b| char::from(b)).collect(),
        })
    }

    fn read_two_byte_string(&mut self) -> Result<JsString, IdbError> {
        let len = self.read_length()?;
        if len % 2 != 0 {
            return Err(IdbError::LengthMismatch {
                context: "two-byte string",
                declared: len as u64,
                actual: (len - 1) as u64,
            });
        }
        let order = self.reader.config().host_order;
        let bytes = self.reader.read_bytes(len)?;
        let units: Vec<u16> = bytes.chunks_exact(2).map(|c| order.read_u16(c)).collect();
        Ok(JsString {
            encoding: StringEncoding::TwoByte,
            text: String::from_utf16_lossy(&units),
        })
    }

    /// Payload of a string wrapper, regexp source or error message.
    fn read_string_payload(&mut self) -> Result<JsString, IdbError> {
        if !self.gates.string_payload_is_object {
            return self.read_utf8_string();
        }
        let offset = self.reader.position();
        match self.read_object()? {
            Value::String(s) => Ok(s),
            other => Err(IdbError::Parse(format!(
                "expected a string at offset {}, found {}",
                offset,
                other.type_name()
            ))),
        }
    }

    /// Read `key, value` pairs until `end`, returning them.
    fn read_properties(&mut self, end: SerializationTag) -> Result<Vec<(Value, Value)>, IdbError> {
        let mut properties = Vec::new();
        loop {
            if self.peek_tag()? == end.as_u8() {
                self.reader.read_u8()?;
                return Ok(properties);
            }
            let offset = self.reader.position();
            let key = self.read_object()?;
            check_property_key(&key, offset)?;
            let value = self.read_object()?;
            properties.push((key, value));
        }
    }

    fn check_count(
        &mut self,
        context: &'static str,
        actual: usize,
    ) -> Result<(), IdbError> {
        let declared = self.reader.read_varint_u32()?;
        if declared as usize != actual {
            return Err(IdbError::LengthMismatch {
                context,
                declared: u64::from(declared),
                actual: actual as u64,
            });
        }
        Ok(())
    }

    fn read_js_object(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let properties = self.read_properties(SerializationTag::EndJsObject)?;
        self.check_count("object properties", properties.len())?;
        Ok(Value::Object { id, properties })
    }

    fn read_sparse_array(&mut self) -> Result<Value, IdbError> {
        let length = self.reader.read_varint_u32()?;
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let properties = self.read_properties(SerializationTag::EndSparseJsArray)?;
        self.check_count("sparse array properties", properties.len())?;
        self.check_count("sparse array length", length as usize)?;
        Ok(Value::SparseArray {
            id,
            length,
            properties,
        })
    }

    fn read_dense_array(&mut self) -> Result<Value, IdbError> {
        let length = self.reader.read_varint_u32()?;
        // Every element takes at least one byte.
        if length as usize > self.reader.remaining() {
            return Err(IdbError::LengthMismatch {
                context: "dense array length",
                declared: u64::from(length),
                actual: self.reader.remaining() as u64,
            });
        }
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let mut elements = Vec::with_capacity(length as usize);
        for _ in 0..length {
            if self.peek_tag()? == SerializationTag::TheHole.as_u8() {
                self.reader.read_u8()?;
                elements.push(None);
                continue;
            }
            let element = self.read_object()?;
            if !self.gates.distinguishes_hole && element == Value::Undefined {
                elements.push(None);
            } else {
                elements.push(Some(element));
            }
        }
        let properties = self.read_properties(SerializationTag::EndDenseJsArray)?;
        self.check_count("dense array properties", properties.len())?;
        self.check_count("dense array length", length as usize)?;
        Ok(Value::DenseArray {
            id,
            elements,
            properties,
        })
    }

    fn read_map(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let mut entries = Vec::new();
        loop {
            if self.peek_tag()? == SerializationTag::EndJsMap.as_u8() {
                self.reader.read_u8()?;
                break;
            }
            let key = self.read_object()?;
            let value = self.read_object()?;
            entries.push((key, value));
        }
        self.check_count("map entries", entries.len() * 2)?;
        Ok(Value::Map { id, entries })
    }

    fn read_set(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let mut elements = Vec::new();
        loop {
            if self.peek_tag()? == SerializationTag::EndJsSet.as_u8() {
                self.reader.read_u8()?;
                break;
            }
            elements.push(self.read_object()?);
        }
        self.check_count("set elements", elements.len())?;
        Ok(Value::Set { id, elements })
    }

    fn read_inline_array_buffer(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        let len = self.read_length()?;
        let bytes = self.reader.read_bytes(len)?.to_vec();
        self.register(id, Identity::ArrayBuffer { byte_length: len });
        Ok(Value::ArrayBuffer {
            id,
            origin: BufferOrigin::Inline,
            bytes,
        })
    }

    fn read_shared_array_buffer(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        let clone_id = self.reader.read_varint_u32()?;
        let bytes = self.delegate.shared_array_buffer(clone_id)?;
        self.register(
            id,
            Identity::ArrayBuffer {
                byte_length: bytes.len(),
            },
        );
        Ok(Value::ArrayBuffer {
            id,
            origin: BufferOrigin::Shared { clone_id },
            bytes,
        })
    }

    fn read_array_buffer_view(
        &mut self,
        buffer: Value,
        buffer_len: usize,
    ) -> Result<Value, IdbError> {
        let offset = self.reader.position();
        let sub_tag = self.reader.read_varint()?;
        let kind = u8::try_from(sub_tag)
            .ok()
            .and_then(ViewKind::from_u8)
            .ok_or(IdbError::MalformedTag {
                tag: sub_tag as u8,
                offset,
                context: "array buffer view subtag",
            })?;
        let byte_offset = self.reader.read_varint_u32()?;
        let byte_length = self.reader.read_varint_u32()?;
        let end = u64::from(byte_offset) + u64::from(byte_length);
        if end > buffer_len as u64 {
            return Err(IdbError::LengthMismatch {
                context: "array buffer view range",
                declared: end,
                actual: buffer_len as u64,
            });
        }
        let flags = if self.gates.view_flags {
            self.reader.read_varint_u32()?
        } else {
            0
        };
        let element_size = kind.element_size();
        if byte_offset % element_size != 0 || byte_length % element_size != 0 {
            return Err(IdbError::Parse(format!(
                "{:?} at offset {} is not aligned to {} bytes",
                kind, offset, element_size
            )));
        }
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        Ok(Value::ArrayBufferView {
            id,
            buffer: Box::new(buffer),
            kind,
            byte_offset,
            byte_length,
            flags,
        })
    }

    fn read_wasm_module(&mut self) -> Result<Value, IdbError> {
        let offset = self.reader.position();
        let encoding = self.reader.read_u8()?;
        if encoding != WASM_RAW_BYTES_TAG {
            return Err(IdbError::MalformedTag {
                tag: encoding,
                offset,
                context: "wasm module encoding",
            });
        }
        let wire_len = self.read_length()?;
        let wire_bytes = self.reader.read_bytes(wire_len)?.to_vec();
        let compiled_len = self.read_length()?;
        let compiled_bytes = self.reader.read_bytes(compiled_len)?.to_vec();
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        Ok(Value::WasmModule {
            id,
            transfer_id: None,
            wire_bytes,
            compiled_bytes,
        })
    }

    fn read_wasm_memory(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        let pages = self.reader.read_zigzag()?;
        let maximum_pages = i32::try_from(pages)
            .map_err(|_| IdbError::Parse(format!("wasm memory maximum {} out of range", pages)))?;
        self.expect_tag(
            SerializationTag::SharedArrayBuffer,
            "wasm memory must wrap a shared array buffer",
        )?;
        let buffer = self.read_shared_array_buffer()?;
        self.register(id, Identity::Other);
        Ok(Value::WasmMemory {
            id,
            maximum_pages,
            buffer: Box::new(buffer),
        })
    }

    fn read_error(&mut self) -> Result<Value, IdbError> {
        let id = self.allocate_id();
        self.register(id, Identity::Other);
        let mut prototype = ErrorPrototype::Error;
        let mut message = None;
        let mut stack = None;
        let mut cause = None;
        loop {
            let offset = self.reader.position();
            let sub_tag = self.reader.read_varint()?;
            match u8::try_from(sub_tag).unwrap_or(0) {
                error_tag::EVAL_ERROR_PROTOTYPE => prototype = ErrorPrototype::EvalError,
                error_tag::RANGE_ERROR_PROTOTYPE => prototype = ErrorPrototype::RangeError,
                error_tag::REFERENCE_ERROR_PROTOTYPE => prototype = ErrorPrototype::ReferenceError,
                error_tag::SYNTAX_ERROR_PROTOTYPE => prototype = ErrorPrototype::SyntaxError,
                error_tag::TYPE_ERROR_PROTOTYPE => prototype = ErrorPrototype::TypeError,
                error_tag::URI_ERROR_PROTOTYPE => prototype = ErrorPrototype::UriError,
                error_tag::MESSAGE => message = Some(self.read_string_payload()?),
                error_tag::STACK => stack = Some(self.read_string_payload()?),
                error_tag::CAUSE => cause = Some(Box::new(self.read_object()?)),
                error_tag::END => break,
                _ => {
                    return Err(IdbError::MalformedTag {
                        tag: sub_tag as u8,
                        offset,
                        context: "error object field",
                    })
                }
            }
        }
        Ok(Value::Error {
            id,
            prototype,
            message,
            stack,
            cause,
        })
    }

    /// Version-0 layout: values are pushed on a stack and end tags pop the
    /// members of the container they close.
    fn read_legacy(&mut self) -> Result<Value, IdbError> {
        let mut stack: Vec<Value> = Vec::new();
        loop {
            if self.reader.is_empty() {
                break;
            }
            let tag = self.peek_tag();
            let byte = match tag {
                Ok(b) => b,
                // Only trailing padding was left.
                Err(IdbError::TruncatedInput { .. }) => break,
                Err(e) => return Err(e),
            };
            let offset = self.reader.position();
            let value = match SerializationTag::from_u8(byte) {
                Some(SerializationTag::EndJsObject) => {
                    self.reader.read_u8()?;
                    let count = self.reader.read_varint_u32()? as usize;
                    let properties = pop_pairs(&mut stack, count, "legacy object properties")?;
                    check_legacy_keys(&properties, offset)?;
                    Value::Object { id: 0, properties }
                }
                Some(SerializationTag::EndSparseJsArray) => {
                    self.reader.read_u8()?;
                    let count = self.reader.read_varint_u32()? as usize;
                    let length = self.reader.read_varint_u32()?;
                    let properties =
                        pop_pairs(&mut stack, count, "legacy sparse array properties")?;
                    check_legacy_keys(&properties, offset)?;
                    Value::SparseArray {
                        id: 0,
                        length,
                        properties,
                    }
                }
                Some(SerializationTag::EndDenseJsArray) => {
                    return Err(IdbError::MalformedTag {
                        tag: byte,
                        offset,
                        context: "dense array end in legacy payload",
                    })
                }
                _ => self.read_object()?,
            };
            stack.push(value);
        }
        if stack.len() != 1 {
            return Err(IdbError::LengthMismatch {
                context: "legacy value stack",
                declared: 1,
                actual: stack.len() as u64,
            });
        }
        stack.pop().ok_or(IdbError::Parse("empty legacy stack".into()))
    }
}

/// Tags that may start a value. The rest only appear inside containers and
/// go through the unknown-tag path like bytes outside the tag table.
fn is_value_tag(tag: SerializationTag) -> bool {
    !matches!(
        tag,
        SerializationTag::Version
            | SerializationTag::Padding
            | SerializationTag::TheHole
            | SerializationTag::EndJsObject
            | SerializationTag::EndSparseJsArray
            | SerializationTag::EndDenseJsArray
            | SerializationTag::EndJsMap
            | SerializationTag::EndJsSet
            | SerializationTag::ArrayBufferView
    )
}

fn check_property_key(key: &Value, offset: usize) -> Result<(), IdbError> {
    match key {
        Value::String(_) | Value::Int32(_) | Value::Uint32(_) | Value::Double(_) => Ok(()),
        other => Err(IdbError::Parse(format!(
            "property key at offset {} is a {}, not a string or number",
            offset,
            other.type_name()
        ))),
    }
}

fn check_legacy_keys(properties: &[(Value, Value)], offset: usize) -> Result<(), IdbError> {
    properties
        .iter()
        .try_for_each(|(k, _)| check_property_key(k, offset))
}

fn pop_pairs(
    stack: &mut Vec<Value>,
    count: usize,
    context: &'static str,
) -> Result<Vec<(Value, Value)>, IdbError> {
    if stack.len() / 2 < count {
        return Err(IdbError::LengthMismatch {
            context,
            declared: count as u64,
            actual: (stack.len() / 2) as u64,
        });
    }
    let flat = stack.split_off(stack.len() - 2 * count);
    let mut pairs = Vec::with_capacity(count);
    let mut it = flat.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        pairs.push((k, v));
    }
    Ok(pairs)
}

/// Decode a bare V8 payload (header optional) with no host object support.
pub fn deserialize(data: &[u8], config: CodecConfig) -> Result<Value, IdbError> {
    let mut delegate = NoDelegate;
    let mut de = Deserializer::new(data, config, &mut delegate);
    de.read_header()?;
    de.read_value()
}
