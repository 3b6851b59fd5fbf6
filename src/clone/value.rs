//! Decoded structured clone values.
//!
//! Every referenceable value (objects, arrays, maps, sets, value wrappers,
//! buffers, views, Wasm objects and host objects) carries the object id it
//! was assigned while decoding. A repeated occurrence of the same object is
//! kept as [`Value::ObjectRef`] holding that id, so cyclic graphs stay
//! finite trees. Use [`Value::identities`] to resolve references.
//!
//! Id `0` marks a container from a version-0 payload, which V8 never
//! registers for back-references.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::clone::host::HostObject;
use crate::clone::tags::ViewKind;

/// Object id assigned in order of first appearance, starting at 1.
pub type ObjectId = u32;

/// Which of the three V8 string encodings a string was stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StringEncoding {
    Utf8,
    Latin1,
    TwoByte,
}

/// A JavaScript string plus the encoding it was (or will be) written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JsString {
    pub encoding: StringEncoding,
    pub text: String,
}

impl JsString {
    /// Pick the encoding V8 would: one-byte when every code point fits Latin-1.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let encoding = if text.chars().all(|c| u32::from(c) <= 0xFF) {
            StringEncoding::Latin1
        } else {
            StringEncoding::TwoByte
        };
        JsString { encoding, text }
    }

    pub fn utf8(text: impl Into<String>) -> Self {
        JsString {
            encoding: StringEncoding::Utf8,
            text: text.into(),
        }
    }

    pub fn two_byte(text: impl Into<String>) -> Self {
        JsString {
            encoding: StringEncoding::TwoByte,
            text: text.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text)
    }
}

/// Arbitrary-precision integer in V8's wire layout.
///
/// `bitfield` holds the sign in bit 0 and the count of 64-bit digits above
/// it; `digits` are the magnitude bytes, least significant first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BigInt {
    pub bitfield: u64,
    pub digits: Vec<u8>,
}

impl BigInt {
    /// Build from a sign and little-endian magnitude, padding to whole digits.
    pub fn from_parts(negative: bool, mut digits: Vec<u8>) -> Self {
        while digits.len() % 8 != 0 {
            digits.push(0);
        }
        let digit_count = (digits.len() / 8) as u64;
        BigInt {
            bitfield: (digit_count << 1) | u64::from(negative),
            digits,
        }
    }

    pub fn from_i128(value: i128) -> Self {
        let magnitude = value.unsigned_abs();
        let mut digits = magnitude.to_le_bytes().to_vec();
        while digits.len() > 8 && digits[digits.len() - 8..].iter().all(|&b| b == 0) {
            digits.truncate(digits.len() - 8);
        }
        if magnitude == 0 {
            digits.clear();
        }
        Self::from_parts(value < 0, digits)
    }

    pub fn is_negative(&self) -> bool {
        self.bitfield & 1 == 1
    }

    /// Magnitude length implied by the bitfield.
    pub fn byte_length(&self) -> u64 {
        ((self.bitfield >> 1) & 0x3FFF_FFFF) * 8
    }

    /// The value, when it fits in 128 bits.
    pub fn to_i128(&self) -> Option<i128> {
        let significant = self
            .digits
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        if significant > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[..significant].copy_from_slice(&self.digits[..significant]);
        let magnitude = u128::from_le_bytes(buf);
        if self.is_negative() {
            if magnitude > i128::MAX as u128 + 1 {
                return None;
            }
            Some((magnitude as i128).wrapping_neg())
        } else {
            i128::try_from(magnitude).ok()
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i128() {
            Some(v) => write!(f, "{}n", v),
            None => {
                let sign = if self.is_negative() { "-" } else { "" };
                write!(f, "{}0x", sign)?;
                for b in self.digits.iter().rev() {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, "n")
            }
        }
    }
}

/// Where the bytes of an array buffer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferOrigin {
    /// Bytes stored inline in the payload.
    Inline,
    /// A `SharedArrayBuffer` looked up by clone id.
    Shared { clone_id: u32 },
    /// A buffer moved through the transfer list.
    Transferred { transfer_id: u32 },
}

/// Constructor recorded for a serialized `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ErrorPrototype {
    #[default]
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
}

impl ErrorPrototype {
    pub fn name(self) -> &'static str {
        match self {
            ErrorPrototype::Error => "Error",
            ErrorPrototype::EvalError => "EvalError",
            ErrorPrototype::RangeError => "RangeError",
            ErrorPrototype::ReferenceError => "ReferenceError",
            ErrorPrototype::SyntaxError => "SyntaxError",
            ErrorPrototype::TypeError => "TypeError",
            ErrorPrototype::UriError => "URIError",
        }
    }
}

/// A decoded structured clone value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Double(f64),
    BigInt(BigInt),
    String(JsString),
    /// Back-reference to an object decoded earlier in the same payload.
    ObjectRef(ObjectId),
    Object {
        id: ObjectId,
        properties: Vec<(Value, Value)>,
    },
    SparseArray {
        id: ObjectId,
        length: u32,
        properties: Vec<(Value, Value)>,
    },
    /// `None` elements are holes.
    DenseArray {
        id: ObjectId,
        elements: Vec<Option<Value>>,
        properties: Vec<(Value, Value)>,
    },
    Date {
        id: ObjectId,
        millis: f64,
    },
    BooleanObject {
        id: ObjectId,
        value: bool,
    },
    NumberObject {
        id: ObjectId,
        value: f64,
    },
    BigIntObject {
        id: ObjectId,
        value: BigInt,
    },
    StringObject {
        id: ObjectId,
        value: JsString,
    },
    RegExp {
        id: ObjectId,
        pattern: JsString,
        flags: u32,
    },
    Map {
        id: ObjectId,
        entries: Vec<(Value, Value)>,
    },
    Set {
        id: ObjectId,
        elements: Vec<Value>,
    },
    ArrayBuffer {
        id: ObjectId,
        origin: BufferOrigin,
        bytes: Vec<u8>,
    },
    /// Typed array or `DataView`; `buffer` is the backing [`Value::ArrayBuffer`]
    /// or an [`Value::ObjectRef`] to it.
    ArrayBufferView {
        id: ObjectId,
        buffer: Box<Value>,
        kind: ViewKind,
        byte_offset: u32,
        byte_length: u32,
        flags: u32,
    },
    WasmModule {
        id: ObjectId,
        transfer_id: Option<u32>,
        wire_bytes: Vec<u8>,
        compiled_bytes: Vec<u8>,
    },
    WasmMemory {
        id: ObjectId,
        maximum_pages: i32,
        buffer: Box<Value>,
    },
    Error {
        id: ObjectId,
        prototype: ErrorPrototype,
        message: Option<JsString>,
        stack: Option<JsString>,
        cause: Option<Box<Value>>,
    },
    HostObject {
        id: ObjectId,
        object: HostObject,
    },
}

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Value::String(JsString::new(text))
    }

    /// The object id of a referenceable value.
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Value::Object { id, .. }
            | Value::SparseArray { id, .. }
            | Value::DenseArray { id, .. }
            | Value::Date { id, .. }
            | Value::BooleanObject { id, .. }
            | Value::NumberObject { id, .. }
            | Value::BigIntObject { id, .. }
            | Value::StringObject { id, .. }
            | Value::RegExp { id, .. }
            | Value::Map { id, .. }
            | Value::Set { id, .. }
            | Value::ArrayBuffer { id, .. }
            | Value::ArrayBufferView { id, .. }
            | Value::WasmModule { id, .. }
            | Value::WasmMemory { id, .. }
            | Value::Error { id, .. }
            | Value::HostObject { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int32(_) | Value::Uint32(_) | Value::Double(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::ObjectRef(_) => "reference",
            Value::Object { .. } => "Object",
            Value::SparseArray { .. } | Value::DenseArray { .. } => "Array",
            Value::Date { .. } => "Date",
            Value::BooleanObject { .. } => "Boolean",
            Value::NumberObject { .. } => "Number",
            Value::BigIntObject { .. } => "BigInt",
            Value::StringObject { .. } => "String",
            Value::RegExp { .. } => "RegExp",
            Value::Map { .. } => "Map",
            Value::Set { .. } => "Set",
            Value::ArrayBuffer { .. } => "ArrayBuffer",
            Value::ArrayBufferView { .. } => "ArrayBufferView",
            Value::WasmModule { .. } => "WebAssembly.Module",
            Value::WasmMemory { .. } => "WebAssembly.Memory",
            Value::Error { .. } => "Error",
            Value::HostObject { .. } => "HostObject",
        }
    }

    /// Look up a property of an object or array by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let props = match self {
            Value::Object { properties, .. }
            | Value::SparseArray { properties, .. }
            | Value::DenseArray { properties, .. } => properties,
            _ => return None,
        };
        props.iter().find_map(|(k, v)| match k {
            Value::String(s) if s.text == key => Some(v),
            _ => None,
        })
    }

    /// Map every object id in the graph to its first (inline) occurrence.
    pub fn identities(&self) -> HashMap<ObjectId, &Value> {
        let mut out = HashMap::new();
        collect_identities(self, &mut out);
        out
    }

    fn children(&self) -> Vec<&Value> {
        match self {
            Value::Object { properties, .. } | Value::SparseArray { properties, .. } => properties
                .iter()
                .flat_map(|(k, v)| [k, v])
                .collect(),
            Value::DenseArray {
                elements,
                properties,
                ..
            } => elements
                .iter()
                .flatten()
                .chain(properties.iter().flat_map(|(k, v)| [k, v]))
                .collect(),
            Value::Map { entries, .. } => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            Value::Set { elements, .. } => elements.iter().collect(),
            Value::ArrayBufferView { buffer, .. } | Value::WasmMemory { buffer, .. } => {
                vec![buffer.as_ref()]
            }
            Value::Error { cause, .. } => cause.iter().map(|c| c.as_ref()).collect(),
            _ => Vec::new(),
        }
    }
}

fn collect_identities<'v>(value: &'v Value, out: &mut HashMap<ObjectId, &'v Value>) {
    if let Some(id) = value.id() {
        if id != 0 {
            out.entry(id).or_insert(value);
        }
    }
    for child in value.children() {
        collect_identities(child, out);
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, pairs: &[(Value, Value)], sep: &str) -> fmt::Result {
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match k {
            Value::String(s) => write!(f, "{}{}{}", s.text, sep, v)?,
            other => write!(f, "{}{}{}", other, sep, v)?,
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Uint32(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::BigInt(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::ObjectRef(id) => write!(f, "<ref #{}>", id),
            Value::Object { properties, .. } => {
                write!(f, "{{")?;
                write_pairs(f, properties, ": ")?;
                write!(f, "}}")
            }
            Value::SparseArray {
                length, properties, ..
            } => {
                write!(f, "Array({}) [", length)?;
                write_pairs(f, properties, ": ")?;
                write!(f, "]")
            }
            Value::DenseArray {
                elements,
                properties,
                ..
            } => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match e {
                        Some(v) => write!(f, "{}", v)?,
                        None => write!(f, "<hole>")?,
                    }
                }
                if !properties.is_empty() {
                    if !elements.is_empty() {
                        write!(f, ", ")?;
                    }
                    write_pairs(f, properties, ": ")?;
                }
                write!(f, "]")
            }
            Value::Date { millis, .. } => write!(f, "Date({})", millis),
            Value::BooleanObject { value, .. } => write!(f, "Boolean({})", value),
            Value::NumberObject { value, .. } => write!(f, "Number({})", value),
            Value::BigIntObject { value, .. } => write!(f, "BigInt({})", value),
            Value::StringObject { value, .. } => write!(f, "String({})", value),
            Value::RegExp { pattern, flags, .. } => write!(f, "/{}/ (flags 0x{:x})", pattern.text, flags),
            Value::Map { entries, .. } => {
                write!(f, "Map {{")?;
                write_pairs(f, entries, " => ")?;
                write!(f, "}}")
            }
            Value::Set { elements, .. } => {
                write!(f, "Set {{")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
            Value::ArrayBuffer { origin, bytes, .. } => match origin {
                BufferOrigin::Inline => write!(f, "ArrayBuffer({} bytes)", bytes.len()),
                BufferOrigin::Shared { clone_id } => {
                    write!(f, "SharedArrayBuffer(#{}, {} bytes)", clone_id, bytes.len())
                }
                BufferOrigin::Transferred { transfer_id } => {
                    write!(f, "ArrayBuffer(transfer #{}, {} bytes)", transfer_id, bytes.len())
                }
            },
            Value::ArrayBufferView {
                kind,
                byte_offset,
                byte_length,
                ..
            } => write!(f, "{:?}(offset {}, {} bytes)", kind, byte_offset, byte_length),
            Value::WasmModule {
                transfer_id,
                wire_bytes,
                ..
            } => match transfer_id {
                Some(t) => write!(f, "WebAssembly.Module(transfer #{})", t),
                None => write!(f, "WebAssembly.Module({} bytes)", wire_bytes.len()),
            },
            Value::WasmMemory { maximum_pages, .. } => {
                write!(f, "WebAssembly.Memory(max {} pages)", maximum_pages)
            }
            Value::Error {
                prototype, message, ..
            } => match message {
                Some(m) => write!(f, "{}({})", prototype.name(), m),
                None => write!(f, "{}()", prototype.name()),
            },
            Value::HostObject { object, .. } => write!(f, "{}", object),
        }
    }
}
