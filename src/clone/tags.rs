//! Wire tags of the V8 structured clone format.
//!
//! Each value in the stream starts with one tag byte. The tags are a closed
//! set, so the deserializer matches on [`SerializationTag`] exhaustively and
//! byte values outside the set are handled in one place.

use serde::Serialize;

/// One-byte tags heading every serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationTag {
    Version,
    Padding,
    VerifyObjectCount,
    TheHole,
    Undefined,
    Null,
    True,
    False,
    Int32,
    Uint32,
    Double,
    BigInt,
    Utf8String,
    OneByteString,
    TwoByteString,
    ObjectReference,
    BeginJsObject,
    EndJsObject,
    BeginSparseJsArray,
    EndSparseJsArray,
    BeginDenseJsArray,
    EndDenseJsArray,
    Date,
    TrueObject,
    FalseObject,
    NumberObject,
    BigIntObject,
    StringObject,
    RegExp,
    BeginJsMap,
    EndJsMap,
    BeginJsSet,
    EndJsSet,
    ArrayBuffer,
    ArrayBufferTransfer,
    ArrayBufferView,
    SharedArrayBuffer,
    WasmModule,
    WasmModuleTransfer,
    HostObject,
    WasmMemoryTransfer,
    Error,
}

impl SerializationTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        use SerializationTag::*;
        Some(match value {
            0xFF => Version,
            0x00 => Padding,
            b'?' => VerifyObjectCount,
            b'-' => TheHole,
            b'_' => Undefined,
            b'0' => Null,
            b'T' => True,
            b'F' => False,
            b'I' => Int32,
            b'U' => Uint32,
            b'N' => Double,
            b'Z' => BigInt,
            b'S' => Utf8String,
            b'"' => OneByteString,
            b'c' => TwoByteString,
            b'^' => ObjectReference,
            b'o' => BeginJsObject,
            b'{' => EndJsObject,
            b'a' => BeginSparseJsArray,
            b'@' => EndSparseJsArray,
            b'A' => BeginDenseJsArray,
            b'$' => EndDenseJsArray,
            b'D' => Date,
            b'y' => TrueObject,
            b'x' => FalseObject,
            b'n' => NumberObject,
            b'z' => BigIntObject,
            b's' => StringObject,
            b'R' => RegExp,
            b';' => BeginJsMap,
            b':' => EndJsMap,
            b'\'' => BeginJsSet,
            b',' => EndJsSet,
            b'B' => ArrayBuffer,
            b't' => ArrayBufferTransfer,
            b'V' => ArrayBufferView,
            b'u' => SharedArrayBuffer,
            b'W' => WasmModule,
            b'w' => WasmModuleTransfer,
            b'\\' => HostObject,
            b'm' => WasmMemoryTransfer,
            b'r' => Error,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        use SerializationTag::*;
        match self {
            Version => 0xFF,
            Padding => 0x00,
            VerifyObjectCount => b'?',
            TheHole => b'-',
            Undefined => b'_',
            Null => b'0',
            True => b'T',
            False => b'F',
            Int32 => b'I',
            Uint32 => b'U',
            Double => b'N',
            BigInt => b'Z',
            Utf8String => b'S',
            OneByteString => b'"',
            TwoByteString => b'c',
            ObjectReference => b'^',
            BeginJsObject => b'o',
            EndJsObject => b'{',
            BeginSparseJsArray => b'a',
            EndSparseJsArray => b'@',
            BeginDenseJsArray => b'A',
            EndDenseJsArray => b'$',
            Date => b'D',
            TrueObject => b'y',
            FalseObject => b'x',
            NumberObject => b'n',
            BigIntObject => b'z',
            StringObject => b's',
            RegExp => b'R',
            BeginJsMap => b';',
            EndJsMap => b':',
            BeginJsSet => b'\'',
            EndJsSet => b',',
            ArrayBuffer => b'B',
            ArrayBufferTransfer => b't',
            ArrayBufferView => b'V',
            SharedArrayBuffer => b'u',
            WasmModule => b'W',
            WasmModuleTransfer => b'w',
            HostObject => b'\\',
            WasmMemoryTransfer => b'm',
            Error => b'r',
        }
    }
}

/// Encoding tag preceding the bytes of an inline Wasm module.
pub const WASM_RAW_BYTES_TAG: u8 = b'y';

/// Element kind of a typed array or `DataView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewKind {
    Int8Array,
    Uint8Array,
    Uint8ClampedArray,
    Int16Array,
    Uint16Array,
    Int32Array,
    Uint32Array,
    Float32Array,
    Float64Array,
    BigInt64Array,
    BigUint64Array,
    DataView,
}

impl ViewKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            b'b' => ViewKind::Int8Array,
            b'B' => ViewKind::Uint8Array,
            b'C' => ViewKind::Uint8ClampedArray,
            b'w' => ViewKind::Int16Array,
            b'W' => ViewKind::Uint16Array,
            b'd' => ViewKind::Int32Array,
            b'D' => ViewKind::Uint32Array,
            b'f' => ViewKind::Float32Array,
            b'F' => ViewKind::Float64Array,
            b'q' => ViewKind::BigInt64Array,
            b'Q' => ViewKind::BigUint64Array,
            b'?' => ViewKind::DataView,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ViewKind::Int8Array => b'b',
            ViewKind::Uint8Array => b'B',
            ViewKind::Uint8ClampedArray => b'C',
            ViewKind::Int16Array => b'w',
            ViewKind::Uint16Array => b'W',
            ViewKind::Int32Array => b'd',
            ViewKind::Uint32Array => b'D',
            ViewKind::Float32Array => b'f',
            ViewKind::Float64Array => b'F',
            ViewKind::BigInt64Array => b'q',
            ViewKind::BigUint64Array => b'Q',
            ViewKind::DataView => b'?',
        }
    }

    /// Bytes per element; offsets and lengths must be multiples of this.
    pub fn element_size(self) -> u32 {
        match self {
            ViewKind::Int8Array
            | ViewKind::Uint8Array
            | ViewKind::Uint8ClampedArray
            | ViewKind::DataView => 1,
            ViewKind::Int16Array | ViewKind::Uint16Array => 2,
            ViewKind::Int32Array | ViewKind::Uint32Array | ViewKind::Float32Array => 4,
            ViewKind::Float64Array | ViewKind::BigInt64Array | ViewKind::BigUint64Array => 8,
        }
    }
}

/// Sub-tags inside a serialized `Error` object.
pub mod error_tag {
    pub const EVAL_ERROR_PROTOTYPE: u8 = b'E';
    pub const RANGE_ERROR_PROTOTYPE: u8 = b'R';
    pub const REFERENCE_ERROR_PROTOTYPE: u8 = b'F';
    pub const SYNTAX_ERROR_PROTOTYPE: u8 = b'S';
    pub const TYPE_ERROR_PROTOTYPE: u8 = b'T';
    pub const URI_ERROR_PROTOTYPE: u8 = b'U';
    pub const MESSAGE: u8 = b'm';
    pub const CAUSE: u8 = b'c';
    pub const STACK: u8 = b's';
    pub const END: u8 = b'.';
}
