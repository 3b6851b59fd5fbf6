//! Integration tests for the V8 structured clone codec and the Blink layer.

use idb::clone::blink::{decode_ssv, encode_ssv, encode_ssv_with, swap_pairs, BlinkDelegate};
use idb::clone::deserializer::deserialize;
use idb::clone::host::{FileInfo, HostObject};
use idb::clone::serializer::{serialize, Serializer};
use idb::clone::tags::ViewKind;
use idb::clone::value::{BigInt, BufferOrigin, ErrorPrototype, JsString, Value};
use idb::indexeddb::coding::CodecConfig;
use idb::IdbError;

fn roundtrip(v: &Value) -> Value {
    let bytes = serialize(v).unwrap();
    deserialize(&bytes, CodecConfig::default()).unwrap()
}

fn key(name: &str) -> Value {
    Value::String(JsString::new(name))
}

#[test]
fn test_dense_array_with_hole_roundtrip() {
    let v = Value::DenseArray {
        id: 1,
        elements: vec![Some(Value::Int32(1)), None, Some(Value::Int32(3))],
        properties: vec![],
    };
    let back = roundtrip(&v);
    let Value::DenseArray { elements, .. } = &back else {
        panic!("not a dense array: {:?}", back)
    };
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0], Some(Value::Int32(1)));
    assert_eq!(elements[1], None);
    assert_eq!(elements[2], Some(Value::Int32(3)));
}

#[test]
fn test_shared_identity_survives_roundtrip() {
    let a = Value::Object {
        id: 2,
        properties: vec![(key("n"), Value::Int32(1))],
    };
    let v = Value::Object {
        id: 1,
        properties: vec![(key("a"), a.clone()), (key("b"), a)],
    };
    let back = roundtrip(&v);

    let first = back.get("a").unwrap();
    let second = back.get("b").unwrap();
    assert_eq!(first.id(), Some(2));
    assert_eq!(second, &Value::ObjectRef(2));
    // The reference resolves to the very same decoded node.
    let identities = back.identities();
    assert!(std::ptr::eq(identities[&2], first));
}

#[test]
fn test_back_reference_from_nested_object() {
    // {a: {}, b: {backref: a}}
    let a = Value::Object {
        id: 2,
        properties: vec![],
    };
    let b = Value::Object {
        id: 3,
        properties: vec![(key("backref"), Value::ObjectRef(2))],
    };
    let v = Value::Object {
        id: 1,
        properties: vec![(key("a"), a), (key("b"), b)],
    };
    let back = roundtrip(&v);
    let backref = back.get("b").and_then(|b| b.get("backref")).unwrap();
    let Value::ObjectRef(target) = backref else {
        panic!("expected a reference, got {:?}", backref)
    };
    let identities = back.identities();
    assert!(std::ptr::eq(identities[target], back.get("a").unwrap()));
}

#[test]
fn test_cyclic_object() {
    let v = Value::Object {
        id: 1,
        properties: vec![(key("self"), Value::ObjectRef(1))],
    };
    let back = roundtrip(&v);
    assert_eq!(back, v);
}

#[test]
fn test_every_plain_variant_roundtrips() {
    let buffer = Value::ArrayBuffer {
        id: 10,
        origin: BufferOrigin::Inline,
        bytes: (0u8..16).collect(),
    };
    let v = Value::DenseArray {
        id: 1,
        elements: vec![
            Some(Value::Undefined),
            Some(Value::Null),
            Some(Value::Bool(false)),
            Some(Value::Int32(-7)),
            Some(Value::Uint32(u32::MAX)),
            Some(Value::Double(0.25)),
            Some(Value::BigInt(BigInt::from_i128(-1 << 70))),
            Some(Value::String(JsString::new("latin é"))),
            Some(Value::String(JsString::new("two byte ☃"))),
            Some(Value::Date { id: 2, millis: 1.7e12 }),
            Some(Value::BooleanObject { id: 3, value: true }),
            Some(Value::NumberObject { id: 4, value: -1.5 }),
            Some(Value::BigIntObject {
                id: 5,
                value: BigInt::from_i128(42),
            }),
            Some(Value::StringObject {
                id: 6,
                value: JsString::new("boxed"),
            }),
            Some(Value::RegExp {
                id: 7,
                pattern: JsString::new("^a+$"),
                flags: 0b11,
            }),
            Some(Value::Map {
                id: 8,
                entries: vec![(Value::Int32(1), key("one"))],
            }),
            Some(Value::Set {
                id: 9,
                elements: vec![key("x"), Value::Null],
            }),
            Some(Value::ArrayBufferView {
                id: 11,
                buffer: Box::new(buffer),
                kind: ViewKind::Uint16Array,
                byte_offset: 2,
                byte_length: 8,
                flags: 0,
            }),
            Some(Value::SparseArray {
                id: 12,
                length: 100,
                properties: vec![(Value::Int32(50), key("mid"))],
            }),
            Some(Value::Error {
                id: 13,
                prototype: ErrorPrototype::TypeError,
                message: Some(JsString::new("bad")),
                stack: None,
                cause: None,
            }),
        ],
        properties: vec![(key("extra"), Value::Int32(1))],
    };
    assert_eq!(roundtrip(&v), v);
}

#[test]
fn test_serializer_renumbers_ids_in_write_order() {
    let v = Value::Object {
        id: 40,
        properties: vec![(
            key("d"),
            Value::Date {
                id: 41,
                millis: 0.0,
            },
        )],
    };
    let back = roundtrip(&v);
    assert_eq!(back.id(), Some(1));
    assert_eq!(back.get("d").and_then(Value::id), Some(2));
}

#[test]
fn test_older_versions_roundtrip() {
    let v = Value::DenseArray {
        id: 1,
        elements: vec![Some(key("s")), None],
        properties: vec![],
    };
    for version in [9, 10, 11, 12, 13, 14, 15] {
        let mut s = Serializer::new().with_version(version).unwrap();
        s.write_header();
        s.write_value(&v).unwrap();
        let bytes = s.finish();
        assert_eq!(bytes[1] as u32, version);
        let back = deserialize(&bytes, CodecConfig::default()).unwrap();
        let Value::DenseArray { elements, .. } = back else {
            panic!("version {}", version)
        };
        assert_eq!(elements[0], Some(key("s")), "version {}", version);
    }
}

#[test]
fn test_blink_record_with_file() {
    let file = HostObject::File(FileInfo {
        path: "/tmp/a.txt".into(),
        name: Some("a.txt".into()),
        relative_path: Some(String::new()),
        uuid: "0f1e2d3c".into(),
        content_type: "text/plain".into(),
        snapshot: None,
        is_user_visible: true,
    });
    let v = Value::Object {
        id: 1,
        properties: vec![(key("attachment"), Value::HostObject { id: 2, object: file })],
    };
    let bytes = encode_ssv(&v).unwrap();
    let decoded = decode_ssv(&bytes, CodecConfig::default()).unwrap();
    assert_eq!(decoded.wire_version, 21);
    assert_eq!(decoded.v8_version, 15);
    assert_eq!(decoded.value, v);
}

#[test]
fn test_blink_older_wire_versions() {
    let v = Value::Object {
        id: 1,
        properties: vec![(
            key("p"),
            Value::HostObject {
                id: 2,
                object: HostObject::DomPoint {
                    read_only: false,
                    x: 1.0,
                    y: 2.0,
                    z: 0.0,
                    w: 1.0,
                },
            },
        )],
    };
    for (wire, v8) in [(13, 13), (17, 13), (19, 15), (21, 15)] {
        let bytes = encode_ssv_with(&v, wire, v8, &mut BlinkDelegate::default()).unwrap();
        let decoded = decode_ssv(&bytes, CodecConfig::default()).unwrap();
        assert_eq!(decoded.wire_version, wire);
        assert_eq!(decoded.v8_version, v8);
        assert_eq!(decoded.value, v);
    }
}

#[test]
fn test_byte_swapped_record() {
    let v = Value::Object {
        id: 1,
        properties: vec![(key("k"), Value::Int32(5))],
    };
    let mut bytes = encode_ssv_with(&v, 9, 9, &mut BlinkDelegate::default()).unwrap();
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    let decoded = decode_ssv(&swap_pairs(&bytes), CodecConfig::default()).unwrap();
    assert!(decoded.byte_swapped);
    assert_eq!(decoded.value, v);
}

#[test]
fn test_unsupported_versions() {
    assert!(matches!(
        deserialize(&[0xFF, 16, b'0'], CodecConfig::default()),
        Err(IdbError::UnsupportedVersion { version: 16, .. })
    ));
    assert!(matches!(
        decode_ssv(&[0xFF, 22, 0xFF, 15, b'0'], CodecConfig::default()),
        Err(IdbError::UnsupportedVersion { version: 22, .. })
    ));
}

#[test]
fn test_truncated_payloads_fail_cleanly() {
    let v = Value::Object {
        id: 1,
        properties: vec![(key("name"), Value::String(JsString::new("value ☃")))],
    };
    let bytes = serialize(&v).unwrap();
    for len in 2..bytes.len() {
        assert!(
            deserialize(&bytes[..len], CodecConfig::default()).is_err(),
            "prefix of {} bytes decoded",
            len
        );
    }
}
