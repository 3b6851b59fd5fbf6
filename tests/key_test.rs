//! Integration tests for the key codec and the `idb_cmp1` comparator.

use std::cmp::Ordering;

use idb::indexeddb::coding::{encode_varint, CodecConfig, Endianness, Reader};
use idb::indexeddb::comparator::{compare_keys, try_compare_keys, Comparator};
use idb::indexeddb::idb_key::IndexedDbKey;
use idb::indexeddb::key_prefix::{KeyPrefix, KeyType};
use idb::indexeddb::keys::{
    DatabaseMetadataKey, GlobalMetadataKey, IndexDataKey, IndexMetaType, ObjectStoreMetaType,
    ParsedKey,
};
use idb::IdbError;

fn encode(key: ParsedKey) -> Vec<u8> {
    key.encode().unwrap()
}

fn record(db: u64, os: u64, pk: IndexedDbKey) -> Vec<u8> {
    encode(ParsedKey::ObjectStoreData {
        prefix: KeyPrefix::object_store_data(db, os),
        primary_key: Some(pk),
    })
}

fn index_row(index: IndexedDbKey, seq: u64, primary: IndexedDbKey) -> Vec<u8> {
    encode(ParsedKey::IndexData(IndexDataKey {
        prefix: KeyPrefix::index_data(1, 1, 30),
        index_key: index,
        sequence_number: Some(seq),
        primary_key: Some(primary),
    }))
}

#[test]
fn test_object_store_data_key_decodes_back() {
    let mut bytes = KeyPrefix::new(1, 2, 1).encode().unwrap();
    IndexedDbKey::Number(42.0).encode_into(Endianness::Little, &mut bytes);

    let parsed = ParsedKey::from_bytes(&bytes).unwrap();
    assert_eq!(parsed.key_type(), KeyType::ObjectStoreData);
    assert_eq!(
        parsed,
        ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::new(1, 2, 1),
            primary_key: Some(IndexedDbKey::Number(42.0)),
        }
    );
}

#[test]
fn test_every_key_family_roundtrips() {
    let keys = vec![
        ParsedKey::GlobalMetadata(GlobalMetadataKey::SchemaVersion),
        ParsedKey::GlobalMetadata(GlobalMetadataKey::DatabaseFreeList { database_id: 9 }),
        ParsedKey::GlobalMetadata(GlobalMetadataKey::DatabaseName {
            origin: "https_example.org_0@1".into(),
            database_name: "日本".into(),
        }),
        ParsedKey::DatabaseMetadata {
            database_id: 3,
            key: DatabaseMetadataKey::ObjectStoreMeta {
                object_store_id: 4,
                meta_type: ObjectStoreMetaType::KeyPath,
            },
        },
        ParsedKey::DatabaseMetadata {
            database_id: 3,
            key: DatabaseMetadataKey::IndexMeta {
                object_store_id: 4,
                index_id: 31,
                meta_type: IndexMetaType::MultiEntry,
            },
        },
        ParsedKey::DatabaseMetadata {
            database_id: 3,
            key: DatabaseMetadataKey::IndexNames {
                object_store_id: 4,
                name: "by_date".into(),
            },
        },
        ParsedKey::ExistsEntry {
            prefix: KeyPrefix::exists_entry(3, 4),
            primary_key: Some(IndexedDbKey::Array(vec![
                IndexedDbKey::Binary(vec![1, 2]),
                IndexedDbKey::Date(1.5e12),
            ])),
        },
        ParsedKey::BlobEntry {
            prefix: KeyPrefix::blob_entry(3, 4),
            primary_key: Some(IndexedDbKey::String("k".into())),
        },
        ParsedKey::IndexData(IndexDataKey {
            prefix: KeyPrefix::index_data(3, 4, 30),
            index_key: IndexedDbKey::String("x".into()),
            sequence_number: Some(7),
            primary_key: Some(IndexedDbKey::Number(1.0)),
        }),
    ];
    for key in keys {
        let bytes = key.encode().unwrap();
        assert_eq!(ParsedKey::from_bytes(&bytes).unwrap(), key, "{}", key);
    }
}

#[test]
fn test_big_endian_config_roundtrips() {
    let config = CodecConfig {
        int_order: Endianness::Big,
        host_order: Endianness::Big,
    };
    let key = ParsedKey::ObjectStoreData {
        prefix: KeyPrefix::object_store_data(300, 2),
        primary_key: Some(IndexedDbKey::Number(-0.5)),
    };
    let bytes = key.encode_with(config).unwrap();
    assert_eq!(&bytes[1..3], &[0x01, 0x2C]);
    assert_eq!(ParsedKey::decode(&bytes, config).unwrap(), key);
}

#[test]
fn test_metadata_type_order() {
    let a = encode(ParsedKey::DatabaseMetadata {
        database_id: 1,
        key: DatabaseMetadataKey::OriginName,
    });
    let b = encode(ParsedKey::DatabaseMetadata {
        database_id: 1,
        key: DatabaseMetadataKey::DatabaseName,
    });
    let c = encode(ParsedKey::DatabaseMetadata {
        database_id: 2,
        key: DatabaseMetadataKey::OriginName,
    });
    assert_eq!(compare_keys(&a, &b), Ordering::Less);
    assert_eq!(compare_keys(&b, &c), Ordering::Less);
    assert_eq!(compare_keys(&a, &c), Ordering::Less);
    assert_eq!(compare_keys(&c, &a), Ordering::Greater);
    assert_eq!(compare_keys(&b, &b), Ordering::Equal);
}

#[test]
fn test_global_metadata_sorts_first() {
    let global = encode(ParsedKey::GlobalMetadata(GlobalMetadataKey::DatabaseName {
        origin: "z".into(),
        database_name: "z".into(),
    }));
    let db = encode(ParsedKey::DatabaseMetadata {
        database_id: 1,
        key: DatabaseMetadataKey::OriginName,
    });
    assert_eq!(compare_keys(&global, &db), Ordering::Less);
}

#[test]
fn test_record_keys_follow_key_order() {
    let keys = [
        record(1, 1, IndexedDbKey::Number(-1.0)),
        record(1, 1, IndexedDbKey::Number(2.0)),
        record(1, 1, IndexedDbKey::Number(10.0)),
        record(1, 1, IndexedDbKey::Date(0.0)),
        record(1, 1, IndexedDbKey::String("a".into())),
        record(1, 1, IndexedDbKey::String("ab".into())),
        record(1, 1, IndexedDbKey::String("b".into())),
        record(1, 1, IndexedDbKey::Binary(vec![0])),
        record(1, 1, IndexedDbKey::Array(vec![])),
        record(1, 1, IndexedDbKey::Array(vec![IndexedDbKey::Number(0.0)])),
        record(1, 2, IndexedDbKey::Number(-5.0)),
    ];
    for pair in keys.windows(2) {
        assert_eq!(compare_keys(&pair[0], &pair[1]), Ordering::Less);
    }
}

#[test]
fn test_index_rows_compare_primary_before_sequence() {
    let a = index_row(IndexedDbKey::Number(1.0), 9, IndexedDbKey::Number(1.0));
    let b = index_row(IndexedDbKey::Number(1.0), 2, IndexedDbKey::Number(2.0));
    assert_eq!(compare_keys(&a, &b), Ordering::Less);

    let same_primary_newer = index_row(IndexedDbKey::Number(1.0), 10, IndexedDbKey::Number(1.0));
    assert_eq!(compare_keys(&a, &same_primary_newer), Ordering::Less);

    let only_index = Comparator::default().only_index_keys();
    assert_eq!(only_index.compare(&a, &b), Ordering::Equal);
    assert_eq!(
        try_compare_keys(&a, &b, true).unwrap(),
        Ordering::Equal
    );
}

#[test]
fn test_unorderable_keys_are_signaled() {
    let good = record(1, 1, IndexedDbKey::Number(1.0));
    let mut bad = KeyPrefix::object_store_data(1, 1).encode().unwrap();
    bad.push(0x42);
    assert!(matches!(
        try_compare_keys(&good, &bad, false),
        Err(IdbError::Unorderable(_))
    ));
    // The infallible form still gives a total answer.
    let _ = compare_keys(&good, &bad);
}

#[test]
fn test_truncated_varint() {
    let mut r = Reader::new(&[0x80, 0x80]);
    assert!(matches!(
        r.read_varint(),
        Err(IdbError::TruncatedInput { .. })
    ));
    assert_eq!(r.position(), 0);

    let mut bytes = Vec::new();
    encode_varint(u64::MAX, &mut bytes);
    let last = bytes.len() - 1;
    bytes[last] |= 0x80;
    assert!(matches!(
        Reader::new(&bytes).read_varint(),
        Err(IdbError::TruncatedInput { .. }) | Err(IdbError::Parse(_))
    ));
}

#[test]
fn test_key_type_order_is_consistent() {
    let ordered = [
        IndexedDbKey::Min,
        IndexedDbKey::Null,
        IndexedDbKey::Number(f64::MAX),
        IndexedDbKey::Date(-1.0),
        IndexedDbKey::String(String::new()),
        IndexedDbKey::Binary(vec![]),
        IndexedDbKey::Array(vec![]),
    ];
    for (i, a) in ordered.iter().enumerate() {
        for (j, b) in ordered.iter().enumerate() {
            assert_eq!(a.cmp(b), i.cmp(&j), "{} vs {}", a, b);
        }
    }
}
