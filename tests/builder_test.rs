//! Integration tests for rebuilding the database model from raw pairs.

use idb::clone::blink::encode_ssv;
use idb::clone::value::{JsString, Value};
use idb::indexeddb::builder::{decode_entry, CollectingReporter, EntryValue, TracingReporter};
use idb::indexeddb::coding::{
    encode_bool, encode_int, encode_string, encode_string_with_length, encode_varint, CodecConfig,
    Endianness,
};
use idb::indexeddb::idb_key::{IndexedDbKey, IndexedDbKeyPath};
use idb::indexeddb::key_prefix::{KeyPrefix, KeyType};
use idb::indexeddb::keys::{
    DatabaseMetadataKey, GlobalMetadataKey, IndexDataKey, IndexMetaType, ObjectStoreMetaType,
    ParsedKey,
};
use idb::indexeddb::model::{BlobDescriptor, IndexedPool};

fn int(v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    encode_int(v, Endianness::Little, &mut out);
    out
}

fn varint(v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    encode_varint(v, &mut out);
    out
}

fn string(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    encode_string(s, &mut out);
    out
}

fn boolean(b: bool) -> Vec<u8> {
    let mut out = Vec::new();
    encode_bool(b, &mut out);
    out
}

fn key_path(path: &str) -> Vec<u8> {
    let mut out = Vec::new();
    IndexedDbKeyPath::String(path.into()).encode_into(&mut out);
    out
}

fn global(key: GlobalMetadataKey) -> Vec<u8> {
    ParsedKey::GlobalMetadata(key).encode().unwrap()
}

fn db(key: DatabaseMetadataKey) -> Vec<u8> {
    ParsedKey::DatabaseMetadata {
        database_id: 1,
        key,
    }
    .encode()
    .unwrap()
}

fn store_meta(meta_type: ObjectStoreMetaType) -> Vec<u8> {
    db(DatabaseMetadataKey::ObjectStoreMeta {
        object_store_id: 1,
        meta_type,
    })
}

fn index_meta(meta_type: IndexMetaType) -> Vec<u8> {
    db(DatabaseMetadataKey::IndexMeta {
        object_store_id: 1,
        index_id: 30,
        meta_type,
    })
}

fn pk(id: f64) -> IndexedDbKey {
    IndexedDbKey::Number(id)
}

fn message(subject: &str) -> Value {
    Value::Object {
        id: 1,
        properties: vec![
            (Value::String(JsString::new("id")), Value::Int32(1)),
            (
                Value::String(JsString::new("subject")),
                Value::String(JsString::new(subject)),
            ),
        ],
    }
}

/// A small but complete backing store: one database holding one store
/// with an index, two records, their exists markers and a blob.
fn mail_store() -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut pairs = vec![
        (global(GlobalMetadataKey::SchemaVersion), int(5)),
        (global(GlobalMetadataKey::MaxDatabaseId), int(1)),
        (global(GlobalMetadataKey::DataVersion), varint(7)),
        (
            global(GlobalMetadataKey::DatabaseName {
                origin: "https_mail.example_0@1".into(),
                database_name: "mail".into(),
            }),
            int(1),
        ),
        (db(DatabaseMetadataKey::OriginName), string("https_mail.example_0@1")),
        (db(DatabaseMetadataKey::DatabaseName), string("mail")),
        (db(DatabaseMetadataKey::MaxObjectStoreId), int(1)),
        (db(DatabaseMetadataKey::UserVersion), varint(3)),
        (db(DatabaseMetadataKey::BlobKeyGeneratorCurrentNumber), varint(2)),
        (
            db(DatabaseMetadataKey::ObjectStoreNames {
                name: "messages".into(),
            }),
            int(1),
        ),
        (store_meta(ObjectStoreMetaType::Name), string("messages")),
        (store_meta(ObjectStoreMetaType::KeyPath), key_path("id")),
        (store_meta(ObjectStoreMetaType::AutoIncrement), boolean(false)),
        (store_meta(ObjectStoreMetaType::Evictable), boolean(false)),
        (store_meta(ObjectStoreMetaType::LastVersion), int(2)),
        (store_meta(ObjectStoreMetaType::MaxIndexId), int(30)),
        (store_meta(ObjectStoreMetaType::HasKeyPath), boolean(true)),
        (
            store_meta(ObjectStoreMetaType::KeyGeneratorCurrentNumber),
            int(1),
        ),
        (index_meta(IndexMetaType::Name), string("by_subject")),
        (index_meta(IndexMetaType::Unique), boolean(false)),
        (index_meta(IndexMetaType::KeyPath), key_path("subject")),
        (index_meta(IndexMetaType::MultiEntry), boolean(false)),
        (
            db(DatabaseMetadataKey::IndexNames {
                object_store_id: 1,
                name: "by_subject".into(),
            }),
            int(30),
        ),
    ];

    for (id, subject) in [(1.0, "hello"), (2.0, "invoice")] {
        let mut value = varint(1);
        value.extend(encode_ssv(&message(subject)).unwrap());
        pairs.push((
            ParsedKey::ObjectStoreData {
                prefix: KeyPrefix::object_store_data(1, 1),
                primary_key: Some(pk(id)),
            }
            .encode()
            .unwrap(),
            value,
        ));
        pairs.push((
            ParsedKey::ExistsEntry {
                prefix: KeyPrefix::exists_entry(1, 1),
                primary_key: Some(pk(id)),
            }
            .encode()
            .unwrap(),
            varint(1),
        ));
        let mut row = varint(1);
        pk(id).encode_into(Endianness::Little, &mut row);
        pairs.push((
            ParsedKey::IndexData(IndexDataKey {
                prefix: KeyPrefix::index_data(1, 1, 30),
                index_key: IndexedDbKey::String(subject.into()),
                sequence_number: Some(1),
                primary_key: Some(pk(id)),
            })
            .encode()
            .unwrap(),
            row,
        ));
    }

    let mut blob = Vec::new();
    encode_bool(false, &mut blob);
    encode_varint(2, &mut blob);
    encode_string_with_length("application/pdf", &mut blob);
    encode_varint(1024, &mut blob);
    pairs.push((
        ParsedKey::BlobEntry {
            prefix: KeyPrefix::blob_entry(1, 1),
            primary_key: Some(pk(2.0)),
        }
        .encode()
        .unwrap(),
        blob,
    ));
    pairs
}

#[test]
fn test_data_version_from_single_pair() {
    let mut pool = IndexedPool::new();
    let key = global(GlobalMetadataKey::DataVersion);
    assert_eq!(key, vec![0, 0, 0, 0, 2]);
    assert!(pool.process(&key, &varint(7), &mut TracingReporter));
    assert_eq!(pool.data_version, Some(7));
}

#[test]
fn test_full_store_rebuilds() {
    let mut reporter = CollectingReporter::default();
    let pool = IndexedPool::from_entries(mail_store(), CodecConfig::default(), &mut reporter);
    assert!(reporter.notices.is_empty(), "{:?}", reporter.notices);

    assert_eq!(pool.schema_version, Some(5));
    assert_eq!(pool.max_database_id, Some(1));
    assert_eq!(pool.data_version, Some(7));
    assert_eq!(pool.record_count(), 2);

    let database = pool.database_by_name("mail").unwrap();
    assert_eq!(database.id, 1);
    assert_eq!(database.origin.as_deref(), Some("https_mail.example_0@1"));
    assert_eq!(database.idb_version, Some(3));
    assert_eq!(database.blob_key_generator, Some(2));
    assert_eq!(database.object_store_names.get("messages"), Some(&1));
    assert_eq!(database.index_names[&1].get("by_subject"), Some(&30));

    let store = database.object_store_by_name("messages").unwrap();
    assert_eq!(store.key_path, Some(IndexedDbKeyPath::String("id".into())));
    assert_eq!(store.auto_increment, Some(false));
    assert_eq!(store.has_key_path, Some(true));
    assert_eq!(store.max_index_id, Some(30));
    assert_eq!(store.exists_markers.len(), 2);

    let record = store.record(&pk(2.0)).unwrap();
    assert_eq!(
        record.value.value.get("subject"),
        Some(&Value::String(JsString::new("invoice")))
    );

    let index = store.index_by_name("by_subject").unwrap();
    assert_eq!(index.unique, Some(false));
    assert_eq!(index.key_path, Some(IndexedDbKeyPath::String("subject".into())));
    let rows = &store.index_entries[&30];
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].referenced_primary_key, Some(pk(2.0)));

    let blobs = &store.blob_metadata[&pk(2.0)];
    assert_eq!(
        blobs[0],
        BlobDescriptor::Blob {
            key: 2,
            content_type: "application/pdf".into(),
            size: 1024,
        }
    );
}

#[test]
fn test_corrupt_pairs_are_skipped_and_reported() {
    let mut pairs = mail_store();
    // Truncated record payload.
    pairs.push((
        ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::object_store_data(1, 1),
            primary_key: Some(pk(3.0)),
        }
        .encode()
        .unwrap(),
        vec![1, 0xFF, 0x15, b'o'],
    ));
    // Key that does not parse at all.
    pairs.push((vec![0xE0], vec![]));
    // Fixed-layout metadata key with a stray byte after it.
    let mut padded = global(GlobalMetadataKey::DataVersion);
    padded.push(0);
    pairs.push((padded, varint(99)));

    let mut reporter = CollectingReporter::default();
    let pool = IndexedPool::from_entries(pairs, CodecConfig::default(), &mut reporter);
    assert_eq!(reporter.notices.len(), 3);
    assert_eq!(reporter.notices[0].key_type, Some(KeyType::ObjectStoreData));
    assert_eq!(reporter.notices[1].key, vec![0xE0]);
    assert_eq!(reporter.notices[2].key_type, Some(KeyType::GlobalMetadata));
    assert_eq!(pool.record_count(), 2);
    assert_eq!(pool.data_version, Some(7));
}

#[test]
fn test_entries_decode_independently() {
    let pairs = mail_store();
    let decoded: Vec<_> = pairs
        .iter()
        .map(|(k, v)| decode_entry(k, v, CodecConfig::default()).unwrap())
        .collect();
    assert!(matches!(decoded[2].value, EntryValue::Int(7)));

    let mut pool = IndexedPool::new();
    for entry in decoded.into_iter().rev() {
        pool.apply(entry).unwrap();
    }
    let database = pool.database(1).unwrap();
    assert_eq!(database.name.as_deref(), Some("mail"));
    assert_eq!(database.object_store(1).unwrap().records.len(), 2);
}

#[test]
fn test_model_serializes_to_json() {
    let mut reporter = CollectingReporter::default();
    let pool = IndexedPool::from_entries(mail_store(), CodecConfig::default(), &mut reporter);
    let json = serde_json::to_value(&pool).unwrap();
    let store = &json["databases"]["1"]["object_stores"]["1"];
    assert_eq!(store["name"], "messages");
    assert_eq!(store["records"].as_array().unwrap().len(), 2);
}
