//! Folding backing store key/value pairs into an [`IndexedPool`].
//!
//! Building is split in two: [`decode_entry`] turns one raw pair into a
//! [`DecodedEntry`] without touching the model, and [`IndexedPool::apply`]
//! folds a decoded entry into the tree. Decoding is pure, so callers can run
//! it on many pairs in parallel and fold the results on one thread.
//!
//! A pair that fails to decode is handed to a [`SkipReporter`] and skipped;
//! it never stops the rest of the scan.

use serde::Serialize;
use tracing::{debug, warn};

use crate::clone::blink::{decode_ssv, DecodedValue};
use crate::indexeddb::coding::{CodecConfig, Reader};
use crate::indexeddb::idb_key::{IndexedDbKey, IndexedDbKeyPath};
use crate::indexeddb::key_prefix::{KeyPrefix, KeyType};
use crate::indexeddb::keys::{
    DatabaseMetadataKey, GlobalMetadataKey, IndexMetaType, ObjectStoreMetaType, ParsedKey,
};
use crate::indexeddb::model::{
    BlobDescriptor, BlobJournalEntry, IndexEntry, IndexedPool, ObjectStore, Record,
};
use crate::util::hex::format_bytes;
use crate::IdbError;

/// Decoded value of one pair, shaped by its key type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntryValue {
    /// Free-list markers carry no payload.
    Empty,
    Int(u64),
    Bool(bool),
    String(String),
    KeyPath(IndexedDbKeyPath),
    BlobJournal(Vec<BlobJournalEntry>),
    BlobEntries(Vec<BlobDescriptor>),
    Record(Record),
    Exists { version: u64 },
    IndexRow {
        version: u64,
        primary_key: Option<IndexedDbKey>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEntry {
    pub key: ParsedKey,
    pub value: EntryValue,
}

/// A pair that was skipped, with enough context to find it again.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipNotice {
    pub key: Vec<u8>,
    pub key_type: Option<KeyType>,
    pub error: IdbError,
}

/// Receives pairs the builder could not decode.
pub trait SkipReporter {
    fn skipped(&mut self, notice: SkipNotice);
}

/// Logs every skipped pair at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl SkipReporter for TracingReporter {
    fn skipped(&mut self, notice: SkipNotice) {
        warn!(
            key = %format_bytes(&notice.key),
            key_type = notice.key_type.map_or("unknown", KeyType::name),
            error = %notice.error,
            "skipping undecodable entry"
        );
    }
}

/// Keeps skipped pairs for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    pub notices: Vec<SkipNotice>,
}

impl SkipReporter for CollectingReporter {
    fn skipped(&mut self, notice: SkipNotice) {
        self.notices.push(notice);
    }
}

fn read_whole<T>(
    value: &[u8],
    config: CodecConfig,
    context: &'static str,
    read: impl FnOnce(&mut Reader<'_>) -> Result<T, IdbError>,
) -> Result<T, IdbError> {
    let mut r = Reader::with_config(value, config);
    let out = read(&mut r)?;
    if !r.is_empty() {
        return Err(IdbError::LengthMismatch {
            context,
            declared: r.position() as u64,
            actual: value.len() as u64,
        });
    }
    Ok(out)
}

fn int_value(value: &[u8], config: CodecConfig) -> Result<EntryValue, IdbError> {
    read_whole(value, config, "int value", |r| r.read_int()).map(EntryValue::Int)
}

fn varint_value(value: &[u8], config: CodecConfig) -> Result<EntryValue, IdbError> {
    read_whole(value, config, "varint value", |r| r.read_varint()).map(EntryValue::Int)
}

fn bool_value(value: &[u8], config: CodecConfig) -> Result<EntryValue, IdbError> {
    read_whole(value, config, "bool value", |r| {
        let offset = r.position();
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(IdbError::Parse(format!(
                "invalid boolean byte 0x{:02x} at offset {}",
                b, offset
            ))),
        }
    })
    .map(EntryValue::Bool)
}

fn string_value(value: &[u8], config: CodecConfig) -> Result<EntryValue, IdbError> {
    read_whole(value, config, "string value", |r| r.read_string()).map(EntryValue::String)
}

fn key_path_value(value: &[u8], config: CodecConfig) -> Result<EntryValue, IdbError> {
    read_whole(value, config, "key path value", IndexedDbKeyPath::decode).map(EntryValue::KeyPath)
}

fn blob_journal(value: &[u8], config: CodecConfig) -> Result<Vec<BlobJournalEntry>, IdbError> {
    let mut r = Reader::with_config(value, config);
    let mut entries = Vec::new();
    while !r.is_empty() {
        let entry = r.atomically(|r| {
            Ok(BlobJournalEntry {
                database_id: r.read_varint()?,
                blob_key: r.read_varint()?,
            })
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn blob_entries(value: &[u8], config: CodecConfig) -> Result<Vec<BlobDescriptor>, IdbError> {
    let mut r = Reader::with_config(value, config);
    let mut entries = Vec::new();
    while !r.is_empty() {
        let entry = r.atomically(|r| {
            let is_file = r.read_bool()?;
            let key = r.read_varint()?;
            let content_type = r.read_string_with_length()?;
            Ok(if is_file {
                BlobDescriptor::File {
                    key,
                    content_type,
                    file_name: r.read_string_with_length()?,
                }
            } else {
                BlobDescriptor::Blob {
                    key,
                    content_type,
                    size: r.read_varint()?,
                }
            })
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Decode a record value: a version varint, then a serialized script value.
pub fn decode_record(value: &[u8], config: CodecConfig) -> Result<Record, IdbError> {
    let mut r = Reader::with_config(value, config);
    let version = r.read_varint()?;
    let value: DecodedValue = decode_ssv(r.rest(), config)?;
    Ok(Record { version, value })
}

fn require_primary_key(
    primary_key: &Option<IndexedDbKey>,
    what: &str,
) -> Result<(), IdbError> {
    match primary_key {
        Some(_) => Ok(()),
        None => Err(IdbError::Parse(format!("{} key without a primary key", what))),
    }
}

fn unknown_meta(tag: u8, context: &'static str) -> IdbError {
    IdbError::MalformedTag {
        tag,
        offset: 0,
        context,
    }
}

fn decode_global_value(
    key: &GlobalMetadataKey,
    value: &[u8],
    config: CodecConfig,
) -> Result<EntryValue, IdbError> {
    match key {
        GlobalMetadataKey::SchemaVersion
        | GlobalMetadataKey::MaxDatabaseId
        | GlobalMetadataKey::DataVersion
        | GlobalMetadataKey::EarliestSweepTime
        | GlobalMetadataKey::DatabaseName { .. } => int_value(value, config),
        GlobalMetadataKey::BlobJournal | GlobalMetadataKey::LiveBlobJournal => {
            blob_journal(value, config).map(EntryValue::BlobJournal)
        }
        GlobalMetadataKey::DatabaseFreeList { .. } => Ok(EntryValue::Empty),
    }
}

fn decode_database_value(
    key: &DatabaseMetadataKey,
    value: &[u8],
    config: CodecConfig,
) -> Result<EntryValue, IdbError> {
    match key {
        DatabaseMetadataKey::OriginName
        | DatabaseMetadataKey::DatabaseName
        | DatabaseMetadataKey::UserStringVersion => string_value(value, config),
        DatabaseMetadataKey::MaxObjectStoreId => int_value(value, config),
        DatabaseMetadataKey::UserVersion | DatabaseMetadataKey::BlobKeyGeneratorCurrentNumber => {
            varint_value(value, config)
        }
        DatabaseMetadataKey::ObjectStoreMeta { meta_type, .. } => match meta_type {
            ObjectStoreMetaType::Name => string_value(value, config),
            ObjectStoreMetaType::KeyPath => key_path_value(value, config),
            ObjectStoreMetaType::AutoIncrement
            | ObjectStoreMetaType::Evictable
            | ObjectStoreMetaType::HasKeyPath => bool_value(value, config),
            ObjectStoreMetaType::LastVersion
            | ObjectStoreMetaType::MaxIndexId
            | ObjectStoreMetaType::KeyGeneratorCurrentNumber => int_value(value, config),
            ObjectStoreMetaType::Unknown(tag) => {
                Err(unknown_meta(*tag, "object store metadata type"))
            }
        },
        DatabaseMetadataKey::IndexMeta { meta_type, .. } => match meta_type {
            IndexMetaType::Name => string_value(value, config),
            IndexMetaType::KeyPath => key_path_value(value, config),
            IndexMetaType::Unique | IndexMetaType::MultiEntry => bool_value(value, config),
            IndexMetaType::Unknown(tag) => Err(unknown_meta(*tag, "index metadata type")),
        },
        DatabaseMetadataKey::ObjectStoreFreeList { .. }
        | DatabaseMetadataKey::IndexFreeList { .. } => Ok(EntryValue::Empty),
        DatabaseMetadataKey::ObjectStoreNames { .. } | DatabaseMetadataKey::IndexNames { .. } => {
            int_value(value, config)
        }
    }
}

/// Decode one backing store pair without touching any model.
pub fn decode_entry(
    key: &[u8],
    value: &[u8],
    config: CodecConfig,
) -> Result<DecodedEntry, IdbError> {
    let parsed = ParsedKey::decode(key, config)?;
    let decoded = match &parsed {
        ParsedKey::GlobalMetadata(k) => decode_global_value(k, value, config)?,
        ParsedKey::DatabaseMetadata { key, .. } => decode_database_value(key, value, config)?,
        ParsedKey::ObjectStoreData { primary_key, .. } => {
            require_primary_key(primary_key, "object store data")?;
            EntryValue::Record(decode_record(value, config)?)
        }
        ParsedKey::ExistsEntry { primary_key, .. } => {
            require_primary_key(primary_key, "exists entry")?;
            let version = read_whole(value, config, "exists value", |r| r.read_varint())?;
            EntryValue::Exists { version }
        }
        ParsedKey::BlobEntry { primary_key, .. } => {
            require_primary_key(primary_key, "blob entry")?;
            EntryValue::BlobEntries(blob_entries(value, config)?)
        }
        ParsedKey::IndexData(_) => {
            let mut r = Reader::with_config(value, config);
            let version = r.read_varint()?;
            let primary_key = if r.is_empty() {
                None
            } else {
                Some(IndexedDbKey::decode(&mut r)?)
            };
            EntryValue::IndexRow {
                version,
                primary_key,
            }
        }
    };
    Ok(DecodedEntry {
        key: parsed,
        value: decoded,
    })
}

fn mismatch(key_type: KeyType) -> IdbError {
    IdbError::Parse(format!("value does not fit a {} key", key_type.name()))
}

impl IndexedPool {
    /// Fold a decoded entry into the model.
    ///
    /// Only fails when `entry.value` is not the shape [`decode_entry`]
    /// produces for `entry.key`.
    pub fn apply(&mut self, entry: DecodedEntry) -> Result<(), IdbError> {
        let key_type = entry.key.key_type();
        debug!(key_type = key_type.name(), "applying entry");
        match (entry.key, entry.value) {
            (ParsedKey::GlobalMetadata(key), value) => self
                .apply_global(key, value)
                .ok_or_else(|| mismatch(key_type)),
            (ParsedKey::DatabaseMetadata { database_id, key }, value) => self
                .apply_database(database_id, key, value)
                .ok_or_else(|| mismatch(key_type)),
            (
                ParsedKey::ObjectStoreData {
                    prefix,
                    primary_key: Some(pk),
                },
                EntryValue::Record(record),
            ) => {
                self.store_mut(prefix).records.insert(pk, record);
                Ok(())
            }
            (
                ParsedKey::ExistsEntry {
                    prefix,
                    primary_key: Some(pk),
                },
                EntryValue::Exists { version },
            ) => {
                self.store_mut(prefix).exists_markers.insert(pk, version);
                Ok(())
            }
            (
                ParsedKey::BlobEntry {
                    prefix,
                    primary_key: Some(pk),
                },
                EntryValue::BlobEntries(blobs),
            ) => {
                self.store_mut(prefix).blob_metadata.insert(pk, blobs);
                Ok(())
            }
            (
                ParsedKey::IndexData(key),
                EntryValue::IndexRow {
                    version,
                    primary_key,
                },
            ) => {
                let index_id = key.prefix.index_id;
                let store = self.store_mut(key.prefix);
                store.index_mut(index_id);
                store
                    .index_entries
                    .entry(index_id)
                    .or_default()
                    .push(IndexEntry {
                        index_key: key.index_key,
                        sequence_number: key.sequence_number,
                        primary_key: key.primary_key,
                        version,
                        referenced_primary_key: primary_key,
                    });
                Ok(())
            }
            _ => Err(mismatch(key_type)),
        }
    }

    /// Decode and fold one raw pair with the default codec settings.
    ///
    /// Returns whether the pair was applied; skipped pairs go to `reporter`.
    pub fn process(
        &mut self,
        key: &[u8],
        value: &[u8],
        reporter: &mut dyn SkipReporter,
    ) -> bool {
        self.process_with(key, value, CodecConfig::default(), reporter)
    }

    pub fn process_with(
        &mut self,
        key: &[u8],
        value: &[u8],
        config: CodecConfig,
        reporter: &mut dyn SkipReporter,
    ) -> bool {
        let decoded = decode_entry(key, value, config);
        self.fold(key, decoded, config, reporter)
    }

    /// Fold the result of an earlier [`decode_entry`] call for `key`.
    pub fn fold(
        &mut self,
        key: &[u8],
        decoded: Result<DecodedEntry, IdbError>,
        config: CodecConfig,
        reporter: &mut dyn SkipReporter,
    ) -> bool {
        match decoded.and_then(|entry| self.apply(entry)) {
            Ok(()) => true,
            Err(error) => {
                let key_type = KeyPrefix::decode(&mut Reader::with_config(key, config))
                    .ok()
                    .map(|p| p.key_type());
                reporter.skipped(SkipNotice {
                    key: key.to_vec(),
                    key_type,
                    error,
                });
                false
            }
        }
    }

    /// Build a pool from a sequence of pairs.
    pub fn from_entries<K, V, I>(
        entries: I,
        config: CodecConfig,
        reporter: &mut dyn SkipReporter,
    ) -> Self
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut pool = IndexedPool::new();
        for (key, value) in entries {
            pool.process_with(key.as_ref(), value.as_ref(), config, reporter);
        }
        pool
    }

    fn store_mut(&mut self, prefix: KeyPrefix) -> &mut ObjectStore {
        self.database_mut(prefix.database_id)
            .object_store_mut(prefix.object_store_id)
    }

    fn apply_global(&mut self, key: GlobalMetadataKey, value: EntryValue) -> Option<()> {
        match (key, value) {
            (GlobalMetadataKey::SchemaVersion, EntryValue::Int(v)) => {
                self.schema_version = Some(v)
            }
            (GlobalMetadataKey::MaxDatabaseId, EntryValue::Int(v)) => {
                self.max_database_id = Some(v)
            }
            (GlobalMetadataKey::DataVersion, EntryValue::Int(v)) => self.data_version = Some(v),
            (GlobalMetadataKey::EarliestSweepTime, EntryValue::Int(v)) => {
                self.earliest_sweep = Some(v)
            }
            (GlobalMetadataKey::BlobJournal, EntryValue::BlobJournal(j)) => {
                self.primary_blob_journal = j
            }
            (GlobalMetadataKey::LiveBlobJournal, EntryValue::BlobJournal(j)) => {
                self.live_blob_journal = j
            }
            (GlobalMetadataKey::DatabaseFreeList { database_id }, EntryValue::Empty) => {
                self.free_database_ids.insert(database_id);
            }
            (
                GlobalMetadataKey::DatabaseName {
                    origin,
                    database_name,
                },
                EntryValue::Int(id),
            ) => {
                let db = self.database_mut(id);
                db.origin.get_or_insert(origin);
                db.name.get_or_insert(database_name);
            }
            _ => return None,
        }
        Some(())
    }

    fn apply_database(
        &mut self,
        database_id: u64,
        key: DatabaseMetadataKey,
        value: EntryValue,
    ) -> Option<()> {
        let db = self.database_mut(database_id);
        match (key, value) {
            (DatabaseMetadataKey::OriginName, EntryValue::String(s)) => db.origin = Some(s),
            (DatabaseMetadataKey::DatabaseName, EntryValue::String(s)) => db.name = Some(s),
            (DatabaseMetadataKey::UserStringVersion, EntryValue::String(s)) => {
                db.string_version = Some(s)
            }
            (DatabaseMetadataKey::MaxObjectStoreId, EntryValue::Int(v)) => {
                db.max_object_store_id = Some(v)
            }
            (DatabaseMetadataKey::UserVersion, EntryValue::Int(v)) => db.idb_version = Some(v),
            (DatabaseMetadataKey::BlobKeyGeneratorCurrentNumber, EntryValue::Int(v)) => {
                db.blob_key_generator = Some(v)
            }
            (
                DatabaseMetadataKey::ObjectStoreMeta {
                    object_store_id,
                    meta_type,
                },
                value,
            ) => {
                let store = db.object_store_mut(u64::from(object_store_id));
                match (meta_type, value) {
                    (ObjectStoreMetaType::Name, EntryValue::String(s)) => store.name = Some(s),
                    (ObjectStoreMetaType::KeyPath, EntryValue::KeyPath(p)) => {
                        store.key_path = Some(p)
                    }
                    (ObjectStoreMetaType::AutoIncrement, EntryValue::Bool(b)) => {
                        store.auto_increment = Some(b)
                    }
                    (ObjectStoreMetaType::Evictable, EntryValue::Bool(b)) => {
                        store.evictable = Some(b)
                    }
                    (ObjectStoreMetaType::HasKeyPath, EntryValue::Bool(b)) => {
                        store.has_key_path = Some(b)
                    }
                    (ObjectStoreMetaType::LastVersion, EntryValue::Int(v)) => {
                        store.last_version = Some(v)
                    }
                    (ObjectStoreMetaType::MaxIndexId, EntryValue::Int(v)) => {
                        store.max_index_id = Some(v)
                    }
                    (ObjectStoreMetaType::KeyGeneratorCurrentNumber, EntryValue::Int(v)) => {
                        store.key_generator_current = Some(v)
                    }
                    _ => return None,
                }
            }
            (
                DatabaseMetadataKey::IndexMeta {
                    object_store_id,
                    index_id,
                    meta_type,
                },
                value,
            ) => {
                let index = db.object_store_mut(object_store_id).index_mut(index_id);
                match (meta_type, value) {
                    (IndexMetaType::Name, EntryValue::String(s)) => index.name = Some(s),
                    (IndexMetaType::KeyPath, EntryValue::KeyPath(p)) => index.key_path = Some(p),
                    (IndexMetaType::Unique, EntryValue::Bool(b)) => index.unique = Some(b),
                    (IndexMetaType::MultiEntry, EntryValue::Bool(b)) => {
                        index.multi_entry = Some(b)
                    }
                    _ => return None,
                }
            }
            (DatabaseMetadataKey::ObjectStoreFreeList { object_store_id }, EntryValue::Empty) => {
                db.free_object_store_ids.insert(object_store_id);
            }
            (
                DatabaseMetadataKey::IndexFreeList {
                    object_store_id,
                    index_id,
                },
                EntryValue::Empty,
            ) => {
                db.free_index_ids
                    .entry(object_store_id)
                    .or_default()
                    .insert(index_id);
            }
            (DatabaseMetadataKey::ObjectStoreNames { name }, EntryValue::Int(id)) => {
                db.object_store_names.insert(name, id);
            }
            (
                DatabaseMetadataKey::IndexNames {
                    object_store_id,
                    name,
                },
                EntryValue::Int(id),
            ) => {
                db.index_names
                    .entry(object_store_id)
                    .or_default()
                    .insert(name, id);
            }
            _ => return None,
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::blink::encode_ssv;
    use crate::clone::value::Value;
    use crate::indexeddb::coding::{
        encode_bool, encode_int, encode_string, encode_string_with_length, encode_varint,
        Endianness,
    };

    fn global(key: GlobalMetadataKey) -> Vec<u8> {
        ParsedKey::GlobalMetadata(key).encode().unwrap()
    }

    fn db_meta(database_id: u64, key: DatabaseMetadataKey) -> Vec<u8> {
        ParsedKey::DatabaseMetadata { database_id, key }.encode().unwrap()
    }

    fn int(v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_int(v, Endianness::Little, &mut out);
        out
    }

    fn string(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        encode_string(s, &mut out);
        out
    }

    fn record(version: u64, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint(version, &mut out);
        out.extend(encode_ssv(value).unwrap());
        out
    }

    #[test]
    fn test_data_version() {
        let mut pool = IndexedPool::new();
        let mut value = Vec::new();
        encode_varint(7, &mut value);
        assert!(pool.process(&global(GlobalMetadataKey::DataVersion), &value, &mut TracingReporter));
        assert_eq!(pool.data_version, Some(7));
    }

    #[test]
    fn test_database_name_creates_database() {
        let mut pool = IndexedPool::new();
        let key = global(GlobalMetadataKey::DatabaseName {
            origin: "https_example.org_0@1".into(),
            database_name: "mail".into(),
        });
        assert!(pool.process(&key, &int(3), &mut TracingReporter));
        let db = pool.database(3).unwrap();
        assert_eq!(db.name.as_deref(), Some("mail"));
        assert_eq!(db.origin.as_deref(), Some("https_example.org_0@1"));
    }

    #[test]
    fn test_object_store_metadata() {
        let mut pool = IndexedPool::new();
        let mut reporter = CollectingReporter::default();
        let meta = |meta_type| DatabaseMetadataKey::ObjectStoreMeta {
            object_store_id: 2,
            meta_type,
        };
        let mut auto = Vec::new();
        encode_bool(true, &mut auto);
        let mut path = Vec::new();
        IndexedDbKeyPath::String("id".into()).encode_into(&mut path);

        pool.process(&db_meta(1, meta(ObjectStoreMetaType::Name)), &string("inbox"), &mut reporter);
        pool.process(&db_meta(1, meta(ObjectStoreMetaType::AutoIncrement)), &auto, &mut reporter);
        pool.process(&db_meta(1, meta(ObjectStoreMetaType::KeyPath)), &path, &mut reporter);
        pool.process(&db_meta(1, meta(ObjectStoreMetaType::MaxIndexId)), &int(31), &mut reporter);
        assert!(reporter.notices.is_empty());

        let store = pool.database(1).unwrap().object_store(2).unwrap();
        assert_eq!(store.name.as_deref(), Some("inbox"));
        assert_eq!(store.auto_increment, Some(true));
        assert_eq!(store.key_path, Some(IndexedDbKeyPath::String("id".into())));
        assert_eq!(store.max_index_id, Some(31));
    }

    #[test]
    fn test_unknown_metadata_type_is_reported() {
        let mut pool = IndexedPool::new();
        let mut reporter = CollectingReporter::default();
        let key = db_meta(
            1,
            DatabaseMetadataKey::ObjectStoreMeta {
                object_store_id: 2,
                meta_type: ObjectStoreMetaType::Unknown(42),
            },
        );
        assert!(!pool.process(&key, &int(1), &mut reporter));
        assert_eq!(reporter.notices.len(), 1);
        assert_eq!(reporter.notices[0].key, key);
        assert_eq!(reporter.notices[0].key_type, Some(KeyType::DatabaseMetadata));
        assert!(matches!(
            reporter.notices[0].error,
            IdbError::MalformedTag { tag: 42, .. }
        ));

        // The scan carries on.
        assert!(pool.process(&global(GlobalMetadataKey::SchemaVersion), &int(5), &mut reporter));
        assert_eq!(pool.schema_version, Some(5));
    }

    #[test]
    fn test_record_and_index_row() {
        let mut pool = IndexedPool::new();
        let mut reporter = CollectingReporter::default();
        let pk = IndexedDbKey::Number(1.0);
        let key = ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::object_store_data(1, 2),
            primary_key: Some(pk.clone()),
        }
        .encode()
        .unwrap();
        assert!(pool.process(&key, &record(4, &Value::string("hello")), &mut reporter));

        let index_key = ParsedKey::IndexData(crate::indexeddb::keys::IndexDataKey {
            prefix: KeyPrefix::index_data(1, 2, 30),
            index_key: IndexedDbKey::String("h".into()),
            sequence_number: Some(4),
            primary_key: Some(pk.clone()),
        })
        .encode()
        .unwrap();
        let mut row = Vec::new();
        encode_varint(4, &mut row);
        pk.encode_into(Endianness::Little, &mut row);
        assert!(pool.process(&index_key, &row, &mut reporter));
        assert!(reporter.notices.is_empty());

        let store = pool.database(1).unwrap().object_store(2).unwrap();
        let rec = store.record(&pk).unwrap();
        assert_eq!(rec.version, 4);
        assert_eq!(rec.value.value, Value::string("hello"));
        let rows = &store.index_entries[&30];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].referenced_primary_key, Some(pk));
        assert!(store.indices.contains_key(&30));
    }

    #[test]
    fn test_blob_entries_and_journal() {
        let mut value = Vec::new();
        encode_bool(true, &mut value);
        encode_varint(5, &mut value);
        encode_string_with_length("text/plain", &mut value);
        encode_string_with_length("a.txt", &mut value);
        encode_bool(false, &mut value);
        encode_varint(6, &mut value);
        encode_string_with_length("", &mut value);
        encode_varint(1024, &mut value);
        let blobs = blob_entries(&value, CodecConfig::default()).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].key(), 5);
        assert!(matches!(&blobs[1], BlobDescriptor::Blob { size: 1024, .. }));

        let journal = blob_journal(&[1, 5, 2, 9], CodecConfig::default()).unwrap();
        assert_eq!(
            journal,
            vec![
                BlobJournalEntry { database_id: 1, blob_key: 5 },
                BlobJournalEntry { database_id: 2, blob_key: 9 },
            ]
        );
        assert!(matches!(
            blob_journal(&[1], CodecConfig::default()),
            Err(IdbError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let mut pool = IndexedPool::new();
        let mut reporter = CollectingReporter::default();
        let key = ParsedKey::ObjectStoreData {
            prefix: KeyPrefix::object_store_data(1, 2),
            primary_key: Some(IndexedDbKey::Number(1.0)),
        }
        .encode()
        .unwrap();
        assert!(!pool.process(&key, &[1, 0xFF, 15, b'o', b'"'], &mut reporter));
        assert_eq!(reporter.notices[0].key_type, Some(KeyType::ObjectStoreData));
        assert!(pool.databases.is_empty());
    }

    #[test]
    fn test_invalid_bool_is_parse_error() {
        assert!(matches!(
            bool_value(&[2], CodecConfig::default()),
            Err(IdbError::Parse(_))
        ));
        assert!(matches!(
            int_value(&[0; 9], CodecConfig::default()),
            Err(IdbError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_from_entries_is_order_insensitive() {
        let pairs = vec![
            (
                db_meta(1, DatabaseMetadataKey::DatabaseName),
                string("mail"),
            ),
            (global(GlobalMetadataKey::MaxDatabaseId), int(1)),
        ];
        let mut reporter = CollectingReporter::default();
        let forward =
            IndexedPool::from_entries(pairs.clone(), CodecConfig::default(), &mut reporter);
        let backward = IndexedPool::from_entries(
            pairs.into_iter().rev(),
            CodecConfig::default(),
            &mut reporter,
        );
        assert_eq!(forward, backward);
        assert_eq!(forward.max_database_id, Some(1));
    }
}
